// ── Override resolution pipeline ──
//
// Environment → session descriptor:
//
//   1. default templates (protocol, path, device name, credential, firewall)
//   2. default description from site and device type
//   3. every override rule in order; each true condition overwrites its
//      target, so the last match wins
//   4. path and name normalization for the filesystem
//
// Rules see the descriptor as resolved so far: `device_name`, `path`, etc.
// shadow the environment attributes of the same name.

use serde_json::Value;
use tracing::{debug, trace};

use crate::config::{OverrideRule, OverrideTarget, SyncConfig};
use crate::environment::{Environment, strip_path_unsafe};
use crate::error::CoreError;
use crate::eval::{EvalError, Evaluator, Scope};
use crate::model::{Firewall, SessionDescriptor};

/// Environment overlaid with the in-progress descriptor.
struct SessionScope<'a> {
    env: &'a Environment,
    session: &'a SessionDescriptor,
}

impl Scope for SessionScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        let text = |s: &str| Some(Value::String(s.to_owned()));
        match name {
            "path" => text(&self.session.path),
            "device_name" => text(&self.session.device_name),
            "description" => text(&self.session.description),
            "connection_protocol" => text(&self.session.protocol),
            "credential" => text(self.session.credential.as_deref().unwrap_or_default()),
            "firewall" => text(self.session.firewall.as_str()),
            other => self.env.lookup(other),
        }
    }
}

/// Applies the configured templates, overrides and filters.
pub struct Resolver<'a> {
    evaluator: &'a Evaluator,
    config: &'a SyncConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(evaluator: &'a Evaluator, config: &'a SyncConfig) -> Self {
        Self { evaluator, config }
    }

    /// Resolve the final session descriptor for one environment.
    pub fn resolve(&self, env: &Environment) -> Result<SessionDescriptor, CoreError> {
        let mut session = self.defaults(env)?;

        for (index, rule) in self.config.overrides.iter().enumerate() {
            self.apply_override(index, rule, env, &mut session)?;
        }

        finalize(&mut session, env)?;
        trace!(device = %session.device_name, path = %session.path, "resolved session");
        Ok(session)
    }

    /// Whether every configured filter holds for the resolved session.
    ///
    /// A filter that fails to evaluate counts as not holding.
    pub fn is_selected(&self, env: &Environment, session: &SessionDescriptor) -> bool {
        let scope = SessionScope { env, session };
        self.config.filters.iter().all(|filter| {
            match self.evaluator.evaluate_condition(filter, &scope) {
                Ok(selected) => selected,
                Err(e) => {
                    debug!(device = %session.device_name, filter, error = %e, "filter failed to evaluate");
                    false
                }
            }
        })
    }

    fn defaults(&self, env: &Environment) -> Result<SessionDescriptor, CoreError> {
        let templates = &self.config.templates;
        let resolve = |field: &str, template: &str| -> Result<String, CoreError> {
            self.evaluator
                .evaluate_string(template, env)
                .map(Option::unwrap_or_default)
                .map_err(|source| evaluation_error(env.device_name.as_str(), field, source))
        };

        let protocol = resolve("connection_protocol", &templates.connection_protocol)?;
        let path = resolve("path", &templates.path)?;
        let device_name = resolve("device_name", &templates.device_name)?;
        let credential = resolve("credential", &templates.credential)?;
        let firewall = resolve("firewall", &templates.firewall)?;

        Ok(SessionDescriptor {
            device_name,
            path,
            ip: env.device_ip.clone(),
            port: env.device_port,
            protocol,
            description: format!(
                "Site: {}\nType: {}\nAdresse: {}",
                env.site_name, env.device_type, env.site_address
            ),
            credential: Some(credential).filter(|c| !c.is_empty()),
            firewall: Firewall::parse(&firewall),
        })
    }

    fn apply_override(
        &self,
        index: usize,
        rule: &OverrideRule,
        env: &Environment,
        session: &mut SessionDescriptor,
    ) -> Result<(), CoreError> {
        let scope = SessionScope {
            env,
            session: &*session,
        };

        match self.evaluator.evaluate_condition(&rule.condition, &scope) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => {
                debug!(
                    device = %session.device_name,
                    rule = index,
                    condition = %rule.condition,
                    error = %e,
                    "override condition failed, skipping rule"
                );
                return Ok(());
            }
        }

        let value = self
            .evaluator
            .evaluate_string(&rule.value, &scope)
            .map_err(|source| {
                let field = format!("override #{index} ({})", rule.target);
                evaluation_error(&session.device_name, &field, source)
            })?;
        let Some(value) = value else {
            trace!(device = %session.device_name, rule = index, "override value is nil, skipping");
            return Ok(());
        };

        debug!(device = %session.device_name, rule = index, target = %rule.target, %value, "override applied");
        match rule.target {
            OverrideTarget::Path => session.path = value,
            OverrideTarget::DeviceName => session.device_name = value,
            OverrideTarget::Description => session.description = value,
            OverrideTarget::ConnectionProtocol => session.protocol = value,
            OverrideTarget::Credential => {
                session.credential = Some(value).filter(|c| !c.is_empty());
            }
            OverrideTarget::Firewall => session.firewall = Firewall::from_session_name(&value),
        }
        Ok(())
    }
}

fn evaluation_error(device: &str, field: &str, source: EvalError) -> CoreError {
    CoreError::Evaluation {
        device: device.to_owned(),
        field: field.to_owned(),
        source,
    }
}

/// Make the name and folder safe to use below the session root.
fn finalize(session: &mut SessionDescriptor, env: &Environment) -> Result<(), CoreError> {
    session.device_name = strip_path_unsafe(session.device_name.trim());
    if session.device_name.is_empty() || session.device_name.starts_with("__") {
        return Err(CoreError::InvalidPath {
            device: env.device_name.clone(),
            path: session.relative_file(),
            reason: "device name resolved to an empty or reserved name".into(),
        });
    }

    session.path = normalize_session_path(&session.path).map_err(|reason| CoreError::InvalidPath {
        device: session.device_name.clone(),
        path: session.path.clone(),
        reason,
    })?;
    Ok(())
}

/// Collapse a folder template result into `a/b/c` form.
///
/// Empty and `.` components are dropped; `..` is rejected so sessions can
/// never land outside the session root.
pub fn normalize_session_path(path: &str) -> Result<String, String> {
    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        let part = strip_path_unsafe(part.trim());
        match part.as_str() {
            "" | "." => {}
            ".." => return Err("parent directory components are not allowed".into()),
            _ => parts.push(part),
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SessionTemplates;
    use crate::model::EntityKind;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn env(name: &str) -> Environment {
        let mut extras = IndexMap::new();
        extras.insert(
            "tags".to_owned(),
            json!([{ "name": "fw:edge-fw", "slug": "fw-edge-fw" }]),
        );
        Environment {
            session_type: EntityKind::Device,
            device_name: name.into(),
            device_role: "Core Router".into(),
            device_type: "Juniper MX204".into(),
            device_ip: "10.0.0.1".into(),
            device_port: 22,
            region_name: "Denmark".into(),
            tenant_name: "Acme".into(),
            site_name: "Copenhagen".into(),
            site_group: String::new(),
            site_address: "Main St 1, 1000 Copenhagen".into(),
            virtual_chassis_name: String::new(),
            is_console_session: false,
            console_server_port: String::new(),
            extras,
        }
    }

    fn rule(target: OverrideTarget, condition: &str, value: &str) -> OverrideRule {
        OverrideRule {
            target,
            condition: condition.into(),
            value: value.into(),
        }
    }

    fn resolve(config: &SyncConfig, name: &str) -> Result<SessionDescriptor, CoreError> {
        let evaluator = Evaluator::new();
        Resolver::new(&evaluator, config).resolve(&env(name))
    }

    #[test]
    fn defaults_only() {
        let session = resolve(&SyncConfig::default(), "rtr-01").unwrap();

        assert_eq!(session.device_name, "rtr-01");
        assert_eq!(session.path, "Acme/Denmark/Copenhagen/Core Router");
        assert_eq!(session.ip, "10.0.0.1");
        assert_eq!(session.port, 22);
        assert_eq!(session.protocol, "SSH2");
        assert_eq!(session.credential, None);
        assert_eq!(session.firewall, Firewall::Disabled);
        assert_eq!(
            session.description,
            "Site: Copenhagen\nType: Juniper MX204\nAdresse: Main St 1, 1000 Copenhagen"
        );
    }

    #[test]
    fn device_name_template_is_evaluated() {
        let config = SyncConfig {
            templates: SessionTemplates {
                device_name: "{site_name}-{device_name}".into(),
                ..SessionTemplates::default()
            },
            ..SyncConfig::default()
        };
        assert_eq!(resolve(&config, "rtr-01").unwrap().device_name, "Copenhagen-rtr-01");
    }

    #[test]
    fn last_matching_rule_wins() {
        let config = SyncConfig {
            overrides: vec![
                rule(OverrideTarget::Path, "{{ true }}", "First"),
                rule(OverrideTarget::Path, "{{ site_name == 'Copenhagen' }}", "Second"),
                rule(OverrideTarget::Path, "{{ false }}", "Never"),
            ],
            ..SyncConfig::default()
        };
        assert_eq!(resolve(&config, "rtr-01").unwrap().path, "Second");
    }

    #[test]
    fn later_rules_see_earlier_results() {
        let config = SyncConfig {
            overrides: vec![
                rule(OverrideTarget::DeviceName, "{{ true }}", "{device_name}-oob"),
                rule(OverrideTarget::Path, "{{ device_name endsWith '-oob' }}", "OOB/{site_name}"),
            ],
            ..SyncConfig::default()
        };
        let session = resolve(&config, "rtr-01").unwrap();
        assert_eq!(session.device_name, "rtr-01-oob");
        assert_eq!(session.path, "OOB/Copenhagen");
    }

    #[test]
    fn firewall_override_values() {
        let empty = SyncConfig {
            overrides: vec![rule(OverrideTarget::Firewall, "{{ true }}", "")],
            ..SyncConfig::default()
        };
        assert_eq!(resolve(&empty, "rtr-01").unwrap().firewall.as_str(), "None");

        let named = SyncConfig {
            overrides: vec![rule(OverrideTarget::Firewall, "{{ true }}", "edge-fw")],
            ..SyncConfig::default()
        };
        assert_eq!(
            resolve(&named, "rtr-01").unwrap().firewall.as_str(),
            "Session:edge-fw"
        );
    }

    #[test]
    fn firewall_from_tag_expression() {
        let config = SyncConfig {
            overrides: vec![rule(
                OverrideTarget::Firewall,
                "find_tag(tags, 'fw') != nil",
                "{{ find_tag(tags, 'fw') }}",
            )],
            ..SyncConfig::default()
        };
        assert_eq!(
            resolve(&config, "rtr-01").unwrap().firewall,
            Firewall::Reference("Session:edge-fw".into())
        );
    }

    #[test]
    fn credential_and_firewall_are_independent() {
        let config = SyncConfig {
            overrides: vec![
                rule(OverrideTarget::Firewall, "{{ true }}", "edge-fw"),
                rule(OverrideTarget::Credential, "{{ true }}", "netops"),
            ],
            ..SyncConfig::default()
        };
        let session = resolve(&config, "rtr-01").unwrap();
        assert_eq!(session.credential.as_deref(), Some("netops"));
        assert_eq!(session.firewall.as_str(), "Session:edge-fw");
    }

    #[test]
    fn failing_condition_skips_rule() {
        let config = SyncConfig {
            overrides: vec![
                rule(OverrideTarget::Path, "{{ site_name > 3 }}", "Broken"),
                rule(OverrideTarget::Path, "{{ site_name }}", "NotBool"),
                rule(OverrideTarget::Path, "true", "Unbraced"),
            ],
            ..SyncConfig::default()
        };
        assert_eq!(
            resolve(&config, "rtr-01").unwrap().path,
            "Acme/Denmark/Copenhagen/Core Router"
        );
    }

    #[test]
    fn failing_value_aborts_device() {
        let config = SyncConfig {
            overrides: vec![rule(OverrideTarget::Description, "{{ true }}", "{{ 1 / 0 }}")],
            ..SyncConfig::default()
        };
        let err = resolve(&config, "rtr-01").unwrap_err();
        assert!(matches!(err, CoreError::Evaluation { ref device, .. } if device == "rtr-01"));
    }

    #[test]
    fn nil_value_leaves_target_untouched() {
        let config = SyncConfig {
            overrides: vec![rule(OverrideTarget::Credential, "{{ true }}", "{{ find_tag(tags, 'cred') }}")],
            ..SyncConfig::default()
        };
        assert_eq!(resolve(&config, "rtr-01").unwrap().credential, None);
    }

    #[test]
    fn failing_default_template_aborts_device() {
        let config = SyncConfig {
            templates: SessionTemplates {
                path: "{{ site_name +  }}".into(),
                ..SessionTemplates::default()
            },
            ..SyncConfig::default()
        };
        assert!(matches!(
            resolve(&config, "rtr-01"),
            Err(CoreError::Evaluation { ref field, .. }) if field == "path"
        ));
    }

    #[test]
    fn path_escaping_root_is_rejected() {
        let config = SyncConfig {
            overrides: vec![rule(OverrideTarget::Path, "{{ true }}", "../outside")],
            ..SyncConfig::default()
        };
        assert!(matches!(
            resolve(&config, "rtr-01"),
            Err(CoreError::InvalidPath { .. })
        ));
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_session_path("/Acme//./EU\\CPH/").unwrap(), "Acme/EU/CPH");
        assert_eq!(normalize_session_path("").unwrap(), "");
        assert!(normalize_session_path("a/../b").is_err());
    }

    #[test]
    fn filters_must_all_hold() {
        let evaluator = Evaluator::new();
        let env = env("rtr-01");
        let mut config = SyncConfig {
            filters: vec![
                "{{ device_role contains 'Router' }}".into(),
                "{{ site_name == 'Copenhagen' }}".into(),
            ],
            ..SyncConfig::default()
        };
        let session = Resolver::new(&evaluator, &config).resolve(&env).unwrap();
        assert!(Resolver::new(&evaluator, &config).is_selected(&env, &session));

        config.filters.push("{{ device_port }}".into());
        assert!(!Resolver::new(&evaluator, &config).is_selected(&env, &session));

        config.filters.truncate(2);
        config.filters.push("true".into());
        assert!(!Resolver::new(&evaluator, &config).is_selected(&env, &session));
    }
}
