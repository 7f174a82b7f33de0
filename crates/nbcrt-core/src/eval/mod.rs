// ── Expression / template evaluator ──
//
// Two modes, chosen by the presence of `{{`:
//
//   * template:   `{tenant_name}/{site_name}` substitutes scalar attributes;
//                 unknown tokens are left verbatim.
//   * expression: `prefix{{ expr }}suffix` compiles `expr`, runs it, and
//                 either returns the typed result (no prefix/suffix) or
//                 splices its string form between prefix and suffix.
//
// Compiled programs are cached per `Evaluator` keyed by the exact inner
// source text.

mod functions;
mod interp;
mod lexer;
mod parser;

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

pub use functions::find_tag;
pub use interp::{stringify, type_name};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

static TEMPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid template token regex")
});

/// Errors from compiling or running an expression.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unterminated '{{{{' in \"{source_text}\"")]
    Unterminated { source_text: String },

    #[error("{message}")]
    Runtime { message: String },

    #[error("expected {expected}, got {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
}

impl EvalError {
    pub(crate) fn runtime(message: String) -> Self {
        Self::Runtime { message }
    }
}

/// Attribute lookup used by templates and expressions.
pub trait Scope {
    /// Value of `name`, or `None` when the attribute is not defined.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// A compiled expression.
#[derive(Debug)]
pub struct Program {
    expr: parser::Expr,
}

impl Program {
    pub fn compile(source: &str) -> Result<Self, EvalError> {
        Ok(Self {
            expr: parser::parse(source)?,
        })
    }

    pub fn run(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
        interp::evaluate(&self.expr, scope)
    }
}

/// Template and expression evaluator with a compiled-program cache.
#[derive(Debug, Default)]
pub struct Evaluator {
    cache: DashMap<String, Arc<Program>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct expressions compiled so far.
    pub fn cached_programs(&self) -> usize {
        self.cache.len()
    }

    fn program(&self, source: &str) -> Result<Arc<Program>, EvalError> {
        if let Some(program) = self.cache.get(source) {
            return Ok(Arc::clone(program.value()));
        }
        trace!(source, "compiling expression");
        let program = Arc::new(Program::compile(source)?);
        self.cache
            .entry(source.to_owned())
            .or_insert_with(|| Arc::clone(&program));
        Ok(program)
    }

    /// Evaluate a template or expression string to a value.
    ///
    /// Template mode and spliced expressions always yield a string; a bare
    /// `{{ expr }}` yields whatever the expression produced.
    pub fn evaluate(&self, source: &str, scope: &dyn Scope) -> Result<Value, EvalError> {
        let Some(start) = source.find(OPEN) else {
            return Ok(Value::String(self.apply_template(source, scope)));
        };
        let after_open = start + OPEN.len();
        let Some(len) = source[after_open..].find(CLOSE) else {
            return Err(EvalError::Unterminated {
                source_text: source.to_owned(),
            });
        };
        let end = after_open + len;

        let prefix = &source[..start];
        let inner = source[after_open..end].trim();
        let suffix = &source[end + CLOSE.len()..];

        let value = self.program(inner)?.run(scope)?;
        if prefix.is_empty() && suffix.is_empty() {
            Ok(value)
        } else {
            Ok(Value::String(format!("{prefix}{}{suffix}", stringify(&value))))
        }
    }

    /// Evaluate to a string; `nil` is reported as `None`.
    pub fn evaluate_string(
        &self,
        source: &str,
        scope: &dyn Scope,
    ) -> Result<Option<String>, EvalError> {
        match self.evaluate(source, scope)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(EvalError::UnexpectedType {
                expected: "string",
                found: type_name(&other),
            }),
        }
    }

    /// Evaluate a condition, which must produce a boolean.
    ///
    /// Conditions follow the same mode rule as any other value: without
    /// `{{ }}` the text is a template and yields a string, not a bool.
    pub fn evaluate_condition(&self, source: &str, scope: &dyn Scope) -> Result<bool, EvalError> {
        match self.evaluate(source.trim(), scope)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::UnexpectedType {
                expected: "bool",
                found: type_name(&other),
            }),
        }
    }

    /// Substitute `{attribute}` tokens with scalar attribute values.
    pub fn apply_template(&self, template: &str, scope: &dyn Scope) -> String {
        TEMPLATE_TOKEN
            .replace_all(template, |caps: &Captures<'_>| {
                match scope.lookup(&caps[1]) {
                    Some(value @ (Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null)) => {
                        stringify(&value)
                    }
                    _ => caps[0].to_owned(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Env;

    impl Scope for Env {
        fn lookup(&self, name: &str) -> Option<Value> {
            match name {
                "tenant_name" => Some(json!("Acme")),
                "site_name" => Some(json!("Copenhagen")),
                "device_port" => Some(json!(22)),
                "is_console_session" => Some(json!(false)),
                "tags" => Some(json!([{ "name": "fw:edge-fw" }, { "name": "cred:netops" }])),
                "site_group" => Some(Value::Null),
                _ => None,
            }
        }
    }

    #[test]
    fn template_substitutes_known_attributes() {
        let eval = Evaluator::new();
        assert_eq!(
            eval.apply_template("{tenant_name}/{site_name}:{device_port}", &Env),
            "Acme/Copenhagen:22"
        );
    }

    #[test]
    fn template_keeps_unknown_tokens() {
        let eval = Evaluator::new();
        assert_eq!(eval.apply_template("{nope}/{site_name}", &Env), "{nope}/Copenhagen");
        assert_eq!(eval.apply_template("{tags}", &Env), "{tags}");
        assert_eq!(eval.apply_template("[{site_group}]", &Env), "[]");
    }

    #[test]
    fn bare_expression_keeps_type() {
        let eval = Evaluator::new();
        assert_eq!(eval.evaluate("{{ device_port + 1 }}", &Env).unwrap(), json!(23));
        assert_eq!(eval.evaluate("{{ find_tag(tags, 'x') }}", &Env).unwrap(), Value::Null);
    }

    #[test]
    fn spliced_expression_is_stringified() {
        let eval = Evaluator::new();
        assert_eq!(
            eval.evaluate("Session:{{ find_tag(tags, 'fw') }}", &Env).unwrap(),
            json!("Session:edge-fw")
        );
        assert_eq!(
            eval.evaluate("port-{{device_port}}!", &Env).unwrap(),
            json!("port-22!")
        );
    }

    #[test]
    fn unterminated_marker_is_an_error() {
        let eval = Evaluator::new();
        assert!(matches!(
            eval.evaluate("{{ site_name", &Env),
            Err(EvalError::Unterminated { .. })
        ));
    }

    #[test]
    fn condition_must_be_boolean() {
        let eval = Evaluator::new();
        assert!(eval.evaluate_condition("{{ site_name == 'Copenhagen' }}", &Env).unwrap());
        assert!(!eval.evaluate_condition("{{ is_console_session }}", &Env).unwrap());
        assert!(matches!(
            eval.evaluate_condition("{{ site_name }}", &Env),
            Err(EvalError::UnexpectedType { expected: "bool", found: "string" })
        ));
    }

    #[test]
    fn unbraced_condition_is_a_template() {
        let eval = Evaluator::new();
        for source in ["true", "site_name == 'Copenhagen'", "{site_name}"] {
            assert!(matches!(
                eval.evaluate_condition(source, &Env),
                Err(EvalError::UnexpectedType { expected: "bool", found: "string" })
            ));
        }
        assert_eq!(eval.cached_programs(), 0);
    }

    #[test]
    fn evaluate_string_rejects_non_strings() {
        let eval = Evaluator::new();
        assert_eq!(eval.evaluate_string("{{ nil }}", &Env).unwrap(), None);
        assert!(eval.evaluate_string("{{ 1 + 1 }}", &Env).is_err());
    }

    #[test]
    fn programs_are_cached_by_source() {
        let eval = Evaluator::new();
        for _ in 0..3 {
            eval.evaluate("{{ device_port }}", &Env).unwrap();
            eval.evaluate_condition("{{ device_port == 22 }}", &Env).unwrap();
        }
        assert_eq!(eval.cached_programs(), 2);
    }

    #[test]
    fn compile_errors_are_not_cached() {
        let eval = Evaluator::new();
        assert!(eval.evaluate("{{ 1 + }}", &Env).is_err());
        assert_eq!(eval.cached_programs(), 0);
    }
}
