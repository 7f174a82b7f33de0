// ── Expression helper library ──

use serde_json::Value;

use super::EvalError;
use super::interp::type_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    FindTag,
    HasTag,
    Lower,
    Upper,
    Trim,
    Len,
    Replace,
    /// `[a, b, c]` list literal.
    List,
}

impl Function {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "find_tag" | "findTag" => Self::FindTag,
            "has_tag" | "hasTag" => Self::HasTag,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "trim" => Self::Trim,
            "len" => Self::Len,
            "replace" => Self::Replace,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::FindTag => "find_tag",
            Self::HasTag => "has_tag",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Trim => "trim",
            Self::Len => "len",
            Self::Replace => "replace",
            Self::List => "list",
        }
    }

    pub fn check_arity(self, given: usize) -> Result<(), String> {
        let expected = match self {
            Self::List => return Ok(()),
            Self::Lower | Self::Upper | Self::Trim | Self::Len => 1,
            Self::FindTag | Self::HasTag => 2,
            Self::Replace => 3,
        };
        if given == expected {
            Ok(())
        } else {
            Err(format!(
                "{}() takes {expected} argument(s), {given} given",
                self.name()
            ))
        }
    }

    pub fn call(self, args: Vec<Value>) -> Result<Value, EvalError> {
        if self == Self::List {
            return Ok(Value::Array(args));
        }
        match (self, args.as_slice()) {
            (Self::FindTag, [tags, label]) => {
                let label = self.string_arg(label)?;
                Ok(find_tag(tags, label).map_or(Value::Null, |v| Value::String(v.to_owned())))
            }
            (Self::HasTag, [tags, name]) => {
                let name = self.string_arg(name)?;
                Ok(Value::Bool(tag_names(tags).any(|tag| tag == name)))
            }
            (Self::Lower, [s]) => Ok(Value::String(self.string_arg(s)?.to_lowercase())),
            (Self::Upper, [s]) => Ok(Value::String(self.string_arg(s)?.to_uppercase())),
            (Self::Trim, [s]) => Ok(Value::String(self.string_arg(s)?.trim().to_owned())),
            (Self::Len, [value]) => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    Value::Null => 0,
                    other => {
                        return Err(EvalError::runtime(format!(
                            "len() does not accept {}",
                            type_name(other)
                        )));
                    }
                };
                Ok(Value::from(len))
            }
            (Self::Replace, [s, from, to]) => Ok(Value::String(
                self.string_arg(s)?
                    .replace(self.string_arg(from)?, self.string_arg(to)?),
            )),
            _ => Err(EvalError::runtime(format!(
                "wrong number of arguments to {}()",
                self.name()
            ))),
        }
    }

    fn string_arg(self, value: &Value) -> Result<&str, EvalError> {
        value.as_str().ok_or_else(|| {
            EvalError::runtime(format!(
                "{}() expects a string, got {}",
                self.name(),
                type_name(value)
            ))
        })
    }
}

/// Tag names from an array of strings or of `{ "name": ... }` objects.
fn tag_names(tags: &Value) -> impl Iterator<Item = &str> {
    tags.as_array()
        .into_iter()
        .flatten()
        .filter_map(|tag| match tag {
            Value::String(name) => Some(name.as_str()),
            Value::Object(map) => map.get("name").and_then(Value::as_str),
            _ => None,
        })
}

/// Value of the first `label:<value>` tag.
pub fn find_tag<'a>(tags: &'a Value, label: &str) -> Option<&'a str> {
    let prefix = format!("{label}:");
    tag_names(tags).find_map(|name| name.strip_prefix(prefix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn find_tag_matches_label_prefix() {
        let tags = json!([{ "name": "site:cph" }, { "name": "fw:edge-fw" }, { "name": "fw:other" }]);
        assert_eq!(find_tag(&tags, "fw"), Some("edge-fw"));
        assert_eq!(find_tag(&tags, "f"), None);
        assert_eq!(find_tag(&json!(["cred:admin"]), "cred"), Some("admin"));
        assert_eq!(find_tag(&Value::Null, "fw"), None);
    }

    #[test]
    fn has_tag_checks_exact_name() {
        let tags = json!([{ "name": "core" }, "edge"]);
        let call = |name: &str| Function::HasTag.call(vec![tags.clone(), json!(name)]).ok();
        assert_eq!(call("core"), Some(json!(true)));
        assert_eq!(call("edge"), Some(json!(true)));
        assert_eq!(call("cor"), Some(json!(false)));
    }

    #[test]
    fn string_helpers() {
        assert_eq!(Function::Lower.call(vec![json!("CPH")]).ok(), Some(json!("cph")));
        assert_eq!(Function::Upper.call(vec![json!("cph")]).ok(), Some(json!("CPH")));
        assert_eq!(Function::Trim.call(vec![json!("  a ")]).ok(), Some(json!("a")));
        assert_eq!(
            Function::Replace.call(vec![json!("a/b/c"), json!("/"), json!("-")]).ok(),
            Some(json!("a-b-c"))
        );
        assert_eq!(Function::Len.call(vec![json!([1, 2, 3])]).ok(), Some(json!(3)));
    }

    #[test]
    fn type_errors_are_reported() {
        assert!(Function::Lower.call(vec![json!(1)]).is_err());
        assert!(Function::Len.call(vec![json!(true)]).is_err());
    }

    #[test]
    fn arity_is_checked() {
        assert!(Function::Replace.check_arity(3).is_ok());
        assert!(Function::Replace.check_arity(2).is_err());
        assert!(Function::List.check_arity(0).is_ok());
    }
}
