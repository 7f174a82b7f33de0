// ── Expression interpreter ──
//
// Tree-walking evaluation over `serde_json::Value`. Unknown identifiers and
// missing members resolve to `nil`; type mismatches are runtime errors.

use std::cmp::Ordering;
use std::num::FpCategory;

use regex::Regex;
use serde_json::Value;

use super::parser::{BinaryOp, Expr, UnaryOp};
use super::{EvalError, Scope};

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// Render a value the way it is spliced into a template.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn evaluate(expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => Ok(scope.lookup(name).unwrap_or(Value::Null)),
        Expr::Member(base, field) => member(evaluate(base, scope)?, field),
        Expr::Index(base, index) => {
            let base = evaluate(base, scope)?;
            let index = evaluate(index, scope)?;
            subscript(base, &index)
        }
        Expr::Call(function, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            function.call(args)
        }
        Expr::Unary(op, inner) => unary(*op, evaluate(inner, scope)?),
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            if boolean(&evaluate(lhs, scope)?, "&&")? {
                Ok(Value::Bool(boolean(&evaluate(rhs, scope)?, "&&")?))
            } else {
                Ok(Value::Bool(false))
            }
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            if boolean(&evaluate(lhs, scope)?, "||")? {
                Ok(Value::Bool(true))
            } else {
                Ok(Value::Bool(boolean(&evaluate(rhs, scope)?, "||")?))
            }
        }
        Expr::Binary(BinaryOp::Coalesce, lhs, rhs) => match evaluate(lhs, scope)? {
            Value::Null => evaluate(rhs, scope),
            value => Ok(value),
        },
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, scope)?;
            let rhs = evaluate(rhs, scope)?;
            binary(*op, &lhs, &rhs)
        }
        Expr::Regex(lhs, regex) => {
            let lhs = evaluate(lhs, scope)?;
            is_match(&lhs, regex)
        }
        Expr::Conditional(cond, then, otherwise) => {
            if boolean(&evaluate(cond, scope)?, "?:")? {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn boolean(value: &Value, op: &str) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| {
        EvalError::runtime(format!("'{op}' expects bool, got {}", type_name(value)))
    })
}

fn member(base: Value, field: &str) -> Result<Value, EvalError> {
    match base {
        Value::Object(mut map) => Ok(map.remove(field).unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(EvalError::runtime(format!(
            "cannot read field '{field}' of {}",
            type_name(&other)
        ))),
    }
}

fn subscript(base: Value, index: &Value) -> Result<Value, EvalError> {
    match (base, index) {
        (Value::Object(mut map), Value::String(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::Array(mut items), Value::Number(n)) => {
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let Some(i) = n.as_i64() else {
                return Err(EvalError::runtime(format!("array index {n} is not an integer")));
            };
            // Negative indexes count from the end.
            let i = if i < 0 { len + i } else { i };
            match usize::try_from(i) {
                Ok(i) if i < items.len() => Ok(items.swap_remove(i)),
                _ => Ok(Value::Null),
            }
        }
        (Value::Null, _) => Ok(Value::Null),
        (base, index) => Err(EvalError::runtime(format!(
            "cannot index {} with {}",
            type_name(&base),
            type_name(index)
        ))),
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!boolean(&value, "!")?)),
        UnaryOp::Neg => match &value {
            Value::Number(n) => n
                .as_i64()
                .and_then(i64::checked_neg)
                .map(Value::from)
                .or_else(|| n.as_f64().map(|f| Value::from(-f)))
                .ok_or_else(|| EvalError::runtime(format!("cannot negate {n}"))),
            other => Err(EvalError::runtime(format!(
                "cannot negate {}",
                type_name(other)
            ))),
        },
    }
}

/// Equality with numeric coercion (`1 == 1.0`).
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, EvalError> {
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.ok_or_else(|| {
        EvalError::runtime(format!(
            "cannot compare {} with {}",
            type_name(lhs),
            type_name(rhs)
        ))
    })
}

fn is_match(lhs: &Value, regex: &Regex) -> Result<Value, EvalError> {
    match lhs {
        Value::String(s) => Ok(Value::Bool(regex.is_match(s))),
        Value::Null => Ok(Value::Bool(false)),
        other => Err(EvalError::runtime(format!(
            "'matches' expects string, got {}",
            type_name(other)
        ))),
    }
}

fn strings<'a>(op: &str, lhs: &'a Value, rhs: &'a Value) -> Result<(&'a str, &'a str), EvalError> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok((a, b)),
        _ => Err(EvalError::runtime(format!(
            "'{op}' expects strings, got {} and {}",
            type_name(lhs),
            type_name(rhs)
        ))),
    }
}

fn contains(haystack: &Value, needle: &Value, op: &str) -> Result<bool, EvalError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| equals(item, needle))),
        Value::Object(map) => match needle {
            Value::String(key) => Ok(map.contains_key(key)),
            _ => Ok(false),
        },
        Value::String(s) => match needle {
            Value::String(sub) => Ok(s.contains(sub.as_str())),
            other => Err(EvalError::runtime(format!(
                "'{op}' on a string expects string, got {}",
                type_name(other)
            ))),
        },
        Value::Null => Ok(false),
        other => Err(EvalError::runtime(format!(
            "'{op}' cannot search {}",
            type_name(other)
        ))),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Eq => Value::Bool(equals(lhs, rhs)),
        BinaryOp::NotEq => Value::Bool(!equals(lhs, rhs)),
        BinaryOp::Lt => Value::Bool(compare(lhs, rhs)?.is_lt()),
        BinaryOp::Le => Value::Bool(compare(lhs, rhs)?.is_le()),
        BinaryOp::Gt => Value::Bool(compare(lhs, rhs)?.is_gt()),
        BinaryOp::Ge => Value::Bool(compare(lhs, rhs)?.is_ge()),
        BinaryOp::In => Value::Bool(contains(rhs, lhs, "in")?),
        BinaryOp::Contains => Value::Bool(contains(lhs, rhs, "contains")?),
        BinaryOp::StartsWith => {
            let (a, b) = strings("startsWith", lhs, rhs)?;
            Value::Bool(a.starts_with(b))
        }
        BinaryOp::EndsWith => {
            let (a, b) = strings("endsWith", lhs, rhs)?;
            Value::Bool(a.ends_with(b))
        }
        BinaryOp::Matches => {
            let Value::String(pattern) = rhs else {
                return Err(EvalError::runtime(format!(
                    "'matches' expects a string pattern, got {}",
                    type_name(rhs)
                )));
            };
            let regex = Regex::new(pattern)
                .map_err(|e| EvalError::runtime(format!("invalid pattern '{pattern}': {e}")))?;
            return is_match(lhs, &regex);
        }
        BinaryOp::Add => match (lhs, rhs) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", stringify(lhs), stringify(rhs)))
            }
            _ => arithmetic(op, lhs, rhs)?,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)?
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => {
            return Err(EvalError::runtime(format!("{op:?} is evaluated lazily")));
        }
    };
    Ok(result)
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else {
        return Err(EvalError::runtime(format!(
            "arithmetic on {} and {}",
            type_name(lhs),
            type_name(rhs)
        )));
    };

    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        let int = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Rem if b == 0 => return Err(EvalError::runtime("modulo by zero".into())),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        if let Some(int) = int {
            return Ok(Value::from(int));
        }
        if op == BinaryOp::Rem {
            return Err(EvalError::runtime("integer overflow".into()));
        }
    }

    let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
        return Err(EvalError::runtime("non-finite number".into()));
    };
    let float = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b.classify() == FpCategory::Zero => {
            return Err(EvalError::runtime("division by zero".into()));
        }
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    if !float.is_finite() {
        return Err(EvalError::runtime("non-finite result".into()));
    }
    Ok(Value::from(float))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::parser::parse;
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct Vars(HashMap<&'static str, Value>);

    impl Scope for Vars {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn vars() -> Vars {
        Vars(HashMap::from([
            ("site_name", json!("Copenhagen")),
            ("device_role", json!("Core Router")),
            ("device_port", json!(22)),
            ("huge", json!(1e200)),
            ("is_console_session", json!(false)),
            ("device", json!({
                "name": "rtr-01",
                "tags": [{ "name": "fw:edge-fw" }],
                "custom_fields": { "jump": null, "rack": 4 }
            })),
        ]))
    }

    fn run(source: &str) -> Result<Value, EvalError> {
        evaluate(&parse(source).unwrap(), &vars())
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(run("site_name == 'Copenhagen' && !is_console_session").unwrap(), json!(true));
        assert_eq!(run("device_port > 1000 or device_role startsWith 'Core'").unwrap(), json!(true));
        assert_eq!(run("device_port == 22.0").unwrap(), json!(true));
    }

    #[test]
    fn and_short_circuits() {
        assert_eq!(run("false && 1 / 0 > 0").unwrap(), json!(false));
        assert_eq!(run("true || undefined_thing > 3").unwrap(), json!(true));
    }

    #[test]
    fn members_and_missing_values() {
        assert_eq!(run("device.name").unwrap(), json!("rtr-01"));
        assert_eq!(run("device.custom_fields.rack").unwrap(), json!(4));
        assert_eq!(run("device.nope.deeper").unwrap(), Value::Null);
        assert_eq!(run("unknown_attr").unwrap(), Value::Null);
        assert_eq!(run("device.tags[0].name").unwrap(), json!("fw:edge-fw"));
        assert_eq!(run("device.tags[-1].name").unwrap(), json!("fw:edge-fw"));
        assert_eq!(run("device.tags[5]").unwrap(), Value::Null);
    }

    #[test]
    fn coalesce_and_ternary() {
        assert_eq!(run("device.custom_fields.jump ?? 'None'").unwrap(), json!("None"));
        assert_eq!(
            run("device_role contains 'Router' ? 'routers' : 'other'").unwrap(),
            json!("routers")
        );
    }

    #[test]
    fn membership() {
        assert_eq!(run("site_name in ['Aarhus', 'Copenhagen']").unwrap(), json!(true));
        assert_eq!(run("'rack' in device.custom_fields").unwrap(), json!(true));
        assert_eq!(run("device_role matches '^Core'").unwrap(), json!(true));
        assert_eq!(run("device_role matches ('^' + 'Edge')").unwrap(), json!(false));
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(run("device_port + 1").unwrap(), json!(23));
        assert_eq!(run("7 / 2").unwrap(), json!(3.5));
        assert_eq!(run("7 % 4").unwrap(), json!(3));
        assert_eq!(run("-device_port").unwrap(), json!(-22));
        assert_eq!(run("'port-' + device_port").unwrap(), json!("port-22"));
    }

    #[test]
    fn runtime_errors() {
        assert!(run("1 / 0").is_err());
        assert!(run("site_name > 3").is_err());
        assert!(run("!site_name").is_err());
        assert!(run("site_name.length").is_err());
    }

    #[test]
    fn float_overflow_is_an_error() {
        assert!(matches!(run("huge * huge"), Err(EvalError::Runtime { .. })));
        assert!(matches!(run("-huge * huge"), Err(EvalError::Runtime { .. })));
        assert_eq!(run("huge / huge").unwrap(), json!(1.0));
    }

    #[test]
    fn stringify_scalars() {
        assert_eq!(stringify(&Value::Null), "");
        assert_eq!(stringify(&json!(22)), "22");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!("x")), "x");
    }
}
