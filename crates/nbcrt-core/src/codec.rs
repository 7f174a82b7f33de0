// ── SecureCRT session record codec ──
//
// Session `.ini` files are line oriented:
//
//   S:"Hostname"=10.0.0.1              string
//   D:"[SSH2] Port"=00000016           integer, 8 hex digits
//   Z:"Description"=00000002           multiline, 8 decimal digits of
//    Site: Copenhagen                  count followed by that many
//    Type: Juniper MX204               space-prefixed lines
//
// The field table below is the single source of truth for which
// descriptor fields are persisted and under which key.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::model::{Firewall, SessionDescriptor};

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Z]):"([^"]*)"=(.*)$"#).expect("valid session field regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("line {line}: multiline count '{value}' for \"{key}\" is not a number")]
    InvalidCount {
        line: usize,
        key: String,
        value: String,
    },

    #[error("\"{key}\" declares {expected} lines but only {found} follow")]
    Truncated {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: \"{key}\" value '{value}' is not a valid integer")]
    InvalidInteger {
        line: usize,
        key: String,
        value: String,
    },

    #[error("line {line}: \"{key}\" is stored as {found}: but expected {expected}:")]
    TypeMismatch {
        line: usize,
        key: String,
        expected: char,
        found: char,
    },
}

/// How a field is rendered on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Multiline,
}

impl FieldKind {
    fn tag(self) -> char {
        match self {
            Self::String => 'S',
            Self::Integer => 'D',
            Self::Multiline => 'Z',
        }
    }
}

/// A field value in transit between descriptor and file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(Cow<'a, str>),
    Integer(u32),
}

/// One persisted descriptor field.
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    get: fn(&SessionDescriptor) -> FieldValue<'_>,
    set: fn(&mut SessionDescriptor, FieldValue<'_>),
}

fn text(value: FieldValue<'_>) -> String {
    match value {
        FieldValue::Text(s) => s.into_owned(),
        FieldValue::Integer(n) => n.to_string(),
    }
}

pub static FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "Hostname",
        kind: FieldKind::String,
        get: |d| FieldValue::Text(Cow::Borrowed(&d.ip)),
        set: |d, v| d.ip = text(v),
    },
    FieldSpec {
        key: "[SSH2] Port",
        kind: FieldKind::Integer,
        get: |d| FieldValue::Integer(u32::from(d.port)),
        set: |d, v| {
            if let FieldValue::Integer(n) = v {
                d.port = u16::try_from(n).unwrap_or(u16::MAX);
            }
        },
    },
    FieldSpec {
        key: "Protocol Name",
        kind: FieldKind::String,
        get: |d| FieldValue::Text(Cow::Borrowed(&d.protocol)),
        set: |d, v| d.protocol = text(v),
    },
    FieldSpec {
        key: "Description",
        kind: FieldKind::Multiline,
        get: |d| FieldValue::Text(Cow::Borrowed(&d.description)),
        set: |d, v| d.description = text(v),
    },
    FieldSpec {
        key: "Credential Title",
        kind: FieldKind::String,
        get: |d| FieldValue::Text(Cow::Borrowed(d.credential.as_deref().unwrap_or_default())),
        set: |d, v| d.credential = Some(text(v)).filter(|c| !c.is_empty()),
    },
    FieldSpec {
        key: "Firewall Name",
        kind: FieldKind::String,
        get: |d| FieldValue::Text(Cow::Borrowed(d.firewall.as_str())),
        set: |d, v| d.firewall = Firewall::parse(&text(v)),
    },
];

fn field(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

// ── Encoding ─────────────────────────────────────────────────────────

/// Render `session` after the caller-supplied `header` (the emulator's
/// default session template). Output depends only on the inputs.
pub fn encode(header: &str, session: &SessionDescriptor) -> String {
    let mut out = String::with_capacity(header.len() + 256);
    out.push_str(header);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }

    for spec in FIELDS {
        let key = spec.key;
        match (spec.kind, (spec.get)(session)) {
            (FieldKind::Integer, FieldValue::Integer(n)) => {
                let _ = writeln!(out, "D:\"{key}\"={n:08X}");
            }
            (FieldKind::Multiline, value) => {
                let value = text(value);
                let lines: Vec<&str> = value
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .collect();
                let _ = writeln!(out, "Z:\"{key}\"={:08}", lines.len());
                for line in lines {
                    let _ = writeln!(out, " {line}");
                }
            }
            (_, value) => {
                let _ = writeln!(out, "S:\"{key}\"={}", text(value));
            }
        }
    }

    out
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Apply every registered field found in `content` to `session`.
///
/// The device name and path are not stored in the file; the caller derives
/// them from its location and passes them in via `session`.
pub fn decode(content: &str, session: &mut SessionDescriptor) -> Result<(), CodecError> {
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;

    while let Some(&line) = lines.get(i) {
        i += 1;
        let Some(caps) = FIELD_LINE.captures(line) else {
            continue;
        };
        let (tag, key, raw) = (&caps[1], &caps[2], &caps[3]);
        let line_no = i;

        // Multiline values own the following lines whether or not the key is
        // registered, so their body is never parsed as fields.
        let body = if tag == "Z" {
            let count: usize = raw.trim().parse().map_err(|_| CodecError::InvalidCount {
                line: line_no,
                key: key.to_owned(),
                value: raw.to_owned(),
            })?;
            let available = lines.len() - i;
            if count > available {
                return Err(CodecError::Truncated {
                    key: key.to_owned(),
                    expected: count,
                    found: available,
                });
            }
            let body = lines[i..i + count]
                .iter()
                .map(|l| l.strip_prefix(' ').unwrap_or(l))
                .collect::<Vec<_>>()
                .join("\n");
            i += count;
            Some(body)
        } else {
            None
        };

        let Some(spec) = field(key) else {
            continue;
        };
        let found = tag.chars().next().unwrap_or(' ');
        if found != spec.kind.tag() {
            return Err(CodecError::TypeMismatch {
                line: line_no,
                key: key.to_owned(),
                expected: spec.kind.tag(),
                found,
            });
        }

        let value = match spec.kind {
            FieldKind::String => FieldValue::Text(Cow::Borrowed(raw)),
            FieldKind::Multiline => FieldValue::Text(Cow::Owned(body.unwrap_or_default())),
            FieldKind::Integer => {
                let n = u32::from_str_radix(raw.trim(), 16).map_err(|_| CodecError::InvalidInteger {
                    line: line_no,
                    key: key.to_owned(),
                    value: raw.to_owned(),
                })?;
                FieldValue::Integer(n)
            }
        };
        (spec.set)(session, value);
    }

    Ok(())
}
