//! Declarative shape of a `memobot.json5` layer.
//!
//! Layers are checked before they are merged so an error can name the file
//! and the dotted path of the offending value.

use crate::ConfigError;
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    OptStr,
    Bool,
    Uint,
    OptUint,
    Number,
    StrList,
    Section(&'static [Field]),
}

type Field = (&'static str, Kind);

const PROVIDER: &[Field] = &[
    ("model", Kind::Str),
    ("base_url", Kind::OptStr),
    ("api_key_env", Kind::Str),
];

const CAPTURE: &[Field] = &[
    ("redact_patterns", Kind::StrList),
    ("detect_secrets", Kind::Bool),
    ("secret_entropy_threshold", Kind::Number),
    ("max_record_chars", Kind::OptUint),
    ("redaction_replacement", Kind::Str),
];

const MEMORY: &[Field] = &[
    ("path", Kind::OptStr),
    ("recall_k", Kind::Uint),
    ("capture", Kind::Section(CAPTURE)),
];

const CONVERSATION: &[Field] = &[
    ("window_turns", Kind::Uint),
    ("persona", Kind::Str),
    ("placeholder", Kind::Str),
    ("failure_notice", Kind::Str),
];

const STREAMING: &[Field] = &[
    ("tick_interval_ms", Kind::Uint),
    ("deadline_ms", Kind::Uint),
    ("late_completion_grace_ms", Kind::Uint),
];

const TELEGRAM: &[Field] = &[
    ("allowed_users", Kind::StrList),
    ("poll_timeout_secs", Kind::Uint),
    ("api_base", Kind::Str),
];

const ROOT: &[Field] = &[
    ("$schema", Kind::Str),
    ("provider", Kind::Section(PROVIDER)),
    ("memory", Kind::Section(MEMORY)),
    ("conversation", Kind::Section(CONVERSATION)),
    ("streaming", Kind::Section(STREAMING)),
    ("telegram", Kind::Section(TELEGRAM)),
];

impl Kind {
    fn expected(self) -> &'static str {
        match self {
            Kind::Str => "expected string",
            Kind::OptStr => "expected string or null",
            Kind::Bool => "expected bool",
            Kind::Uint | Kind::OptUint => "expected non-negative integer",
            Kind::Number => "expected number",
            Kind::StrList => "expected array",
            Kind::Section(_) => "expected object",
        }
    }
}

/// Check one parsed layer. `layer` prefixes every reported path.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    Checker { layer }.section(value, "", ROOT)
}

struct Checker<'a> {
    layer: &'a str,
}

impl Checker<'_> {
    fn section(&self, value: &Value, path: &str, fields: &[Field]) -> Result<(), ConfigError> {
        let Value::Object(map) = value else {
            return Err(self.invalid(path, "expected object"));
        };
        for (key, child) in map {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            let Some((_, kind)) = fields.iter().find(|(name, _)| *name == key.as_str()) else {
                return Err(self.invalid(&child_path, "unknown key"));
            };
            self.field(child, &child_path, *kind)?;
        }
        Ok(())
    }

    fn field(&self, value: &Value, path: &str, kind: Kind) -> Result<(), ConfigError> {
        let matches = match kind {
            Kind::Str => value.is_string(),
            Kind::OptStr => value.is_null() || value.is_string(),
            Kind::Bool => value.is_boolean(),
            Kind::Uint => value.is_u64(),
            Kind::OptUint => value.is_null() || value.is_u64(),
            Kind::Number => value.is_number(),
            Kind::StrList => return self.string_list(value, path),
            Kind::Section(fields) => return self.section(value, path, fields),
        };
        if matches {
            Ok(())
        } else {
            Err(self.invalid(path, kind.expected()))
        }
    }

    fn string_list(&self, value: &Value, path: &str) -> Result<(), ConfigError> {
        let Value::Array(items) = value else {
            return Err(self.invalid(path, Kind::StrList.expected()));
        };
        match items.iter().position(|item| !item.is_string()) {
            Some(idx) => Err(self.invalid(&format!("{path}[{idx}]"), "expected string")),
            None => Ok(()),
        }
    }

    fn invalid(&self, path: &str, message: &str) -> ConfigError {
        let path = if path.is_empty() { "root" } else { path };
        ConfigError::InvalidField {
            path: format!("{}:{path}", self.layer),
            message: message.to_string(),
        }
    }
}
