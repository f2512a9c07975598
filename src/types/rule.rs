use serde::{Deserialize, Deserializer, Serialize};

use super::config::DEFAULT_MAX_DEPTH;
use super::error::ConfigurationError;
use super::value::Value;

/// A gate/if/then/else expression quadruple attached to a form node.
///
/// Rules live in a node's UI schema under `ui:options.formRules` and run in
/// sequence order. Missing or `null` expression fields read as empty; a
/// missing `active` flag reads as `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormRule {
    /// Documentation only.
    #[serde(deserialize_with = "nullable_string")]
    pub desc: String,
    /// Optional gating expression. A falsy result skips the whole rule.
    #[serde(rename = "context", deserialize_with = "nullable_string")]
    pub gate: String,
    #[serde(rename = "if", deserialize_with = "nullable_string")]
    pub condition: String,
    #[serde(deserialize_with = "nullable_string")]
    pub then: String,
    #[serde(rename = "else", deserialize_with = "nullable_string")]
    pub otherwise: String,
    #[serde(deserialize_with = "nullable_flag")]
    pub active: bool,
}

impl Default for FormRule {
    fn default() -> Self {
        Self {
            desc: String::new(),
            gate: String::new(),
            condition: String::new(),
            then: String::new(),
            otherwise: String::new(),
            active: true,
        }
    }
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn nullable_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Option::<bool>::deserialize(deserializer).map(|flag| flag.unwrap_or(false))
}

impl FormRule {
    /// An active rule running `then` when `condition` is truthy.
    #[must_use]
    pub fn new(condition: &str, then: &str) -> Self {
        Self {
            condition: condition.to_owned(),
            then: then.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn otherwise(mut self, expression: &str) -> Self {
        self.otherwise = expression.to_owned();
        self
    }

    #[must_use]
    pub fn gated_by(mut self, expression: &str) -> Self {
        self.gate = expression.to_owned();
        self
    }

    #[must_use]
    pub fn described(mut self, desc: &str) -> Self {
        self.desc = desc.to_owned();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Read the rule record at position `index` of a rule list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidRule`] if the record is not a
    /// mapping or a field has the wrong type.
    pub fn from_value(value: &Value, index: usize) -> Result<Self, ConfigurationError> {
        if value.as_mapping().is_none() {
            return Err(ConfigurationError::InvalidRule {
                index,
                reason: format!("expected a mapping, found {}", value.type_name()),
            });
        }
        let json = value
            .to_json(DEFAULT_MAX_DEPTH)
            .map_err(|e| ConfigurationError::InvalidRule {
                index,
                reason: e.to_string(),
            })?;
        serde_json::from_value(json).map_err(|e| ConfigurationError::InvalidRule {
            index,
            reason: e.to_string(),
        })
    }

    /// This rule as a rule record, ready to be placed in a rule list.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).map_or(Value::Undefined, Value::from_json)
    }
}
