//! Runtime-tunable settings backing `/set` and `/config`.
//!
//! Keys are registered once at startup with a kind and a description;
//! `/set` accepts only registered keys and parses the new value as the
//! registered kind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

/// A setting value. The variant fixes the kind for later `/set` parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Float(f64),
    Int(i64),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

/// Why a `/set` was rejected, phrased for the chat reply.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        expected: &'static str,
    },
}

struct Setting {
    value: SettingValue,
    description: String,
}

#[derive(Default)]
pub struct Settings {
    inner: RwLock<BTreeMap<String, Setting>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` with its initial value. Called once per key at
    /// startup.
    pub fn register(&self, key: &str, description: &str, value: SettingValue) {
        self.inner.write().unwrap().insert(
            key.to_string(),
            Setting {
                value,
                description: description.to_string(),
            },
        );
    }

    /// Numeric value of `key`; integer settings widen to f64.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.inner.read().unwrap().get(key)?.value {
            SettingValue::Float(v) => Some(v),
            SettingValue::Int(v) => Some(v as f64),
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.inner.read().unwrap().get(key)?.value {
            SettingValue::Int(v) => Some(v),
            SettingValue::Float(_) => None,
        }
    }

    /// Parses `raw` as the kind registered for `key` and stores it.
    /// Returns the previous value.
    pub fn set(&self, key: &str, raw: &str) -> Result<SettingValue, SetError> {
        let mut inner = self.inner.write().unwrap();
        let setting = inner
            .get_mut(key)
            .ok_or_else(|| SetError::UnknownKey(key.to_string()))?;
        let parsed = match setting.value {
            SettingValue::Float(_) => {
                SettingValue::Float(raw.parse().map_err(|_| SetError::InvalidValue {
                    key: key.to_string(),
                    expected: "a number",
                })?)
            }
            SettingValue::Int(_) => {
                SettingValue::Int(raw.parse().map_err(|_| SetError::InvalidValue {
                    key: key.to_string(),
                    expected: "an integer",
                })?)
            }
        };
        Ok(std::mem::replace(&mut setting.value, parsed))
    }

    /// One line per setting for `/config`, in key order.
    pub fn format_all(&self) -> String {
        let inner = self.inner.read().unwrap();
        let mut lines = Vec::with_capacity(inner.len());
        for (key, setting) in inner.iter() {
            lines.push(format!("{key} = {} ({})", setting.value, setting.description));
        }
        lines.join("\n")
    }
}
