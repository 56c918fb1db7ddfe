//! Limiter configuration entries and the raw-string parser.
//!
//! The raw value is a JSON array of objects:
//!
//! ```json
//! [{ "method": "bar", "alias": "", "appId": "billing",
//!    "type": "tokenBucket", "enabled": true, "limit": 100, "period": 1000 }]
//! ```
//!
//! Every field is optional. Entries that are disabled, have no positive limit
//! or a period under one millisecond are dropped without error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Joins method, alias and app id into a limiter key
pub const KEY_DELIMITER: &str = ":";

/// Default period when an entry gives none
pub const DEFAULT_PERIOD_MS: i64 = 1000;

/// Build the `method:alias:appId` key
pub fn limiter_key(method: &str, alias: &str, app_id: &str) -> String {
    [method, alias, app_id].join(KEY_DELIMITER)
}

/// Effective parameters of one limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Algorithm name in the algorithm registry
    pub kind: String,
    /// Permits per period
    pub limit_count: u32,
    /// Period, nanosecond resolution
    pub limit_period: Duration,
}

impl RateLimiterConfig {
    pub fn new(kind: impl Into<String>, limit_count: u32, limit_period: Duration) -> Self {
        Self {
            kind: kind.into(),
            limit_count,
            limit_period,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LimiterParseError {
    #[error("malformed limiter config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("limiter entry {index} is not an object")]
    NotAnObject { index: usize },
    #[error("limiter entry {index}: field '{field}' has invalid value {value}")]
    InvalidField {
        index: usize,
        field: &'static str,
        value: String,
    },
}

/// Parse the raw limiter string.
///
/// `Ok(None)` means no limiter configuration at all (absent or empty value),
/// which clears the service's limiters.
pub fn parse_limiter_configs(
    raw: Option<&str>,
    default_kind: &str,
) -> Result<Option<HashMap<String, RateLimiterConfig>>, LimiterParseError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };
    let entries: Vec<Value> = serde_json::from_str(raw)?;

    let mut configs = HashMap::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Value::Object(fields) = entry else {
            return Err(LimiterParseError::NotAnObject { index });
        };
        let entry = Entry { index, fields };

        let method = entry.string("method")?.unwrap_or_default();
        let alias = entry.string("alias")?.unwrap_or_default();
        let app_id = entry.string("appId")?.unwrap_or_default();
        let kind = match fields.get("type") {
            None => Some(default_kind.to_string()),
            Some(_) => entry.string("type")?.filter(|k| !k.is_empty()),
        };
        let enabled = match entry.boolean("enabled")? {
            Some(enabled) => enabled,
            None => entry.boolean("open")?.unwrap_or(true),
        };
        let limit = entry.integer("limit")?.unwrap_or(0);
        let period_ms = entry.integer("period")?.unwrap_or(DEFAULT_PERIOD_MS);

        let Some(kind) = kind else { continue };
        if !enabled || limit <= 0 || period_ms < 1 {
            continue;
        }
        let limit_count = u32::try_from(limit).map_err(|_| entry.invalid("limit"))?;
        let limit_period = Duration::from_millis(period_ms as u64);

        configs.insert(
            limiter_key(&method, &alias, &app_id),
            RateLimiterConfig::new(kind, limit_count, limit_period),
        );
    }
    Ok(Some(configs))
}

/// Loosely typed field access: scalars are accepted as strings and numeric or
/// boolean strings as their typed value.
struct Entry<'a> {
    index: usize,
    fields: &'a Map<String, Value>,
}

impl Entry<'_> {
    fn invalid(&self, field: &'static str) -> LimiterParseError {
        LimiterParseError::InvalidField {
            index: self.index,
            field,
            value: self
                .fields
                .get(field)
                .map(Value::to_string)
                .unwrap_or_default(),
        }
    }

    fn string(&self, field: &'static str) -> Result<Option<String>, LimiterParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(self.invalid(field)),
        }
    }

    fn boolean(&self, field: &'static str) -> Result<Option<bool>, LimiterParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(self.invalid(field)),
            },
            Some(_) => Err(self.invalid(field)),
        }
    }

    fn integer(&self, field: &'static str) -> Result<Option<i64>, LimiterParseError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| self.invalid(field)),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(field)),
            Some(_) => Err(self.invalid(field)),
        }
    }
}
