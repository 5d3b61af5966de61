//! Metadata attached to accounts and addresses.
//!
//! Well-known keys are typed fields; anything else written by other tools is
//! kept in `extra` so a load/save cycle never drops it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_testing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recent: Option<bool>,
    /// Milliseconds since the unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_edited: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meta {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn testing() -> Self {
        Self {
            is_testing: Some(true),
            ..Self::default()
        }
    }

    pub fn is_testing(&self) -> bool {
        self.is_testing.unwrap_or(false)
    }

    pub fn is_recent(&self) -> bool {
        self.is_recent.unwrap_or(false)
    }

    /// Field-by-field merge. Every field set in `update` overwrites the value
    /// here, unset fields are left alone. Extension keys follow the same rule.
    pub fn merge(&mut self, update: Meta) {
        if update.name.is_some() {
            self.name = update.name;
        }
        if update.is_testing.is_some() {
            self.is_testing = update.is_testing;
        }
        if update.is_recent.is_some() {
            self.is_recent = update.is_recent;
        }
        if update.when_created.is_some() {
            self.when_created = update.when_created;
        }
        if update.when_edited.is_some() {
            self.when_edited = update.when_edited;
        }
        for (key, value) in update.extra {
            self.extra.insert(key, value);
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
