//! Engine settings.
//!
//! Plain in-memory configuration, typically deserialized from JSON by the
//! settings-loading layer before a run starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Score;
use crate::error::DispatchResult;

/// Dispatch-wide switches and per-rule settings blobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Restrict each dispatch list to the activities tied for the best composite.
    pub only_dispatch_best_composites: bool,
    /// Run an activity's successor next on the same resource when possible.
    pub enforce_successor_constraint: bool,
    /// Composites below this value disqualify the activity in optimize passes.
    pub global_min_score: Option<Score>,
    /// Opaque settings handed to configurable rules, by rule key.
    pub rule_settings: BTreeMap<String, serde_json::Value>,
}

impl DispatchSettings {
    /// Parses settings from JSON.
    pub fn from_json(json: &str) -> DispatchResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_only_best_composites(mut self, enabled: bool) -> Self {
        self.only_dispatch_best_composites = enabled;
        self
    }

    pub fn with_successor_constraint(mut self, enabled: bool) -> Self {
        self.enforce_successor_constraint = enabled;
        self
    }

    pub fn with_global_min_score(mut self, min: Score) -> Self {
        self.global_min_score = Some(min);
        self
    }

    /// Sets the settings blob for one rule.
    pub fn with_rule_settings(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.rule_settings.insert(key.into(), value);
        self
    }

    pub fn rule_settings(&self, key: &str) -> Option<&serde_json::Value> {
        self.rule_settings.get(key)
    }
}
