//! Time-versioned lookup tables, loaded once from JSON resource files.
//!
//! Mirrors the Classifier's swappable model path (§4.5 / `predictor.rs`): a
//! compiled-in default location plus an override for tests, both read
//! through the same loader. The concrete mapping content is opaque data, not
//! part of the algorithm under test.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::BimbasError;

#[derive(Debug, Clone, Deserialize)]
struct MappingWindow {
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    mapping: std::collections::HashMap<String, String>,
}

/// A set of time-versioned key→key lookup tables.
///
/// Used for both the event→action and action→activity stages; in both cases
/// the mapped value is itself a kind name (an action kind, or an activity
/// kind), so a single `String`-keyed, `String`-valued shape covers both.
#[derive(Debug, Clone)]
pub struct MappingTable {
    windows: Vec<MappingWindow>,
}

impl MappingTable {
    pub fn from_json(data: &str) -> Result<Self, BimbasError> {
        let windows: Vec<MappingWindow> = serde_json::from_str(data)?;
        if windows.is_empty() {
            return Err(BimbasError::Config(
                "mapping table must declare at least one validity window".into(),
            ));
        }
        Ok(Self { windows })
    }

    pub async fn load(path: &Path) -> Result<Self, BimbasError> {
        let data = tokio::fs::read_to_string(path).await.map_err(|err| {
            BimbasError::Config(format!("failed to read mapping table {path:?}: {err}"))
        })?;
        Self::from_json(&data)
    }

    /// The newest window whose validity range covers `at`, if any.
    fn window_for(&self, at: DateTime<Utc>) -> Option<&MappingWindow> {
        self.windows
            .iter()
            .filter(|w| w.valid_from <= at && w.valid_until.map(|u| at < u).unwrap_or(true))
            .max_by_key(|w| w.valid_from)
    }

    /// Looks up `key` in the window covering `at`. Returns `None` both when
    /// no window covers `at` and when the covering window has no entry for
    /// `key` — both cases are "unmapped" to the caller.
    pub fn lookup(&self, at: DateTime<Utc>, key: &str) -> Option<&str> {
        self.window_for(at).and_then(|w| w.mapping.get(key)).map(String::as_str)
    }

    /// Identifies the window covering `at` (its `valid_from`), or `None` if
    /// none covers it. Windows never overlap, so `valid_from` alone is a
    /// stable identity — used to partition a timeline so a fold never
    /// crosses a window boundary.
    pub(crate) fn window_key(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window_for(at).map(|w| w.valid_from)
    }
}
