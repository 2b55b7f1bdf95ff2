use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The account type returned by `GET /users/{login}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Bot,
    User,
    Organization,
    Unknown,
}

impl UserType {
    pub fn from_api_str(value: Option<&str>) -> Self {
        match value {
            Some("Bot") => UserType::Bot,
            Some("User") => UserType::User,
            Some("Organization") => UserType::Organization,
            _ => UserType::Unknown,
        }
    }
}

/// The actor that produced an event, action or activity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Actor {
    pub login: String,
}

/// The repository an event, action or activity happened against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repo {
    pub id: i64,
    pub name: String,
}

impl Repo {
    /// The substring of `name` before the first `/`, or `"unknown"` if
    /// `name` contains no `/`.
    pub fn owner(&self) -> &str {
        match self.name.split_once('/') {
            Some((owner, _)) => owner,
            None => "unknown",
        }
    }
}

/// A single raw event as returned by `GET /users/{login}/events`.
///
/// Treated as read-only JSON-shaped data: only the fields the mapper and
/// classifier pipeline need are pulled out as typed fields; everything else
/// is preserved in `extra` so the mapping tables can be extended without a
/// struct migration.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub actor: Actor,
    pub repo: Repo,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
