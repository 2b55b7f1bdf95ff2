use chrono::{DateTime, Utc};

use crate::source::{Actor, Repo};

/// Intermediate record produced by mapping one [`RawEvent`](crate::source::RawEvent)
/// through the event→action table.
#[derive(Debug, Clone)]
pub struct Action {
    pub start_date: DateTime<Utc>,
    pub actor: Actor,
    pub repository: Repo,
    pub kind: String,
}

/// Final record produced by folding consecutive [`Action`]s through the
/// action→activity table.
#[derive(Debug, Clone)]
pub struct Activity {
    pub start_date: DateTime<Utc>,
    pub actor: Actor,
    pub repository: Repo,
    pub activity: String,
}
