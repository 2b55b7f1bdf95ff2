//! Fetching raw events and account metadata from the GitHub REST API.

mod event_source;
mod types;

pub use event_source::EventSource;
pub use types::{Actor, RawEvent, Repo, UserType};
