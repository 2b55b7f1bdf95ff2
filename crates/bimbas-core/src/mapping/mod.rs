//! The two-stage, table-driven event → action → activity pipeline.

mod action_mapper;
mod activity_mapper;
mod table;
mod types;

pub use action_mapper::ActionMapper;
pub use activity_mapper::ActivityMapper;
pub use table::MappingTable;
pub use types::{Action, Activity};

use std::path::{Path, PathBuf};

use crate::error::BimbasError;
use crate::source::RawEvent;

const DEFAULT_EVENT_TO_ACTION: &str = include_str!("../../resources/mappings/event_to_action.json");
const DEFAULT_ACTION_TO_ACTIVITY: &str =
    include_str!("../../resources/mappings/action_to_activity.json");

/// The loaded pair of mapping tables, plus the two-stage pipeline over them.
pub struct ActivityPipeline {
    event_to_action: MappingTable,
    action_to_activity: MappingTable,
}

impl ActivityPipeline {
    /// Loads both tables from their bundled default resource paths.
    pub fn load_default() -> Result<Self, BimbasError> {
        Ok(Self {
            event_to_action: MappingTable::from_json(DEFAULT_EVENT_TO_ACTION)?,
            action_to_activity: MappingTable::from_json(DEFAULT_ACTION_TO_ACTIVITY)?,
        })
    }

    /// Loads both tables from an override directory, for tests or a
    /// deployment that ships its own mapping data. Expects
    /// `event_to_action.json` and `action_to_activity.json` inside `dir`.
    pub async fn load_from_dir(dir: &Path) -> Result<Self, BimbasError> {
        Ok(Self {
            event_to_action: MappingTable::load(&event_to_action_path(dir)).await?,
            action_to_activity: MappingTable::load(&action_to_activity_path(dir)).await?,
        })
    }

    /// Runs both mapping stages over `events`, which must already be in
    /// ascending `created_at` order.
    ///
    /// Stage 2 partitions the actions by the action→activity window covering
    /// each one and collapses each partition independently, so a run of
    /// consecutive actions never folds into one activity across a mapping
    /// window boundary — matching `split_events_by_mapping_versions` in the
    /// original tool this mapping is grounded on.
    pub fn map(&self, events: &[RawEvent]) -> Vec<Activity> {
        let actions = ActionMapper::new(&self.event_to_action).map(events);
        partition_by_window(&self.action_to_activity, &actions)
            .into_iter()
            .flat_map(|group| ActivityMapper::new(&self.action_to_activity).map(group))
            .collect()
    }
}

/// Splits `actions` (already in ascending `start_date` order) into maximal
/// runs that each fall inside a single `table` window.
fn partition_by_window<'a>(table: &MappingTable, actions: &'a [Action]) -> Vec<&'a [Action]> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut current_key = match actions.first() {
        Some(first) => table.window_key(first.start_date),
        None => return groups,
    };

    for (i, action) in actions.iter().enumerate().skip(1) {
        let key = table.window_key(action.start_date);
        if key != current_key {
            groups.push(&actions[start..i]);
            start = i;
            current_key = key;
        }
    }
    groups.push(&actions[start..]);
    groups
}

fn event_to_action_path(dir: &Path) -> PathBuf {
    dir.join("event_to_action.json")
}

fn action_to_activity_path(dir: &Path) -> PathBuf {
    dir.join("action_to_activity.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Actor, Repo};

    #[test]
    fn default_tables_load() {
        ActivityPipeline::load_default().unwrap();
    }

    #[test]
    fn stage_two_never_collapses_a_run_across_a_window_boundary() {
        let table = MappingTable::from_json(
            r#"[
                {"valid_from": "2008-01-01T00:00:00Z", "valid_until": "2020-01-01T00:00:00Z", "mapping": {"commit": "push"}},
                {"valid_from": "2020-01-01T00:00:00Z", "valid_until": null, "mapping": {"commit": "push"}}
            ]"#,
        )
        .unwrap();

        let actor = Actor { login: "octocat".to_string() };
        let repo = Repo { id: 1, name: "octocat/repo".to_string() };
        let actions = vec![
            Action {
                start_date: "2019-12-31T23:00:00Z".parse().unwrap(),
                actor: actor.clone(),
                repository: repo.clone(),
                kind: "commit".to_string(),
            },
            Action {
                start_date: "2020-01-02T00:00:00Z".parse().unwrap(),
                actor: actor.clone(),
                repository: repo.clone(),
                kind: "commit".to_string(),
            },
        ];

        let groups = partition_by_window(&table, &actions);
        assert_eq!(groups.len(), 2);

        let activities: Vec<Activity> = groups
            .into_iter()
            .flat_map(|group| ActivityMapper::new(&table).map(group))
            .collect();
        assert_eq!(activities.len(), 2);
    }
}
