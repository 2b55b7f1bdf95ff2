//! Stage 2: actions → activities.

use super::table::MappingTable;
use super::types::{Action, Activity};

pub struct ActivityMapper<'a> {
    table: &'a MappingTable,
}

impl<'a> ActivityMapper<'a> {
    pub fn new(table: &'a MappingTable) -> Self {
        Self { table }
    }

    /// Collapses consecutive actions that map to the same activity kind for
    /// the same actor and repository into a single activity, keyed to the
    /// earliest action in the run. Actions an unrelated run separates are
    /// kept as their own activity even if their kind repeats later.
    pub fn map(&self, actions: &[Action]) -> Vec<Activity> {
        let mut activities = Vec::new();
        let mut run: Option<(String, &Action)> = None;

        for action in actions {
            let Some(kind) = self.table.lookup(action.start_date, &action.kind) else {
                continue;
            };

            match &run {
                Some((run_kind, first))
                    if run_kind == kind
                        && first.actor.login == action.actor.login
                        && first.repository.id == action.repository.id =>
                {
                    // same run: the activity already started at `first`.
                }
                _ => {
                    if let Some((run_kind, first)) = run.take() {
                        activities.push(Activity {
                            start_date: first.start_date,
                            actor: first.actor.clone(),
                            repository: first.repository.clone(),
                            activity: run_kind,
                        });
                    }
                    run = Some((kind.to_string(), action));
                }
            }
        }

        if let Some((run_kind, first)) = run {
            activities.push(Activity {
                start_date: first.start_date,
                actor: first.actor.clone(),
                repository: first.repository.clone(),
                activity: run_kind,
            });
        }

        activities
    }
}
