//! Stage 1: raw events → actions.

use super::table::MappingTable;
use super::types::Action;
use crate::source::RawEvent;

pub struct ActionMapper<'a> {
    table: &'a MappingTable,
}

impl<'a> ActionMapper<'a> {
    pub fn new(table: &'a MappingTable) -> Self {
        Self { table }
    }

    /// Maps each event through the window covering its own timestamp.
    ///
    /// Events are assumed already in ascending-`created_at` order (the
    /// contract `query_events` and the Orchestrator's cumulative list
    /// uphold), so looking up each event's own window and appending in
    /// place is equivalent to grouping by window first and concatenating —
    /// both preserve overall temporal order, and per-event lookup avoids an
    /// intermediate partition just to undo it.
    pub fn map(&self, events: &[RawEvent]) -> Vec<Action> {
        let mut unused = 0usize;
        let actions = events
            .iter()
            .filter_map(|event| {
                match self.table.lookup(event.created_at, &event.kind) {
                    Some(kind) => Some(Action {
                        start_date: event.created_at,
                        actor: event.actor.clone(),
                        repository: event.repo.clone(),
                        kind: kind.to_string(),
                    }),
                    None => {
                        unused += 1;
                        None
                    }
                }
            })
            .collect();

        if unused > 0 {
            log::debug!("Warning: Unused actions — dropped {unused} unmapped event(s)");
        }

        actions
    }
}
