//! Duplicate removal within a source and across sources.

use std::collections::HashSet;

use crate::models::Event;

/// Drop repeated events by [`Event::identity_key`]; the first occurrence wins
/// and order is preserved.
pub fn dedupe_events(events: impl IntoIterator<Item = Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for event in events {
        if seen.insert(event.identity_key()) {
            deduped.push(event);
        }
    }
    deduped
}

/// Merge two sources: all of `primary`, then each `secondary` event whose
/// [`Event::cross_source_key`] does not occur in `primary`.
pub fn merge(primary: Vec<Event>, secondary: Vec<Event>) -> Vec<Event> {
    let keys: HashSet<(String, String)> = primary.iter().map(Event::cross_source_key).collect();

    let mut merged = primary;
    merged.extend(
        secondary
            .into_iter()
            .filter(|event| !keys.contains(&event.cross_source_key())),
    );
    merged
}
