//! Maps identifiers chosen in the widget back to stored selection values.
//!
//! Each chosen identifier is resolved against the live hit set first. A record
//! that has scrolled out of the current results (because the user kept typing)
//! is carried forward from the previous value untouched, so narrowing a search
//! never silently drops an earlier choice. Identifiers found in neither place
//! are no longer valid and are dropped.

use std::collections::HashSet;

use serde_json::{Map as JsonMap, Value};
use tablelink_types::{ChosenIdentifiers, FieldConfig, SearchHit, SelectedItem, SelectionMode, SelectionValue};
use tracing::debug;

/// Reconcile `chosen` against `hits` and `previous`, producing a value shaped for the field's mode.
///
/// Output order follows the order of `chosen`. Duplicate identifiers collapse to their first occurrence.
pub fn reconcile(config: &FieldConfig, chosen: &ChosenIdentifiers, hits: &[SearchHit], previous: &SelectionValue) -> SelectionValue {
    let mode = config.mode();
    let identifiers = chosen.as_slice();
    let identifiers = match mode {
        SelectionMode::Single => &identifiers[..identifiers.len().min(1)],
        SelectionMode::Multiple => identifiers,
    };

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        if identifier.is_empty() || !seen.insert(identifier.as_str()) {
            continue;
        }
        let reference = SelectedItem::reference_for(&config.collection, identifier);

        if let Some(hit) = hits.iter().find(|hit| hit.record_id().as_deref() == Some(identifier.as_str())) {
            items.push(SelectedItem::new(reference, snapshot_of(hit, config.effective_allow_list())));
        } else if let Some(existing) = previous.find(&reference) {
            items.push(existing.clone());
        } else {
            debug!(collection = %config.collection, record_id = %identifier, "chosen identifier not found; dropped");
        }
    }

    SelectionValue::from_items(items, mode)
}

/// Snapshot of a hit without ranking metadata, reduced to `allow_list` when one restricts it.
pub fn snapshot_of(hit: &SearchHit, allow_list: Option<&[String]>) -> JsonMap<String, Value> {
    let fields = hit.without_ranking_metadata();
    match allow_list {
        Some(allowed) => fields.into_iter().filter(|(key, _)| allowed.iter().any(|field| field == key)).collect(),
        None => fields,
    }
}
