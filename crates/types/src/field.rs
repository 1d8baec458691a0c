//! Field configuration supplied by the host for one editing session.

use serde::{Deserialize, Serialize};

use crate::SelectionMode;

/// Configuration of a record-link field.
///
/// Accepts both the current camelCase keys and the legacy keys used by older
/// table schemas (`index`, `filters`, `primaryKeys`, `secondaryKeys`, `snapshotFields`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    /// Search collection the records live in.
    #[serde(alias = "index")]
    pub collection: String,
    /// Filter expression template rendered against the host row.
    #[serde(default, alias = "filters")]
    pub filter_template: String,
    /// Record fields joined to form an option label.
    #[serde(default, alias = "primaryKeys")]
    pub primary_display_keys: Vec<String>,
    /// Record fields joined to form an option description.
    #[serde(default, alias = "secondaryKeys", skip_serializing_if = "Option::is_none")]
    pub secondary_display_keys: Option<Vec<String>>,
    /// Fields copied into a selection snapshot. An empty list means no restriction.
    #[serde(default, alias = "snapshotFields", skip_serializing_if = "Option::is_none")]
    pub snapshot_field_allow_list: Option<Vec<String>>,
    /// Multi-select unless explicitly `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    /// Plural label shown by the widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_label: Option<String>,
}

impl FieldConfig {
    pub fn mode(&self) -> SelectionMode {
        if self.multiple == Some(false) {
            SelectionMode::Single
        } else {
            SelectionMode::Multiple
        }
    }

    /// Allow-list that actually restricts snapshots, if any.
    pub fn effective_allow_list(&self) -> Option<&[String]> {
        self.snapshot_field_allow_list
            .as_deref()
            .filter(|fields| !fields.is_empty())
    }
}
