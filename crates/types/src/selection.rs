//! Selection values bound into a host document field.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// A record chosen by the user, stored as a durable reference plus a partial snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    /// Durable `<collection>/<recordId>` path.
    #[serde(alias = "docPath")]
    pub reference: String,
    /// Partial copy of the record's fields at selection time.
    #[serde(default)]
    pub snapshot: JsonMap<String, Value>,
}

impl SelectedItem {
    pub fn new(reference: impl Into<String>, snapshot: JsonMap<String, Value>) -> Self {
        Self {
            reference: reference.into(),
            snapshot,
        }
    }

    /// Builds the reference for a record inside a collection.
    pub fn reference_for(collection: &str, record_id: &str) -> String {
        format!("{collection}/{record_id}")
    }

    /// Record identifier: the last path segment of the reference.
    pub fn record_id(&self) -> &str {
        self.reference.rsplit('/').next().unwrap_or(self.reference.as_str())
    }
}

/// Whether a field holds one record or a list of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Single,
    #[default]
    Multiple,
}

/// Value stored in the host field.
///
/// Serialized untagged so the persisted shape is an object, an array or `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionValue {
    Many(Vec<SelectedItem>),
    One(SelectedItem),
    #[default]
    Empty,
}

impl SelectionValue {
    /// Normalizes a host value into the shape required by `mode`.
    ///
    /// Multi-select wraps a lone item into a list; single-select keeps only the
    /// first item of a list. Items with an empty reference are discarded.
    pub fn normalized(self, mode: SelectionMode) -> Self {
        let items: Vec<SelectedItem> = self.into_items().into_iter().filter(|item| !item.reference.is_empty()).collect();
        Self::from_items(items, mode)
    }

    /// Builds a value of the requested shape from a list of items.
    pub fn from_items(items: Vec<SelectedItem>, mode: SelectionMode) -> Self {
        match mode {
            SelectionMode::Multiple => SelectionValue::Many(items),
            SelectionMode::Single => items.into_iter().next().map(SelectionValue::One).unwrap_or(SelectionValue::Empty),
        }
    }

    pub fn items(&self) -> &[SelectedItem] {
        match self {
            SelectionValue::Many(items) => items.as_slice(),
            SelectionValue::One(item) => std::slice::from_ref(item),
            SelectionValue::Empty => &[],
        }
    }

    pub fn into_items(self) -> Vec<SelectedItem> {
        match self {
            SelectionValue::Many(items) => items,
            SelectionValue::One(item) => vec![item],
            SelectionValue::Empty => Vec::new(),
        }
    }

    /// Looks up an item by its reference.
    pub fn find(&self, reference: &str) -> Option<&SelectedItem> {
        self.items().iter().find(|item| item.reference == reference)
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// Identifiers chosen in the widget, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChosenIdentifiers {
    Many(Vec<String>),
    One(Option<String>),
}

impl ChosenIdentifiers {
    pub fn as_slice(&self) -> &[String] {
        match self {
            ChosenIdentifiers::Many(ids) => ids.as_slice(),
            ChosenIdentifiers::One(Some(id)) => std::slice::from_ref(id),
            ChosenIdentifiers::One(None) => &[],
        }
    }
}
