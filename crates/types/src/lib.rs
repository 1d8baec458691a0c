//! Shared type definitions for the record-link picker.

mod field;
mod search;
mod selection;

pub use field::FieldConfig;
pub use search::{CredentialCacheEntry, FALLBACK_RECORD_ID_FIELD, RANKING_METADATA_FIELDS, RECORD_ID_FIELD, SearchHit, SearchResponse};
pub use selection::{ChosenIdentifiers, SelectedItem, SelectionMode, SelectionValue};

use serde::{Deserialize, Serialize};

/// Why the widget reported a change of its input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputChangeReason {
    /// The user typed.
    #[default]
    Input,
    /// The widget reset the text, for example after a pick.
    Reset,
    /// The widget cleared the text.
    Clear,
}

/// Inbound events raised by the presentation widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WidgetEvent {
    /// The picker dropdown was opened.
    Open,
    /// The search input text changed.
    InputChanged { text: String, reason: InputChangeReason },
    /// The user picked or unpicked records.
    Pick { chosen: ChosenIdentifiers },
    /// The picker dropdown was closed.
    Close,
}

/// One entry offered by the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerOption {
    /// Text shown for the record.
    pub label: String,
    /// Secondary text shown under the label, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Record identifier returned to the controller when picked.
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Error,
}

/// User-visible message raised by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: NotificationSeverity,
    pub message: String,
    /// Documentation link offered next to the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
}

impl Notification {
    pub fn error(message: impl Into<String>, docs_url: Option<String>) -> Self {
        Self {
            severity: NotificationSeverity::Error,
            message: message.into(),
            docs_url,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: NotificationSeverity::Warning,
            message: message.into(),
            docs_url: None,
        }
    }
}
