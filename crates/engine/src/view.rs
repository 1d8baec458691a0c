//! Data handed to the presentation widget.

use serde::Serialize;
use serde_json::{Map as JsonMap, Value};
use tablelink_types::{FieldConfig, PickerOption, SearchHit, SelectionMode, SelectionValue};

use crate::dispatch::QueryResults;

/// Everything the widget needs to render the picker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PickerView {
    pub options: Vec<PickerOption>,
    /// Record identifiers currently selected, parsed from their references.
    pub selected: Vec<String>,
    pub loading: bool,
    pub input_text: String,
    pub summary: String,
    /// `"<selected> of <total>"`, multi-select only. The total is `?` until the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_label: Option<String>,
}

impl PickerView {
    pub fn build(config: &FieldConfig, results: &QueryResults, selection: &SelectionValue, input_text: &str) -> Self {
        let mut options: Vec<PickerOption> = results
            .hits
            .iter()
            .filter_map(|hit| option_for_hit(config, hit))
            .collect();

        // keep chosen records visible even after they drop out of the hit set
        for item in selection.items() {
            let record_id = item.record_id();
            if options.iter().any(|option| option.value == record_id) {
                continue;
            }
            options.push(option_for_fields(config, record_id, &item.snapshot));
        }

        let count_text = match config.mode() {
            SelectionMode::Multiple => {
                let total = results
                    .total_count
                    .map(|total| total.to_string())
                    .unwrap_or_else(|| "?".to_string());
                Some(format!("{} of {}", selection.len(), total))
            }
            SelectionMode::Single => None,
        };

        Self {
            options,
            selected: selection.items().iter().map(|item| item.record_id().to_string()).collect(),
            loading: results.loading,
            input_text: input_text.to_string(),
            summary: summary(config, selection),
            count_text,
            search_label: config.search_label.clone(),
        }
    }
}

/// Short description of the current selection shown in the collapsed field.
pub fn summary(config: &FieldConfig, selection: &SelectionValue) -> String {
    match (config.mode(), selection.items()) {
        (_, [only]) => {
            let label = join_fields(&only.snapshot, &config.primary_display_keys);
            if label.is_empty() { only.record_id().to_string() } else { label }
        }
        (SelectionMode::Single, []) => "0 selected".to_string(),
        (_, items) => format!("{} selected", items.len()),
    }
}

fn option_for_hit(config: &FieldConfig, hit: &SearchHit) -> Option<PickerOption> {
    let record_id = hit.record_id()?;
    Some(option_for_fields(config, &record_id, hit.fields()))
}

fn option_for_fields(config: &FieldConfig, record_id: &str, fields: &JsonMap<String, Value>) -> PickerOption {
    let label = join_fields(fields, &config.primary_display_keys);
    let description = config
        .secondary_display_keys
        .as_deref()
        .map(|keys| join_fields(fields, keys))
        .filter(|description| !description.is_empty());

    PickerOption {
        label: if label.is_empty() { record_id.to_string() } else { label },
        description,
        value: record_id.to_string(),
    }
}

fn join_fields(fields: &JsonMap<String, Value>, keys: &[String]) -> String {
    keys.iter()
        .filter_map(|key| fields.get(key))
        .filter_map(display_text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Object(map) => map.get("name").or_else(|| map.get("id")).and_then(display_text),
        _ => None,
    }
}
