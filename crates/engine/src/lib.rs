//! # Tablelink Engine
//!
//! Search-backed record selection for a single host field. The engine turns
//! typing into throttled, row-scoped queries against a hosted search index,
//! keeps short-lived search credentials cached per collection, and maps the
//! identifiers a picker widget reports back into durable references with
//! field snapshots.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use tablelink_engine::{
//!     Controller, ControllerSettings, CredentialCache, FieldBinding, HttpCredentialIssuer, HttpSearchBackend, SystemClock,
//!     drive_controller,
//! };
//! use tablelink_types::{SelectionValue, WidgetEvent};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = ControllerSettings::from_env();
//! let binding = FieldBinding {
//!     config: serde_json::from_value(json!({"collection": "users", "primaryDisplayKeys": ["name"]}))?,
//!     row: json!({"team": {"id": "T1"}}),
//!     value: SelectionValue::Empty,
//! };
//! let sink = Arc::new(|value: SelectionValue| println!("{value:?}"));
//! let cache = CredentialCache::new(settings.credential_ttl);
//! let controller = Controller::new(binding, cache, sink, settings, Arc::new(SystemClock));
//!
//! let (widget_tx, widget_rx) = tokio::sync::mpsc::unbounded_channel();
//! let (update_tx, _update_rx) = tokio::sync::mpsc::unbounded_channel();
//! widget_tx.send(WidgetEvent::Open)?;
//! drop(widget_tx);
//! drive_controller(
//!     controller,
//!     Arc::new(HttpCredentialIssuer::from_env()?),
//!     Arc::new(HttpSearchBackend::from_env()?),
//!     widget_rx,
//!     update_tx,
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`credentials`**: process-wide, TTL-bounded search secret cache
//! - **`filter`**: `{{path}}` / `{{path:default}}` filter templates
//! - **`dispatch`**: debounce slot and sequence-guarded query issuance
//! - **`reconcile`**: chosen identifiers to stored values
//! - **`buffer`**: per-session working copy committed on close
//! - **`controller`**: the session state machine
//! - **`backend`**: credential issuer and search backend collaborators
//! - **`runtime`**: Tokio driver executing controller effects

pub mod backend;
pub mod buffer;
pub mod clock;
pub mod controller;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod reconcile;
pub mod runtime;
pub mod settings;
pub mod view;

pub use backend::{
    AppIdentifierGrant, CredentialIssuer, HttpCredentialIssuer, HttpSearchBackend, SearchBackend, SearchRequest, SearchSecretGrant,
};
pub use buffer::BufferedSelection;
pub use clock::{Clock, SystemClock};
pub use controller::{Controller, ControllerEvent, Effect, FieldBinding, Phase, SelectionSink};
pub use credentials::CredentialCache;
pub use dispatch::{DebounceSlot, IssuedQuery, QueryDispatcher, QueryResults, QueryScope, ReplyOutcome};
pub use error::SelectionError;
pub use reconcile::reconcile;
pub use runtime::{RuntimeUpdate, drive_controller};
pub use settings::ControllerSettings;
pub use view::PickerView;
