//! Tokio driver that connects a [`Controller`] to its collaborators.
//!
//! The controller itself is synchronous. This loop feeds it widget events,
//! timer expiry and collaborator replies one at a time, performs the effects
//! it returns (spawning network calls so the loop never blocks on them), and
//! publishes the refreshed view after every event. When the widget channel
//! closes the session is torn down and the loop ends.

use std::sync::Arc;

use anyhow::Result;
use tablelink_types::{Notification, WidgetEvent};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::backend::{CredentialIssuer, SearchBackend};
use crate::controller::{Controller, ControllerEvent, Effect};
use crate::view::PickerView;

/// Updates published to the host while the driver runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeUpdate {
    View(PickerView),
    Notification(Notification),
}

/// Runs `controller` until `widget_rx` closes.
pub async fn drive_controller(
    mut controller: Controller,
    issuer: Arc<dyn CredentialIssuer>,
    backend: Arc<dyn SearchBackend>,
    mut widget_rx: UnboundedReceiver<WidgetEvent>,
    update_tx: UnboundedSender<RuntimeUpdate>,
) -> Result<()> {
    let (reply_tx, mut reply_rx) = unbounded_channel::<ControllerEvent>();
    let executor = EffectExecutor {
        issuer,
        backend,
        reply_tx,
        update_tx: update_tx.clone(),
    };
    let mut deadline: Option<Instant> = None;

    let effects = controller.mount();
    executor.perform(effects, &mut deadline);
    let _ = update_tx.send(RuntimeUpdate::View(controller.view()));

    loop {
        let event = tokio::select! {
            widget = widget_rx.recv() => match widget {
                Some(event) => ControllerEvent::Widget(event),
                None => break,
            },
            Some(reply) = reply_rx.recv() => reply,
            _ = debounce(deadline) => {
                deadline = None;
                ControllerEvent::DebounceElapsed
            }
        };

        let effects = controller.handle(event);
        executor.perform(effects, &mut deadline);
        if update_tx.send(RuntimeUpdate::View(controller.view())).is_err() {
            debug!("update receiver dropped");
        }
    }

    debug!(generation = controller.generation(), "widget channel closed; tearing down");
    let effects = controller.teardown();
    executor.perform(effects, &mut deadline);
    Ok(())
}

async fn debounce(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct EffectExecutor {
    issuer: Arc<dyn CredentialIssuer>,
    backend: Arc<dyn SearchBackend>,
    reply_tx: UnboundedSender<ControllerEvent>,
    update_tx: UnboundedSender<RuntimeUpdate>,
}

impl EffectExecutor {
    fn perform(&self, effects: Vec<Effect>, deadline: &mut Option<Instant>) {
        for effect in effects {
            match effect {
                Effect::IssueAppIdentifier { generation } => {
                    let issuer = Arc::clone(&self.issuer);
                    let reply_tx = self.reply_tx.clone();
                    tokio::spawn(async move {
                        let result = issuer.issue_app_identifier().await.map_err(|error| format!("{error:#}"));
                        let _ = reply_tx.send(ControllerEvent::AppIdentifierIssued { generation, result });
                    });
                }
                Effect::IssueSearchSecret { generation, collection } => {
                    let issuer = Arc::clone(&self.issuer);
                    let reply_tx = self.reply_tx.clone();
                    tokio::spawn(async move {
                        let result = issuer
                            .issue_search_secret(&collection)
                            .await
                            .map_err(|error| format!("{error:#}"));
                        let _ = reply_tx.send(ControllerEvent::SearchSecretIssued {
                            generation,
                            collection,
                            result,
                        });
                    });
                }
                Effect::Search {
                    generation,
                    sequence,
                    request,
                } => {
                    let backend = Arc::clone(&self.backend);
                    let reply_tx = self.reply_tx.clone();
                    tokio::spawn(async move {
                        let result = backend.query(&request).await.map_err(|error| format!("{error:#}"));
                        let _ = reply_tx.send(ControllerEvent::SearchCompleted {
                            generation,
                            sequence,
                            result,
                        });
                    });
                }
                Effect::ArmDebounce { deadline: at } => *deadline = Some(Instant::from_std(at)),
                Effect::CancelDebounce => *deadline = None,
                Effect::Notify(notification) => {
                    let _ = self.update_tx.send(RuntimeUpdate::Notification(notification));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;
    use tablelink_types::{ChosenIdentifiers, InputChangeReason, SelectionValue};
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::backend::testing::{CountingIssuer, ScriptedBackend};
    use crate::clock::{Clock, SystemClock, testing::ManualClock};
    use crate::controller::{FieldBinding, SelectionSink};
    use crate::credentials::CredentialCache;
    use crate::settings::ControllerSettings;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<SelectionValue>>);

    impl SelectionSink for RecordingSink {
        fn on_change(&self, value: SelectionValue) {
            self.0.lock().expect("sink lock").push(value);
        }
    }

    fn controller(cache: CredentialCache, sink: Arc<RecordingSink>, clock: Arc<dyn Clock>) -> Controller {
        let binding = FieldBinding {
            config: serde_json::from_value(json!({"collection": "users", "primaryDisplayKeys": ["name"]})).unwrap(),
            row: json!({}),
            value: SelectionValue::Empty,
        };
        Controller::new(binding, cache, sink, ControllerSettings::default(), clock)
    }

    fn typed(text: &str) -> WidgetEvent {
        WidgetEvent::InputChanged {
            text: text.into(),
            reason: InputChangeReason::Input,
        }
    }

    fn drain(update_rx: &mut UnboundedReceiver<RuntimeUpdate>) -> Vec<RuntimeUpdate> {
        let mut updates = Vec::new();
        loop {
            match update_rx.try_recv() {
                Ok(update) => updates.push(update),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return updates,
            }
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_reaches_backend_once() {
        let issuer = Arc::new(CountingIssuer::default());
        let backend = Arc::new(ScriptedBackend::default().with_response("bob", vec!["7"]));
        let sink = Arc::new(RecordingSink::default());
        let (widget_tx, widget_rx) = unbounded_channel();
        let (update_tx, mut update_rx) = unbounded_channel();

        let cache = CredentialCache::new(Duration::from_secs(3600));
        let driver = tokio::spawn(drive_controller(
            controller(cache, sink, Arc::new(SystemClock)),
            issuer.clone(),
            backend.clone(),
            widget_rx,
            update_tx,
        ));

        widget_tx.send(WidgetEvent::Open).unwrap();
        settle().await;
        for text in ["b", "bo", "bob"] {
            widget_tx.send(typed(text)).unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(backend.texts(), vec![String::new()]);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(backend.texts(), vec![String::new(), "bob".to_string()]);

        drop(widget_tx);
        driver.await.unwrap().unwrap();
        let last_view = drain(&mut update_rx)
            .into_iter()
            .filter_map(|update| match update {
                RuntimeUpdate::View(view) => Some(view),
                RuntimeUpdate::Notification(_) => None,
            })
            .last()
            .unwrap();
        let values: Vec<&str> = last_view.options.iter().map(|option| option.value.as_str()).collect();
        assert_eq!(values, vec!["7"]);
        assert_eq!(last_view.input_text, "bob");
        assert_eq!(issuer.app_id_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_reply_does_not_overwrite_newer_results() {
        let issuer = Arc::new(CountingIssuer::default());
        let backend = Arc::new(
            ScriptedBackend::default()
                .with_response("a", vec!["1"])
                .with_response("ab", vec!["2"])
                .with_delay("a", Duration::from_secs(3)),
        );
        let (widget_tx, widget_rx) = unbounded_channel();
        let (update_tx, mut update_rx) = unbounded_channel();
        let driver = tokio::spawn(drive_controller(
            controller(CredentialCache::new(Duration::from_secs(3600)), Arc::default(), Arc::new(SystemClock)),
            issuer,
            backend.clone(),
            widget_rx,
            update_tx,
        ));

        widget_tx.send(WidgetEvent::Open).unwrap();
        settle().await;
        widget_tx.send(typed("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        widget_tx.send(typed("ab")).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.texts(), vec!["".to_string(), "a".to_string(), "ab".to_string()]);

        let views: Vec<PickerView> = drain(&mut update_rx)
            .into_iter()
            .filter_map(|update| match update {
                RuntimeUpdate::View(view) => Some(view),
                RuntimeUpdate::Notification(_) => None,
            })
            .collect();
        let last = views.last().unwrap();
        let values: Vec<&str> = last.options.iter().map(|option| option.value.as_str()).collect();
        assert_eq!(values, vec!["2"]);
        assert!(!last.loading);

        drop(widget_tx);
        driver.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn search_secret_is_fetched_once_per_hour() {
        let issuer = Arc::new(CountingIssuer::default());
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let (widget_tx, widget_rx) = unbounded_channel();
        let (update_tx, _update_rx) = unbounded_channel();
        let driver = tokio::spawn(drive_controller(
            controller(CredentialCache::new(Duration::from_secs(3600)), Arc::default(), clock.clone()),
            issuer.clone(),
            Arc::new(ScriptedBackend::default()),
            widget_rx,
            update_tx,
        ));

        for step in 0..3 {
            widget_tx.send(WidgetEvent::Open).unwrap();
            settle().await;
            widget_tx.send(WidgetEvent::Close).unwrap();
            settle().await;
            if step < 2 {
                clock.advance(Duration::from_secs(1800));
            }
        }

        drop(widget_tx);
        driver.await.unwrap().unwrap();
        assert_eq!(issuer.app_id_calls(), 1);
        assert_eq!(issuer.secret_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn multi_select_commits_on_close_only() {
        let backend = Arc::new(ScriptedBackend::default().with_response("", vec!["1", "2", "3"]));
        let sink = Arc::new(RecordingSink::default());
        let (widget_tx, widget_rx) = unbounded_channel();
        let (update_tx, _update_rx) = unbounded_channel();
        let driver = tokio::spawn(drive_controller(
            controller(CredentialCache::new(Duration::from_secs(3600)), sink.clone(), Arc::new(SystemClock)),
            Arc::new(CountingIssuer::default()),
            backend,
            widget_rx,
            update_tx,
        ));

        widget_tx.send(WidgetEvent::Open).unwrap();
        settle().await;
        for chosen in [vec!["1"], vec!["1", "2"], vec!["1", "2", "3"]] {
            widget_tx
                .send(WidgetEvent::Pick {
                    chosen: ChosenIdentifiers::Many(chosen.into_iter().map(String::from).collect()),
                })
                .unwrap();
        }
        settle().await;
        assert!(sink.0.lock().unwrap().is_empty());

        widget_tx.send(WidgetEvent::Close).unwrap();
        settle().await;
        let committed = sink.0.lock().unwrap().clone();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].len(), 3);

        drop(widget_tx);
        driver.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn credential_failure_is_published_as_notification() {
        let issuer = Arc::new(CountingIssuer {
            refuse_app_id: Some("Algolia not setup".into()),
            ..CountingIssuer::default()
        });
        let backend = Arc::new(ScriptedBackend::default());
        let (widget_tx, widget_rx) = unbounded_channel();
        let (update_tx, mut update_rx) = unbounded_channel();
        let driver = tokio::spawn(drive_controller(
            controller(CredentialCache::new(Duration::from_secs(3600)), Arc::default(), Arc::new(SystemClock)),
            issuer,
            backend.clone(),
            widget_rx,
            update_tx,
        ));

        widget_tx.send(WidgetEvent::Open).unwrap();
        settle().await;
        widget_tx.send(typed("x")).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(widget_tx);
        driver.await.unwrap().unwrap();

        let notifications: Vec<Notification> = drain(&mut update_rx)
            .into_iter()
            .filter_map(|update| match update {
                RuntimeUpdate::Notification(notification) => Some(notification),
                RuntimeUpdate::View(_) => None,
            })
            .collect();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "Algolia not set up: Failed to get app ID");
        assert!(backend.texts().is_empty());
    }
}
