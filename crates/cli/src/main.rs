use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tablelink_engine::{
    Controller, ControllerSettings, CredentialCache, FieldBinding, HttpCredentialIssuer, HttpSearchBackend, RuntimeUpdate, SystemClock,
    drive_controller, filter,
};
use tablelink_types::{ChosenIdentifiers, FieldConfig, InputChangeReason, SelectionMode, SelectionValue, WidgetEvent};
use tablelink_util::{CredentialStore, redact_sensitive};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::unbounded_channel;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "tablelink", version, about = "Pick records from a hosted search index into a field")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run an interactive picker session driven by commands on stdin.
    Pick {
        /// Field configuration as JSON.
        #[arg(long)]
        field: String,
        /// Host row as JSON, used to render the filter template.
        #[arg(long, default_value = "{}")]
        row: String,
        /// Current field value as JSON.
        #[arg(long)]
        value: Option<String>,
        /// Query before the picker is opened.
        #[arg(long)]
        eager: bool,
    },
    /// Render a filter template against a row.
    RenderFilter {
        #[arg(long)]
        template: String,
        #[arg(long, default_value = "{}")]
        row: String,
    },
    /// Inspect or reset stored search credentials.
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(Debug, Subcommand)]
enum CredentialsAction {
    Show,
    Clear,
}

#[derive(Debug, PartialEq)]
enum ScriptCommand {
    Event(WidgetEvent),
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Pick { field, row, value, eager } => run_pick(&field, &row, value.as_deref(), eager).await,
        Commands::RenderFilter { template, row } => {
            let row: Value = serde_json::from_str(&row).context("parse --row")?;
            println!("{}", filter::render(&template, &row));
            Ok(())
        }
        Commands::Credentials { action } => run_credentials(action),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store() -> Arc<CredentialStore> {
    match CredentialStore::new() {
        Ok(store) => Arc::new(store),
        Err(error) => {
            warn!(error = %error, "credential store unavailable; using in-memory credentials");
            Arc::new(CredentialStore::ephemeral())
        }
    }
}

async fn run_pick(field: &str, row: &str, value: Option<&str>, eager: bool) -> Result<()> {
    let config: FieldConfig = serde_json::from_str(field).context("parse --field")?;
    let row: Value = serde_json::from_str(row).context("parse --row")?;
    let value: SelectionValue = match value {
        Some(raw) => serde_json::from_str(raw).context("parse --value")?,
        None => SelectionValue::Empty,
    };
    let mode = config.mode();

    let settings = ControllerSettings::from_env().with_eager_load(eager);
    let cache = CredentialCache::with_store(open_store(), settings.credential_ttl);
    let sink = Arc::new(|value: SelectionValue| print_json(&json!({ "committed": value })));
    let controller = Controller::new(FieldBinding { config, row, value }, cache, sink, settings, Arc::new(SystemClock));

    let issuer = Arc::new(HttpCredentialIssuer::from_env()?);
    let backend = Arc::new(HttpSearchBackend::from_env()?);
    let (widget_tx, widget_rx) = unbounded_channel();
    let (update_tx, mut update_rx) = unbounded_channel();
    let driver = tokio::spawn(drive_controller(controller, issuer, backend, widget_rx, update_tx));
    let printer = tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            match update {
                RuntimeUpdate::View(view) => print_json(&json!({ "view": view })),
                RuntimeUpdate::Notification(notification) => print_json(&json!({ "notification": notification })),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        match parse_command(&line, mode) {
            Ok(Some(ScriptCommand::Quit)) => break,
            Ok(Some(ScriptCommand::Event(event))) => {
                if widget_tx.send(event).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => eprintln!("{message}"),
        }
    }

    drop(widget_tx);
    driver.await.context("controller task panicked")??;
    printer.await.context("printer task panicked")?;
    Ok(())
}

fn run_credentials(action: CredentialsAction) -> Result<()> {
    let store = CredentialStore::new().context("open credential store")?;
    match action {
        CredentialsAction::Show => {
            let payload = serde_json::to_string_pretty(&store.snapshot())?;
            println!("{}", store.path().display());
            println!("{}", redact_sensitive(&payload));
        }
        CredentialsAction::Clear => {
            store.clear().context("clear credential store")?;
            println!("cleared {}", store.path().display());
        }
    }
    Ok(())
}

/// Parse one stdin line into a widget event. Blank lines yield `None`.
fn parse_command(line: &str, mode: SelectionMode) -> Result<Option<ScriptCommand>, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let event = match word {
        "" => return Ok(None),
        "quit" | "exit" => return Ok(Some(ScriptCommand::Quit)),
        "open" => WidgetEvent::Open,
        "close" => WidgetEvent::Close,
        "type" => WidgetEvent::InputChanged {
            text: rest.trim_start().to_string(),
            reason: InputChangeReason::Input,
        },
        "pick" | "clear" => {
            let ids: Vec<String> = if word == "clear" {
                Vec::new()
            } else {
                rest.split_whitespace().map(String::from).collect()
            };
            let chosen = match mode {
                SelectionMode::Multiple => ChosenIdentifiers::Many(ids),
                SelectionMode::Single => ChosenIdentifiers::One(ids.into_iter().next()),
            };
            WidgetEvent::Pick { chosen }
        }
        other => return Err(format!("unknown command '{other}' (expected open, type, pick, clear, close or quit)")),
    };
    Ok(Some(ScriptCommand::Event(event)))
}

fn print_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(error) => warn!(error = %error, "failed to encode output"),
    }
}
