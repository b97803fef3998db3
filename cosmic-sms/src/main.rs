mod config;
mod diagnostics;

use anyhow::{Context, Result};
use clap::Parser;
use cosmic_sms_core::{
    format_message_time, now_millis, ConversationList, ConversationSummary, InboxError,
    MessageRecord, ReconcileOutcome, RelativeTimeFormatter, SnapshotView, SqliteStore,
    ThreadSession, DEFAULT_THREAD_TITLE,
};
use diagnostics::{Cli, Command, PolicyArg};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    diagnostics::init_logging(&cli).context("Failed to initialize logging")?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Command::Conversations { json, policy } => list_conversations(&config, json, policy).await,
        Command::Thread { thread_id, json } => show_thread(&config, &thread_id, json).await,
        Command::Send {
            thread_id,
            address,
            body,
        } => send_message(&config, &thread_id, &address, &body.join(" ")).await,
        Command::Import { file } => import_messages(&config, &file),
        Command::DumpConfig => {
            let contents =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", contents);
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    config.ensure_directories()?;
    let path = config.database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open message log {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Print the notice the view ended up with, if any
fn report_notice(view: &SnapshotView) {
    if let Some(notice) = view.notice() {
        eprintln!("{}", notice.message());
    }
}

/// Log a library failure by severity and show its user-facing text
fn report_failure(error: &InboxError) {
    if error.is_recoverable() {
        warn!("Recoverable failure, try again later: {}", error);
    } else if error.requires_user_action() {
        warn!("Failure needs user action: {}", error);
    } else {
        error!("Operation failed: {}", error);
    }
    eprintln!("{}", error.user_message());
}

/// Thread the loopback transport will file a send to `address` under
fn target_thread(
    store: &SqliteStore,
    requested: &str,
    address: &str,
) -> cosmic_sms_core::Result<String> {
    let resolved = store.thread_for_address(address)?;
    if resolved != requested {
        warn!(
            "Thread {} is not the thread for {}; following thread {}",
            requested, address, resolved
        );
    }
    Ok(resolved)
}

async fn list_conversations(config: &Config, json: bool, policy: Option<PolicyArg>) -> Result<()> {
    let store = open_store(config)?;
    let view = Arc::new(SnapshotView::new());
    let policy = policy
        .map(Into::into)
        .unwrap_or(config.inbox.aggregation_policy);

    let list = ConversationList::new(store, config.permissions(), Arc::clone(&view))
        .with_policy(policy);

    let summaries = match list.load().await {
        Ok(summaries) => summaries,
        Err(e) => {
            report_failure(&e);
            return Err(e).context("Failed to load conversations");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        report_notice(&view);
        return Ok(());
    }

    let formatter = config.formatter()?;
    print_conversations(&summaries, &formatter, config.inbox.snippet_max_chars);
    Ok(())
}

fn print_conversations(
    summaries: &[ConversationSummary],
    formatter: &RelativeTimeFormatter,
    snippet_max_chars: usize,
) {
    let now = now_millis();
    for summary in summaries {
        println!(
            "{:>6}  {:<20} {:>8}  ({})  {}",
            summary.thread_id,
            summary.address,
            formatter.format(summary.last_timestamp_millis, now),
            summary.message_count,
            summary.preview(snippet_max_chars)
        );
    }
}

async fn show_thread(config: &Config, thread_id: &str, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let view = Arc::new(SnapshotView::new());
    let (session, _guard) = ThreadSession::new(
        thread_id,
        "",
        Arc::clone(&store),
        Arc::clone(&store),
        config.permissions(),
        Arc::clone(&view),
    );

    let transcript = match session.load().await {
        Ok(transcript) => transcript,
        Err(e) => {
            report_failure(&e);
            return Err(e).context("Failed to load thread");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&transcript)?);
        return Ok(());
    }

    let title = transcript
        .iter()
        .map(|record| record.address.as_str())
        .find(|address| !address.trim().is_empty())
        .unwrap_or(DEFAULT_THREAD_TITLE);
    print_transcript(title, &transcript);
    Ok(())
}

fn print_transcript(title: &str, transcript: &[MessageRecord]) {
    println!("{}", title);
    for record in transcript {
        let marker = if record.is_sent() { '>' } else { '<' };
        println!(
            "{} {:>8}  {}",
            marker,
            format_message_time(record.timestamp_millis),
            record.body
        );
    }
}

async fn send_message(config: &Config, thread_id: &str, address: &str, body: &str) -> Result<()> {
    let (title, transcript) = send_and_reconcile(config, thread_id, address, body).await?;
    if let Some(records) = transcript {
        print_transcript(&title, &records);
    }
    Ok(())
}

/// Send `body` and wait for the thread re-read; `None` if the view went away
async fn send_and_reconcile(
    config: &Config,
    thread_id: &str,
    address: &str,
    body: &str,
) -> Result<(String, Option<Vec<MessageRecord>>)> {
    let store = open_store(config)?;
    let thread_id = match target_thread(&store, thread_id, address) {
        Ok(thread_id) => thread_id,
        Err(e) => {
            report_failure(&e);
            return Err(e).context("Failed to resolve thread");
        }
    };

    let view = Arc::new(SnapshotView::new());
    let (session, _guard) = ThreadSession::new(
        thread_id.as_str(),
        address,
        Arc::clone(&store),
        Arc::clone(&store),
        config.permissions(),
        Arc::clone(&view),
    );
    let session = session.with_config(config.coordinator_config());

    // the optimistic append needs the current transcript
    if let Err(e) = session.load().await {
        report_failure(&e);
        return Err(e).context("Failed to load thread");
    }

    let handle = match session.send(address, body).await {
        Ok(handle) => handle,
        Err(e) => {
            report_failure(&e);
            return Err(e).context("Failed to send message");
        }
    };

    match handle.wait().await {
        ReconcileOutcome::Delivered(count) => {
            info!("Thread {} reconciled with {} messages", thread_id, count);
            Ok((session.title().to_string(), Some(view.transcript())))
        }
        ReconcileOutcome::ViewGone => Ok((session.title().to_string(), None)),
        ReconcileOutcome::Failed(reason) => {
            error!("Reconciliation failed: {}", reason);
            anyhow::bail!("Message sent but the thread could not be refreshed: {}", reason)
        }
    }
}

fn import_messages(config: &Config, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records: Vec<MessageRecord> =
        serde_json::from_str(&contents).context("Failed to parse message JSON")?;

    let store = open_store(config)?;
    let imported = store.import(&records)?;

    println!(
        "Imported {} messages into {}",
        imported,
        config.database_path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.store.database = dir.path().join("messages.db");
        config.send.reconcile_delay_ms = 10;
        config
    }

    fn seed(config: &Config) {
        let store = SqliteStore::open(config.database_path()).unwrap();
        store
            .insert(&MessageRecord {
                id: "1".to_string(),
                thread_id: "4".to_string(),
                address: "555".to_string(),
                body: "hi".to_string(),
                timestamp_millis: 1_000,
                direction: cosmic_sms_core::Direction::Incoming,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_to_new_address_shows_new_thread() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        seed(&config);

        let (title, transcript) = send_and_reconcile(&config, "42", "+1999", "hello")
            .await
            .unwrap();

        let transcript = transcript.unwrap();
        assert_eq!(title, "+1999");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].thread_id, "5");
        assert_eq!(transcript[0].body, "hello");
        assert!(transcript[0].is_sent());
    }

    #[tokio::test]
    async fn test_send_to_known_address_keeps_its_thread() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        seed(&config);

        let (_, transcript) = send_and_reconcile(&config, "4", "555", "reply")
            .await
            .unwrap();

        let transcript = transcript.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].body, "reply");
    }

    #[tokio::test]
    async fn test_send_without_permission_reports_inbox_error() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.permissions.send = false;
        seed(&config);

        let error = send_and_reconcile(&config, "4", "555", "blocked")
            .await
            .unwrap_err();

        let inbox_error = error.downcast_ref::<InboxError>().unwrap();
        assert!(inbox_error.requires_user_action());
        assert!(inbox_error.user_message().starts_with("SMS permission required"));
    }

    #[test]
    fn test_target_thread_follows_address() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(target_thread(&store, "42", "+1999").unwrap(), "1");
    }
}
