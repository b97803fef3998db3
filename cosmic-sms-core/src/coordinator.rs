//! Send-and-Reconcile Coordinator
//!
//! A [`ThreadSession`] owns one open thread. It loads the transcript, sends
//! replies through the [`Transport`] and, after an accepted send, schedules
//! a single delayed re-read of the thread so the view picks up the message
//! once the record source has stored it.
//!
//! ## Reconciliation
//!
//! The transport and the record source are separate systems. A send that
//! the transport accepted is not necessarily visible in the log right away,
//! so the session re-queries the thread after
//! [`CoordinatorConfig::reconcile_delay`] (300 ms by default) and replaces
//! the view's transcript with what it finds. There is exactly one attempt:
//! if the message is still not visible the view stays stale until the next
//! load. A failed send schedules nothing.
//!
//! In [`ReconcileMode::Optimistic`] the session also pushes the current
//! transcript plus a synthesized outgoing record as soon as the transport
//! accepts. The delayed re-read replaces it with the source's view.
//!
//! ## Liveness
//!
//! The view owner holds the [`ViewGuard`] returned by [`ThreadSession::new`].
//! Dropping it (or calling [`ViewGuard::release`]) turns any pending
//! reconciliation into a no-op that reports [`ReconcileOutcome::ViewGone`].

use crate::format::now_millis;
use crate::record::MessageRecord;
use crate::source::{PermissionGate, RecordQuery, RecordSource, Transport};
use crate::transcript::reconstruct;
use crate::view::{TranscriptView, ViewGuard, ViewLiveness, ViewNotice};
use crate::{InboxError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delay between an accepted send and the transcript re-read
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_millis(300);

/// Title used when the open thread has no address
pub const DEFAULT_THREAD_TITLE: &str = "Messages";

/// What the view shows between an accepted send and the re-read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Leave the transcript alone until the source has been re-read
    #[default]
    Delayed,
    /// Append the sent message locally right away
    Optimistic,
}

/// Session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub reconcile_delay: Duration,
    pub mode: ReconcileMode,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
            mode: ReconcileMode::Delayed,
        }
    }
}

/// Result of a scheduled reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The view received a transcript of this many messages
    Delivered(usize),
    /// The view was torn down before the re-read could be delivered
    ViewGone,
    /// The record source could not be read
    Failed(String),
}

/// Handle to the pending reconciliation of one send
///
/// Dropping the handle detaches the task; the reconciliation still runs.
#[derive(Debug)]
pub struct ReconcileHandle {
    task: JoinHandle<ReconcileOutcome>,
}

impl ReconcileHandle {
    /// Wait for the reconciliation to finish
    pub async fn wait(self) -> ReconcileOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => ReconcileOutcome::Failed(format!("Reconciliation task failed: {}", e)),
        }
    }
}

/// One open conversation thread
pub struct ThreadSession<S, T, G, V> {
    thread_id: String,
    address: String,
    source: Arc<S>,
    transport: Arc<T>,
    gate: G,
    view: Arc<V>,
    liveness: ViewLiveness,
    transcript: Arc<Mutex<Vec<MessageRecord>>>,
    config: CoordinatorConfig,
}

impl<S, T, G, V> ThreadSession<S, T, G, V>
where
    S: RecordSource + 'static,
    T: Transport,
    G: PermissionGate,
    V: TranscriptView + 'static,
{
    /// Open `thread_id` and return the session with the guard that keeps
    /// its view alive
    pub fn new(
        thread_id: impl Into<String>,
        address: impl Into<String>,
        source: Arc<S>,
        transport: Arc<T>,
        gate: G,
        view: Arc<V>,
    ) -> (Self, ViewGuard) {
        let (liveness, guard) = ViewLiveness::new();
        let session = Self {
            thread_id: thread_id.into(),
            address: address.into(),
            source,
            transport,
            gate,
            view,
            liveness,
            transcript: Arc::new(Mutex::new(Vec::new())),
            config: CoordinatorConfig::default(),
        };
        (session, guard)
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Window title: the thread's address, or "Messages" when it has none
    pub fn title(&self) -> &str {
        if self.address.trim().is_empty() {
            DEFAULT_THREAD_TITLE
        } else {
            &self.address
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Transcript most recently delivered to the view
    pub fn transcript(&self) -> Vec<MessageRecord> {
        lock(&self.transcript).clone()
    }

    /// Read the thread from the source and show it
    pub async fn load(&self) -> Result<Vec<MessageRecord>> {
        if !self.gate.may_read() {
            warn!("Read permission denied, not loading thread {}", self.thread_id);
            self.view
                .show_notice(ViewNotice::PermissionRequired("read messages".to_string()));
            return Err(InboxError::PermissionDenied("read messages".to_string()));
        }

        let records = match self
            .source
            .query(&RecordQuery::thread_ascending(self.thread_id.as_str()))
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to load thread {}: {}", self.thread_id, e);
                self.view.show_notice(ViewNotice::LoadFailed(e.to_string()));
                return Err(e);
            }
        };

        let transcript = reconstruct(&self.thread_id, &records);
        info!(
            "Loaded thread {} with {} messages",
            self.thread_id,
            transcript.len()
        );

        *lock(&self.transcript) = transcript.clone();
        self.view.clear_notice();
        self.view.show_transcript(transcript.clone());
        Ok(transcript)
    }

    /// Send `body` to `address` and schedule the transcript re-read
    ///
    /// # Errors
    ///
    /// - [`InboxError::SendValidation`] when the trimmed body or the address
    ///   is empty; nothing is sent
    /// - [`InboxError::PermissionDenied`] when sending is not allowed
    /// - whatever the transport returned; no reconciliation is scheduled
    pub async fn send(&self, address: &str, body: &str) -> Result<ReconcileHandle> {
        let body = body.trim();
        let address = address.trim();

        if body.is_empty() {
            debug!("Ignoring send with empty body");
            return Err(InboxError::SendValidation(
                "message body is empty".to_string(),
            ));
        }
        if address.is_empty() {
            debug!("Ignoring send with no recipient");
            return Err(InboxError::SendValidation(
                "recipient address is empty".to_string(),
            ));
        }

        if !self.gate.may_send() {
            warn!("Send permission denied for thread {}", self.thread_id);
            self.view
                .show_notice(ViewNotice::PermissionRequired("send messages".to_string()));
            return Err(InboxError::PermissionDenied("send messages".to_string()));
        }

        if let Err(e) = self.transport.send(address, body).await {
            warn!("Transport rejected message to {}: {}", address, e);
            self.view.show_notice(ViewNotice::SendFailed(e.to_string()));
            return Err(e);
        }

        info!(
            "Sent {} chars to {} in thread {}",
            body.chars().count(),
            address,
            self.thread_id
        );

        if self.config.mode == ReconcileMode::Optimistic && self.liveness.is_alive() {
            let mut transcript = self.transcript();
            transcript.push(MessageRecord::outgoing(
                self.thread_id.as_str(),
                address,
                body,
                now_millis(),
            ));
            *lock(&self.transcript) = transcript.clone();
            self.view.show_transcript(transcript);
        }

        Ok(self.schedule_reconcile())
    }

    fn schedule_reconcile(&self) -> ReconcileHandle {
        let source = Arc::clone(&self.source);
        let view = Arc::clone(&self.view);
        let liveness = self.liveness.clone();
        let transcript = Arc::clone(&self.transcript);
        let thread_id = self.thread_id.clone();
        let delay = self.config.reconcile_delay;

        debug!(
            "Scheduling reconciliation of thread {} in {:?}",
            thread_id, delay
        );

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if !liveness.is_alive() {
                debug!("View for thread {} is gone, skipping reconciliation", thread_id);
                return ReconcileOutcome::ViewGone;
            }

            let records = match source
                .query(&RecordQuery::thread_ascending(thread_id.as_str()))
                .await
            {
                Ok(records) => records,
                Err(e) => {
                    warn!("Reconciliation of thread {} failed: {}", thread_id, e);
                    if liveness.is_alive() {
                        view.show_notice(ViewNotice::LoadFailed(e.to_string()));
                    }
                    return ReconcileOutcome::Failed(e.to_string());
                }
            };

            let rebuilt = reconstruct(&thread_id, &records);

            // the view may have closed while the query was in flight
            if !liveness.is_alive() {
                debug!("View for thread {} closed during reconciliation", thread_id);
                return ReconcileOutcome::ViewGone;
            }

            let count = rebuilt.len();
            *lock(&transcript) = rebuilt.clone();
            view.clear_notice();
            view.show_transcript(rebuilt);

            debug!("Reconciled thread {} with {} messages", thread_id, count);
            ReconcileOutcome::Delivered(count)
        });

        ReconcileHandle { task }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
