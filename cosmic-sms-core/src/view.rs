//! Display Surfaces
//!
//! Views receive whole ordered snapshots. There is no incremental patch
//! contract: every update replaces what the view showed before.
//!
//! A view that can disappear while a reconciliation is pending is paired
//! with a [`ViewLiveness`] token. The owner keeps the [`ViewGuard`]; once it
//! drops, pending work sees the token as dead and does nothing.

use crate::record::{ConversationSummary, MessageRecord};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Explanatory state shown instead of (or alongside) an empty list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNotice {
    /// A capability check failed; persists until permission is granted
    PermissionRequired(String),
    /// The log has no messages to show
    NoMessages,
    /// The record source could not be read
    LoadFailed(String),
    /// A send attempt failed
    SendFailed(String),
}

impl ViewNotice {
    /// Text to show the user
    pub fn message(&self) -> String {
        match self {
            Self::PermissionRequired(what) => {
                format!("SMS permission required to {}. Please grant permission.", what)
            }
            Self::NoMessages => "No messages found".to_string(),
            Self::LoadFailed(reason) => format!("Error loading messages: {}", reason),
            Self::SendFailed(reason) => format!("Failed to send: {}", reason),
        }
    }
}

/// Receives the conversation list
pub trait ConversationListView: Send + Sync {
    fn show_conversations(&self, conversations: Vec<ConversationSummary>);
    fn show_notice(&self, notice: ViewNotice);
    /// Drop whatever notice is showing
    fn clear_notice(&self);
}

/// Receives a thread transcript
pub trait TranscriptView: Send + Sync {
    fn show_transcript(&self, messages: Vec<MessageRecord>);
    fn show_notice(&self, notice: ViewNotice);
    fn clear_notice(&self);
}

impl<V: ConversationListView + ?Sized> ConversationListView for Arc<V> {
    fn show_conversations(&self, conversations: Vec<ConversationSummary>) {
        (**self).show_conversations(conversations)
    }

    fn show_notice(&self, notice: ViewNotice) {
        (**self).show_notice(notice)
    }

    fn clear_notice(&self) {
        (**self).clear_notice()
    }
}

impl<V: TranscriptView + ?Sized> TranscriptView for Arc<V> {
    fn show_transcript(&self, messages: Vec<MessageRecord>) {
        (**self).show_transcript(messages)
    }

    fn show_notice(&self, notice: ViewNotice) {
        (**self).show_notice(notice)
    }

    fn clear_notice(&self) {
        (**self).clear_notice()
    }
}

/// Shared flag telling pending work whether its view still exists
#[derive(Debug, Clone)]
pub struct ViewLiveness {
    alive: Arc<AtomicBool>,
}

impl ViewLiveness {
    /// Create a live token and the guard that keeps it alive
    pub fn new() -> (Self, ViewGuard) {
        let alive = Arc::new(AtomicBool::new(true));
        (
            Self {
                alive: alive.clone(),
            },
            ViewGuard { alive },
        )
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// Held by the view owner; marks the view torn down when dropped
#[derive(Debug)]
pub struct ViewGuard {
    alive: Arc<AtomicBool>,
}

impl ViewGuard {
    /// Mark the view torn down without waiting for the guard to drop
    pub fn release(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl Drop for ViewGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// A view that keeps the latest snapshot in memory
///
/// Used by the command-line front end to print what a graphical view would
/// render, and by tests to observe updates.
#[derive(Debug, Default)]
pub struct SnapshotView {
    conversations: Mutex<Vec<ConversationSummary>>,
    transcript: Mutex<Vec<MessageRecord>>,
    notice: Mutex<Option<ViewNotice>>,
    updates: AtomicUsize,
}

impl SnapshotView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        lock(&self.conversations).clone()
    }

    pub fn transcript(&self) -> Vec<MessageRecord> {
        lock(&self.transcript).clone()
    }

    pub fn notice(&self) -> Option<ViewNotice> {
        lock(&self.notice).clone()
    }

    /// Number of list or transcript replacements received
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl ConversationListView for SnapshotView {
    fn show_conversations(&self, conversations: Vec<ConversationSummary>) {
        *lock(&self.conversations) = conversations;
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn show_notice(&self, notice: ViewNotice) {
        *lock(&self.notice) = Some(notice);
    }

    fn clear_notice(&self) {
        *lock(&self.notice) = None;
    }
}

impl TranscriptView for SnapshotView {
    fn show_transcript(&self, messages: Vec<MessageRecord>) {
        *lock(&self.transcript) = messages;
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn show_notice(&self, notice: ViewNotice) {
        *lock(&self.notice) = Some(notice);
    }

    fn clear_notice(&self) {
        *lock(&self.notice) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
