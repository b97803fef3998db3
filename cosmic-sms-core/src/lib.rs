//! COSMIC SMS Inbox Engine
//!
//! This library turns a device SMS log into a conversation list and
//! per-thread transcripts, and sends replies with a delayed reconciliation
//! against the log.
//!
//! The log, the transport and the permission checks are external
//! collaborators described in [`source`]; [`store`] provides a SQLite mirror
//! and an in-memory log that implement them.

pub mod aggregator;
pub mod coordinator;
pub mod format;
pub mod inbox;
pub mod record;
pub mod source;
pub mod store;
pub mod transcript;
pub mod view;

mod error;

pub use aggregator::{aggregate, AggregationPolicy, AggregationReport, Aggregator};
pub use coordinator::{
    CoordinatorConfig, ReconcileHandle, ReconcileMode, ReconcileOutcome, ThreadSession,
    DEFAULT_RECONCILE_DELAY, DEFAULT_THREAD_TITLE,
};
pub use error::{InboxError, Result};
pub use format::{
    format_message_time, format_message_time_in, format_relative, format_relative_in,
    now_millis, RelativeTimeFormatter, FORMAT_FALLBACK,
};
pub use inbox::ConversationList;
pub use record::{
    ConversationSummary, Direction, MessageRecord, DEFAULT_PREVIEW_CHARS, UNKNOWN_ADDRESS,
};
pub use source::{
    AllowAll, PermissionGate, RecordQuery, RecordSource, SortDirection, StaticPermissions,
    Transport,
};
pub use store::{MemoryStore, SqliteStore};
pub use transcript::reconstruct;
pub use view::{
    ConversationListView, SnapshotView, TranscriptView, ViewGuard, ViewLiveness, ViewNotice,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reconcile_delay() {
        assert_eq!(DEFAULT_RECONCILE_DELAY.as_millis(), 300);
        assert_eq!(CoordinatorConfig::default().reconcile_delay, DEFAULT_RECONCILE_DELAY);
    }
}
