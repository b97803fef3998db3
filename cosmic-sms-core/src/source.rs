//! External Collaborators
//!
//! The inbox engine reads and writes nothing on its own. It consumes:
//!
//! - a [`RecordSource`]: the device message log, queried with a thread
//!   filter and a timestamp ordering
//! - a [`Transport`]: submits outgoing messages, success or failure only,
//!   no delivery receipts
//! - a [`PermissionGate`]: capability checks evaluated before either of
//!   the above is touched
//!
//! Implementations for a local SQLite mirror and an in-memory log live in
//! [`crate::store`].

use crate::record::MessageRecord;
use crate::Result;
use async_trait::async_trait;

/// Timestamp ordering requested from a record source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// A query against the message log, always ordered by timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Restrict to one thread
    pub thread_id: Option<String>,
    /// Timestamp ordering
    pub direction: SortDirection,
}

impl RecordQuery {
    /// Whole log, newest first (what the conversation aggregator needs)
    pub fn all_descending() -> Self {
        Self {
            thread_id: None,
            direction: SortDirection::Descending,
        }
    }

    /// One thread, oldest first (what the thread reconstructor needs)
    pub fn thread_ascending(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            direction: SortDirection::Ascending,
        }
    }

    /// Whether `record` passes the thread filter
    pub fn matches(&self, record: &MessageRecord) -> bool {
        self.thread_id
            .as_deref()
            .map_or(true, |thread_id| record.thread_id == thread_id)
    }
}

/// Read access to the device message log
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Return the records matching `query`, in the requested order
    async fn query(&self, query: &RecordQuery) -> Result<Vec<MessageRecord>>;
}

/// Outgoing message submission
///
/// Returning `Ok(())` means the transport accepted the message. It does
/// not mean the message is visible in the record source yet.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit `body` to `address`
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::Transport`](crate::InboxError::Transport) when
    /// the message could not be handed off.
    async fn send(&self, address: &str, body: &str) -> Result<()>;
}

/// Capability checks for reading the log and sending messages
pub trait PermissionGate: Send + Sync {
    fn may_read(&self) -> bool;
    fn may_send(&self) -> bool;
}

/// Fixed permission answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPermissions {
    pub read: bool,
    pub send: bool,
}

impl StaticPermissions {
    pub fn new(read: bool, send: bool) -> Self {
        Self { read, send }
    }
}

impl PermissionGate for StaticPermissions {
    fn may_read(&self) -> bool {
        self.read
    }

    fn may_send(&self) -> bool {
        self.send
    }
}

/// Grants everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn may_read(&self) -> bool {
        true
    }

    fn may_send(&self) -> bool {
        true
    }
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for std::sync::Arc<S> {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<MessageRecord>> {
        (**self).query(query).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, address: &str, body: &str) -> Result<()> {
        (**self).send(address, body).await
    }
}

impl<G: PermissionGate + ?Sized> PermissionGate for std::sync::Arc<G> {
    fn may_read(&self) -> bool {
        (**self).may_read()
    }

    fn may_send(&self) -> bool {
        (**self).may_send()
    }
}
