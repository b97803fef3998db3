//! In-Memory Message Log
//!
//! Holds records behind a `tokio::sync::RwLock`. Records appended through
//! the loopback transport become visible to queries only after the
//! configured visibility delay, which makes the store's eventual-consistency
//! gap reproducible in tests.

use crate::format::now_millis;
use crate::record::MessageRecord;
use crate::source::{RecordQuery, RecordSource, Transport};
use crate::{InboxError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct StoredRecord {
    record: MessageRecord,
    visible_at: Instant,
}

/// In-memory record source and loopback transport
pub struct MemoryStore {
    records: RwLock<Vec<StoredRecord>>,
    visibility_delay: Duration,
    pending_failure: Mutex<Option<String>>,
    queries: AtomicUsize,
    sends: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store where sent messages are visible immediately
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            visibility_delay: Duration::ZERO,
            pending_failure: Mutex::new(None),
            queries: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
        }
    }

    /// Create a store seeded with `records`
    pub fn with_records(records: Vec<MessageRecord>) -> Self {
        let now = Instant::now();
        let stored = records
            .into_iter()
            .map(|record| StoredRecord {
                record,
                visible_at: now,
            })
            .collect();

        Self {
            records: RwLock::new(stored),
            ..Self::new()
        }
    }

    /// Delay before a sent message shows up in queries
    pub fn with_visibility_delay(mut self, delay: Duration) -> Self {
        self.visibility_delay = delay;
        self
    }

    /// Append a record that is visible immediately
    pub async fn insert(&self, record: MessageRecord) {
        self.records.write().await.push(StoredRecord {
            record,
            visible_at: Instant::now(),
        });
    }

    /// Make the next transport send fail with `reason`
    pub fn fail_next_send(&self, reason: impl Into<String>) {
        if let Ok(mut pending) = self.pending_failure.lock() {
            *pending = Some(reason.into());
        }
    }

    /// Number of queries answered so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of accepted sends so far
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn take_pending_failure(&self) -> Option<String> {
        self.pending_failure
            .lock()
            .ok()
            .and_then(|mut pending| pending.take())
    }
}

#[async_trait]
impl RecordSource for MemoryStore {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<MessageRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let records = self.records.read().await;

        let visible = records
            .iter()
            .filter(|stored| stored.visible_at <= now)
            .map(|stored| &stored.record);
        let result = super::apply_query(visible, query);

        debug!(
            "Memory store answered query (thread {:?}): {} records",
            query.thread_id,
            result.len()
        );
        Ok(result)
    }
}

#[async_trait]
impl Transport for MemoryStore {
    async fn send(&self, address: &str, body: &str) -> Result<()> {
        if let Some(reason) = self.take_pending_failure() {
            warn!("Memory transport refusing message to {}: {}", address, reason);
            return Err(InboxError::Transport(reason));
        }

        let mut records = self.records.write().await;

        let thread_id = records
            .iter()
            .rev()
            .find(|stored| stored.record.address == address && !stored.record.thread_id.is_empty())
            .map(|stored| stored.record.thread_id.clone())
            .unwrap_or_else(|| {
                let next = records
                    .iter()
                    .filter_map(|stored| stored.record.thread_id.parse::<i64>().ok())
                    .max()
                    .unwrap_or(0)
                    + 1;
                next.to_string()
            });

        records.push(StoredRecord {
            record: MessageRecord::outgoing(thread_id.clone(), address, body, now_millis()),
            visible_at: Instant::now() + self.visibility_delay,
        });
        self.sends.fetch_add(1, Ordering::SeqCst);

        info!(
            "Memory transport accepted message to {} (thread {})",
            address, thread_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Direction;

    fn record(id: &str, thread_id: &str, address: &str, timestamp_millis: i64) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            thread_id: thread_id.to_string(),
            address: address.to_string(),
            body: format!("body-{}", id),
            timestamp_millis,
            direction: Direction::Incoming,
        }
    }

    #[tokio::test]
    async fn test_query_orders_and_filters() {
        let store = MemoryStore::with_records(vec![
            record("1", "A", "555", 100),
            record("2", "B", "777", 150),
            record("3", "A", "555", 200),
        ]);

        let all = store.query(&RecordQuery::all_descending()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);

        let thread = store.query(&RecordQuery::thread_ascending("A")).await.unwrap();
        let ids: Vec<&str> = thread.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_send_reuses_thread_for_known_address() {
        let store = MemoryStore::with_records(vec![record("1", "9", "555", 100)]);

        store.send("555", "hello").await.unwrap();

        let thread = store.query(&RecordQuery::thread_ascending("9")).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert!(thread[1].is_sent());
        assert_eq!(thread[1].body, "hello");
    }

    #[tokio::test]
    async fn test_send_to_new_address_opens_thread() {
        let store = MemoryStore::with_records(vec![record("1", "9", "555", 100)]);

        store.send("888", "first").await.unwrap();

        let thread = store.query(&RecordQuery::thread_ascending("10")).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].address, "888");
    }

    #[tokio::test]
    async fn test_fail_next_send() {
        let store = MemoryStore::new();
        store.fail_next_send("no signal");

        let result = store.send("555", "hi").await;
        assert!(matches!(result, Err(InboxError::Transport(_))));
        assert_eq!(store.send_count(), 0);

        assert!(store.send("555", "hi").await.is_ok());
        assert_eq!(store.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_delay_hides_sent_messages() {
        let store = MemoryStore::new().with_visibility_delay(Duration::from_millis(400));

        store.send("555", "hi").await.unwrap();
        assert!(store.query(&RecordQuery::all_descending()).await.unwrap().is_empty());

        tokio::time::advance(Duration::from_millis(401)).await;
        assert_eq!(store.query(&RecordQuery::all_descending()).await.unwrap().len(), 1);
    }
}
