//! Thread Reconstructor
//!
//! Produces the message feed of one thread, oldest message first, so a view
//! can render top to bottom and scroll to the newest entry.

use crate::record::MessageRecord;
use tracing::debug;

/// Filter `records` to `thread_id` and order them by ascending timestamp
///
/// The sort is stable, so messages sharing a timestamp keep source order.
/// Sorting happens here whether or not the source already returned records
/// ascending. A thread with no records yields an empty transcript.
///
/// ```rust
/// use cosmic_sms_core::{reconstruct, Direction, MessageRecord};
///
/// let record = |id: &str, thread: &str, ts: i64| MessageRecord {
///     id: id.into(),
///     thread_id: thread.into(),
///     address: "555".into(),
///     body: String::new(),
///     timestamp_millis: ts,
///     direction: Direction::Incoming,
/// };
/// let log = vec![record("3", "A", 200), record("2", "B", 150), record("1", "A", 100)];
///
/// let ids: Vec<_> = reconstruct("A", &log).into_iter().map(|r| r.id).collect();
/// assert_eq!(ids, vec!["1", "3"]);
/// ```
pub fn reconstruct(thread_id: &str, records: &[MessageRecord]) -> Vec<MessageRecord> {
    let mut transcript: Vec<MessageRecord> = records
        .iter()
        .filter(|record| record.thread_id == thread_id)
        .cloned()
        .collect();

    transcript.sort_by_key(|record| record.timestamp_millis);

    debug!(
        "Reconstructed thread {}: {} of {} records",
        thread_id,
        transcript.len(),
        records.len()
    );

    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Direction;

    fn record(id: &str, thread_id: &str, timestamp_millis: i64) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            thread_id: thread_id.to_string(),
            address: "555".to_string(),
            body: format!("body-{}", id),
            timestamp_millis,
            direction: Direction::Incoming,
        }
    }

    fn ids(records: &[MessageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_filters_and_orders_ascending() {
        let records = vec![
            record("3", "A", 200),
            record("2", "B", 150),
            record("1", "A", 100),
        ];

        let transcript = reconstruct("A", &records);
        assert_eq!(ids(&transcript), vec!["1", "3"]);
    }

    #[test]
    fn test_unknown_thread_is_empty() {
        let records = vec![record("1", "A", 100)];
        assert!(reconstruct("Z", &records).is_empty());
    }

    #[test]
    fn test_empty_log() {
        assert!(reconstruct("A", &[]).is_empty());
    }

    #[test]
    fn test_equal_timestamps_keep_source_order() {
        let records = vec![
            record("b", "A", 100),
            record("a", "A", 100),
            record("c", "A", 50),
        ];

        let transcript = reconstruct("A", &records);
        assert_eq!(ids(&transcript), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_thread_id_match_is_exact() {
        let records = vec![record("1", "1", 10), record("2", "11", 20)];
        assert_eq!(ids(&reconstruct("1", &records)), vec!["1"]);
    }
}
