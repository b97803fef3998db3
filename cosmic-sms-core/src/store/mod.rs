//! Record Source Implementations
//!
//! - [`SqliteStore`]: a local SQLite mirror of the device `sms` table
//! - [`MemoryStore`]: an in-memory log with an optional visibility delay,
//!   reproducing the gap between "transport accepted" and "message visible"
//!
//! Both also act as loopback [`Transport`](crate::source::Transport)s: a
//! successful send appends an outgoing record to the same log, the way the
//! phone's own message store does after the radio hands a message off.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::record::MessageRecord;
use crate::source::{RecordQuery, SortDirection};

/// Apply a query's filter and ordering to an in-memory slice
///
/// Ordering is stable, so equal timestamps keep insertion order.
pub(crate) fn apply_query<'a, I>(records: I, query: &RecordQuery) -> Vec<MessageRecord>
where
    I: IntoIterator<Item = &'a MessageRecord>,
{
    let mut matched: Vec<MessageRecord> = records
        .into_iter()
        .filter(|record| query.matches(record))
        .cloned()
        .collect();

    match query.direction {
        SortDirection::Ascending => matched.sort_by_key(|record| record.timestamp_millis),
        SortDirection::Descending => {
            matched.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis))
        }
    }

    matched
}
