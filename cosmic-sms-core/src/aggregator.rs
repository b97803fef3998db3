//! Conversation Aggregator
//!
//! Turns the flat message log into the conversation list: one
//! [`ConversationSummary`] per distinct thread id, newest thread first.
//!
//! ## Representative Record
//!
//! With [`AggregationPolicy::FirstSeen`] (the default) the first record met
//! for a thread supplies the summary's address and snippet; every later
//! record for that thread only bumps `message_count`. That yields the true
//! latest message only when the input is sorted by timestamp descending,
//! which is what [`RecordQuery::all_descending`](crate::source::RecordQuery::all_descending)
//! asks the source for. [`AggregationPolicy::MostRecent`] drops that
//! precondition and picks the record with the greatest timestamp instead.
//!
//! Under either policy `last_timestamp_millis` is the maximum timestamp of
//! the thread, and the output is sorted on it descending. The sort is
//! stable: threads with equal timestamps keep the order in which they first
//! appeared in the input.
//!
//! ## Bad Records
//!
//! A record with an empty thread id is skipped and logged as a data-quality
//! event. It never aborts the pass. Any other id, whitespace included, is a
//! thread of its own so the list agrees with reconstruct.

use crate::record::{ConversationSummary, MessageRecord, UNKNOWN_ADDRESS};
use crate::InboxError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// How the representative record of a thread is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// First record encountered wins; input must be sorted newest first
    #[default]
    FirstSeen,
    /// Record with the greatest timestamp wins, whatever the input order
    MostRecent,
}

impl AggregationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstSeen => "first_seen",
            Self::MostRecent => "most_recent",
        }
    }
}

/// Counts from one aggregation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregationReport {
    /// Records supplied
    pub total: usize,
    /// Records skipped for missing a thread id
    pub skipped: usize,
}

impl AggregationReport {
    /// Records that ended up in a summary
    pub fn grouped(&self) -> usize {
        self.total - self.skipped
    }
}

/// Groups message records into conversation summaries
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: AggregationPolicy,
}

struct Group {
    summary: ConversationSummary,
    representative_timestamp: i64,
}

impl Aggregator {
    /// Create an aggregator with the given representative-record policy
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Build the conversation list from a snapshot of the log
    pub fn aggregate(&self, records: &[MessageRecord]) -> Vec<ConversationSummary> {
        self.aggregate_with_report(records).0
    }

    /// Build the conversation list and report how many records were skipped
    pub fn aggregate_with_report(
        &self,
        records: &[MessageRecord],
    ) -> (Vec<ConversationSummary>, AggregationReport) {
        let mut report = AggregationReport {
            total: records.len(),
            skipped: 0,
        };
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for record in records {
            let thread_id = record.thread_id.as_str();
            if thread_id.is_empty() {
                report.skipped += 1;
                let error =
                    InboxError::DataQuality(format!("message {} has no thread id", record.id));
                warn!("Skipping record: {}", error);
                continue;
            }

            match index.get(thread_id) {
                None => {
                    index.insert(thread_id, groups.len());
                    groups.push(Group {
                        summary: ConversationSummary {
                            thread_id: thread_id.to_string(),
                            address: representative_address(record),
                            snippet: record.body.clone(),
                            last_timestamp_millis: record.timestamp_millis,
                            message_count: 1,
                        },
                        representative_timestamp: record.timestamp_millis,
                    });
                }
                Some(&position) => {
                    let group = &mut groups[position];
                    group.summary.message_count += 1;
                    group.summary.last_timestamp_millis = group
                        .summary
                        .last_timestamp_millis
                        .max(record.timestamp_millis);

                    if self.policy == AggregationPolicy::MostRecent
                        && record.timestamp_millis > group.representative_timestamp
                    {
                        group.summary.address = representative_address(record);
                        group.summary.snippet = record.body.clone();
                        group.representative_timestamp = record.timestamp_millis;
                    }
                }
            }
        }

        let mut summaries: Vec<ConversationSummary> =
            groups.into_iter().map(|group| group.summary).collect();
        summaries.sort_by(|a, b| b.last_timestamp_millis.cmp(&a.last_timestamp_millis));

        debug!(
            "Aggregated {} records into {} conversations ({} skipped, policy {})",
            report.total,
            summaries.len(),
            report.skipped,
            self.policy.as_str()
        );

        (summaries, report)
    }
}

fn representative_address(record: &MessageRecord) -> String {
    if record.address.trim().is_empty() {
        UNKNOWN_ADDRESS.to_string()
    } else {
        record.address.clone()
    }
}

/// Aggregate with the default first-seen policy
pub fn aggregate(records: &[MessageRecord]) -> Vec<ConversationSummary> {
    Aggregator::default().aggregate(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Direction;

    fn record(id: &str, thread_id: &str, timestamp_millis: i64) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            thread_id: thread_id.to_string(),
            address: format!("addr-{}", thread_id),
            body: format!("body-{}", id),
            timestamp_millis,
            direction: Direction::Incoming,
        }
    }

    #[test]
    fn test_groups_descending_input() {
        let records = vec![
            record("3", "A", 200),
            record("2", "B", 150),
            record("1", "A", 100),
        ];

        let summaries = aggregate(&records);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].thread_id, "A");
        assert_eq!(summaries[0].snippet, "body-3");
        assert_eq!(summaries[0].last_timestamp_millis, 200);
        assert_eq!(summaries[0].message_count, 2);
        assert_eq!(summaries[1].thread_id, "B");
        assert_eq!(summaries[1].snippet, "body-2");
        assert_eq!(summaries[1].message_count, 1);
    }

    #[test]
    fn test_empty_log() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_first_seen_keeps_first_snippet_on_unsorted_input() {
        let records = vec![record("1", "A", 100), record("3", "A", 300)];

        let summaries = aggregate(&records);

        assert_eq!(summaries[0].snippet, "body-1");
        assert_eq!(summaries[0].last_timestamp_millis, 300);
        assert_eq!(summaries[0].message_count, 2);
    }

    #[test]
    fn test_most_recent_policy_picks_latest_record() {
        let records = vec![
            record("1", "A", 100),
            record("3", "A", 300),
            record("2", "A", 200),
        ];

        let summaries = Aggregator::new(AggregationPolicy::MostRecent).aggregate(&records);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].snippet, "body-3");
        assert_eq!(summaries[0].last_timestamp_millis, 300);
        assert_eq!(summaries[0].message_count, 3);
    }

    #[test]
    fn test_ordering_is_independent_of_insertion_order() {
        let records = vec![
            record("1", "old", 10),
            record("2", "new", 500),
            record("3", "mid", 250),
        ];

        let order: Vec<String> = aggregate(&records)
            .into_iter()
            .map(|s| s.thread_id)
            .collect();

        assert_eq!(order, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_ties_keep_first_appearance_order() {
        let records = vec![
            record("1", "B", 100),
            record("2", "A", 100),
            record("3", "C", 100),
        ];

        let order: Vec<String> = aggregate(&records)
            .into_iter()
            .map(|s| s.thread_id)
            .collect();

        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_missing_thread_id_is_skipped() {
        let records = vec![
            record("1", "A", 100),
            record("2", "", 200),
        ];

        let (summaries, report) = Aggregator::default().aggregate_with_report(&records);

        assert_eq!(summaries.len(), 1);
        assert_eq!(report.total, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.grouped(), 1);
    }

    #[test]
    fn test_whitespace_thread_id_is_its_own_thread() {
        let records = vec![record("1", " ", 100), record("2", "A", 50)];

        let (summaries, report) = Aggregator::default().aggregate_with_report(&records);

        assert_eq!(report.skipped, 0);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].thread_id, " ");
        let counted: usize = summaries.iter().map(|s| s.message_count).sum();
        assert_eq!(counted, records.iter().filter(|r| !r.thread_id.is_empty()).count());
        assert_eq!(crate::reconstruct(" ", &records).len(), 1);
    }

    #[test]
    fn test_empty_address_maps_to_unknown() {
        let mut nameless = record("1", "A", 100);
        nameless.address = String::new();

        let summaries = aggregate(&[nameless]);

        assert_eq!(summaries[0].address, UNKNOWN_ADDRESS);
    }

    #[test]
    fn test_counts_sum_to_grouped_records() {
        let records: Vec<MessageRecord> = (0..40)
            .map(|i| {
                let thread = if i % 9 == 0 {
                    String::new()
                } else {
                    format!("t{}", i % 4)
                };
                record(&i.to_string(), &thread, 1_000 - i)
            })
            .collect();

        let (summaries, report) = Aggregator::default().aggregate_with_report(&records);
        let counted: usize = summaries.iter().map(|s| s.message_count).sum();

        assert_eq!(counted, report.grouped());
        assert_eq!(summaries.len(), 4);
    }

    #[test]
    fn test_aggregation_is_repeatable() {
        let records = vec![
            record("1", "A", 300),
            record("2", "B", 200),
            record("3", "A", 100),
        ];

        assert_eq!(aggregate(&records), aggregate(&records));
    }
}
