//! Conversation List Loading
//!
//! Reads the whole log newest first, aggregates it and hands the result to
//! a [`ConversationListView`]. The read permission is checked before the
//! source is touched.

use crate::aggregator::{AggregationPolicy, AggregationReport, Aggregator};
use crate::record::ConversationSummary;
use crate::source::{PermissionGate, RecordQuery, RecordSource};
use crate::view::{ConversationListView, ViewNotice};
use crate::{InboxError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Loads the conversation list into a view
pub struct ConversationList<S, G, V> {
    source: Arc<S>,
    gate: G,
    view: Arc<V>,
    aggregator: Aggregator,
}

impl<S, G, V> ConversationList<S, G, V>
where
    S: RecordSource,
    G: PermissionGate,
    V: ConversationListView,
{
    pub fn new(source: Arc<S>, gate: G, view: Arc<V>) -> Self {
        Self {
            source,
            gate,
            view,
            aggregator: Aggregator::default(),
        }
    }

    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.aggregator = Aggregator::new(policy);
        self
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.aggregator.policy()
    }

    /// Load and show the conversation list
    pub async fn load(&self) -> Result<Vec<ConversationSummary>> {
        self.load_with_report().await.map(|(summaries, _)| summaries)
    }

    /// Load and show the conversation list, also returning skip counts
    pub async fn load_with_report(&self) -> Result<(Vec<ConversationSummary>, AggregationReport)> {
        if !self.gate.may_read() {
            warn!("Read permission denied, not loading conversations");
            self.view
                .show_notice(ViewNotice::PermissionRequired("read messages".to_string()));
            return Err(InboxError::PermissionDenied("read messages".to_string()));
        }

        let records = match self.source.query(&RecordQuery::all_descending()).await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to load conversations: {}", e);
                self.view.show_notice(ViewNotice::LoadFailed(e.to_string()));
                return Err(e);
            }
        };

        let (summaries, report) = self.aggregator.aggregate_with_report(&records);
        info!(
            "Loaded {} conversations from {} messages",
            summaries.len(),
            report.total
        );

        if summaries.is_empty() {
            self.view.show_notice(ViewNotice::NoMessages);
        } else {
            self.view.clear_notice();
        }
        self.view.show_conversations(summaries.clone());

        Ok((summaries, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Direction, MessageRecord};
    use crate::source::{AllowAll, StaticPermissions};
    use crate::store::MemoryStore;
    use crate::view::SnapshotView;
    use async_trait::async_trait;

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

    struct BrokenSource;

    #[async_trait]
    impl RecordSource for BrokenSource {
        async fn query(&self, _query: &RecordQuery) -> Result<Vec<crate::MessageRecord>> {
            Err(InboxError::Source("provider crashed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_load_shows_newest_thread_first() {
        let store = Arc::new(MemoryStore::with_records(vec![
            record("1", "A", 100),
            record("2", "B", 300),
            record("3", "A", 200),
        ]));
        let view = Arc::new(SnapshotView::new());
        let list = ConversationList::new(store, AllowAll, Arc::clone(&view));

        let summaries = list.load().await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].thread_id, "B");
        assert_eq!(summaries[1].snippet, "body-3");
        assert_eq!(summaries[1].message_count, 2);
        assert_eq!(view.conversations(), summaries);
        assert!(view.notice().is_none());
    }

    #[tokio::test]
    async fn test_permission_denied_skips_source() {
        let store = Arc::new(MemoryStore::with_records(vec![record("1", "A", 100)]));
        let view = Arc::new(SnapshotView::new());
        let list = ConversationList::new(
            Arc::clone(&store),
            StaticPermissions::new(false, false),
            Arc::clone(&view),
        );

        let result = list.load().await;

        assert!(matches!(result, Err(InboxError::PermissionDenied(_))));
        assert_eq!(store.query_count(), 0);
        assert!(view.conversations().is_empty());
        assert!(matches!(
            view.notice(),
            Some(ViewNotice::PermissionRequired(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_log_shows_no_messages() {
        let view = Arc::new(SnapshotView::new());
        let list = ConversationList::new(Arc::new(MemoryStore::new()), AllowAll, Arc::clone(&view));

        let summaries = list.load().await.unwrap();

        assert!(summaries.is_empty());
        assert_eq!(view.notice(), Some(ViewNotice::NoMessages));
        assert_eq!(view.update_count(), 1);
    }

    #[tokio::test]
    async fn test_reload_with_messages_clears_notice() {
        let store = Arc::new(MemoryStore::new());
        let view = Arc::new(SnapshotView::new());
        let list = ConversationList::new(Arc::clone(&store), AllowAll, Arc::clone(&view));

        list.load().await.unwrap();
        assert_eq!(view.notice(), Some(ViewNotice::NoMessages));

        store.insert(record("1", "A", 100)).await;
        let summaries = list.load().await.unwrap();

        assert_eq!(summaries.len(), 1);
        assert!(view.notice().is_none());
        assert_eq!(view.update_count(), 2);
    }

    #[tokio::test]
    async fn test_source_failure_shows_load_failed() {
        let view = Arc::new(SnapshotView::new());
        let list = ConversationList::new(Arc::new(BrokenSource), AllowAll, Arc::clone(&view));

        let result = list.load().await;

        assert!(matches!(result, Err(InboxError::Source(_))));
        assert!(matches!(view.notice(), Some(ViewNotice::LoadFailed(_))));
    }

    #[tokio::test]
    async fn test_report_counts_skipped_records() {
        let store = Arc::new(MemoryStore::with_records(vec![
            record("1", "A", 100),
            record("2", "", 200),
        ]));
        let view = Arc::new(SnapshotView::new());
        let list = ConversationList::new(store, AllowAll, view)
            .with_policy(AggregationPolicy::MostRecent);

        let (summaries, report) = list.load_with_report().await.unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(report.total, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(list.policy(), AggregationPolicy::MostRecent);
    }
}
