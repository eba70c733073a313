//! Conversation summary aggregation.
//!
//! A pass resolves every conversation the viewer participates in — metadata,
//! most recent message, unread count, participant count — each conversation
//! independently, so one bad lookup degrades one row instead of failing the
//! list. The whole list is recomputed on every relevant change event; cost is
//! bounded by conversation count, not message count.

use crate::error::ChatError;
use crate::state::ConversationSummary;
use crate::store::ConversationStore;

pub(crate) async fn aggregate(
    store: &dyn ConversationStore,
    viewer_id: &str,
) -> Result<Vec<ConversationSummary>, ChatError> {
    let ids = store.participant_conversations(viewer_id).await?;

    let mut summaries = Vec::with_capacity(ids.len());
    for conversation_id in ids {
        let meta = match store.fetch_conversation_meta(&conversation_id).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, %e, "summary meta lookup failed");
                continue;
            }
        };

        let last_message = match store.fetch_last_message(&conversation_id).await {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, %e, "last message lookup failed");
                None
            }
        };
        let unread_count = match store.count_unread(&conversation_id, viewer_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, %e, "unread count failed");
                0
            }
        };
        let participant_count = match store.count_participants(&conversation_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, %e, "participant count failed");
                0
            }
        };

        let activity = meta.activity.as_ref();
        summaries.push(ConversationSummary {
            conversation_id,
            kind: meta.kind,
            activity_id: activity.map(|a| a.id.clone()),
            activity_title: activity.map(|a| a.title.clone()),
            activity_category: activity.and_then(|a| a.category.clone()),
            last_message: last_message.as_ref().map(|m| m.body.clone()),
            // Conversations with no messages fall back to their own
            // last-activity timestamp for sorting.
            last_message_at: last_message
                .as_ref()
                .map(|m| m.created_at)
                .or(meta.last_activity_at),
            last_message_sender_id: last_message.as_ref().map(|m| m.sender_id.clone()),
            last_message_sender_name: last_message.as_ref().and_then(|m| m.sender_name.clone()),
            unread_count,
            participant_count,
        });
    }

    sort_summaries(&mut summaries);
    Ok(summaries)
}

/// Descending by most recent activity; conversations with no timestamp at all
/// sort last, keeping their retrieval order among themselves.
pub(crate) fn sort_summaries(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| match (a.last_message_at, b.last_message_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::store::{Conversation, ConversationKind, Message};

    /// Minimal store fixture: conversations in retrieval order, optional last
    /// message, and a set of conversation ids whose last-message lookup fails.
    struct FixtureStore {
        conversations: Vec<(Conversation, Option<Message>)>,
        failing_last_message: Mutex<HashSet<String>>,
    }

    impl FixtureStore {
        fn new(conversations: Vec<(Conversation, Option<Message>)>) -> Self {
            Self {
                conversations,
                failing_last_message: Mutex::new(HashSet::new()),
            }
        }

        fn fail_last_message_for(&self, conversation_id: &str) {
            self.failing_last_message
                .lock()
                .insert(conversation_id.to_string());
        }
    }

    #[async_trait]
    impl ConversationStore for FixtureStore {
        async fn fetch_messages(
            &self,
            _conversation_id: &str,
            _before: Option<i64>,
            _limit: u32,
        ) -> Result<Vec<Message>, ChatError> {
            Ok(vec![])
        }

        async fn insert_message(
            &self,
            _conversation_id: &str,
            _sender_id: &str,
            _body: &str,
            _image_ref: Option<String>,
        ) -> Result<(), ChatError> {
            Ok(())
        }

        async fn mark_read(
            &self,
            _conversation_id: &str,
            _viewer_id: &str,
            _now: i64,
        ) -> Result<u64, ChatError> {
            Ok(0)
        }

        async fn fetch_conversation_meta(
            &self,
            conversation_id: &str,
        ) -> Result<Conversation, ChatError> {
            self.conversations
                .iter()
                .find(|(c, _)| c.id == conversation_id)
                .map(|(c, _)| c.clone())
                .ok_or_else(|| ChatError::not_found("conversation", conversation_id))
        }

        async fn participant_conversations(
            &self,
            _viewer_id: &str,
        ) -> Result<Vec<String>, ChatError> {
            Ok(self.conversations.iter().map(|(c, _)| c.id.clone()).collect())
        }

        async fn fetch_last_message(
            &self,
            conversation_id: &str,
        ) -> Result<Option<Message>, ChatError> {
            if self.failing_last_message.lock().contains(conversation_id) {
                return Err(ChatError::transport("last message lookup unavailable"));
            }
            Ok(self
                .conversations
                .iter()
                .find(|(c, _)| c.id == conversation_id)
                .and_then(|(_, m)| m.clone()))
        }

        async fn count_unread(
            &self,
            _conversation_id: &str,
            _viewer_id: &str,
        ) -> Result<u32, ChatError> {
            Ok(0)
        }

        async fn count_participants(&self, _conversation_id: &str) -> Result<u32, ChatError> {
            Ok(2)
        }
    }

    fn conversation(id: &str, last_activity_at: Option<i64>) -> Conversation {
        Conversation {
            id: id.to_string(),
            kind: ConversationKind::Direct,
            activity: None,
            last_activity_at,
        }
    }

    fn message(conversation_id: &str, created_at: i64) -> Message {
        Message {
            id: format!("m-{conversation_id}"),
            conversation_id: conversation_id.to_string(),
            sender_id: "peer".to_string(),
            sender_name: Some("Peer".to_string()),
            body: "latest".to_string(),
            image_ref: None,
            created_at,
            read_at: None,
        }
    }

    #[tokio::test]
    async fn sorts_by_recency_with_fallback_and_stable_tail() {
        let store = FixtureStore::new(vec![
            (conversation("quiet-a", None), None),
            (conversation("old", None), Some(message("old", 10))),
            // No messages: sorts by its own last-activity timestamp.
            (conversation("fallback", Some(50)), None),
            (conversation("quiet-b", None), None),
            (conversation("new", None), Some(message("new", 100))),
        ]);

        let summaries = aggregate(&store, "me").await.unwrap();
        let order: Vec<&str> = summaries
            .iter()
            .map(|s| s.conversation_id.as_str())
            .collect();
        assert_eq!(order, vec!["new", "fallback", "old", "quiet-a", "quiet-b"]);

        let fallback = &summaries[1];
        assert_eq!(fallback.last_message, None);
        assert_eq!(fallback.last_message_at, Some(50));
    }

    #[tokio::test]
    async fn one_failed_lookup_degrades_one_row() {
        let store = FixtureStore::new(vec![
            (conversation("ok", None), Some(message("ok", 100))),
            (conversation("broken", Some(20)), Some(message("broken", 200))),
        ]);
        store.fail_last_message_for("broken");

        let summaries = aggregate(&store, "me").await.unwrap();
        assert_eq!(summaries.len(), 2);

        let broken = summaries
            .iter()
            .find(|s| s.conversation_id == "broken")
            .unwrap();
        assert_eq!(broken.last_message, None);
        assert_eq!(broken.last_message_sender_name, None);
        // Falls back to the conversation's own timestamp.
        assert_eq!(broken.last_message_at, Some(20));

        let ok = summaries.iter().find(|s| s.conversation_id == "ok").unwrap();
        assert_eq!(ok.last_message.as_deref(), Some("latest"));
    }

    #[tokio::test]
    async fn empty_conversation_reports_null_fields_and_zero_unread() {
        let store = FixtureStore::new(vec![(conversation("empty", None), None)]);
        let summaries = aggregate(&store, "me").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].last_message, None);
        assert_eq!(summaries[0].last_message_at, None);
        assert_eq!(summaries[0].unread_count, 0);
    }
}
