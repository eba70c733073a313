//! Data-access boundary consumed by the engine.
//!
//! The backing store (SQL service, sync server, in-process fixture) is a
//! collaborator behind [`ConversationStore`]; the engine never talks to a
//! database directly. Implementations live outside the actor and may suspend;
//! every call is made from a spawned task, never from the actor loop itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Maximum message body length, in Unicode code points.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// A single message row.
///
/// Immutable once stored, except `read_at`, which transitions once from
/// `None` to `Some` and never reverts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    /// Denormalized sender display name, joined in by the store.
    pub sender_name: Option<String>,
    pub body: String,
    pub image_ref: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    pub read_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// Bound to a scheduled group activity.
    Activity,
    /// Direct message thread.
    Direct,
}

/// Metadata of the activity a conversation is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Unix milliseconds.
    pub scheduled_for: Option<i64>,
    pub location_name: Option<String>,
}

/// A conversation row. Participant count and last-activity are derived data
/// fetched separately; the engine never owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub activity: Option<ActivityInfo>,
    /// Unix milliseconds; conversation-level fallback when it has no messages.
    pub last_activity_at: Option<i64>,
}

/// Store contract for conversations and messages.
///
/// All methods are read-your-writes consistent for a single caller but make
/// no cross-caller ordering promises; live convergence comes from the
/// change events on the channel transport, not from the store.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch up to `limit` messages, newest first. With `before`, only
    /// messages strictly older than that creation timestamp are returned
    /// (exclusive cursor).
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        before: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Message>, ChatError>;

    /// Persist a new message. The stored row is delivered back through the
    /// transport as an insert event; this call intentionally returns no row.
    async fn insert_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        image_ref: Option<String>,
    ) -> Result<(), ChatError>;

    /// Set `read_at = now` on every message in the conversation whose sender
    /// is not the viewer and whose `read_at` is null. Returns the number of
    /// rows affected; zero is a successful no-op.
    async fn mark_read(
        &self,
        conversation_id: &str,
        viewer_id: &str,
        now: i64,
    ) -> Result<u64, ChatError>;

    async fn fetch_conversation_meta(&self, conversation_id: &str)
        -> Result<Conversation, ChatError>;

    /// Identifiers of every conversation the viewer participates in, in
    /// retrieval order.
    async fn participant_conversations(&self, viewer_id: &str) -> Result<Vec<String>, ChatError>;

    /// The single most recent message, if any.
    async fn fetch_last_message(&self, conversation_id: &str)
        -> Result<Option<Message>, ChatError>;

    /// Count of messages with `read_at` null and sender ≠ viewer. Must agree
    /// exactly with the set [`ConversationStore::mark_read`] would affect.
    async fn count_unread(&self, conversation_id: &str, viewer_id: &str)
        -> Result<u32, ChatError>;

    async fn count_participants(&self, conversation_id: &str) -> Result<u32, ChatError>;
}
