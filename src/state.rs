use crate::store::{ActivityInfo, Conversation, ConversationKind};

/// Snapshot of everything the host renders. Cheap to clone; the shell keeps
/// the latest copy behind a shared lock for pull-based reads.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub rev: u64,
    pub conversations: Vec<ConversationSummary>,
    /// True until the first aggregation pass lands.
    pub conversations_loading: bool,
    pub current_conversation: Option<ConversationViewState>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            conversations: vec![],
            conversations_loading: true,
            current_conversation: None,
            toast: None,
        }
    }
}

/// Derived, read-only projection of one conversation for the list screen.
///
/// `last_message_at` already folds in the conversation-level fallback: when a
/// conversation has no messages yet it carries the conversation's own
/// last-activity timestamp instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub kind: ConversationKind,
    pub activity_id: Option<String>,
    pub activity_title: Option<String>,
    pub activity_category: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    pub last_message_sender_id: Option<String>,
    pub last_message_sender_name: Option<String>,
    pub unread_count: u32,
    pub participant_count: u32,
}

/// The open conversation: metadata, the loaded message window, and who is
/// typing right now.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationViewState {
    pub conversation_id: String,
    /// None until the metadata fetch completes.
    pub details: Option<ConversationDetails>,
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
    pub loading: bool,
    pub typing: Vec<TypingParticipant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDetails {
    pub kind: ConversationKind,
    pub title: String,
    pub category: String,
    pub activity: Option<ActivityInfo>,
    pub participant_count: u32,
}

impl ConversationDetails {
    pub fn from_meta(conversation: &Conversation, participant_count: u32) -> Self {
        let title = conversation
            .activity
            .as_ref()
            .map(|a| a.title.clone())
            .unwrap_or_else(|| "Direct Message".to_string());
        let category = conversation
            .activity
            .as_ref()
            .and_then(|a| a.category.clone())
            .unwrap_or_else(|| "other".to_string());
        Self {
            kind: conversation.kind,
            title,
            category,
            activity: conversation.activity.clone(),
            participant_count,
        }
    }
}

/// Viewer-facing projection of a stored message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub body: String,
    pub image_ref: Option<String>,
    pub timestamp: i64,
    pub read_at: Option<i64>,
    pub is_mine: bool,
}

/// Ephemeral: exists only between a remote typing-started signal and the
/// matching stop signal or expiry. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingParticipant {
    pub participant_id: String,
    pub display_name: String,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity_conversation() -> Conversation {
        Conversation {
            id: "c1".into(),
            kind: ConversationKind::Activity,
            activity: Some(ActivityInfo {
                id: "a1".into(),
                title: "Sunday trail run".into(),
                category: Some("sports".into()),
                description: None,
                scheduled_for: Some(1_700_000_000_000),
                location_name: Some("North gate".into()),
            }),
            last_activity_at: None,
        }
    }

    #[test]
    fn details_take_title_and_category_from_activity() {
        let details = ConversationDetails::from_meta(&activity_conversation(), 4);
        assert_eq!(details.title, "Sunday trail run");
        assert_eq!(details.category, "sports");
        assert_eq!(details.participant_count, 4);
    }

    #[test]
    fn details_fall_back_for_direct_conversations() {
        let conversation = Conversation {
            id: "c2".into(),
            kind: ConversationKind::Direct,
            activity: None,
            last_activity_at: Some(5),
        };
        let details = ConversationDetails::from_meta(&conversation, 2);
        assert_eq!(details.title, "Direct Message");
        assert_eq!(details.category, "other");
        assert!(details.activity.is_none());
    }
}
