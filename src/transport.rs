//! Channel transport boundary.
//!
//! The transport is a bidirectional pub/sub primitive: row-change events for
//! the message table and ad-hoc typing broadcasts, scoped to named topics.
//! Payloads are validated at this boundary into the closed [`ChannelEvent`]
//! set; the engine never inspects untyped payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::store::Message;

/// A named pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Row-change events (insert/update) filtered to one conversation.
    Messages { conversation_id: String },
    /// Typing broadcasts for one conversation.
    Typing { conversation_id: String },
    /// Global feed: every message insert plus membership changes. Drives the
    /// summary aggregator.
    ConversationUpdates,
}

impl Topic {
    pub fn messages(conversation_id: impl Into<String>) -> Self {
        Self::Messages {
            conversation_id: conversation_id.into(),
        }
    }

    pub fn typing(conversation_id: impl Into<String>) -> Self {
        Self::Typing {
            conversation_id: conversation_id.into(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Messages { conversation_id } => write!(f, "messages:{conversation_id}"),
            Topic::Typing { conversation_id } => write!(f, "typing:{conversation_id}"),
            Topic::ConversationUpdates => write!(f, "conversations-updates"),
        }
    }
}

/// Typing broadcast payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingSignal {
    pub participant_id: String,
    pub display_name: String,
    pub is_typing: bool,
}

/// Validated events delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    MessageInserted {
        message: Message,
    },
    MessageUpdated {
        message: Message,
    },
    Typing {
        conversation_id: String,
        signal: TypingSignal,
    },
    /// A participant joined a conversation.
    MembershipAdded {
        conversation_id: String,
        participant_id: String,
    },
}

/// Pub/sub transport contract.
///
/// Subscribe/unsubscribe/broadcast are synchronous registrations — real
/// implementations enqueue network work internally. The engine relies on
/// that: topic teardown must complete before a rebind is issued, with no
/// overlap window.
pub trait ChannelTransport: Send + Sync {
    fn subscribe(&self, topic: &Topic) -> Result<(), ChatError>;

    fn unsubscribe(&self, topic: &Topic) -> Result<(), ChatError>;

    fn broadcast(&self, topic: &Topic, signal: TypingSignal) -> Result<(), ChatError>;

    /// The event feed drained by the engine's notifications loop. Only events
    /// for currently subscribed topics are delivered.
    fn events(&self) -> flume::Receiver<ChannelEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_are_conversation_scoped() {
        assert_eq!(Topic::messages("c1").to_string(), "messages:c1");
        assert_eq!(Topic::typing("c1").to_string(), "typing:c1");
        assert_eq!(Topic::ConversationUpdates.to_string(), "conversations-updates");
        assert_ne!(Topic::messages("c1"), Topic::messages("c2"));
    }
}
