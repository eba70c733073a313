//! In-process store and transport backend.
//!
//! Non-persistent: everything lives in memory and is gone at process exit.
//! Useful for tests, demos, and ephemeral embedding where a real backend
//! isn't required. The pair mirrors a store-then-notify service: writes go
//! through [`MemoryStore`], and the resulting row-change events come back out
//! of [`MemoryTransport`] exactly as a remote backend would deliver them —
//! one copy per subscribed topic that carries the event.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::error::ChatError;
use crate::state::now_millis;
use crate::store::{Conversation, ConversationStore, Message};
use crate::transport::{ChannelEvent, ChannelTransport, Topic, TypingSignal};

/// Store operations that can be made to fail, for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    FetchMessages,
    InsertMessage,
    MarkRead,
    LastMessage,
}

pub struct MemoryTransport {
    topics: Mutex<HashSet<Topic>>,
    broadcasts: Mutex<Vec<(Topic, TypingSignal)>>,
    event_tx: flume::Sender<ChannelEvent>,
    event_rx: flume::Receiver<ChannelEvent>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (event_tx, event_rx) = flume::unbounded();
        Self {
            topics: Mutex::new(HashSet::new()),
            broadcasts: Mutex::new(Vec::new()),
            event_tx,
            event_rx,
        }
    }

    /// Deliver an event to subscribers: one copy per subscribed topic that
    /// carries it, like per-channel delivery of a row-change feed. An event
    /// whose topics are all unsubscribed is dropped.
    pub fn publish(&self, event: ChannelEvent) {
        let copies = {
            let topics = self.topics.lock();
            Self::carrying_topics(&event)
                .into_iter()
                .filter(|t| topics.contains(t))
                .count()
        };
        for _ in 0..copies {
            let _ = self.event_tx.send(event.clone());
        }
    }

    pub fn subscribed_topics(&self) -> Vec<Topic> {
        self.topics.lock().iter().cloned().collect()
    }

    /// Every typing signal broadcast through this transport, oldest first.
    pub fn sent_broadcasts(&self) -> Vec<(Topic, TypingSignal)> {
        self.broadcasts.lock().clone()
    }

    fn carrying_topics(event: &ChannelEvent) -> Vec<Topic> {
        match event {
            ChannelEvent::MessageInserted { message } => vec![
                Topic::messages(message.conversation_id.as_str()),
                Topic::ConversationUpdates,
            ],
            ChannelEvent::MessageUpdated { message } => {
                vec![Topic::messages(message.conversation_id.as_str())]
            }
            ChannelEvent::Typing {
                conversation_id, ..
            } => vec![Topic::typing(conversation_id.as_str())],
            ChannelEvent::MembershipAdded { .. } => vec![Topic::ConversationUpdates],
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport for MemoryTransport {
    fn subscribe(&self, topic: &Topic) -> Result<(), ChatError> {
        self.topics.lock().insert(topic.clone());
        Ok(())
    }

    fn unsubscribe(&self, topic: &Topic) -> Result<(), ChatError> {
        self.topics.lock().remove(topic);
        Ok(())
    }

    fn broadcast(&self, topic: &Topic, signal: TypingSignal) -> Result<(), ChatError> {
        self.broadcasts.lock().push((topic.clone(), signal.clone()));
        // Broadcasts loop back to every subscriber, the sender included;
        // receivers filter their own participant id.
        if let Topic::Typing { conversation_id } = topic {
            self.publish(ChannelEvent::Typing {
                conversation_id: conversation_id.clone(),
                signal,
            });
        }
        Ok(())
    }

    fn events(&self) -> flume::Receiver<ChannelEvent> {
        self.event_rx.clone()
    }
}

struct StoredConversation {
    conversation: Conversation,
    participants: Vec<String>,
}

#[derive(Default)]
struct StoreInner {
    conversations: Vec<StoredConversation>,
    messages: Vec<Message>,
    profiles: HashMap<String, String>,
}

pub struct MemoryStore {
    inner: RwLock<StoreInner>,
    transport: Arc<MemoryTransport>,
    failures: Mutex<HashSet<FailurePoint>>,
}

impl MemoryStore {
    pub fn new(transport: Arc<MemoryTransport>) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            transport,
            failures: Mutex::new(HashSet::new()),
        }
    }

    pub fn add_conversation(&self, conversation: Conversation, participants: &[&str]) {
        self.inner.write().conversations.push(StoredConversation {
            conversation,
            participants: participants.iter().map(|p| p.to_string()).collect(),
        });
    }

    /// Register a display name used to denormalize `sender_name` onto rows.
    pub fn set_profile(&self, participant_id: &str, display_name: &str) {
        self.inner
            .write()
            .profiles
            .insert(participant_id.to_string(), display_name.to_string());
    }

    /// Seed pre-existing history. No event is published: seeded rows model
    /// messages that existed before the client connected.
    pub fn seed_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        created_at: i64,
    ) -> Message {
        let mut inner = self.inner.write();
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: inner.profiles.get(sender_id).cloned(),
            body: body.to_string(),
            image_ref: None,
            created_at,
            read_at: None,
        };
        inner.messages.push(message.clone());
        message
    }

    /// Add a participant and publish the membership event.
    pub fn add_participant(&self, conversation_id: &str, participant_id: &str) {
        {
            let mut inner = self.inner.write();
            if let Some(stored) = inner
                .conversations
                .iter_mut()
                .find(|s| s.conversation.id == conversation_id)
            {
                stored.participants.push(participant_id.to_string());
            }
        }
        self.transport.publish(ChannelEvent::MembershipAdded {
            conversation_id: conversation_id.to_string(),
            participant_id: participant_id.to_string(),
        });
    }

    pub fn messages_in(&self, conversation_id: &str) -> Vec<Message> {
        self.inner
            .read()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn fail_on(&self, point: FailurePoint) {
        self.failures.lock().insert(point);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    fn check(&self, point: FailurePoint) -> Result<(), ChatError> {
        if self.failures.lock().contains(&point) {
            return Err(ChatError::transport(format!("{point:?} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        before: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Message>, ChatError> {
        self.check(FailurePoint::FetchMessages)?;
        let inner = self.inner.read();
        let mut page: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| before.map(|b| m.created_at < b).unwrap_or(true))
            .cloned()
            .collect();
        // Newest first.
        page.sort_by(|a, b| {
            (b.created_at, b.id.as_str()).cmp(&(a.created_at, a.id.as_str()))
        });
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn insert_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        image_ref: Option<String>,
    ) -> Result<(), ChatError> {
        self.check(FailurePoint::InsertMessage)?;
        let message = {
            let mut inner = self.inner.write();
            if !inner
                .conversations
                .iter()
                .any(|s| s.conversation.id == conversation_id)
            {
                return Err(ChatError::not_found("conversation", conversation_id));
            }
            let message = Message {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: conversation_id.to_string(),
                sender_id: sender_id.to_string(),
                sender_name: inner.profiles.get(sender_id).cloned(),
                body: body.to_string(),
                image_ref,
                created_at: now_millis(),
                read_at: None,
            };
            inner.messages.push(message.clone());
            message
        };
        self.transport
            .publish(ChannelEvent::MessageInserted { message });
        Ok(())
    }

    async fn mark_read(
        &self,
        conversation_id: &str,
        viewer_id: &str,
        now: i64,
    ) -> Result<u64, ChatError> {
        self.check(FailurePoint::MarkRead)?;
        let updated: Vec<Message> = {
            let mut inner = self.inner.write();
            inner
                .messages
                .iter_mut()
                .filter(|m| {
                    m.conversation_id == conversation_id
                        && m.sender_id != viewer_id
                        && m.read_at.is_none()
                })
                .map(|m| {
                    m.read_at = Some(now);
                    m.clone()
                })
                .collect()
        };
        // Read-receipt propagation: each transition goes out as an update row.
        for message in &updated {
            self.transport.publish(ChannelEvent::MessageUpdated {
                message: message.clone(),
            });
        }
        Ok(updated.len() as u64)
    }

    async fn fetch_conversation_meta(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, ChatError> {
        self.inner
            .read()
            .conversations
            .iter()
            .find(|s| s.conversation.id == conversation_id)
            .map(|s| s.conversation.clone())
            .ok_or_else(|| ChatError::not_found("conversation", conversation_id))
    }

    async fn participant_conversations(&self, viewer_id: &str) -> Result<Vec<String>, ChatError> {
        Ok(self
            .inner
            .read()
            .conversations
            .iter()
            .filter(|s| s.participants.iter().any(|p| p == viewer_id))
            .map(|s| s.conversation.id.clone())
            .collect())
    }

    async fn fetch_last_message(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Message>, ChatError> {
        self.check(FailurePoint::LastMessage)?;
        Ok(self
            .inner
            .read()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .max_by_key(|m| (m.created_at, m.id.clone()))
            .cloned())
    }

    async fn count_unread(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> Result<u32, ChatError> {
        Ok(self
            .inner
            .read()
            .messages
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && m.sender_id != viewer_id
                    && m.read_at.is_none()
            })
            .count() as u32)
    }

    async fn count_participants(&self, conversation_id: &str) -> Result<u32, ChatError> {
        self.inner
            .read()
            .conversations
            .iter()
            .find(|s| s.conversation.id == conversation_id)
            .map(|s| s.participants.len() as u32)
            .ok_or_else(|| ChatError::not_found("conversation", conversation_id))
    }
}
