use crate::actions::AppAction;
use crate::error::ChatError;
use crate::state::{AppState, ConversationDetails, ConversationSummary, ConversationViewState,
    TypingParticipant};
use crate::store::Message;
use crate::transport::ChannelEvent;

#[derive(Debug, Clone)]
pub enum AppUpdate {
    FullState(AppState),
    ConversationListChanged {
        rev: u64,
        conversations: Vec<ConversationSummary>,
    },
    CurrentConversationChanged {
        rev: u64,
        current: Option<ConversationViewState>,
    },
    TypingChanged {
        rev: u64,
        conversation_id: String,
        typing: Vec<TypingParticipant>,
    },
    ToastChanged {
        rev: u64,
        toast: Option<String>,
    },
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
            AppUpdate::ConversationListChanged { rev, .. } => *rev,
            AppUpdate::CurrentConversationChanged { rev, .. } => *rev,
            AppUpdate::TypingChanged { rev, .. } => *rev,
            AppUpdate::ToastChanged { rev, .. } => *rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Initial,
    Older,
}

#[derive(Debug)]
pub enum InternalEvent {
    // Transport receive path
    Channel(ChannelEvent),

    // Async results. Fetches carry the scope/generation token they were
    // spawned under; stale results are dropped on mismatch.
    ConversationsAggregated {
        token: u64,
        result: Result<Vec<ConversationSummary>, ChatError>,
    },
    ConversationMetaLoaded {
        token: u64,
        conversation_id: String,
        result: Result<ConversationDetails, ChatError>,
    },
    PageLoaded {
        token: u64,
        conversation_id: String,
        mode: PageMode,
        result: Result<Vec<Message>, ChatError>,
    },
    SendFinished {
        conversation_id: String,
        result: Result<(), ChatError>,
    },
    MarkReadFinished {
        conversation_id: String,
        result: Result<u64, ChatError>,
    },

    // Timer ticks
    TypingExpired {
        token: u64,
        conversation_id: String,
        participant_id: String,
        seq: u64,
    },
    TypingIdleElapsed {
        token: u64,
        conversation_id: String,
        seq: u64,
    },
}
