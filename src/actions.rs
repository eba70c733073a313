#[derive(Debug, Clone)]
pub enum AppAction {
    // Conversation scope
    OpenConversation {
        conversation_id: String,
    },
    CloseConversation,

    // Messages
    SendMessage {
        conversation_id: String,
        body: String,
        image_ref: Option<String>,
    },
    LoadOlderMessages {
        conversation_id: String,
    },

    // Compose box activity (drives outbound typing signals)
    ComposerEdited {
        conversation_id: String,
    },

    // Summary list
    RefreshConversations,

    // UI
    ClearToast,

    // Lifecycle
    Foregrounded,
}

impl AppAction {
    /// Log-safe action tag (never includes message bodies).
    pub fn tag(&self) -> &'static str {
        match self {
            AppAction::OpenConversation { .. } => "OpenConversation",
            AppAction::CloseConversation => "CloseConversation",
            AppAction::SendMessage { .. } => "SendMessage",
            AppAction::LoadOlderMessages { .. } => "LoadOlderMessages",
            AppAction::ComposerEdited { .. } => "ComposerEdited",
            AppAction::RefreshConversations => "RefreshConversations",
            AppAction::ClearToast => "ClearToast",
            AppAction::Foregrounded => "Foregrounded",
        }
    }
}
