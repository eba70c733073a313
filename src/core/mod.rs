mod config;
mod pages;
mod read_receipts;
mod summaries;
mod typing;

use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::error::ValidationError;
use crate::state::{now_millis, AppState, ChatMessage, ConversationDetails, ConversationViewState};
use crate::store::{ConversationStore, MAX_MESSAGE_CHARS};
use crate::transport::{ChannelEvent, ChannelTransport, Topic, TypingSignal};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent, PageMode};
use crate::Viewer;

use config::{load_app_config, AppConfig};
use pages::MessagePages;
use typing::{ComposerTyping, RemoteObservation, RemoteTyping};

/// Everything bound to the one open conversation: topic subscriptions, the
/// message window, and both typing trackers. Dropped as a unit on scope exit;
/// in-flight work is invalidated by the token.
struct ConversationScope {
    conversation_id: String,
    token: u64,
    pages: MessagePages,
    remote_typing: RemoteTyping,
    composer: ComposerTyping,
    details: Option<ConversationDetails>,
    loading_initial: bool,
}

impl ConversationScope {
    fn new(conversation_id: String, token: u64, page_size: usize) -> Self {
        Self {
            conversation_id,
            token,
            pages: MessagePages::new(page_size),
            remote_typing: RemoteTyping::new(),
            composer: ComposerTyping::new(),
            details: None,
            loading_initial: true,
        }
    }
}

pub(crate) struct AppCore {
    state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn ChannelTransport>,
    viewer: Viewer,
    config: AppConfig,
    runtime: tokio::runtime::Runtime,

    scope: Option<ConversationScope>,
    scope_token: u64,

    agg_in_flight: bool,
    agg_dirty: bool,
    agg_token: u64,
}

impl AppCore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn ChannelTransport>,
        viewer: Viewer,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
    ) -> Self {
        let config = load_app_config(&data_dir);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let mut this = Self {
            state: AppState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            store,
            transport,
            viewer,
            config,
            runtime,
            scope: None,
            scope_token: 0,
            agg_in_flight: false,
            agg_dirty: false,
            agg_token: 0,
        };

        // Bind the global feed before the first aggregation so no insert can
        // slip between the snapshot and live maintenance.
        if let Err(e) = this.transport.subscribe(&Topic::ConversationUpdates) {
            tracing::warn!(%e, "conversation updates subscribe failed");
        }
        this.start_notifications_loop();
        this.reload_conversations();

        // Ensure state() has an immediately-available snapshot.
        this.next_rev();
        let snapshot = this.state.clone();
        this.emit(AppUpdate::FullState(snapshot));
        this
    }

    pub(crate) fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(action) => {
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    // ---- actions ----

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::OpenConversation { conversation_id } => {
                let already_open = self
                    .scope
                    .as_ref()
                    .map(|s| s.conversation_id == conversation_id)
                    .unwrap_or(false);
                if already_open {
                    tracing::debug!(conversation_id = %conversation_id, "conversation already open");
                    return;
                }

                self.close_scope();

                // Old bindings are fully torn down above; no overlap window.
                for topic in [
                    Topic::messages(conversation_id.as_str()),
                    Topic::typing(conversation_id.as_str()),
                ] {
                    if let Err(e) = self.transport.subscribe(&topic) {
                        tracing::warn!(topic = %topic, %e, "subscribe failed");
                    }
                }

                let token = self.scope_token;
                self.scope = Some(ConversationScope::new(
                    conversation_id.clone(),
                    token,
                    self.page_size() as usize,
                ));
                self.spawn_meta_load(&conversation_id, token);
                self.spawn_page_load(&conversation_id, token, None, PageMode::Initial);
                self.emit_current();
            }
            AppAction::CloseConversation => {
                self.close_scope();
                self.emit_current();
            }
            AppAction::SendMessage {
                conversation_id,
                body,
                image_ref,
            } => {
                let scope_matches = self
                    .scope
                    .as_ref()
                    .map(|s| s.conversation_id == conversation_id)
                    .unwrap_or(false);
                if !scope_matches {
                    tracing::warn!(conversation_id = %conversation_id, "send outside the open conversation ignored");
                    return;
                }

                // Validation happens before any transport call; the host keeps
                // the draft on failure.
                let trimmed = body.trim().to_string();
                if trimmed.is_empty() {
                    self.toast(ValidationError::EmptyBody.to_string());
                    return;
                }
                if trimmed.chars().count() > MAX_MESSAGE_CHARS {
                    self.toast(
                        ValidationError::BodyTooLong {
                            limit: MAX_MESSAGE_CHARS,
                        }
                        .to_string(),
                    );
                    return;
                }

                let store = self.store.clone();
                let tx = self.core_sender.clone();
                let sender_id = self.viewer.id.clone();
                self.runtime.spawn(async move {
                    // No optimistic insert: the row comes back as an insert
                    // event, the sole source of truth for the new message.
                    let result = store
                        .insert_message(&conversation_id, &sender_id, &trimmed, image_ref)
                        .await;
                    let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SendFinished {
                        conversation_id,
                        result,
                    })));
                });
            }
            AppAction::LoadOlderMessages { conversation_id } => {
                let started = match self.scope.as_mut() {
                    Some(scope) if scope.conversation_id == conversation_id => scope
                        .pages
                        .begin_older()
                        .map(|cursor| (scope.token, cursor)),
                    _ => None,
                };
                // None: empty window or a fetch already in flight.
                let Some((token, cursor)) = started else {
                    return;
                };
                self.spawn_page_load(&conversation_id, token, Some(cursor), PageMode::Older);
            }
            AppAction::ComposerEdited { conversation_id } => {
                let armed = match self.scope.as_mut() {
                    Some(scope) if scope.conversation_id == conversation_id => {
                        Some((scope.token, scope.composer.edited()))
                    }
                    _ => None,
                };
                let Some((token, seq)) = armed else {
                    return;
                };

                self.broadcast_typing(&conversation_id, true);

                let idle = self.typing_idle();
                let tx = self.core_sender.clone();
                self.runtime.spawn(async move {
                    tokio::time::sleep(idle).await;
                    let _ = tx.send(CoreMsg::Internal(Box::new(
                        InternalEvent::TypingIdleElapsed {
                            token,
                            conversation_id,
                            seq,
                        },
                    )));
                });
            }
            AppAction::RefreshConversations => {
                self.reload_conversations();
            }
            AppAction::ClearToast => {
                if self.state.toast.is_some() {
                    self.state.toast = None;
                    self.emit_toast();
                }
            }
            AppAction::Foregrounded => {
                self.reload_conversations();
                // Resync the open window to the newest page.
                let open = self
                    .scope
                    .as_ref()
                    .map(|s| (s.conversation_id.clone(), s.token));
                if let Some((conversation_id, token)) = open {
                    if let Some(scope) = self.scope.as_mut() {
                        scope.loading_initial = true;
                    }
                    self.spawn_meta_load(&conversation_id, token);
                    self.spawn_page_load(&conversation_id, token, None, PageMode::Initial);
                    self.emit_current();
                }
            }
        }
    }

    // ---- internal events ----

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::Channel(event) => self.handle_channel_event(event),
            InternalEvent::ConversationsAggregated { token, result } => {
                // Ignore stale passes.
                if token != self.agg_token {
                    return;
                }
                self.agg_in_flight = false;
                match result {
                    Ok(conversations) => {
                        self.state.conversations = conversations;
                        self.state.conversations_loading = false;
                        self.emit_conversations();
                    }
                    Err(e) => {
                        // Best-effort background work: keep the previous list.
                        tracing::warn!(%e, "conversation aggregation failed");
                        if self.state.conversations_loading {
                            self.state.conversations_loading = false;
                            self.emit_conversations();
                        }
                    }
                }
                if self.agg_dirty {
                    self.agg_dirty = false;
                    self.reload_conversations();
                }
            }
            InternalEvent::ConversationMetaLoaded {
                token,
                conversation_id,
                result,
            } => {
                let applied = match self.scope.as_mut() {
                    Some(scope)
                        if scope.token == token && scope.conversation_id == conversation_id =>
                    {
                        match result {
                            Ok(details) => {
                                scope.details = Some(details);
                                true
                            }
                            Err(e) => {
                                tracing::warn!(conversation_id = %conversation_id, %e, "conversation meta load failed");
                                false
                            }
                        }
                    }
                    _ => false,
                };
                if applied {
                    self.emit_current();
                }
            }
            InternalEvent::PageLoaded {
                token,
                conversation_id,
                mode,
                result,
            } => {
                let outcome = match self.scope.as_mut() {
                    Some(scope)
                        if scope.token == token && scope.conversation_id == conversation_id =>
                    {
                        match (mode, result) {
                            (PageMode::Initial, Ok(page)) => {
                                scope.loading_initial = false;
                                scope.pages.apply_initial(page);
                                Some(Ok(()))
                            }
                            (PageMode::Older, Ok(page)) => {
                                scope.pages.apply_older(page);
                                Some(Ok(()))
                            }
                            (PageMode::Initial, Err(e)) => {
                                scope.loading_initial = false;
                                Some(Err(e))
                            }
                            (PageMode::Older, Err(e)) => {
                                scope.pages.abort_older();
                                Some(Err(e))
                            }
                        }
                    }
                    // Stale result for a scope that no longer exists.
                    _ => None,
                };
                match outcome {
                    Some(Ok(())) => {
                        self.emit_current();
                        self.maybe_mark_read(&conversation_id);
                    }
                    Some(Err(e)) => {
                        tracing::warn!(conversation_id = %conversation_id, ?mode, %e, "page load failed");
                        self.emit_current();
                        self.toast(format!("Could not load messages: {e}"));
                    }
                    None => {}
                }
            }
            InternalEvent::SendFinished {
                conversation_id,
                result,
            } => match result {
                Ok(()) => {
                    tracing::debug!(conversation_id = %conversation_id, "message stored");
                    let scope_matches = self
                        .scope
                        .as_ref()
                        .map(|s| s.conversation_id == conversation_id)
                        .unwrap_or(false);
                    if scope_matches {
                        if let Some(scope) = self.scope.as_mut() {
                            scope.composer.sent();
                        }
                        // Stop signal goes out regardless of idle timer state.
                        self.broadcast_typing(&conversation_id, false);
                    }
                }
                Err(e) => {
                    tracing::warn!(conversation_id = %conversation_id, %e, "send failed");
                    self.toast(format!("Could not send message: {e}"));
                }
            },
            InternalEvent::MarkReadFinished {
                conversation_id,
                result,
            } => match result {
                Ok(affected) => {
                    tracing::debug!(conversation_id = %conversation_id, affected, "conversation marked read");
                }
                Err(e) => {
                    // Fire-and-forget: logged, not retried.
                    tracing::warn!(conversation_id = %conversation_id, %e, "mark read failed");
                }
            },
            InternalEvent::TypingExpired {
                token,
                conversation_id,
                participant_id,
                seq,
            } => {
                let removed = match self.scope.as_mut() {
                    Some(scope)
                        if scope.token == token && scope.conversation_id == conversation_id =>
                    {
                        scope.remote_typing.expire(&participant_id, seq)
                    }
                    _ => false,
                };
                if removed {
                    self.emit_typing();
                }
            }
            InternalEvent::TypingIdleElapsed {
                token,
                conversation_id,
                seq,
            } => {
                let fire = match self.scope.as_mut() {
                    Some(scope)
                        if scope.token == token && scope.conversation_id == conversation_id =>
                    {
                        scope.composer.idle_elapsed(seq)
                    }
                    _ => false,
                };
                if fire {
                    self.broadcast_typing(&conversation_id, false);
                }
            }
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::MessageInserted { message } => {
                let conversation_id = message.conversation_id.clone();
                let from_other = message.sender_id != self.viewer.id;
                let merged = match self.scope.as_mut() {
                    Some(scope) if scope.conversation_id == conversation_id => {
                        scope.pages.merge_insert(message)
                    }
                    _ => false,
                };
                if merged {
                    self.emit_current();
                    if from_other {
                        self.maybe_mark_read(&conversation_id);
                    }
                }
                // Every insert refreshes the summary list: full recomputation,
                // no incremental patch.
                self.reload_conversations();
            }
            ChannelEvent::MessageUpdated { message } => {
                let replaced = match self.scope.as_mut() {
                    Some(scope) if scope.conversation_id == message.conversation_id => {
                        scope.pages.apply_update(message)
                    }
                    // Unknown conversation or identifier: silent no-op.
                    _ => false,
                };
                if replaced {
                    self.emit_current();
                }
            }
            ChannelEvent::Typing {
                conversation_id,
                signal,
            } => {
                let viewer_id = self.viewer.id.clone();
                let observation = match self.scope.as_mut() {
                    Some(scope) if scope.conversation_id == conversation_id => {
                        Some((scope.token, scope.remote_typing.observe(&signal, &viewer_id)))
                    }
                    _ => None,
                };
                let Some((token, observation)) = observation else {
                    return;
                };
                match observation {
                    RemoteObservation::Started { seq, joined } => {
                        let expiry = self.typing_expiry();
                        let tx = self.core_sender.clone();
                        let participant_id = signal.participant_id.clone();
                        self.runtime.spawn(async move {
                            tokio::time::sleep(expiry).await;
                            let _ = tx.send(CoreMsg::Internal(Box::new(
                                InternalEvent::TypingExpired {
                                    token,
                                    conversation_id,
                                    participant_id,
                                    seq,
                                },
                            )));
                        });
                        if joined {
                            self.emit_typing();
                        }
                    }
                    RemoteObservation::Stopped => self.emit_typing(),
                    RemoteObservation::NoChange => {}
                }
            }
            ChannelEvent::MembershipAdded { participant_id, .. } => {
                if participant_id == self.viewer.id {
                    self.reload_conversations();
                }
            }
        }
    }

    // ---- scope lifecycle ----

    fn close_scope(&mut self) {
        // Token bump invalidates in-flight fetches and timer ticks.
        self.scope_token = self.scope_token.wrapping_add(1);
        let Some(scope) = self.scope.take() else {
            return;
        };
        for topic in [
            Topic::messages(scope.conversation_id.as_str()),
            Topic::typing(scope.conversation_id.as_str()),
        ] {
            if let Err(e) = self.transport.unsubscribe(&topic) {
                tracing::warn!(topic = %topic, %e, "unsubscribe failed");
            }
        }
    }

    // ---- async work ----

    fn spawn_page_load(
        &mut self,
        conversation_id: &str,
        token: u64,
        before: Option<i64>,
        mode: PageMode,
    ) {
        let store = self.store.clone();
        let tx = self.core_sender.clone();
        let limit = self.page_size();
        let conversation_id = conversation_id.to_string();
        self.runtime.spawn(async move {
            let result = store.fetch_messages(&conversation_id, before, limit).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::PageLoaded {
                token,
                conversation_id,
                mode,
                result,
            })));
        });
    }

    fn spawn_meta_load(&mut self, conversation_id: &str, token: u64) {
        let store = self.store.clone();
        let tx = self.core_sender.clone();
        let conversation_id = conversation_id.to_string();
        self.runtime.spawn(async move {
            let result = match store.fetch_conversation_meta(&conversation_id).await {
                Ok(conversation) => {
                    // Participant count is best-effort display data.
                    let participant_count = store
                        .count_participants(&conversation_id)
                        .await
                        .unwrap_or(0);
                    Ok(ConversationDetails::from_meta(&conversation, participant_count))
                }
                Err(e) => Err(e),
            };
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ConversationMetaLoaded {
                    token,
                    conversation_id,
                    result,
                },
            )));
        });
    }

    fn reload_conversations(&mut self) {
        if self.agg_in_flight {
            self.agg_dirty = true;
            return;
        }
        self.agg_in_flight = true;
        self.agg_dirty = false;
        self.agg_token = self.agg_token.wrapping_add(1);
        let token = self.agg_token;

        let store = self.store.clone();
        let viewer_id = self.viewer.id.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = summaries::aggregate(store.as_ref(), &viewer_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ConversationsAggregated { token, result },
            )));
        });
    }

    fn maybe_mark_read(&mut self, conversation_id: &str) {
        let unread = match self.scope.as_ref() {
            Some(scope) if scope.conversation_id == conversation_id => {
                read_receipts::has_unread(scope.pages.messages(), &self.viewer.id)
            }
            _ => false,
        };
        if !unread {
            return;
        }
        let store = self.store.clone();
        let tx = self.core_sender.clone();
        let viewer_id = self.viewer.id.clone();
        let conversation_id = conversation_id.to_string();
        self.runtime.spawn(async move {
            let result = store
                .mark_read(&conversation_id, &viewer_id, now_millis())
                .await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::MarkReadFinished {
                    conversation_id,
                    result,
                },
            )));
        });
    }

    fn broadcast_typing(&self, conversation_id: &str, is_typing: bool) {
        let topic = Topic::typing(conversation_id);
        let signal = TypingSignal {
            participant_id: self.viewer.id.clone(),
            display_name: self.viewer.display_name.clone(),
            is_typing,
        };
        if let Err(e) = self.transport.broadcast(&topic, signal) {
            tracing::warn!(topic = %topic, %e, "typing broadcast failed");
        }
    }

    fn start_notifications_loop(&self) {
        let rx = self.transport.events();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            while let Ok(event) = rx.recv_async().await {
                if tx
                    .send(CoreMsg::Internal(Box::new(InternalEvent::Channel(event))))
                    .is_err()
                {
                    break;
                }
            }
        });
    }

    // ---- state emission ----

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn emit(&mut self, update: AppUpdate) {
        self.commit_state();
        let _ = self.update_sender.send(update);
    }

    fn commit_state(&self) {
        let snapshot = self.state.clone();
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot,
            Err(poison) => *poison.into_inner() = snapshot,
        }
    }

    fn view_state(&self, scope: &ConversationScope) -> ConversationViewState {
        let messages = scope
            .pages
            .messages()
            .iter()
            .map(|m| ChatMessage {
                id: m.id.clone(),
                sender_id: m.sender_id.clone(),
                sender_name: m.sender_name.clone(),
                body: m.body.clone(),
                image_ref: m.image_ref.clone(),
                timestamp: m.created_at,
                read_at: m.read_at,
                is_mine: m.sender_id == self.viewer.id,
            })
            .collect();
        ConversationViewState {
            conversation_id: scope.conversation_id.clone(),
            details: scope.details.clone(),
            messages,
            has_more: scope.pages.has_more(),
            loading: scope.loading_initial,
            typing: scope.remote_typing.participants(),
        }
    }

    fn emit_conversations(&mut self) {
        let rev = self.next_rev();
        let conversations = self.state.conversations.clone();
        self.emit(AppUpdate::ConversationListChanged { rev, conversations });
    }

    fn emit_current(&mut self) {
        let current = match self.scope.as_ref() {
            Some(scope) => Some(self.view_state(scope)),
            None => None,
        };
        self.state.current_conversation = current.clone();
        let rev = self.next_rev();
        self.emit(AppUpdate::CurrentConversationChanged { rev, current });
    }

    fn emit_typing(&mut self) {
        let Some((conversation_id, typing)) = self
            .scope
            .as_ref()
            .map(|s| (s.conversation_id.clone(), s.remote_typing.participants()))
        else {
            return;
        };
        if let Some(current) = self.state.current_conversation.as_mut() {
            current.typing = typing.clone();
        }
        let rev = self.next_rev();
        self.emit(AppUpdate::TypingChanged {
            rev,
            conversation_id,
            typing,
        });
    }

    fn emit_toast(&mut self) {
        let rev = self.next_rev();
        let toast = self.state.toast.clone();
        self.emit(AppUpdate::ToastChanged { rev, toast });
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Keep the toast in state until the host explicitly clears it, so a
        // rev-gap resync still carries it.
        self.state.toast = Some(msg.into());
        self.emit_toast();
    }
}
