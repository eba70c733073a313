//! Realtime conversation synchronization engine for the Huddle activity-chat
//! client.
//!
//! The engine is an in-process library: the host hands it a
//! [`ConversationStore`] (data access) and a [`ChannelTransport`] (pub/sub),
//! dispatches [`AppAction`]s, and renders the [`AppState`] snapshots and
//! [`AppUpdate`] stream that come back. All engine state is owned by a single
//! actor thread; nothing here blocks the caller.

mod actions;
mod core;
mod error;
mod logging;
mod memory;
mod state;
mod store;
mod transport;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use error::{ChatError, TransportError, ValidationError};
pub use memory::{FailurePoint, MemoryStore, MemoryTransport};
pub use state::*;
pub use store::{
    ActivityInfo, Conversation, ConversationKind, ConversationStore, Message, MAX_MESSAGE_CHARS,
};
pub use transport::{ChannelEvent, ChannelTransport, Topic, TypingSignal};
pub use updates::AppUpdate;

use updates::CoreMsg;

/// Host-side callback for receiving state updates. Updates arrive on a
/// dedicated listener thread in emission order; `rev` gaps mean the host
/// should resync from [`HuddleApp::state`].
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

/// The local signed-in participant.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: String,
    pub display_name: String,
}

impl Viewer {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

pub struct HuddleApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
}

impl HuddleApp {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn ChannelTransport>,
        viewer: Viewer,
        data_dir: impl Into<String>,
    ) -> Arc<Self> {
        let data_dir = data_dir.into();
        logging::init_logging();
        tracing::info!(viewer = %viewer.id, data_dir = %data_dir, "HuddleApp::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                store,
                transport,
                viewer,
                data_dir,
                shared_for_core,
            );
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
        })
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }
}
