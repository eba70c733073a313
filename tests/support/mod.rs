use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use huddle_core::{
    AppReconciler, AppUpdate, Conversation, ConversationKind, HuddleApp, MemoryStore,
    MemoryTransport, Viewer,
};
use tempfile::TempDir;

pub const VIEWER_ID: &str = "viewer-1";
pub const VIEWER_NAME: &str = "Val";

pub fn wait_until(what: &str, timeout: Duration, mut f: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub struct TestReconciler {
    updates: Arc<Mutex<Vec<AppUpdate>>>,
}

impl TestReconciler {
    pub fn new() -> (Self, Arc<Mutex<Vec<AppUpdate>>>) {
        let updates = Arc::new(Mutex::new(vec![]));
        (
            Self {
                updates: updates.clone(),
            },
            updates,
        )
    }
}

impl AppReconciler for TestReconciler {
    fn reconcile(&self, update: AppUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// A full engine wired to the in-memory backend, plus handles for seeding and
/// observing it.
pub struct TestApp {
    pub app: Arc<HuddleApp>,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<MemoryTransport>,
    _dir: TempDir,
}

pub fn new_app(seed: impl FnOnce(&MemoryStore)) -> TestApp {
    new_app_with_config(None, seed)
}

pub fn new_app_with_config(
    config: Option<serde_json::Value>,
    seed: impl FnOnce(&MemoryStore),
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    if let Some(config) = config {
        std::fs::write(
            dir.path().join("huddle_config.json"),
            serde_json::to_vec(&config).unwrap(),
        )
        .unwrap();
    }

    let transport = Arc::new(MemoryTransport::new());
    let store = Arc::new(MemoryStore::new(transport.clone()));
    store.set_profile(VIEWER_ID, VIEWER_NAME);
    seed(&store);

    let app = HuddleApp::new(
        store.clone(),
        transport.clone(),
        Viewer::new(VIEWER_ID, VIEWER_NAME),
        dir.path().to_string_lossy().to_string(),
    );
    TestApp {
        app,
        store,
        transport,
        _dir: dir,
    }
}

pub fn direct_conversation(id: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        kind: ConversationKind::Direct,
        activity: None,
        last_activity_at: None,
    }
}
