/// Logging initialization: tracing-subscriber fmt → stderr, filterable via
/// `RUST_LOG`. Called once at the start of `HuddleApp::new()`; `try_init` so
/// embedding hosts (and parallel tests) that already installed a subscriber
/// are left alone.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle_core=debug,info".into()),
        )
        .try_init();
}
