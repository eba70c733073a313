use std::path::Path;

use serde::Deserialize;

use super::AppCore;

const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_TYPING_EXPIRY_MS: u64 = 3_000;
const DEFAULT_TYPING_IDLE_MS: u64 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct AppConfig {
    pub(super) page_size: Option<u32>,
    pub(super) typing_expiry_ms: Option<u64>,
    pub(super) typing_idle_ms: Option<u64>,
}

pub(super) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join("huddle_config.json");
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    serde_json::from_slice::<AppConfig>(&bytes).unwrap_or_default()
}

impl AppCore {
    pub(super) fn page_size(&self) -> u32 {
        self.config.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// How long a remote typing entry lives without a renewing signal.
    pub(super) fn typing_expiry(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.config.typing_expiry_ms.unwrap_or(DEFAULT_TYPING_EXPIRY_MS),
        )
    }

    /// Compose-box quiet period before the outbound stop signal.
    pub(super) fn typing_idle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.config.typing_idle_ms.unwrap_or(DEFAULT_TYPING_IDLE_MS),
        )
    }
}
