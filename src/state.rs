use std::sync::Arc;

use crate::chat::CompletionClient;
use crate::config::AppConfig;
use crate::data::DataSource;
use crate::recordings::RecordingStore;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub data: Arc<dyn DataSource>,
    pub chat: Arc<dyn CompletionClient>,
    pub recordings: RecordingStore,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        data: Arc<dyn DataSource>,
        chat: Arc<dyn CompletionClient>,
    ) -> Self {
        let recordings = RecordingStore::new(config.upload_dir.clone());
        Self {
            config: Arc::new(config),
            data,
            chat,
            recordings,
        }
    }
}
