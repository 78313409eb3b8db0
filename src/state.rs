use crate::config::Config;
use crate::storage::JsonStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: JsonStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: JsonStore, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
