//! Shared application state

use std::sync::Arc;

use super::assets::AssetConfig;
use super::websocket::ClientRegistry;

/// State shared by every route
#[derive(Debug)]
pub struct AppState {
    /// Connected push channels
    pub registry: Arc<ClientRegistry>,

    /// Where served files live
    pub assets: AssetConfig,
}

impl AppState {
    /// Create a new AppState with an empty client registry
    pub fn new(assets: AssetConfig) -> Self {
        Self::with_registry(assets, Arc::new(ClientRegistry::new()))
    }

    /// Create a new AppState around an existing registry
    pub fn with_registry(assets: AssetConfig, registry: Arc<ClientRegistry>) -> Self {
        Self { registry, assets }
    }
}
