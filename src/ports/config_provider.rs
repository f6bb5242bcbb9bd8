use async_trait::async_trait;
use eyre::Result;
use tokio::sync::mpsc;

use crate::config::models::ServerConfig;

/// Trait for configuration providers that can load and watch for configuration changes.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load the current configuration.
    async fn load_config(&self) -> Result<ServerConfig>;

    /// Take the channel that signals when the configuration has changed.
    ///
    /// Returns `None` once the receiver has already been handed out.
    fn watch(&self) -> Option<mpsc::Receiver<()>>;
}
