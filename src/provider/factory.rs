//! Provider factory for creating `Provider` trait objects from configuration.

use super::{EchoProvider, HttpProvider, Provider, ProviderError};
use crate::config::{ProviderKind, ServiceConfig};
use reqwest::Client;
use std::sync::Arc;

/// Create and initialize the provider for a `[[services]]` entry.
///
/// The shared `client` is reused by every HTTP provider for connection
/// pooling.
pub async fn create_provider(
    config: &ServiceConfig,
    client: Arc<Client>,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::Http => Arc::new(HttpProvider::new(config.id.clone(), client)),
        ProviderKind::Echo => Arc::new(EchoProvider::new(config.id.clone())),
    };

    provider.initialize(config).await?;
    Ok(provider)
}
