use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::backends::{BackendResult, Backends, create_backends};

/// Shared by every route and connection.
pub struct AppState {
    pub config: ServerConfig,
    pub backends: Backends,
}

impl AppState {
    /// Build the backends selected by `config`.
    pub fn new(config: ServerConfig) -> BackendResult<Arc<Self>> {
        let backends = create_backends(&config)?;
        Ok(Arc::new(Self { config, backends }))
    }

    /// State with an explicit backend set, bypassing configuration.
    pub fn with_backends(config: ServerConfig, backends: Backends) -> Arc<Self> {
        Arc::new(Self { config, backends })
    }
}
