//! Application state.

use std::sync::Arc;

use egg_credit_store::Store;

use crate::config::{ConfigError, ServiceConfig};
use crate::ledger::{Ledger, LedgerSettings};
use crate::portkey::{CostProvider, PortkeyClient};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger engine.
    pub ledger: Arc<Ledger>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create the application state with the Portkey cost provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the Portkey
    /// client cannot be built.
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let portkey = PortkeyClient::from_config(&config)?;
        tracing::info!(
            workspace = %config.portkey_workspace_slug,
            window_start = %config.portkey_window_start,
            "Portkey cost provider enabled"
        );
        Ok(Self::with_components(store, Arc::new(portkey), config))
    }

    /// Create the application state from explicit components.
    #[must_use]
    pub fn with_components(
        store: Arc<dyn Store>,
        costs: Arc<dyn CostProvider>,
        config: ServiceConfig,
    ) -> Self {
        let ledger = Ledger::new(store, costs, LedgerSettings::from(&config));
        Self {
            ledger: Arc::new(ledger),
            config,
        }
    }
}
