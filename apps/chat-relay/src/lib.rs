pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::hub::BroadcastHub;
use gateway::origin::OriginGate;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<OriginGate>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let gate = OriginGate::new(config.allowed_origins.clone());
        Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
            hub: Arc::new(BroadcastHub::new()),
        }
    }
}
