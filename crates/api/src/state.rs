//! Shared application state

use std::sync::Arc;

use chatdesk_shared::Store;

use crate::auth::{AuthState, HashProvider, TokenService};
use crate::config::Config;
use crate::services::MessageIngestService;
use crate::websocket::RealtimeGateway;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub hasher: Arc<dyn HashProvider>,
    pub gateway: RealtimeGateway,
    pub ingest: Arc<MessageIngestService>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, hasher: Arc<dyn HashProvider>) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, &config.app_name);
        let gateway = RealtimeGateway::new();
        let ingest = Arc::new(MessageIngestService::new(
            Arc::clone(&store),
            gateway.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            tokens,
            hasher,
            gateway,
            ingest,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            tokens: self.tokens.clone(),
        }
    }
}
