//! Shared application state threaded through every request handler

use std::sync::Arc;

use crate::auth::AuthClient;
use crate::config::Config;
use crate::game::RoomRegistry;
use crate::store::{DocumentClient, StatsStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthClient,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let auth = AuthClient::new(config.auth_verify_url.clone(), config.auth_api_key.clone());
        let stats_store = StatsStore::new(DocumentClient::new(
            config.store_url.clone(),
            config.store_api_key.clone(),
        ));
        Self {
            config: Arc::new(config),
            auth,
            rooms: Arc::new(RoomRegistry::new(stats_store)),
        }
    }
}
