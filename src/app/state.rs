//! Application state shared across routes

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::game::RuntimeHandle;

/// A connected world bridge
#[derive(Debug, Clone, Serialize)]
pub struct BridgeSession {
    pub connection_id: Uuid,
    pub name: String,
    pub connected_at: DateTime<Utc>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runtime: RuntimeHandle,
    pub bridges: Arc<DashMap<Uuid, BridgeSession>>,
}

impl AppState {
    pub fn new(config: Config, runtime: RuntimeHandle) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
            bridges: Arc::new(DashMap::new()),
        }
    }

    pub fn bridge_sessions(&self) -> Vec<BridgeSession> {
        let mut sessions: Vec<BridgeSession> =
            self.bridges.iter().map(|entry| entry.value().clone()).collect();
        sessions.sort_by_key(|s| s.connected_at);
        sessions
    }
}
