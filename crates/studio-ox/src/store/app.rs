use studio_ox_common::{RequestState, RequestTracker};
use tokio::sync::watch;

use crate::{Studio, response::HealthResponse};

/// Backend health as last observed.
#[derive(Debug)]
pub struct AppStore {
    client: Studio,
    health: Option<HealthResponse>,
    loading: RequestTracker,
}

impl AppStore {
    pub fn new(client: Studio) -> Self {
        Self {
            client,
            health: None,
            loading: RequestTracker::new(),
        }
    }

    pub fn health(&self) -> Option<&HealthResponse> {
        self.health.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.loading.error()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.loading.subscribe()
    }

    /// Refresh [`Self::health`]; it is cleared when the check fails.
    pub async fn check_health(&mut self) -> Option<&HealthResponse> {
        self.health = self.loading.run(self.client.health()).await;
        match &self.health {
            Some(health) => log::debug!("backend health: {}", health.status),
            None => log::warn!("health check failed"),
        }
        self.health.as_ref()
    }
}
