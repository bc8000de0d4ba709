use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use common::auth::{Authenticator, IdentityProvider};
use common::bootstrap::Services;
use common::config::Settings;
use common::storage::{PageStore, UserStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub users: Arc<dyn UserStore>,
    pub pages: Arc<dyn PageStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub authenticator: Arc<Authenticator>,
    /// Absent when no Prometheus recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(config: Settings, services: Services, metrics: Option<PrometheusHandle>) -> Self {
        let authenticator = Authenticator::new(
            services.verifier.clone(),
            services.identity.clone(),
            services.users.clone(),
        );

        Self {
            config: Arc::new(config),
            users: services.users,
            pages: services.pages,
            identity: services.identity,
            authenticator: Arc::new(authenticator),
            metrics,
        }
    }
}
