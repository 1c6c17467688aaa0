use crate::auth::IdentityProvider;
use crate::matchmaker::Matchmaker;
use crate::metrics::MetricsCollector;
use crate::queue::QueueEngine;
use crate::store::PlayerStore;
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every route
#[derive(Clone)]
pub struct GatewayState {
    pub engine: QueueEngine,
    pub identity: Arc<IdentityProvider>,
    pub matchmaker: Arc<Matchmaker>,
    pub store: Arc<dyn PlayerStore>,
    pub metrics: Arc<MetricsCollector>,
    pub service_name: String,
    /// Matchmaker interval, used to judge sweep staleness in `/health`
    pub scheduler_interval: Duration,
}
