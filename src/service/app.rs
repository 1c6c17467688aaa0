//! Main application state and service coordination
//!
//! Builds the store, queue engine, matchmaker and gateway from an
//! [`AppConfig`] and owns the background tasks that run them.

use crate::auth::IdentityProvider;
use crate::config::AppConfig;
use crate::gateway::{GatewayServer, GatewayServerConfig, GatewayState};
use crate::matchmaker::{Matchmaker, MatchmakerScheduler};
use crate::metrics::MetricsCollector;
use crate::queue::{EngineContext, QueueEngine};
use crate::service::health::{HealthCheck, HealthStatus};
use crate::store::{InMemoryPlayerStore, PlayerStore, RedisPlayerStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// How often uptime and health gauges are refreshed
const HEALTH_METRICS_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Store connection error: {message}")]
    StoreConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn PlayerStore>,
    engine: QueueEngine,
    matchmaker: Arc<Matchmaker>,
    metrics: Arc<MetricsCollector>,
    gateway: Arc<GatewayServer>,

    /// Stops the scheduler and health task
    shutdown_tx: broadcast::Sender<()>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} matchmaking service", config.service.name);

        let store = Self::initialize_store(&config).await?;
        Self::with_store(config, store)
    }

    /// Initialize around an already constructed store
    pub fn with_store(config: AppConfig, store: Arc<dyn PlayerStore>) -> Result<Self, ServiceError> {
        if config.auth.jwt_secret.is_empty() {
            return Err(ServiceError::Configuration {
                message: "JWT secret is not set".to_string(),
            });
        }

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let context = Arc::new(
            EngineContext::production()
                .with_default_criteria(config.matchmaking.default_criteria.clone())
                .with_player_timeout(config.player_timeout()),
        );
        debug!("Engine context: {:?}", context);

        let engine =
            QueueEngine::new(store.clone(), context.clone()).with_metrics(metrics.clone());
        let matchmaker = Arc::new(
            Matchmaker::new(store.clone(), context).with_metrics(metrics.clone()),
        );
        let identity = Arc::new(IdentityProvider::new(
            &config.auth.jwt_secret,
            config.auth.player_id_salt.clone(),
            config.token_ttl(),
        ));

        let gateway_state = GatewayState {
            engine: engine.clone(),
            identity,
            matchmaker: matchmaker.clone(),
            store: store.clone(),
            metrics: metrics.clone(),
            service_name: config.service.name.clone(),
            scheduler_interval: config.matchmaker_interval(),
        };
        let gateway = Arc::new(GatewayServer::new(
            GatewayServerConfig {
                port: config.service.port,
                ..GatewayServerConfig::default()
            },
            gateway_state,
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            store,
            engine,
            matchmaker,
            metrics,
            gateway,
            shutdown_tx,
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start the gateway, the matchmaker and the health task
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} matchmaking service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_gateway();
        self.start_matchmaker();
        self.start_health_metrics();

        info!(
            "Service started: gateway on port {}, matchmaker every {}ms",
            self.config.service.port, self.config.matchmaking.interval_ms
        );
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        *self.is_running.write().await = false;

        if self.shutdown_tx.send(()).is_err() {
            debug!("No background task was listening for shutdown");
        }
        self.gateway.stop();

        self.stop_background_tasks().await;

        info!("Shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn engine(&self) -> &QueueEngine {
        &self.engine
    }

    pub fn matchmaker(&self) -> Arc<Matchmaker> {
        self.matchmaker.clone()
    }

    pub fn store(&self) -> Arc<dyn PlayerStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    async fn initialize_store(config: &AppConfig) -> Result<Arc<dyn PlayerStore>, ServiceError> {
        match &config.store.redis_url {
            Some(url) => {
                let store =
                    RedisPlayerStore::connect(url, &config.store.collection, config.store_ttl())
                        .await
                        .map_err(|e| ServiceError::StoreConnection {
                            message: format!("Failed to connect to Redis: {}", e),
                        })?;
                info!(
                    "Using Redis player store (collection '{}')",
                    config.store.collection
                );
                Ok(Arc::new(store))
            }
            None => {
                info!("No REDIS_URL set, using in-memory player store");
                Ok(Arc::new(InMemoryPlayerStore::with_ttl(config.store_ttl())))
            }
        }
    }

    fn start_gateway(&mut self) {
        let gateway = self.gateway.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = gateway.start().await {
                error!("Gateway failed: {:#}", e);
            }
        });
        self.background_tasks.push(handle);
    }

    fn start_matchmaker(&mut self) {
        let scheduler =
            MatchmakerScheduler::new(self.matchmaker.clone(), self.config.matchmaker_interval());
        let handle = scheduler.spawn(self.shutdown_tx.subscribe());
        self.background_tasks.push(handle);
    }

    fn start_health_metrics(&mut self) {
        let metrics = self.metrics.clone();
        let store = self.store.clone();
        let matchmaker = self.matchmaker.clone();
        let interval = self.config.matchmaker_interval();
        let service_name = self.config.service.name.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_METRICS_INTERVAL);
            let start_time = tokio::time::Instant::now();
            info!("Health metrics task started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        metrics
                            .service()
                            .uptime_seconds
                            .set(start_time.elapsed().as_secs() as i64);

                        let health =
                            HealthCheck::check(&service_name, store.as_ref(), &matchmaker, interval)
                                .await;
                        metrics.update_health_status(health.status.as_gauge());
                        for check in &health.checks {
                            metrics.update_component_health(
                                &check.name,
                                check.status != HealthStatus::Unhealthy,
                            );
                        }
                        debug!("Updated health metrics: {}", health.status);
                    }
                    _ = shutdown.recv() => break,
                }
            }

            info!("Health metrics task stopped");
        });
        self.background_tasks.push(handle);
    }

    /// Wait for background tasks, aborting any still running after the timeout
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout();

        for (i, mut task) in self.background_tasks.drain(..).enumerate() {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => debug!("Background task {}/{} finished", i + 1, task_count),
                Ok(Err(e)) => warn!("Background task {}/{} failed: {}", i + 1, task_count, e),
                Err(_) => {
                    warn!(
                        "Background task {}/{} did not stop in time, aborting",
                        i + 1,
                        task_count
                    );
                    task.abort();
                }
            }
        }

        info!("All {} background tasks stopped", task_count);
    }
}
