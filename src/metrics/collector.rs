//! Prometheus metrics for the queue, the matchmaker and the service
//!
//! This module provides metrics for queue operations and matchmaker sweeps.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking queue
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Join/poll/drop metrics
    queue_metrics: QueueMetrics,

    /// Sweep metrics
    matchmaker_metrics: MatchmakerMetrics,

    /// Service health metrics
    service_metrics: ServiceMetrics,
}

/// Queue operation metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Queue operations handled, by operation
    pub operations_total: IntCounterVec,

    /// Queue operations that failed, by operation and error kind
    pub operation_errors_total: IntCounterVec,

    /// Players in the queue as of the last sweep
    pub players_in_queue: IntGauge,
}

/// Matchmaker sweep metrics
#[derive(Clone)]
pub struct MatchmakerMetrics {
    /// Sweeps by outcome (completed, skipped, failed)
    pub ticks_total: IntCounterVec,

    /// Pairs formed
    pub matches_total: IntCounter,

    /// Players evicted for inactivity
    pub evictions_total: IntCounter,

    /// Version conflicts met while writing pairs
    pub write_conflicts_total: IntCounter,

    /// Sweep duration
    pub tick_duration: Histogram,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Seconds since the service started
    pub uptime_seconds: IntGauge,

    /// Overall health as reported by the last health check
    pub health_status: IntGauge,

    /// 1 when a component passed its last check, else 0
    pub component_health: IntGaugeVec,
}

impl MetricsCollector {
    /// Collector over a fresh private registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let matchmaker_metrics = MatchmakerMetrics::new(&registry)?;
        let service_metrics = ServiceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            matchmaker_metrics,
            service_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matchmaker(&self) -> &MatchmakerMetrics {
        &self.matchmaker_metrics
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Record a queue operation (join, poll, drop)
    pub fn record_queue_operation(&self, operation: &str) {
        self.queue_metrics
            .operations_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Record a failed queue operation
    pub fn record_queue_error(&self, operation: &str, kind: &str) {
        self.queue_metrics
            .operation_errors_total
            .with_label_values(&[operation, kind])
            .inc();
    }

    /// Record a completed sweep
    pub fn record_tick_completed(
        &self,
        queue_size: usize,
        matches: usize,
        evictions: usize,
        conflicts: usize,
        duration: Duration,
    ) {
        self.matchmaker_metrics
            .ticks_total
            .with_label_values(&["completed"])
            .inc();
        self.matchmaker_metrics.matches_total.inc_by(matches as u64);
        self.matchmaker_metrics
            .evictions_total
            .inc_by(evictions as u64);
        self.matchmaker_metrics
            .write_conflicts_total
            .inc_by(conflicts as u64);
        self.matchmaker_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
        self.queue_metrics.players_in_queue.set(queue_size as i64);
    }

    /// Record a sweep that was skipped because another was still running
    pub fn record_tick_skipped(&self) {
        self.matchmaker_metrics
            .ticks_total
            .with_label_values(&["skipped"])
            .inc();
    }

    /// Record a sweep abandoned on a store failure
    pub fn record_tick_failed(&self, duration: Duration) {
        self.matchmaker_metrics
            .ticks_total
            .with_label_values(&["failed"])
            .inc();
        self.matchmaker_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operations_total = IntCounterVec::new(
            Opts::new(
                "parlor_queue_operations_total",
                "Total queue operations handled",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_errors_total = IntCounterVec::new(
            Opts::new(
                "parlor_queue_operation_errors_total",
                "Total failed queue operations",
            ),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(operation_errors_total.clone()))?;

        let players_in_queue = IntGauge::new(
            "parlor_queue_players_in_queue",
            "Players in the queue at the last sweep",
        )?;
        registry.register(Box::new(players_in_queue.clone()))?;

        Ok(Self {
            operations_total,
            operation_errors_total,
            players_in_queue,
        })
    }
}

impl MatchmakerMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let ticks_total = IntCounterVec::new(
            Opts::new("parlor_queue_ticks_total", "Matchmaker sweeps by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(ticks_total.clone()))?;

        let matches_total = IntCounter::new("parlor_queue_matches_total", "Total pairs formed")?;
        registry.register(Box::new(matches_total.clone()))?;

        let evictions_total = IntCounter::new(
            "parlor_queue_evictions_total",
            "Total players evicted for inactivity",
        )?;
        registry.register(Box::new(evictions_total.clone()))?;

        let write_conflicts_total = IntCounter::new(
            "parlor_queue_write_conflicts_total",
            "Version conflicts met while pairing",
        )?;
        registry.register(Box::new(write_conflicts_total.clone()))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "parlor_queue_tick_duration_seconds",
                "Time spent in one matchmaker sweep",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 3.0, 10.0]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self {
            ticks_total,
            matches_total,
            evictions_total,
            write_conflicts_total,
            tick_duration,
        })
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("parlor_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "parlor_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("parlor_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
