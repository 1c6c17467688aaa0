//! Metrics and monitoring for the matchmaking queue
//!
//! Queue operation counters, sweep outcomes and timings, exported through
//! the gateway's `/metrics` endpoint.

pub mod collector;

pub use collector::{
    MatchmakerMetrics, MetricsCollector, QueueMetrics, ServiceMetrics,
};
