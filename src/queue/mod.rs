//! Queue engine for the matchmaking service
//!
//! Players enter with `join`, keep their place alive with `poll` and leave
//! with `drop`. Pairing happens elsewhere, in the matchmaker sweep.

pub mod context;
pub mod engine;

pub use context::{
    Clock, EngineContext, ManualClock, MatchIdGenerator, MonotonicClock, SequentialMatchIds,
    UuidMatchIds,
};
pub use engine::{QueueEngine, QueueStatus};
