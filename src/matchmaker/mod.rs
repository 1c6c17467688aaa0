//! Background matchmaking
//!
//! The sweep pairs compatible players and evicts idle ones. The scheduler
//! runs it on a fixed interval.

pub mod scheduler;
pub mod sweep;

#[cfg(test)]
mod test_support;

pub use scheduler::MatchmakerScheduler;
pub use sweep::{order_for_sweep, Matchmaker, TickOutcome, TickReport};
