//! HTTP gateway
//!
//! Authenticates callers and forwards `/queue/*` requests to the queue
//! engine. Also serves `/login`, `/status`, `/health` and `/metrics`.

pub mod extract;
pub mod handlers;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod state;

pub use extract::AuthenticatedPlayer;
pub use routes::router;
pub use server::{GatewayServer, GatewayServerConfig};
pub use state::GatewayState;
