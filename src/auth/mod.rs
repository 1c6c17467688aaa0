//! Player authentication

pub mod identity;

pub use identity::{Claims, IdentityProvider, LoginGrant, DEFAULT_TOKEN_TTL};
