//! Main application configuration
//!
//! Defaults, optional TOML file, then environment variables. CLI overrides
//! are applied by the binary on top of the result.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub auth: AuthSettings,
    pub matchmaking: MatchmakingSettings,
    pub store: StoreSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and health reports
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// HTTP port for the gateway
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Token signing and player id derivation
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub player_id_salt: String,
    pub token_ttl_seconds: u64,
}

/// Matchmaker timing and defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Sweep interval in milliseconds
    pub interval_ms: u64,
    /// Idle time after which an unmatched player is evicted, in milliseconds
    pub player_timeout_ms: u64,
    /// Criteria used when a join does not name one
    pub default_criteria: String,
}

/// Player store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Redis connection URL; the in-memory store is used when unset
    pub redis_url: Option<String>,
    /// Name of the collection holding player records
    pub collection: String,
    /// Collection expiry, refreshed on every queue operation
    pub ttl_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "parlor-queue".to_string(),
            log_level: "info".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            player_id_salt: String::new(),
            token_ttl_seconds: 24 * 60 * 60,
        }
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("player_id_salt", &"<redacted>")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            player_timeout_ms: 60_000,
            default_criteria: crate::types::DEFAULT_CRITERIA.to_string(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            collection: "players".to_string(),
            ttl_seconds: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment variables on top
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Override fields from variables found through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = lookup("PORT") {
            self.service.port = parse_var("PORT", &port)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Auth settings
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(salt) = lookup("PLAYER_ID_SALT") {
            self.auth.player_id_salt = salt;
        }
        if let Some(ttl) = lookup("TOKEN_TTL_SECONDS") {
            self.auth.token_ttl_seconds = parse_var("TOKEN_TTL_SECONDS", &ttl)?;
        }

        // Matchmaking settings
        if let Some(interval) = lookup("MATCHMAKER_INTERVAL") {
            self.matchmaking.interval_ms = parse_var("MATCHMAKER_INTERVAL", &interval)?;
        }
        if let Some(timeout) = lookup("PLAYER_TIMEOUT") {
            self.matchmaking.player_timeout_ms = parse_var("PLAYER_TIMEOUT", &timeout)?;
        }
        if let Some(criteria) = lookup("DEFAULT_CRITERIA") {
            self.matchmaking.default_criteria = criteria;
        }

        // Store settings
        if let Some(url) = lookup("REDIS_URL").filter(|url| !url.is_empty()) {
            self.store.redis_url = Some(url);
        }
        if let Some(collection) = lookup("STORE_COLLECTION") {
            self.store.collection = collection;
        }
        if let Some(ttl) = lookup("STORE_TTL_SECONDS") {
            self.store.ttl_seconds = parse_var("STORE_TTL_SECONDS", &ttl)?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    pub fn matchmaker_interval(&self) -> Duration {
        Duration::from_millis(self.matchmaking.interval_ms)
    }

    pub fn player_timeout(&self) -> Duration {
        Duration::from_millis(self.matchmaking.player_timeout_ms)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_seconds)
    }

    pub fn store_ttl(&self) -> Duration {
        Duration::from_secs(self.store.ttl_seconds)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.port == 0 {
        return Err(anyhow!("Port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.auth.jwt_secret.is_empty() {
        return Err(anyhow!("JWT secret cannot be empty (set JWT_SECRET)"));
    }
    if config.auth.token_ttl_seconds == 0 {
        return Err(anyhow!("Token lifetime must be greater than 0"));
    }

    if config.matchmaking.interval_ms == 0 {
        return Err(anyhow!("Matchmaker interval must be greater than 0"));
    }
    if config.matchmaking.player_timeout_ms == 0 {
        return Err(anyhow!("Player timeout must be greater than 0"));
    }

    if config.store.collection.is_empty() {
        return Err(anyhow!("Store collection name cannot be empty"));
    }
    if config.store.ttl_seconds == 0 {
        return Err(anyhow!("Store TTL must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "secret".to_string();
        config
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.service.port, 8080);
        assert_eq!(config.matchmaker_interval(), Duration::from_millis(3_000));
        assert_eq!(config.player_timeout(), Duration::from_millis(60_000));
        assert_eq!(config.matchmaking.default_criteria, "default");
        assert_eq!(config.store.collection, "players");
        assert_eq!(config.store_ttl(), Duration::from_secs(60));
        assert_eq!(config.token_ttl(), Duration::from_secs(86_400));
        assert!(config.store.redis_url.is_none());
    }

    #[test]
    fn test_default_config_needs_a_secret() {
        assert!(validate_config(&AppConfig::default()).is_err());
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("JWT_SECRET", "s3cret"),
                ("PORT", "9000"),
                ("MATCHMAKER_INTERVAL", "500"),
                ("PLAYER_TIMEOUT", "10000"),
                ("REDIS_URL", "redis://cache:6379"),
                ("DEFAULT_CRITERIA", "casual"),
            ]))
            .unwrap();

        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.service.port, 9000);
        assert_eq!(config.matchmaking.interval_ms, 500);
        assert_eq!(config.matchmaking.player_timeout_ms, 10_000);
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.matchmaking.default_criteria, "casual");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup_from(&[("MATCHMAKER_INTERVAL", "soon")]))
            .unwrap_err();

        assert!(err.to_string().contains("MATCHMAKER_INTERVAL"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = valid_config();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.matchmaking.interval_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.matchmaking.player_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.store.collection.clear();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.store.ttl_seconds = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.service.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [matchmaking]
            interval_ms = 1000

            [store]
            redis_url = "redis://localhost:6379"
            "#,
        )
        .unwrap();

        assert_eq!(config.matchmaking.interval_ms, 1_000);
        assert_eq!(config.matchmaking.player_timeout_ms, 60_000);
        assert_eq!(config.store.collection, "players");
        assert_eq!(config.service.name, "parlor-queue");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut config = valid_config();
        config.auth.jwt_secret = "hunter2".to_string();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
