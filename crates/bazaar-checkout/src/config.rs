//! # Checkout Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BAZAAR_DATABASE_PATH=/var/lib/bazaar/bazaar.db                     │
//! │     BAZAAR_REDIS_URL=redis://127.0.0.1:6379                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/checkout/checkout.toml (Linux)                           │
//! │     ~/Library/Application Support/com.bazaar.checkout/checkout.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "bazaar.db"
//! max_connections = 5
//!
//! [lock]
//! enabled = true
//! redis_url = "redis://127.0.0.1:6379"   # omit for the in-process store
//! key_prefix = "checkout:lock"
//! retries = 10
//! retry_interval_ms = 50
//! ttl_ms = 3000
//!
//! [reservation]
//! ttl_secs = 900
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::lock::LockSettings;
use crate::stock::DEFAULT_RESERVATION_TTL_SECS;
use bazaar_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; `:memory:` for a throwaway database.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("bazaar.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Lock Settings
// =============================================================================

/// Product lock settings.
///
/// Without `redis_url` locks live in process memory, which only coordinates
/// checkouts running in this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Acquire attempts before reporting contention.
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Lifetime of a lock key if its holder never releases it.
    #[serde(default = "default_lock_ttl")]
    pub ttl_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_key_prefix() -> String {
    "checkout:lock".to_string()
}

fn default_retries() -> u32 {
    10
}

fn default_retry_interval() -> u64 {
    50
}

fn default_lock_ttl() -> u64 {
    3000
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            enabled: true,
            redis_url: None,
            key_prefix: default_key_prefix(),
            retries: default_retries(),
            retry_interval_ms: default_retry_interval(),
            ttl_ms: default_lock_ttl(),
        }
    }
}

// =============================================================================
// Reservation Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationSettings {
    /// How long reserved stock stays held before the sweep may reclaim it.
    #[serde(default = "default_reservation_ttl")]
    pub ttl_secs: i64,
}

/// Longest allowed reservation hold (7 days).
pub const MAX_RESERVATION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

fn default_reservation_ttl() -> i64 {
    DEFAULT_RESERVATION_TTL_SECS
}

impl Default for ReservationSettings {
    fn default() -> Self {
        ReservationSettings {
            ttl_secs: default_reservation_ttl(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub reservation: ReservationSettings,
}

impl CheckoutConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (checkout.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading checkout config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load checkout config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!(?path, "Checkout config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }

        if self.lock.retries == 0 {
            return Err(ConfigError::Invalid("lock.retries must be at least 1".into()));
        }

        if self.lock.ttl_ms == 0 {
            return Err(ConfigError::Invalid("lock.ttl_ms must be greater than 0".into()));
        }

        // A lock that expires between two attempts can never be waited out
        if self.lock.ttl_ms <= self.lock.retry_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "lock.ttl_ms ({}) must exceed lock.retry_interval_ms ({})",
                self.lock.ttl_ms, self.lock.retry_interval_ms
            )));
        }

        if let Some(url) = &self.lock.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::Invalid(format!(
                    "lock.redis_url must start with redis:// or rediss://, got: {}",
                    url
                )));
            }
        }

        if self.reservation.ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "reservation.ttl_secs must be greater than 0".into(),
            ));
        }

        if self.reservation.ttl_secs > MAX_RESERVATION_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "reservation.ttl_secs ({}) must not exceed {}",
                self.reservation.ttl_secs, MAX_RESERVATION_TTL_SECS
            )));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `BAZAAR_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BAZAAR_DATABASE_PATH") {
            debug!(%path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(url) = lookup("BAZAAR_REDIS_URL") {
            debug!("Overriding Redis URL from environment");
            self.lock.redis_url = if url.is_empty() { None } else { Some(url) };
        }

        if let Some(enabled) = lookup("BAZAAR_LOCK_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.lock.enabled = true,
                "0" | "false" | "no" | "off" => self.lock.enabled = false,
                _ => warn!(value = %enabled, "Unknown BAZAAR_LOCK_ENABLED value"),
            }
        }

        override_number(&lookup, "BAZAAR_LOCK_RETRIES", &mut self.lock.retries);
        override_number(
            &lookup,
            "BAZAAR_LOCK_RETRY_INTERVAL_MS",
            &mut self.lock.retry_interval_ms,
        );
        override_number(&lookup, "BAZAAR_LOCK_TTL_MS", &mut self.lock.ttl_ms);
        override_number(
            &lookup,
            "BAZAAR_RESERVATION_TTL_SECS",
            &mut self.reservation.ttl_secs,
        );
    }

    /// `checkout.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bazaar", "checkout")
            .map(|dirs| dirs.config_dir().join("checkout.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        if self.database.path == Path::new(":memory:") {
            return DbConfig::in_memory();
        }
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            key_prefix: self.lock.key_prefix.clone(),
            max_attempts: self.lock.retries,
            retry_interval: Duration::from_millis(self.lock.retry_interval_ms),
            ttl: Duration::from_millis(self.lock.ttl_ms),
        }
    }

    /// Hold duration for new reservations, clamped to
    /// `1..=MAX_RESERVATION_TTL_SECS` for configs built without `validate()`.
    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reservation.ttl_secs.clamp(1, MAX_RESERVATION_TTL_SECS))
    }
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(name) {
        match raw.trim().parse() {
            Ok(value) => {
                debug!(name, value = %raw, "Overriding from environment");
                *target = value;
            }
            Err(_) => warn!(name, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CheckoutConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.lock.enabled);
        assert!(config.lock.redis_url.is_none());

        let settings = config.lock_settings();
        assert_eq!(settings.key_prefix, "checkout:lock");
        assert_eq!(settings.max_attempts, 10);
        assert_eq!(settings.retry_interval, Duration::from_millis(50));
        assert_eq!(settings.ttl, Duration::from_millis(3000));
        assert_eq!(config.reservation_ttl(), chrono::Duration::minutes(15));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: CheckoutConfig = toml::from_str(
            r#"
            [lock]
            redis_url = "redis://127.0.0.1:6379"
            retries = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.lock.retries, 3);
        assert_eq!(config.lock.ttl_ms, 3000);
        assert_eq!(config.database.path, PathBuf::from("bazaar.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CheckoutConfig::default();
        config.apply_overrides(env(&[
            ("BAZAAR_DATABASE_PATH", "/tmp/checkout.db"),
            ("BAZAAR_LOCK_ENABLED", "off"),
            ("BAZAAR_LOCK_RETRIES", "4"),
            ("BAZAAR_LOCK_TTL_MS", "not-a-number"),
            ("BAZAAR_RESERVATION_TTL_SECS", "60"),
        ]));

        assert_eq!(config.database.path, PathBuf::from("/tmp/checkout.db"));
        assert!(!config.lock.enabled);
        assert_eq!(config.lock.retries, 4);
        // Bad value ignored
        assert_eq!(config.lock.ttl_ms, 3000);
        assert_eq!(config.reservation.ttl_secs, 60);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CheckoutConfig::default();

        config.lock.retries = 0;
        assert!(config.validate().is_err());
        config.lock.retries = 10;

        config.lock.ttl_ms = 50;
        assert!(config.validate().is_err());
        config.lock.ttl_ms = 3000;

        config.lock.redis_url = Some("http://cache:6379".into());
        assert!(config.validate().is_err());
        config.lock.redis_url = Some("redis://cache:6379".into());
        assert!(config.validate().is_ok());

        config.reservation.ttl_secs = 0;
        assert!(config.validate().is_err());
        config.reservation.ttl_secs = i64::MAX;
        assert!(config.validate().is_err());
        config.reservation.ttl_secs = MAX_RESERVATION_TTL_SECS;
        assert!(config.validate().is_ok());
        config.reservation.ttl_secs = 900;

        config.database.max_connections = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_reservation_ttl_never_overflows() {
        let mut config = CheckoutConfig::default();
        assert_eq!(config.reservation_ttl(), chrono::Duration::seconds(900));

        config.reservation.ttl_secs = i64::MAX;
        let ttl = config.reservation_ttl();
        assert_eq!(ttl, chrono::Duration::seconds(MAX_RESERVATION_TTL_SECS));
        assert!(chrono::Utc::now().checked_add_signed(ttl).is_some());
    }

    #[test]
    fn test_memory_path_uses_single_connection() {
        let mut config = CheckoutConfig::default();
        config.database.path = PathBuf::from(":memory:");
        assert_eq!(config.db_config().max_connections, 1);

        config.database.path = PathBuf::from("shop.db");
        config.database.max_connections = 8;
        assert_eq!(config.db_config().max_connections, 8);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&CheckoutConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[lock]"));
        assert!(toml_str.contains("[reservation]"));
    }
}
