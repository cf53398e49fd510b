use anyhow::{Context, Result};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::order::{OrderPolicy, OrderStatus};
use crate::domain::vehicle::AlertThresholds;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read once at startup from the environment (a `.env` file is loaded first
// when present). Unset variables fall back to defaults; set but malformed
// variables fail startup.
//
// ============================================================================

pub const ENV_DATABASE_URL: &str = "LOGISTICS_DATABASE_URL";
pub const ENV_HTTP_ADDR: &str = "LOGISTICS_HTTP_ADDR";
pub const ENV_DB_MAX_CONNECTIONS: &str = "LOGISTICS_DB_MAX_CONNECTIONS";
pub const ENV_MAINTENANCE_SCAN_SECS: &str = "LOGISTICS_MAINTENANCE_SCAN_SECS";
pub const ENV_MAINTENANCE_WINDOW_DAYS: &str = "LOGISTICS_MAINTENANCE_WINDOW_DAYS";
pub const ENV_LOW_FUEL_THRESHOLD: &str = "LOGISTICS_LOW_FUEL_THRESHOLD";
pub const ENV_SERVICE_MILEAGE_KM: &str = "LOGISTICS_SERVICE_MILEAGE_KM";
pub const ENV_NOTIFY_ORDER_STATUSES: &str = "LOGISTICS_NOTIFY_ORDER_STATUSES";
pub const ENV_CHANNEL_CAPACITY: &str = "LOGISTICS_CHANNEL_CAPACITY";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres URL. `None` runs on the in-process memory store.
    pub database_url: Option<String>,
    pub http_addr: SocketAddr,
    pub db_max_connections: u32,
    /// `None` disables the periodic maintenance scan.
    pub maintenance_scan_interval: Option<Duration>,
    pub thresholds: AlertThresholds,
    pub notify_order_statuses: HashSet<OrderStatus>,
    /// Per-topic and per-client live buffer.
    pub channel_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AlertThresholds::default();

        let scan_secs: u64 = parse_or(&get, ENV_MAINTENANCE_SCAN_SECS, 86_400)?;

        let notify_order_statuses = match get(ENV_NOTIFY_ORDER_STATUSES) {
            Some(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<OrderStatus>().map_err(anyhow::Error::msg))
                .collect::<Result<HashSet<_>>>()
                .with_context(|| format!("invalid {}", ENV_NOTIFY_ORDER_STATUSES))?,
            None => OrderPolicy::default().notify_statuses,
        };

        let config = Self {
            database_url: get(ENV_DATABASE_URL),
            http_addr: parse_or(&get, ENV_HTTP_ADDR, SocketAddr::from(([0, 0, 0, 0], 3001)))?,
            db_max_connections: parse_or(&get, ENV_DB_MAX_CONNECTIONS, 10)?,
            maintenance_scan_interval: (scan_secs > 0).then(|| Duration::from_secs(scan_secs)),
            thresholds: AlertThresholds {
                low_fuel: parse_or(&get, ENV_LOW_FUEL_THRESHOLD, defaults.low_fuel)?,
                service_mileage_km: parse_or(&get, ENV_SERVICE_MILEAGE_KM, defaults.service_mileage_km)?,
                maintenance_window_days: parse_or(
                    &get,
                    ENV_MAINTENANCE_WINDOW_DAYS,
                    defaults.maintenance_window_days,
                )?,
            },
            notify_order_statuses,
            channel_capacity: parse_or(&get, ENV_CHANNEL_CAPACITY, 1024)?,
        };

        if config.channel_capacity == 0 {
            anyhow::bail!("{} must be greater than zero", ENV_CHANNEL_CAPACITY);
        }
        if !(0..=100).contains(&config.thresholds.low_fuel) {
            anyhow::bail!("{} must be within 0..=100", ENV_LOW_FUEL_THRESHOLD);
        }

        Ok(config)
    }

    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            notify_statuses: self.notify_order_statuses.clone(),
            ..OrderPolicy::default()
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.http_addr.port(), 3001);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.maintenance_scan_interval, Some(Duration::from_secs(86_400)));
        assert_eq!(config.thresholds, AlertThresholds::default());
        assert_eq!(config.channel_capacity, 1024);
        assert_eq!(config.notify_order_statuses.len(), 3);
        assert!(config.notify_order_statuses.contains(&OrderStatus::Delivered));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (ENV_DATABASE_URL, "postgres://localhost/logistics"),
            (ENV_HTTP_ADDR, "127.0.0.1:8080"),
            (ENV_MAINTENANCE_SCAN_SECS, "0"),
            (ENV_LOW_FUEL_THRESHOLD, "30"),
            (ENV_NOTIFY_ORDER_STATUSES, "shipped, delivered"),
        ])
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/logistics"));
        assert_eq!(config.http_addr.port(), 8080);
        assert!(config.maintenance_scan_interval.is_none());
        assert_eq!(config.thresholds.low_fuel, 30);
        assert_eq!(
            config.order_policy().notify_statuses,
            [OrderStatus::Shipped, OrderStatus::Delivered].into_iter().collect()
        );
    }

    #[test]
    fn test_malformed_values_fail() {
        assert!(load(&[(ENV_DB_MAX_CONNECTIONS, "many")]).is_err());
        assert!(load(&[(ENV_NOTIFY_ORDER_STATUSES, "delivered,lost")]).is_err());
        assert!(load(&[(ENV_CHANNEL_CAPACITY, "0")]).is_err());
        assert!(load(&[(ENV_LOW_FUEL_THRESHOLD, "150")]).is_err());
    }

    #[test]
    fn test_blank_database_url_means_memory_store() {
        assert!(load(&[(ENV_DATABASE_URL, "  ")]).unwrap().database_url.is_none());
    }
}
