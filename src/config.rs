use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::{DispatchSettings, ScheduleClock, ScheduleRunnerConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL; reports are kept in memory when unset
    pub database_url: Option<String>,
    /// Maximum database connections in pool
    pub database_max_connections: u32,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Base URL that share links point at
    pub public_base_url: String,
    /// Default lifetime of a shared report in days (default: 30)
    pub share_ttl_days: u32,
    /// Upper bound on a single mail send in seconds (default: 10)
    pub mail_timeout_secs: u64,
    /// Sender address used in outbound mail
    pub mail_from: String,
    /// Seconds between passes over due schedules (default: 60)
    pub schedule_poll_secs: u64,
    pub schedule_runner_enabled: bool,
    /// Local offset used to place scheduled run times, in minutes east of UTC
    pub schedule_utc_offset_minutes: i32,
    /// Local hour at which scheduled reports go out (default: 9)
    pub schedule_delivery_hour: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = parse_or(&lookup, "PORT", 8080)?;

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let share_ttl_days = parse_or(&lookup, "SHARE_TTL_DAYS", 30)?;
        if share_ttl_days == 0 {
            return Err(ConfigError::InvalidValue("SHARE_TTL_DAYS"));
        }

        let mail_timeout_secs = parse_or(&lookup, "MAIL_TIMEOUT_SECS", 10)?;

        let mail_from = lookup("MAIL_FROM").unwrap_or_else(|| {
            "AI Sentiment Tracker <noreply@sentimenttracker.com>".to_string()
        });

        let schedule_poll_secs = parse_or(&lookup, "SCHEDULE_POLL_SECS", 60)?;
        if schedule_poll_secs == 0 {
            return Err(ConfigError::InvalidValue("SCHEDULE_POLL_SECS"));
        }

        let schedule_runner_enabled = parse_or(&lookup, "SCHEDULE_RUNNER_ENABLED", true)?;

        let schedule_utc_offset_minutes = parse_or(&lookup, "SCHEDULE_UTC_OFFSET_MINUTES", 0)?;

        let schedule_delivery_hour = parse_or(&lookup, "SCHEDULE_DELIVERY_HOUR", 9)?;

        let config = Self {
            database_url,
            database_max_connections,
            host,
            port,
            public_base_url,
            share_ttl_days,
            mail_timeout_secs,
            mail_from,
            schedule_poll_secs,
            schedule_runner_enabled,
            schedule_utc_offset_minutes,
            schedule_delivery_hour,
        };

        // Rejects offsets past +/-24h and hours past 23
        config.schedule_clock()?;

        Ok(config)
    }

    pub fn schedule_clock(&self) -> Result<ScheduleClock, ConfigError> {
        ScheduleClock::new(self.schedule_utc_offset_minutes, self.schedule_delivery_hour).ok_or(
            if self.schedule_delivery_hour > 23 {
                ConfigError::InvalidValue("SCHEDULE_DELIVERY_HOUR")
            } else {
                ConfigError::InvalidValue("SCHEDULE_UTC_OFFSET_MINUTES")
            },
        )
    }

    pub fn dispatch_settings(&self) -> Result<DispatchSettings, ConfigError> {
        Ok(DispatchSettings {
            public_base_url: self.public_base_url.clone(),
            mail_timeout: Duration::from_secs(self.mail_timeout_secs),
            share_ttl: chrono::Duration::days(i64::from(self.share_ttl_days)),
            clock: self.schedule_clock()?,
        })
    }

    pub fn schedule_runner(&self) -> ScheduleRunnerConfig {
        ScheduleRunnerConfig {
            interval: Duration::from_secs(self.schedule_poll_secs),
            enabled: self.schedule_runner_enabled,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert_eq!(config.share_ttl_days, 30);
        assert_eq!(config.mail_timeout_secs, 10);
        assert_eq!(config.schedule_poll_secs, 60);
        assert!(config.schedule_runner_enabled);
        assert_eq!(config.schedule_clock().unwrap(), ScheduleClock::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/reports"),
            ("PORT", "9000"),
            ("PUBLIC_BASE_URL", "https://reports.example.com/"),
            ("SCHEDULE_RUNNER_ENABLED", "false"),
            ("SCHEDULE_UTC_OFFSET_MINUTES", "-300"),
            ("SCHEDULE_DELIVERY_HOUR", "7"),
        ])
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/reports"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.public_base_url, "https://reports.example.com");
        assert!(!config.schedule_runner().enabled);

        let clock = config.schedule_clock().unwrap();
        assert_eq!(clock.offset.local_minus_utc(), -300 * 60);
        assert_eq!(clock.delivery_hour, 7);
    }

    #[test]
    fn test_blank_database_url_means_in_memory() {
        let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("PORT", "http"),
            ("SHARE_TTL_DAYS", "0"),
            ("SCHEDULE_POLL_SECS", "0"),
            ("SCHEDULE_RUNNER_ENABLED", "maybe"),
            ("SCHEDULE_DELIVERY_HOUR", "24"),
            ("SCHEDULE_UTC_OFFSET_MINUTES", "1500"),
        ] {
            match config_from(&[(key, value)]) {
                Err(ConfigError::InvalidValue(name)) => assert_eq!(name, key),
                other => panic!("expected {key}={value} to be rejected, got {other:?}"),
            }
        }
    }
}
