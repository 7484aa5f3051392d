// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

use chrono_tz::Tz;

/// Chorecore engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// Reference timezone for day boundaries and scheduled triggers
    pub timezone: Tz,
    /// Delay between retries of a failed scheduled job
    pub job_retry_backoff: Duration,
    /// Retries per trigger before a job gives up until the next one
    pub job_max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CHORECORE_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `CHORECORE_TIMEZONE`: IANA timezone name (default: UTC)
    /// - `CHORECORE_JOB_RETRY_SECS`: Retry backoff in seconds (default: 60)
    /// - `CHORECORE_JOB_MAX_RETRIES`: Retries per trigger (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("CHORECORE_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("CHORECORE_DATABASE_URL"))?;

        let timezone: Tz = std::env::var("CHORECORE_TIMEZONE")
            .unwrap_or_else(|_| "UTC".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("CHORECORE_TIMEZONE", "must be an IANA timezone name")
            })?;

        let retry_secs: u64 = std::env::var("CHORECORE_JOB_RETRY_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("CHORECORE_JOB_RETRY_SECS", "must be a positive integer")
            })?;

        let job_max_retries: u32 = std::env::var("CHORECORE_JOB_MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("CHORECORE_JOB_MAX_RETRIES", "must be a positive integer")
            })?;

        Ok(Self {
            database_url,
            timezone,
            job_retry_backoff: Duration::from_secs(retry_secs),
            job_max_retries,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
