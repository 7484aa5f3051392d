// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Chorecore - Task Lifecycle & Scheduling Engine
//!
//! The engine process is responsible for:
//! - Generating task instances at every local midnight
//! - Archiving weekly leaderboard snapshots at Saturday midnight
//!
//! Lifecycle operations (begin/complete/approve) are invoked by the
//! embedding API layer through the library; this binary only runs the
//! scheduled jobs.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use chorecore::clock::{Clock, SystemClock};
use chorecore::config::Config;
use chorecore::events::BroadcastBus;
use chorecore::generator::DailyGenerator;
use chorecore::migrations;
use chorecore::persistence::{Persistence, PostgresPersistence, SqlitePersistence};
use chorecore::scheduler::{JobScheduler, JobSchedulerConfig};
use chorecore::weekly::WeeklyReset;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chorecore=info".parse()?),
        )
        .init();

    info!("Starting Chorecore engine");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        timezone = %config.timezone,
        retry_backoff_secs = config.job_retry_backoff.as_secs(),
        "Configuration loaded"
    );

    // Connect to database and run migrations
    info!("Connecting to database...");
    let persistence: Arc<dyn Persistence> = if config.database_url.starts_with("sqlite") {
        Arc::new(SqlitePersistence::from_url(&config.database_url).await?)
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;
        info!("Running database migrations...");
        migrations::run_postgres(&pool).await?;
        Arc::new(PostgresPersistence::new(pool))
    };
    info!("Database connection established");

    persistence.health_check_db().await?;
    info!("Database health check passed");

    // Build the scheduled jobs
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = Arc::new(BroadcastBus::default());
    let generator = Arc::new(DailyGenerator::new(
        persistence.clone(),
        events.clone(),
        clock.clone(),
    ));
    let weekly = Arc::new(WeeklyReset::new(persistence.clone(), clock.clone()));

    let scheduler = JobScheduler::new(
        generator,
        weekly,
        clock,
        JobSchedulerConfig {
            timezone: config.timezone,
            retry_backoff: config.job_retry_backoff,
            max_retries: config.job_max_retries,
        },
    );
    let shutdown = scheduler.shutdown_handle();

    info!("Chorecore engine initialized successfully");

    let scheduler_handle = tokio::spawn(scheduler.run());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // notify_one stores a permit, so the signal is not lost if the
    // scheduler is mid-job rather than parked on its timer.
    shutdown.notify_one();
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task error: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
