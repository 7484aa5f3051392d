// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for chorecore integration tests.
//!
//! Provides TestContext wiring an in-memory SQLite store, a manual clock
//! and an observable event bus behind the engine components.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use chorecore::catalog::{Catalog, NewTemplate};
use chorecore::clock::{Clock, ManualClock};
use chorecore::events::BroadcastBus;
use chorecore::generator::DailyGenerator;
use chorecore::lifecycle::LifecycleManager;
use chorecore::migrations;
use chorecore::persistence::{
    Persistence, PlayerRecord, SqlitePersistence, TaskCategory, TemplateRecord,
};
use chorecore::scoring::ScoreAggregator;
use chorecore::weekly::WeeklyReset;

/// All tests run in UTC so calendar dates equal the clock's UTC dates.
pub const TEST_TZ: chrono_tz::Tz = chrono_tz::UTC;

/// Monday 2025-03-10, 08:00 UTC. An unremarkable school-day morning.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

/// Test context wiring all engine components over one in-memory database.
pub struct TestContext {
    pub persistence: Arc<dyn Persistence>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<BroadcastBus>,
    pub lifecycle: LifecycleManager,
    pub generator: DailyGenerator,
    pub catalog: Catalog,
    pub aggregator: ScoreAggregator,
    pub weekly: WeeklyReset,
}

impl TestContext {
    /// Create a new test context with the clock frozen at `start`.
    ///
    /// Uses a single-connection in-memory SQLite pool: every query sees the
    /// same database, and the pool keeps the connection (and with it the
    /// database) alive for the context's lifetime.
    pub async fn new_at(start: DateTime<Utc>) -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("connect to in-memory sqlite");
        migrations::run_sqlite(&pool).await.expect("run migrations");

        let persistence: Arc<dyn Persistence> = Arc::new(SqlitePersistence::new(pool));
        let clock = Arc::new(ManualClock::new(start));
        let events = Arc::new(BroadcastBus::default());

        let lifecycle = LifecycleManager::new(
            persistence.clone(),
            events.clone(),
            clock.clone(),
            TEST_TZ,
        );
        let generator =
            DailyGenerator::new(persistence.clone(), events.clone(), clock.clone());
        let catalog = Catalog::new(persistence.clone(), clock.clone());
        let aggregator = ScoreAggregator::new(persistence.clone());
        let weekly = WeeklyReset::new(persistence.clone(), clock.clone());

        Self {
            persistence,
            clock,
            events,
            lifecycle,
            generator,
            catalog,
            aggregator,
            weekly,
        }
    }

    /// Create a new test context frozen at [`monday_morning`].
    pub async fn new() -> Self {
        Self::new_at(monday_morning()).await
    }

    /// Insert a player directly, returning its id.
    pub async fn add_player(&self, display_name: &str, is_admin: bool) -> String {
        let record = PlayerRecord {
            player_id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            is_admin,
            active: true,
            created_at: self.clock.now(),
        };
        self.persistence
            .create_player(&record)
            .await
            .expect("create player");
        record.player_id
    }

    /// Insert a recurring template required every day, returning its id.
    pub async fn add_daily_template(
        &self,
        title: &str,
        category: TaskCategory,
        points: i64,
    ) -> String {
        self.add_template(title, category, points, [true; 7]).await
    }

    /// Insert a recurring template with explicit weekday flags (Sunday
    /// first), returning its id.
    pub async fn add_template(
        &self,
        title: &str,
        category: TaskCategory,
        points: i64,
        required_days: [bool; 7],
    ) -> String {
        let record = self
            .catalog
            .add_template(NewTemplate {
                title: title.to_string(),
                category,
                points,
                display_order: 0,
                required_days,
                created_by: None,
            })
            .await
            .expect("create template");
        record.template_id
    }

    /// Insert a growth template, returning its id.
    pub async fn add_growth_template(&self, title: &str, points: i64) -> String {
        self.add_template(title, TaskCategory::Growth, points, [false; 7])
            .await
    }

    /// Fetch a template by id.
    pub async fn template(&self, template_id: &str) -> TemplateRecord {
        self.persistence
            .get_template(template_id)
            .await
            .expect("get template")
            .expect("template exists")
    }

    /// Run the generator for the clock's current UTC date and return the
    /// instance id for (player, template), which must have been created.
    pub async fn generate_instance_for(&self, player_id: &str, template_id: &str) -> String {
        let date = self.clock.now().date_naive();
        self.generator
            .run_for_date(date)
            .await
            .expect("generator run");
        self.instance_for(player_id, template_id).await
    }

    /// Find the instance id for (player, template) on the clock's current
    /// UTC date.
    pub async fn instance_for(&self, player_id: &str, template_id: &str) -> String {
        let date = self.clock.now().date_naive();
        let instances = self
            .persistence
            .list_instances_for_day(player_id, date)
            .await
            .expect("list instances");
        instances
            .into_iter()
            .find(|i| i.template_id == template_id)
            .expect("instance exists for player/template")
            .instance_id
    }
}
