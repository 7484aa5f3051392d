// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Catalog administration: players, task templates and per-player overrides.
//!
//! Catalog edits only shape the future. Generated instances carry their own
//! title/points snapshots, so deactivating a template or changing its points
//! never rewrites history.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::persistence::{
    InstanceRecord, OverrideRecord, Persistence, PlayerRecord, TaskCategory, TemplateRecord,
    WeeklySnapshotRecord,
};

/// Highest points value a template may carry.
pub const MAX_TEMPLATE_POINTS: i64 = 1999;

/// Input for creating a task template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    /// Human-readable task title.
    pub title: String,
    /// Task category.
    pub category: TaskCategory,
    /// Points awarded on approval, 1-1999.
    pub points: i64,
    /// Display ordering tie-break.
    pub display_order: i64,
    /// Weekday recurrence flags, Sunday first. All false for growth tasks.
    pub required_days: [bool; 7],
    /// Creating administrator, if known.
    pub created_by: Option<String>,
}

/// Administrative surface over the task catalog.
pub struct Catalog {
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
}

impl Catalog {
    /// Create a new catalog handle.
    pub fn new(persistence: Arc<dyn Persistence>, clock: Arc<dyn Clock>) -> Self {
        Self { persistence, clock }
    }

    /// Register a player.
    #[instrument(skip(self))]
    pub async fn add_player(
        &self,
        display_name: &str,
        is_admin: bool,
    ) -> Result<PlayerRecord> {
        if display_name.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "display_name",
                message: "must not be empty".to_string(),
            });
        }

        let record = PlayerRecord {
            player_id: Uuid::new_v4().to_string(),
            display_name: display_name.trim().to_string(),
            is_admin,
            active: true,
            created_at: self.clock.now(),
        };
        self.persistence.create_player(&record).await?;
        info!(player_id = %record.player_id, "Player created");
        Ok(record)
    }

    /// Create a task template.
    ///
    /// Growth templates ignore the weekday flags; the generator never picks
    /// them up regardless.
    #[instrument(skip(self, template), fields(title = %template.title))]
    pub async fn add_template(&self, template: NewTemplate) -> Result<TemplateRecord> {
        if template.title.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "title",
                message: "must not be empty".to_string(),
            });
        }
        if template.points < 1 || template.points > MAX_TEMPLATE_POINTS {
            return Err(EngineError::Validation {
                field: "points",
                message: format!("must be between 1 and {}", MAX_TEMPLATE_POINTS),
            });
        }

        let [sun, mon, tue, wed, thu, fri, sat] = template.required_days;
        let record = TemplateRecord {
            template_id: Uuid::new_v4().to_string(),
            title: template.title.trim().to_string(),
            category: template.category.as_str().to_string(),
            points: template.points,
            display_order: template.display_order,
            active: true,
            required_sunday: sun,
            required_monday: mon,
            required_tuesday: tue,
            required_wednesday: wed,
            required_thursday: thu,
            required_friday: fri,
            required_saturday: sat,
            created_by: template.created_by,
            created_at: self.clock.now(),
        };
        self.persistence.create_template(&record).await?;
        info!(template_id = %record.template_id, "Template created");
        Ok(record)
    }

    /// Deactivate a template catalog-wide.
    ///
    /// Stops future generation for everyone; already-generated instances
    /// keep flowing through their lifecycle.
    #[instrument(skip(self))]
    pub async fn deactivate_template(&self, template_id: &str) -> Result<()> {
        if !self.persistence.set_template_active(template_id, false).await? {
            return Err(EngineError::NotFound {
                entity: "template",
                id: template_id.to_string(),
            });
        }
        info!(template_id, "Template deactivated");
        Ok(())
    }

    /// Reactivate a template.
    #[instrument(skip(self))]
    pub async fn reactivate_template(&self, template_id: &str) -> Result<()> {
        if !self.persistence.set_template_active(template_id, true).await? {
            return Err(EngineError::NotFound {
                entity: "template",
                id: template_id.to_string(),
            });
        }
        info!(template_id, "Template reactivated");
        Ok(())
    }

    /// Change a template's points going forward.
    ///
    /// Instances generated before the edit keep their snapshot.
    #[instrument(skip(self))]
    pub async fn set_template_points(&self, template_id: &str, points: i64) -> Result<()> {
        if points < 1 || points > MAX_TEMPLATE_POINTS {
            return Err(EngineError::Validation {
                field: "points",
                message: format!("must be between 1 and {}", MAX_TEMPLATE_POINTS),
            });
        }
        if !self.persistence.set_template_points(template_id, points).await? {
            return Err(EngineError::NotFound {
                entity: "template",
                id: template_id.to_string(),
            });
        }
        info!(template_id, points, "Template points changed");
        Ok(())
    }

    /// Set (or replace) the per-player override for a template.
    ///
    /// `removed` suppresses future generation for this player only;
    /// `auto_approve` skips the administrator step on completion.
    #[instrument(skip(self))]
    pub async fn set_override(
        &self,
        player_id: &str,
        template_id: &str,
        auto_approve: bool,
        removed: bool,
    ) -> Result<()> {
        if self.persistence.get_player(player_id).await?.is_none() {
            return Err(EngineError::NotFound {
                entity: "player",
                id: player_id.to_string(),
            });
        }
        if self.persistence.get_template(template_id).await?.is_none() {
            return Err(EngineError::NotFound {
                entity: "template",
                id: template_id.to_string(),
            });
        }

        let record = OverrideRecord {
            player_id: player_id.to_string(),
            template_id: template_id.to_string(),
            auto_approve,
            removed,
        };
        self.persistence.upsert_override(&record).await?;
        info!(player_id, template_id, auto_approve, removed, "Override set");
        Ok(())
    }

    /// All registered players.
    pub async fn players(&self) -> Result<Vec<PlayerRecord>> {
        self.persistence.list_players().await
    }

    /// A player's task instances for one calendar day.
    pub async fn day_view(
        &self,
        player_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<InstanceRecord>> {
        self.persistence.list_instances_for_day(player_id, date).await
    }

    /// A player's archived weekly totals, newest week first.
    pub async fn weekly_history(&self, player_id: &str) -> Result<Vec<WeeklySnapshotRecord>> {
        self.persistence.list_weekly_snapshots(player_id).await
    }
}
