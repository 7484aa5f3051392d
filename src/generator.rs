// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Daily task instance generation.
//!
//! Expands the catalog of active recurring templates across active players
//! into one pending instance per (player, template, day). The
//! (player, template, due_date) uniqueness constraint makes the whole job
//! idempotent: re-running after a crash or duplicate trigger creates
//! nothing new and is never an error.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::Result;
use crate::events::{EngineEvent, EventBus, EventType};
use crate::persistence::{InstanceRecord, InstanceStatus, Persistence};

/// Outcome counts for one generator run, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Instances newly created this run.
    pub created: u64,
    /// (player, template) pairs skipped because the instance already existed.
    pub skipped_existing: u64,
    /// Templates skipped because they are deactivated.
    pub skipped_inactive: u64,
    /// Templates skipped because the weekday flag was not set.
    pub skipped_not_required: u64,
    /// (player, template) pairs skipped due to a `removed` override.
    pub skipped_removed: u64,
}

/// Scheduled job that materializes task instances for a calendar day.
///
/// The only creator of task instance rows; it never updates or deletes
/// existing ones.
pub struct DailyGenerator {
    persistence: Arc<dyn Persistence>,
    events: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
}

impl DailyGenerator {
    /// Create a new daily generator.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        events: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            persistence,
            events,
            clock,
        }
    }

    /// Generate instances for `date`.
    ///
    /// Growth templates never reach this loop (the store filters them);
    /// inactive templates are skipped here so the report can count them.
    /// A `removed` override suppresses one player without affecting the
    /// others. Safe to re-run for the same date.
    #[instrument(skip(self))]
    pub async fn run_for_date(&self, date: NaiveDate) -> Result<GenerationReport> {
        let weekday = date.weekday();
        let templates = self.persistence.list_recurring_templates().await?;
        let players = self.persistence.list_active_players().await?;

        let mut report = GenerationReport::default();
        let now = self.clock.now();

        for template in &templates {
            if !template.active {
                report.skipped_inactive += 1;
                continue;
            }
            if !template.required_on(weekday) {
                report.skipped_not_required += 1;
                continue;
            }

            for player in &players {
                let removed = self
                    .persistence
                    .get_override(&player.player_id, &template.template_id)
                    .await?
                    .map(|o| o.removed)
                    .unwrap_or(false);
                if removed {
                    report.skipped_removed += 1;
                    continue;
                }

                let record = InstanceRecord {
                    instance_id: Uuid::new_v4().to_string(),
                    player_id: player.player_id.clone(),
                    template_id: template.template_id.clone(),
                    title: template.title.clone(),
                    category: template.category.clone(),
                    points: template.points,
                    due_date: date,
                    status: InstanceStatus::Pending.as_str().to_string(),
                    started_at: None,
                    completed_at: None,
                    approved_at: None,
                    points_awarded: 0,
                    created_at: now,
                };

                if self.persistence.insert_instance_if_absent(&record).await? {
                    report.created += 1;
                    self.events.publish(EngineEvent {
                        event_type: EventType::InstanceCreated,
                        player_id: record.player_id.clone(),
                        date,
                        payload: serde_json::json!({
                            "instance_id": record.instance_id,
                            "template_id": record.template_id,
                            "title": record.title,
                        }),
                    });
                } else {
                    debug!(
                        player_id = %player.player_id,
                        template_id = %template.template_id,
                        "Instance already exists, skipping"
                    );
                    report.skipped_existing += 1;
                }
            }
        }

        info!(
            %date,
            created = report.created,
            skipped_existing = report.skipped_existing,
            skipped_inactive = report.skipped_inactive,
            skipped_not_required = report.skipped_not_required,
            skipped_removed = report.skipped_removed,
            "Daily generation finished"
        );

        Ok(report)
    }
}
