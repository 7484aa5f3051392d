// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task instance lifecycle operations.
//!
//! Drives the per-instance state machine
//! (`pending -> in_progress -> pending_approval -> approved`) and the
//! once-ever growth completions. Every transition is a guarded
//! compare-and-swap in the store: a request that loses a race observes
//! `rows_affected == 0` and fails with `InvalidTransition` instead of
//! silently overwriting.
//!
//! All timing is server-authoritative. The only client-reported duration is
//! `time_spent_seconds` on growth tasks, which has no scoring effect.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventBus, EventType};
use crate::persistence::{
    GrowthCompletionRecord, InstanceRecord, InstanceStatus, Persistence, TaskCategory,
    TemplateRecord,
};

/// An authenticated caller, as supplied by the (external) session layer.
///
/// Administrators are players with a capability flag, not a separate
/// resource type; an admin completing their own chores acts as a player.
#[derive(Debug, Clone)]
pub struct Actor {
    /// The player identity of the caller.
    pub player_id: String,
    /// Whether the caller carries the administrator capability.
    pub is_admin: bool,
}

impl Actor {
    /// A plain player actor.
    pub fn player(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            is_admin: false,
        }
    }

    /// An administrator actor.
    pub fn admin(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            is_admin: true,
        }
    }
}

/// Lifecycle manager for task instances and growth completions.
///
/// The sole writer of status/timestamp fields on task instances and the
/// sole creator of growth completion rows.
pub struct LifecycleManager {
    persistence: Arc<dyn Persistence>,
    events: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl LifecycleManager {
    /// Create a new lifecycle manager.
    ///
    /// `timezone` is the fixed reference timezone used to derive calendar
    /// days (growth completion dates, event dates) from instants.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        events: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            persistence,
            events,
            clock,
            timezone,
        }
    }

    /// The calendar day of `instant` in the reference timezone.
    fn local_date_now(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.timezone).date_naive()
    }

    // ========================================================================
    // Recurring task transitions
    // ========================================================================

    /// Begin a pending task instance.
    ///
    /// Valid only from `pending`; sets `started_at` to the server clock.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the instance does not exist
    /// - `Forbidden` if the actor is not the instance's player
    /// - `InvalidTransition` if the instance is not `pending` (including a
    ///   concurrent caller winning the race)
    #[instrument(skip(self, actor), fields(actor = %actor.player_id))]
    pub async fn begin(&self, instance_id: &str, actor: &Actor) -> Result<InstanceRecord> {
        // 1. The instance must exist and belong to the actor.
        let instance = self.require_instance(instance_id).await?;
        if instance.player_id != actor.player_id {
            return Err(EngineError::Forbidden {
                actor: actor.player_id.clone(),
                reason: format!("instance '{}' belongs to another player", instance_id),
            });
        }

        // 2. Guarded pending -> in_progress swap.
        let started_at = self.clock.now();
        let applied = self
            .persistence
            .begin_instance_if_pending(instance_id, started_at)
            .await?;
        if !applied {
            return Err(self.invalid_transition(instance_id, InstanceStatus::Pending).await);
        }

        info!(instance_id, "Task begun");
        self.require_instance(instance_id).await
    }

    /// Complete an in-progress task instance.
    ///
    /// Valid only from `in_progress`; sets `completed_at` to the server
    /// clock, so the recorded time spent is `completed_at - started_at`
    /// regardless of anything the client claims. If the player's override
    /// has auto-approve, the instance moves straight to `approved` with
    /// points awarded and a score-changed event, exactly as [`Self::approve`]
    /// would do.
    #[instrument(skip(self, actor), fields(actor = %actor.player_id))]
    pub async fn complete(&self, instance_id: &str, actor: &Actor) -> Result<InstanceRecord> {
        // 1. The instance must exist and belong to the actor.
        let instance = self.require_instance(instance_id).await?;
        if instance.player_id != actor.player_id {
            return Err(EngineError::Forbidden {
                actor: actor.player_id.clone(),
                reason: format!("instance '{}' belongs to another player", instance_id),
            });
        }

        // 2. Auto-approve comes from the (player, template) override.
        let auto_approve = self
            .persistence
            .get_override(&instance.player_id, &instance.template_id)
            .await?
            .map(|o| o.auto_approve)
            .unwrap_or(false);

        // 3. Guarded in_progress -> pending_approval/approved swap.
        let completed_at = self.clock.now();
        let applied = self
            .persistence
            .complete_instance_if_in_progress(instance_id, completed_at, auto_approve)
            .await?;
        if !applied {
            return Err(self
                .invalid_transition(instance_id, InstanceStatus::InProgress)
                .await);
        }

        let updated = self.require_instance(instance_id).await?;
        let time_spent_secs = updated.time_spent().map(|d| d.num_seconds()).unwrap_or(0);
        info!(
            instance_id,
            auto_approve,
            time_spent_secs,
            status = %updated.status,
            "Task completed"
        );

        // 4. Auto-approve awards points, so the score changed.
        if auto_approve {
            self.publish_score_changed(
                &updated.player_id,
                updated.due_date,
                serde_json::json!({
                    "instance_id": updated.instance_id,
                    "points_awarded": updated.points_awarded,
                }),
            );
        }

        Ok(updated)
    }

    /// Approve a completed task instance, awarding its snapshotted points.
    ///
    /// Valid only from `pending_approval`; requires the administrator
    /// capability. `points_awarded` comes from the instance's own snapshot,
    /// immune to any catalog edits since generation.
    #[instrument(skip(self, actor), fields(actor = %actor.player_id))]
    pub async fn approve(&self, instance_id: &str, actor: &Actor) -> Result<InstanceRecord> {
        // 1. Capability check before anything else.
        if !actor.is_admin {
            return Err(EngineError::Forbidden {
                actor: actor.player_id.clone(),
                reason: "approval requires the administrator capability".to_string(),
            });
        }

        // 2. The instance must exist.
        self.require_instance(instance_id).await?;

        // 3. Guarded pending_approval -> approved swap.
        let approved_at = self.clock.now();
        let applied = self
            .persistence
            .approve_instance_if_pending_approval(instance_id, approved_at)
            .await?;
        if !applied {
            return Err(self
                .invalid_transition(instance_id, InstanceStatus::PendingApproval)
                .await);
        }

        let updated = self.require_instance(instance_id).await?;
        info!(
            instance_id,
            points_awarded = updated.points_awarded,
            "Task approved"
        );

        self.publish_score_changed(
            &updated.player_id,
            updated.due_date,
            serde_json::json!({
                "instance_id": updated.instance_id,
                "points_awarded": updated.points_awarded,
            }),
        );

        Ok(updated)
    }

    // ========================================================================
    // Growth tasks
    // ========================================================================

    /// Complete a growth task for a player, at most once ever.
    ///
    /// There is no status machine here: the insert relies on the
    /// (player, template) uniqueness constraint, and a violation - including
    /// the loser of a concurrent race - surfaces as `AlreadyCompleted`.
    /// Points are snapshotted from the template at completion time.
    #[instrument(skip(self, actor), fields(actor = %actor.player_id))]
    pub async fn complete_growth_task(
        &self,
        player_id: &str,
        template_id: &str,
        time_spent_seconds: i64,
        actor: &Actor,
    ) -> Result<GrowthCompletionRecord> {
        // 1. Players complete their own growth tasks; admins may record one
        //    on a player's behalf.
        if !actor.is_admin && actor.player_id != player_id {
            return Err(EngineError::Forbidden {
                actor: actor.player_id.clone(),
                reason: format!("cannot complete a growth task for player '{}'", player_id),
            });
        }

        if time_spent_seconds < 0 {
            return Err(EngineError::Validation {
                field: "time_spent_seconds",
                message: "must not be negative".to_string(),
            });
        }

        // 2. The player and the growth template must exist.
        if self.persistence.get_player(player_id).await?.is_none() {
            return Err(EngineError::NotFound {
                entity: "player",
                id: player_id.to_string(),
            });
        }
        let template = self
            .persistence
            .get_template(template_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "template",
                id: template_id.to_string(),
            })?;
        if template.task_category() != Some(TaskCategory::Growth) {
            return Err(EngineError::Validation {
                field: "template_id",
                message: format!("template '{}' is not a growth task", template_id),
            });
        }

        // 3. Insert-once; the uniqueness constraint is the arbiter.
        let now = self.clock.now();
        let completed_date = self.local_date_now();
        let record = GrowthCompletionRecord {
            completion_id: Uuid::new_v4().to_string(),
            player_id: player_id.to_string(),
            template_id: template_id.to_string(),
            title: template.title.clone(),
            points_awarded: template.points,
            completed_date,
            time_spent_seconds,
            created_at: now,
        };
        self.persistence.insert_growth_completion(&record).await?;

        info!(
            player_id,
            template_id,
            points_awarded = record.points_awarded,
            "Growth task completed"
        );

        self.publish_score_changed(
            player_id,
            completed_date,
            serde_json::json!({
                "template_id": template_id,
                "points_awarded": record.points_awarded,
            }),
        );

        Ok(record)
    }

    /// Growth templates the player can still complete.
    pub async fn available_growth_tasks(&self, player_id: &str) -> Result<Vec<TemplateRecord>> {
        self.persistence
            .list_available_growth_templates(player_id)
            .await
    }

    /// The player's recorded growth completions, newest first.
    pub async fn accomplishments(
        &self,
        player_id: &str,
    ) -> Result<Vec<GrowthCompletionRecord>> {
        self.persistence.list_growth_completions(player_id).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require_instance(&self, instance_id: &str) -> Result<InstanceRecord> {
        self.persistence
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "instance",
                id: instance_id.to_string(),
            })
    }

    /// Build the `InvalidTransition` error for a lost guarded update,
    /// re-reading the row for the actual status.
    async fn invalid_transition(
        &self,
        instance_id: &str,
        expected: InstanceStatus,
    ) -> EngineError {
        let actual = match self.persistence.get_instance(instance_id).await {
            Ok(Some(instance)) => instance.status,
            // The row existed moments ago; report the state as unknown
            // rather than masking the transition failure.
            Ok(None) | Err(_) => "unknown".to_string(),
        };
        debug!(instance_id, expected = expected.as_str(), %actual, "Transition rejected");
        EngineError::InvalidTransition {
            instance_id: instance_id.to_string(),
            expected: expected.as_str(),
            actual,
        }
    }

    fn publish_score_changed(
        &self,
        player_id: &str,
        date: NaiveDate,
        payload: serde_json::Value,
    ) {
        self.events.publish(EngineEvent {
            event_type: EventType::ScoreChanged,
            player_id: player_id.to_string(),
            date,
            payload,
        });
    }
}
