//! Persistence interfaces and backends for the chorecore engine.
//!
//! The engine owns no in-memory state: every invariant (one instance per
//! player/template/day, at most one growth completion per player/template,
//! one snapshot per player/week) lives in the relational store as a
//! uniqueness constraint, and every lifecycle transition is a guarded
//! single-statement update so concurrent callers race safely.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};

use crate::error::EngineError;

/// Task category a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    /// Recurring morning routine task.
    Morning,
    /// Recurring afternoon task.
    Afternoon,
    /// Recurring bedtime routine task.
    Bedtime,
    /// One-shot growth task, completable at most once per player.
    Growth,
}

impl TaskCategory {
    /// Stable string form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Bedtime => "bedtime",
            Self::Growth => "growth",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "bedtime" => Some(Self::Bedtime),
            "growth" => Some(Self::Growth),
            _ => None,
        }
    }
}

/// Status of a task instance.
///
/// The state machine is strictly forward-only:
/// `pending -> in_progress -> pending_approval -> approved`,
/// with auto-approve collapsing the last two steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Generated, not yet started by the player.
    Pending,
    /// Player has begun the task.
    InProgress,
    /// Player finished; waiting for an administrator.
    PendingApproval,
    /// Approved; points awarded. Terminal.
    Approved,
}

impl InstanceStatus {
    /// Stable string form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

/// Player record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerRecord {
    /// Unique identifier for the player.
    pub player_id: String,
    /// Display name shown on leaderboards.
    pub display_name: String,
    /// Whether the player carries the administrator capability.
    pub is_admin: bool,
    /// Inactive players are skipped by the daily generator.
    pub active: bool,
    /// When the player was created.
    pub created_at: DateTime<Utc>,
}

/// Recurring (or growth) task template from the catalog.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TemplateRecord {
    /// Unique identifier for the template.
    pub template_id: String,
    /// Human-readable task title.
    pub title: String,
    /// Category string (see [`TaskCategory`]).
    pub category: String,
    /// Points awarded on approval, 1-1999.
    pub points: i64,
    /// Display ordering tie-break; not semantically load-bearing.
    pub display_order: i64,
    /// Inactive templates are suppressed catalog-wide.
    pub active: bool,
    /// Required on Sundays.
    pub required_sunday: bool,
    /// Required on Mondays.
    pub required_monday: bool,
    /// Required on Tuesdays.
    pub required_tuesday: bool,
    /// Required on Wednesdays.
    pub required_wednesday: bool,
    /// Required on Thursdays.
    pub required_thursday: bool,
    /// Required on Fridays.
    pub required_friday: bool,
    /// Required on Saturdays.
    pub required_saturday: bool,
    /// Creator reference (administrator player id).
    pub created_by: Option<String>,
    /// When the template was created.
    pub created_at: DateTime<Utc>,
}

impl TemplateRecord {
    /// Whether this template is required on the given weekday.
    ///
    /// Ignored for growth templates, which have no recurrence.
    pub fn required_on(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Sun => self.required_sunday,
            Weekday::Mon => self.required_monday,
            Weekday::Tue => self.required_tuesday,
            Weekday::Wed => self.required_wednesday,
            Weekday::Thu => self.required_thursday,
            Weekday::Fri => self.required_friday,
            Weekday::Sat => self.required_saturday,
        }
    }

    /// The parsed category, if the stored string is valid.
    pub fn task_category(&self) -> Option<TaskCategory> {
        TaskCategory::parse(&self.category)
    }
}

/// Per-(player, template) override.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverrideRecord {
    /// The player the override applies to.
    pub player_id: String,
    /// The template the override applies to.
    pub template_id: String,
    /// Skip administrator approval on completion.
    pub auto_approve: bool,
    /// Suppress future generation for this player only.
    pub removed: bool,
}

/// One concrete task occurrence for one player on one date.
///
/// `title`, `category` and `points` are snapshots taken at generation time;
/// catalog edits never touch them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstanceRecord {
    /// Unique identifier for the instance.
    pub instance_id: String,
    /// The player the instance is assigned to.
    pub player_id: String,
    /// The template the instance was generated from.
    pub template_id: String,
    /// Title snapshot.
    pub title: String,
    /// Category snapshot.
    pub category: String,
    /// Points snapshot; awarded on approval.
    pub points: i64,
    /// The calendar day (reference timezone) the instance belongs to.
    pub due_date: NaiveDate,
    /// Current status (see [`InstanceStatus`]).
    pub status: String,
    /// When the player began the task.
    pub started_at: Option<DateTime<Utc>>,
    /// When the player finished the task.
    pub completed_at: Option<DateTime<Utc>>,
    /// When an administrator (or auto-approve) approved the task.
    pub approved_at: Option<DateTime<Utc>>,
    /// Points awarded; 0 until approved.
    pub points_awarded: i64,
    /// When the generator created the row.
    pub created_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// Server-computed time spent, once both timestamps exist.
    pub fn time_spent(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }
}

/// One-shot growth task completion. Insert-once, never updated or deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GrowthCompletionRecord {
    /// Unique identifier for the completion.
    pub completion_id: String,
    /// The player who completed the task.
    pub player_id: String,
    /// The growth template that was completed.
    pub template_id: String,
    /// Title snapshot taken at completion time.
    pub title: String,
    /// Points snapshot taken at completion time.
    pub points_awarded: i64,
    /// The calendar day (reference timezone) of completion.
    pub completed_date: NaiveDate,
    /// Player-reported time spent, in seconds.
    pub time_spent_seconds: i64,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// Archived weekly leaderboard entry, one per (player, week).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WeeklySnapshotRecord {
    /// The player the snapshot belongs to.
    pub player_id: String,
    /// First day of the snapshotted week.
    pub week_start: NaiveDate,
    /// Total points over the 7 days starting at `week_start`.
    pub total_points: i64,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// Persistence interface used by the lifecycle manager and scheduled jobs.
///
/// Guarded `*_if_*` transition methods return `Ok(false)` when the row was
/// not in the required source state; callers map that to `InvalidTransition`.
/// `insert_*_if_absent` methods swallow uniqueness conflicts and report
/// whether a row was actually written; snapshot writes are upserts instead,
/// so re-archiving a week replaces its totals.
#[allow(missing_docs)]
#[async_trait]
pub trait Persistence: Send + Sync {
    // ========================================================================
    // Players
    // ========================================================================

    async fn create_player(&self, player: &PlayerRecord) -> Result<(), EngineError>;

    async fn get_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, EngineError>;

    async fn list_players(&self) -> Result<Vec<PlayerRecord>, EngineError>;

    async fn list_active_players(&self) -> Result<Vec<PlayerRecord>, EngineError>;

    // ========================================================================
    // Task catalog (templates and per-player overrides)
    // ========================================================================

    async fn create_template(&self, template: &TemplateRecord) -> Result<(), EngineError>;

    async fn get_template(&self, template_id: &str)
    -> Result<Option<TemplateRecord>, EngineError>;

    /// All non-growth templates, the daily generator's input set. The
    /// generator filters (and counts) the inactive ones itself.
    async fn list_recurring_templates(&self) -> Result<Vec<TemplateRecord>, EngineError>;

    /// Returns false if the template does not exist.
    async fn set_template_active(
        &self,
        template_id: &str,
        active: bool,
    ) -> Result<bool, EngineError>;

    /// Catalog-level point edit. Historical instances keep their snapshot.
    /// Returns false if the template does not exist.
    async fn set_template_points(&self, template_id: &str, points: i64)
    -> Result<bool, EngineError>;

    async fn upsert_override(&self, record: &OverrideRecord) -> Result<(), EngineError>;

    async fn get_override(
        &self,
        player_id: &str,
        template_id: &str,
    ) -> Result<Option<OverrideRecord>, EngineError>;

    // ========================================================================
    // Task instances (lifecycle state machine)
    // ========================================================================

    /// Idempotent insert keyed on (player, template, due_date).
    ///
    /// Returns true if a row was created, false if one already existed.
    async fn insert_instance_if_absent(
        &self,
        record: &InstanceRecord,
    ) -> Result<bool, EngineError>;

    async fn get_instance(&self, instance_id: &str)
    -> Result<Option<InstanceRecord>, EngineError>;

    async fn list_instances_for_day(
        &self,
        player_id: &str,
        due_date: NaiveDate,
    ) -> Result<Vec<InstanceRecord>, EngineError>;

    /// `pending -> in_progress`, setting `started_at`. Guarded on status.
    async fn begin_instance_if_pending(
        &self,
        instance_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<bool, EngineError>;

    /// `in_progress -> pending_approval` (or straight to `approved` when
    /// `auto_approve` is set), setting `completed_at`. Guarded on status.
    ///
    /// The auto-approve path awards the points snapshot in the same
    /// statement, so a concurrent admin approval cannot double-award.
    async fn complete_instance_if_in_progress(
        &self,
        instance_id: &str,
        completed_at: DateTime<Utc>,
        auto_approve: bool,
    ) -> Result<bool, EngineError>;

    /// `pending_approval -> approved`, awarding the points snapshot.
    /// Guarded on status.
    async fn approve_instance_if_pending_approval(
        &self,
        instance_id: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, EngineError>;

    /// Sum of `points_awarded` over approved instances in the inclusive
    /// date range.
    async fn sum_approved_points(
        &self,
        player_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64, EngineError>;

    // ========================================================================
    // Growth completions
    // ========================================================================

    /// Insert a completion row, relying on the (player, template) uniqueness
    /// constraint. A unique violation surfaces as `AlreadyCompleted` - that
    /// constraint, not a read-then-write check, is the authoritative signal.
    async fn insert_growth_completion(
        &self,
        record: &GrowthCompletionRecord,
    ) -> Result<(), EngineError>;

    /// Completions for a player, newest completion date first.
    async fn list_growth_completions(
        &self,
        player_id: &str,
    ) -> Result<Vec<GrowthCompletionRecord>, EngineError>;

    /// Active growth templates the player has not completed yet.
    async fn list_available_growth_templates(
        &self,
        player_id: &str,
    ) -> Result<Vec<TemplateRecord>, EngineError>;

    /// Sum of `points_awarded` over completions in the inclusive date range.
    async fn sum_growth_points(
        &self,
        player_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64, EngineError>;

    // ========================================================================
    // Weekly score snapshots
    // ========================================================================

    /// Insert or refresh the snapshot keyed on (player, week_start).
    ///
    /// An existing row is overwritten with the new totals, so a later run
    /// can reconcile points earned after an earlier archival pass.
    async fn upsert_weekly_snapshot(
        &self,
        record: &WeeklySnapshotRecord,
    ) -> Result<(), EngineError>;

    /// Snapshots for a player, newest week first.
    async fn list_weekly_snapshots(
        &self,
        player_id: &str,
    ) -> Result<Vec<WeeklySnapshotRecord>, EngineError>;

    // ========================================================================
    // Health
    // ========================================================================

    async fn health_check_db(&self) -> Result<bool, EngineError>;
}

/// Map a sqlx error to the engine error space, translating a unique
/// violation on the growth completion insert into `AlreadyCompleted`.
pub(crate) fn growth_insert_error(
    err: sqlx::Error,
    player_id: &str,
    template_id: &str,
) -> EngineError {
    if let sqlx::Error::Database(ref db) = err
        && db.is_unique_violation()
    {
        return EngineError::AlreadyCompleted {
            player_id: player_id.to_string(),
            template_id: template_id.to_string(),
        };
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for category in [
            TaskCategory::Morning,
            TaskCategory::Afternoon,
            TaskCategory::Bedtime,
            TaskCategory::Growth,
        ] {
            assert_eq!(TaskCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(TaskCategory::parse("evening"), None);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            InstanceStatus::Pending,
            InstanceStatus::InProgress,
            InstanceStatus::PendingApproval,
            InstanceStatus::Approved,
        ] {
            assert_eq!(InstanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InstanceStatus::parse("done"), None);
    }

    #[test]
    fn test_required_on_maps_weekday_flags() {
        let template = TemplateRecord {
            template_id: "tpl-1".to_string(),
            title: "Brush Teeth".to_string(),
            category: "morning".to_string(),
            points: 150,
            display_order: 0,
            active: true,
            required_sunday: false,
            required_monday: true,
            required_tuesday: true,
            required_wednesday: true,
            required_thursday: true,
            required_friday: true,
            required_saturday: false,
            created_by: None,
            created_at: Utc::now(),
        };

        assert!(!template.required_on(Weekday::Sun));
        assert!(template.required_on(Weekday::Mon));
        assert!(template.required_on(Weekday::Fri));
        assert!(!template.required_on(Weekday::Sat));
    }
}
