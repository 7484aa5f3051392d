//! SQLite-backed persistence implementation.
//!
//! SQLite is the embedded deployment target and the test backend; the SQL
//! mirrors the PostgreSQL implementation with `?` placeholders and integer
//! booleans.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::EngineError;
use crate::migrations;

use super::{
    GrowthCompletionRecord, InstanceRecord, OverrideRecord, Persistence, PlayerRecord,
    TemplateRecord, WeeklySnapshotRecord, growth_insert_error,
};

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    ///
    /// The caller is responsible for running migrations
    /// (see [`crate::migrations::run_sqlite`]).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// Creates parent directories and the database file if needed, connects
    /// with sensible defaults, and runs all migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::Database {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::from_url(&url).await
    }

    /// Create and initialize a new SQLite persistence from a connection URL.
    pub async fn from_url(url: &str) -> Result<Self, EngineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| EngineError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at '{}': {}", url, e),
            })?;

        migrations::SQLITE
            .run(&pool)
            .await
            .map_err(|e| EngineError::Database {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn create_player(&self, player: &PlayerRecord) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO players (player_id, display_name, is_admin, active, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&player.player_id)
        .bind(&player.display_name)
        .bind(player.is_admin)
        .bind(player.active)
        .bind(player.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, EngineError> {
        let record = sqlx::query_as::<_, PlayerRecord>(
            r#"
            SELECT player_id, display_name, is_admin, active, created_at
            FROM players
            WHERE player_id = ?
            "#,
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_players(&self) -> Result<Vec<PlayerRecord>, EngineError> {
        let rows = sqlx::query_as::<_, PlayerRecord>(
            r#"
            SELECT player_id, display_name, is_admin, active, created_at
            FROM players
            ORDER BY display_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_active_players(&self) -> Result<Vec<PlayerRecord>, EngineError> {
        let rows = sqlx::query_as::<_, PlayerRecord>(
            r#"
            SELECT player_id, display_name, is_admin, active, created_at
            FROM players
            WHERE active = 1
            ORDER BY display_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn create_template(&self, template: &TemplateRecord) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO task_templates (
                template_id, title, category, points, display_order, active,
                required_sunday, required_monday, required_tuesday, required_wednesday,
                required_thursday, required_friday, required_saturday,
                created_by, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.template_id)
        .bind(&template.title)
        .bind(&template.category)
        .bind(template.points)
        .bind(template.display_order)
        .bind(template.active)
        .bind(template.required_sunday)
        .bind(template.required_monday)
        .bind(template.required_tuesday)
        .bind(template.required_wednesday)
        .bind(template.required_thursday)
        .bind(template.required_friday)
        .bind(template.required_saturday)
        .bind(&template.created_by)
        .bind(template.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<TemplateRecord>, EngineError> {
        let record = sqlx::query_as::<_, TemplateRecord>(
            r#"
            SELECT template_id, title, category, points, display_order, active,
                   required_sunday, required_monday, required_tuesday, required_wednesday,
                   required_thursday, required_friday, required_saturday,
                   created_by, created_at
            FROM task_templates
            WHERE template_id = ?
            "#,
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_recurring_templates(&self) -> Result<Vec<TemplateRecord>, EngineError> {
        let rows = sqlx::query_as::<_, TemplateRecord>(
            r#"
            SELECT template_id, title, category, points, display_order, active,
                   required_sunday, required_monday, required_tuesday, required_wednesday,
                   required_thursday, required_friday, required_saturday,
                   created_by, created_at
            FROM task_templates
            WHERE category != 'growth'
            ORDER BY display_order, title
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn set_template_active(
        &self,
        template_id: &str,
        active: bool,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE task_templates
            SET active = ?
            WHERE template_id = ?
            "#,
        )
        .bind(active)
        .bind(template_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_template_points(
        &self,
        template_id: &str,
        points: i64,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE task_templates
            SET points = ?
            WHERE template_id = ?
            "#,
        )
        .bind(points)
        .bind(template_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_override(&self, record: &OverrideRecord) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO player_task_overrides (player_id, template_id, auto_approve, removed)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (player_id, template_id)
            DO UPDATE SET auto_approve = excluded.auto_approve, removed = excluded.removed
            "#,
        )
        .bind(&record.player_id)
        .bind(&record.template_id)
        .bind(record.auto_approve)
        .bind(record.removed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_override(
        &self,
        player_id: &str,
        template_id: &str,
    ) -> Result<Option<OverrideRecord>, EngineError> {
        let record = sqlx::query_as::<_, OverrideRecord>(
            r#"
            SELECT player_id, template_id, auto_approve, removed
            FROM player_task_overrides
            WHERE player_id = ? AND template_id = ?
            "#,
        )
        .bind(player_id)
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_instance_if_absent(
        &self,
        record: &InstanceRecord,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r#"
            INSERT INTO task_instances (
                instance_id, player_id, template_id, title, category, points,
                due_date, status, points_awarded, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            ON CONFLICT (player_id, template_id, due_date) DO NOTHING
            "#,
        )
        .bind(&record.instance_id)
        .bind(&record.player_id)
        .bind(&record.template_id)
        .bind(&record.title)
        .bind(&record.category)
        .bind(record.points)
        .bind(record.due_date)
        .bind(&record.status)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>, EngineError> {
        let record = sqlx::query_as::<_, InstanceRecord>(
            r#"
            SELECT instance_id, player_id, template_id, title, category, points,
                   due_date, status, started_at, completed_at, approved_at,
                   points_awarded, created_at
            FROM task_instances
            WHERE instance_id = ?
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_instances_for_day(
        &self,
        player_id: &str,
        due_date: NaiveDate,
    ) -> Result<Vec<InstanceRecord>, EngineError> {
        let rows = sqlx::query_as::<_, InstanceRecord>(
            r#"
            SELECT instance_id, player_id, template_id, title, category, points,
                   due_date, status, started_at, completed_at, approved_at,
                   points_awarded, created_at
            FROM task_instances
            WHERE player_id = ? AND due_date = ?
            ORDER BY category, title
            "#,
        )
        .bind(player_id)
        .bind(due_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn begin_instance_if_pending(
        &self,
        instance_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE task_instances
            SET status = 'in_progress', started_at = ?
            WHERE instance_id = ? AND status = 'pending'
            "#,
        )
        .bind(started_at)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete_instance_if_in_progress(
        &self,
        instance_id: &str,
        completed_at: DateTime<Utc>,
        auto_approve: bool,
    ) -> Result<bool, EngineError> {
        let result = if auto_approve {
            sqlx::query(
                r#"
                UPDATE task_instances
                SET status = 'approved',
                    completed_at = ?1,
                    approved_at = ?1,
                    points_awarded = points
                WHERE instance_id = ?2 AND status = 'in_progress'
                "#,
            )
            .bind(completed_at)
            .bind(instance_id)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE task_instances
                SET status = 'pending_approval', completed_at = ?
                WHERE instance_id = ? AND status = 'in_progress'
                "#,
            )
            .bind(completed_at)
            .bind(instance_id)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    async fn approve_instance_if_pending_approval(
        &self,
        instance_id: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE task_instances
            SET status = 'approved', approved_at = ?, points_awarded = points
            WHERE instance_id = ? AND status = 'pending_approval'
            "#,
        )
        .bind(approved_at)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn sum_approved_points(
        &self,
        player_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64, EngineError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(points_awarded), 0)
            FROM task_instances
            WHERE player_id = ? AND due_date >= ? AND due_date <= ?
              AND status = 'approved'
            "#,
        )
        .bind(player_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn insert_growth_completion(
        &self,
        record: &GrowthCompletionRecord,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO growth_completions (
                completion_id, player_id, template_id, title, points_awarded,
                completed_date, time_spent_seconds, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.completion_id)
        .bind(&record.player_id)
        .bind(&record.template_id)
        .bind(&record.title)
        .bind(record.points_awarded)
        .bind(record.completed_date)
        .bind(record.time_spent_seconds)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| growth_insert_error(e, &record.player_id, &record.template_id))?;

        Ok(())
    }

    async fn list_growth_completions(
        &self,
        player_id: &str,
    ) -> Result<Vec<GrowthCompletionRecord>, EngineError> {
        let rows = sqlx::query_as::<_, GrowthCompletionRecord>(
            r#"
            SELECT completion_id, player_id, template_id, title, points_awarded,
                   completed_date, time_spent_seconds, created_at
            FROM growth_completions
            WHERE player_id = ?
            ORDER BY completed_date DESC, created_at DESC
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_available_growth_templates(
        &self,
        player_id: &str,
    ) -> Result<Vec<TemplateRecord>, EngineError> {
        let rows = sqlx::query_as::<_, TemplateRecord>(
            r#"
            SELECT t.template_id, t.title, t.category, t.points, t.display_order, t.active,
                   t.required_sunday, t.required_monday, t.required_tuesday, t.required_wednesday,
                   t.required_thursday, t.required_friday, t.required_saturday,
                   t.created_by, t.created_at
            FROM task_templates t
            WHERE t.category = 'growth' AND t.active = 1
              AND NOT EXISTS (
                  SELECT 1 FROM growth_completions g
                  WHERE g.template_id = t.template_id AND g.player_id = ?
              )
            ORDER BY t.display_order, t.title
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn sum_growth_points(
        &self,
        player_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64, EngineError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(points_awarded), 0)
            FROM growth_completions
            WHERE player_id = ? AND completed_date >= ? AND completed_date <= ?
            "#,
        )
        .bind(player_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn upsert_weekly_snapshot(
        &self,
        record: &WeeklySnapshotRecord,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO weekly_score_snapshots (player_id, week_start, total_points, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (player_id, week_start)
            DO UPDATE SET total_points = excluded.total_points,
                          created_at = excluded.created_at
            "#,
        )
        .bind(&record.player_id)
        .bind(record.week_start)
        .bind(record.total_points)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_weekly_snapshots(
        &self,
        player_id: &str,
    ) -> Result<Vec<WeeklySnapshotRecord>, EngineError> {
        let rows = sqlx::query_as::<_, WeeklySnapshotRecord>(
            r#"
            SELECT player_id, week_start, total_points, created_at
            FROM weekly_score_snapshots
            WHERE player_id = ?
            ORDER BY week_start DESC
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn health_check_db(&self) -> Result<bool, EngineError> {
        let row: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 == 1)
    }
}
