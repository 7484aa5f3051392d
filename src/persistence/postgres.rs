//! PostgreSQL-backed persistence implementation.
//!
//! The production backend. The caller runs migrations
//! (see [`crate::migrations::run_postgres`]) before handing the pool over.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::EngineError;

use super::{
    GrowthCompletionRecord, InstanceRecord, OverrideRecord, Persistence, PlayerRecord,
    TemplateRecord, WeeklySnapshotRecord, growth_insert_error,
};

/// PostgreSQL-backed persistence provider.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new PostgreSQL persistence provider from an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn create_player(&self, player: &PlayerRecord) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO players (player_id, display_name, is_admin, active, created_at)
            VALUES ($1, $2, $3, $4, $5)
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
            WHERE player_id = $1
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
            WHERE active = TRUE
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
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
            WHERE template_id = $1
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
            SET active = $1
            WHERE template_id = $2
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
            SET points = $1
            WHERE template_id = $2
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
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (player_id, template_id)
            DO UPDATE SET auto_approve = EXCLUDED.auto_approve, removed = EXCLUDED.removed
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
            WHERE player_id = $1 AND template_id = $2
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9)
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
            WHERE instance_id = $1
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
            WHERE player_id = $1 AND due_date = $2
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
            SET status = 'in_progress', started_at = $1
            WHERE instance_id = $2 AND status = 'pending'
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
                    completed_at = $1,
                    approved_at = $1,
                    points_awarded = points
                WHERE instance_id = $2 AND status = 'in_progress'
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
                SET status = 'pending_approval', completed_at = $1
                WHERE instance_id = $2 AND status = 'in_progress'
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
            SET status = 'approved', approved_at = $1, points_awarded = points
            WHERE instance_id = $2 AND status = 'pending_approval'
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
            SELECT COALESCE(SUM(points_awarded), 0)::BIGINT
            FROM task_instances
            WHERE player_id = $1 AND due_date >= $2 AND due_date <= $3
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
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
            WHERE player_id = $1
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
            WHERE t.category = 'growth' AND t.active = TRUE
              AND NOT EXISTS (
                  SELECT 1 FROM growth_completions g
                  WHERE g.template_id = t.template_id AND g.player_id = $1
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
            SELECT COALESCE(SUM(points_awarded), 0)::BIGINT
            FROM growth_completions
            WHERE player_id = $1 AND completed_date >= $2 AND completed_date <= $3
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
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (player_id, week_start)
            DO UPDATE SET total_points = EXCLUDED.total_points,
                          created_at = EXCLUDED.created_at
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
            WHERE player_id = $1
            ORDER BY week_start DESC
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn health_check_db(&self) -> Result<bool, EngineError> {
        let row: (i32,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 == 1)
    }
}
