// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Weekly leaderboard snapshots.
//!
//! "Reset" is purely archival: the current-week view rolls forward on its
//! own because weekly scores are computed from a date range, not from a
//! counter. This job writes one snapshot row per player per week; the write
//! is an upsert, so re-archiving a week replaces its totals with the latest
//! computed score. The scheduler uses that to reconcile points that land
//! after a week's first archival pass.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::Result;
use crate::persistence::{Persistence, WeeklySnapshotRecord};
use crate::scoring::ScoreAggregator;

/// Outcome counts for one weekly reset run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklyResetReport {
    /// Snapshot rows written (created or refreshed) this run.
    pub archived: u64,
}

/// Scheduled job that archives each player's weekly total.
///
/// The only writer of weekly score snapshots. Touches nothing else.
pub struct WeeklyReset {
    persistence: Arc<dyn Persistence>,
    aggregator: ScoreAggregator,
    clock: Arc<dyn Clock>,
}

impl WeeklyReset {
    /// Create a new weekly reset job.
    pub fn new(persistence: Arc<dyn Persistence>, clock: Arc<dyn Clock>) -> Self {
        let aggregator = ScoreAggregator::new(persistence.clone());
        Self {
            persistence,
            aggregator,
            clock,
        }
    }

    /// Snapshot the week starting at `week_start` for every player.
    ///
    /// Inactive players are included: their history is still history.
    /// Safe to re-run for the same week; each run overwrites the snapshot
    /// with the score as currently computed, so points approved after an
    /// earlier pass are picked up.
    #[instrument(skip(self))]
    pub async fn run_for_week(&self, week_start: NaiveDate) -> Result<WeeklyResetReport> {
        let players = self.persistence.list_players().await?;
        let now = self.clock.now();

        let mut report = WeeklyResetReport::default();
        for player in &players {
            let total_points = self
                .aggregator
                .weekly_score(&player.player_id, week_start)
                .await?;

            let record = WeeklySnapshotRecord {
                player_id: player.player_id.clone(),
                week_start,
                total_points,
                created_at: now,
            };
            self.persistence.upsert_weekly_snapshot(&record).await?;
            report.archived += 1;
        }

        info!(
            %week_start,
            archived = report.archived,
            "Weekly snapshot finished"
        );

        Ok(report)
    }
}
