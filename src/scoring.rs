// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Daily and weekly score computation.
//!
//! Scores are pure functions of a date range over immutable approved
//! records; there is no mutable counter and therefore nothing to "reset".
//! Any past date can be queried for historical drill-down.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::Result;
use crate::persistence::Persistence;

/// Days per scoring week.
const WEEK_DAYS: i64 = 7;

/// The Sunday on or before `date`.
///
/// Scoring weeks are Sunday-anchored in the reference timezone.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Read-only score computation over approved instances and growth
/// completions.
#[derive(Clone)]
pub struct ScoreAggregator {
    persistence: Arc<dyn Persistence>,
}

impl ScoreAggregator {
    /// Create a new score aggregator.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    /// Points a player earned on one calendar day: approved recurring
    /// instances plus growth completions recorded that day.
    pub async fn daily_score(&self, player_id: &str, date: NaiveDate) -> Result<i64> {
        let approved = self
            .persistence
            .sum_approved_points(player_id, date, date)
            .await?;
        let growth = self
            .persistence
            .sum_growth_points(player_id, date, date)
            .await?;
        Ok(approved + growth)
    }

    /// Points a player earned over the 7 days starting at `week_start`.
    ///
    /// Equals the sum of [`Self::daily_score`] over those days, computed as
    /// a single range query per table.
    pub async fn weekly_score(&self, player_id: &str, week_start: NaiveDate) -> Result<i64> {
        let week_end = week_start + Duration::days(WEEK_DAYS - 1);
        let approved = self
            .persistence
            .sum_approved_points(player_id, week_start, week_end)
            .await?;
        let growth = self
            .persistence
            .sum_growth_points(player_id, week_start, week_end)
            .await?;
        Ok(approved + growth)
    }
}
