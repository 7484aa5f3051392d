// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wall-clock-anchored job scheduling.
//!
//! The daily generator fires at every local midnight and the weekly reset at
//! every Saturday local midnight, both in the fixed reference timezone.
//! After each firing the scheduler re-arms by computing the next absolute
//! trigger instant from the timezone database - never by sleeping a fixed
//! 24h interval - so daylight-saving shifts land on the correct wall-clock
//! midnight. Local times that do not exist (spring-forward gap) resolve to
//! the first valid instant after them; ambiguous local times (fall-back
//! fold) resolve to their earliest occurrence.
//!
//! Both jobs are idempotent, so at-least-once execution is safe: a failed
//! run is retried with a bounded backoff and then left for the next trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::generator::DailyGenerator;
use crate::scoring::week_start_for;
use crate::weekly::WeeklyReset;

/// Resolve local midnight of `date` in `tz` to a UTC instant.
///
/// If midnight falls into a spring-forward gap, the first valid instant
/// after it is used (the job still runs once for that day).
fn resolve_local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let mut naive = date.and_time(NaiveTime::MIN);
    // DST gaps are at most a few hours; step forward until the local time
    // maps to a real instant.
    for _ in 0..4 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => naive += chrono::Duration::hours(1),
        }
    }
    // Unreachable with real tzdata; interpret as UTC rather than panic.
    Utc.from_utc_datetime(&naive)
}

/// The next local-midnight instant in `tz` strictly after `after`.
pub fn next_daily_trigger(after: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_date = after.with_timezone(&tz).date_naive();
    let mut candidate = local_date + chrono::Duration::days(1);
    let mut trigger = resolve_local_midnight(tz, candidate);
    // A resolved gap instant can theoretically still precede `after`.
    while trigger <= after {
        candidate += chrono::Duration::days(1);
        trigger = resolve_local_midnight(tz, candidate);
    }
    trigger
}

/// The next Saturday-midnight instant in `tz` strictly after `after`.
pub fn next_weekly_trigger(after: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_date = after.with_timezone(&tz).date_naive();
    for days_ahead in 1..=7 {
        let candidate = local_date + chrono::Duration::days(days_ahead);
        if candidate.weekday() == Weekday::Sat {
            let trigger = resolve_local_midnight(tz, candidate);
            if trigger > after {
                return trigger;
            }
        }
    }
    // `local_date + 7` always covers a Saturday; keep the compiler happy.
    resolve_local_midnight(tz, local_date + chrono::Duration::days(7))
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Fixed reference timezone all triggers are anchored to.
    pub timezone: Tz,
    /// Delay before retrying a failed job run.
    pub retry_backoff: Duration,
    /// Retries per trigger before giving up until the next one.
    pub max_retries: u32,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            retry_backoff: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

/// Background scheduler driving the daily generator and the weekly reset.
///
/// Exactly one active scheduler instance is assumed per deployment.
pub struct JobScheduler {
    generator: Arc<DailyGenerator>,
    weekly: Arc<WeeklyReset>,
    clock: Arc<dyn Clock>,
    config: JobSchedulerConfig,
    shutdown: Arc<Notify>,
}

impl JobScheduler {
    /// Create a new scheduler.
    pub fn new(
        generator: Arc<DailyGenerator>,
        weekly: Arc<WeeklyReset>,
        clock: Arc<dyn Clock>,
        config: JobSchedulerConfig,
    ) -> Self {
        Self {
            generator,
            weekly,
            clock,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the scheduler loop until shutdown is signalled.
    pub async fn run(self) {
        info!(
            timezone = %self.config.timezone,
            retry_backoff_secs = self.config.retry_backoff.as_secs(),
            "Job scheduler started"
        );

        loop {
            let now = self.clock.now();
            let daily_at = next_daily_trigger(now, self.config.timezone);
            let weekly_at = next_weekly_trigger(now, self.config.timezone);
            let next = daily_at.min(weekly_at);

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(trigger = %next, wait_secs = wait.as_secs(), "Armed for next trigger");

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Job scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            // Saturday midnight fires both jobs; generation first so the new
            // day's instances exist before anything reads them.
            if daily_at == next {
                let date = daily_at.with_timezone(&self.config.timezone).date_naive();
                if self.run_daily(date).await {
                    break;
                }
            }
            if weekly_at == next {
                let trigger_date = weekly_at.with_timezone(&self.config.timezone).date_naive();
                let week_start = week_start_for(trigger_date - chrono::Duration::days(1));
                // The previous week's own Saturday was still in progress at
                // its first archival pass; re-archive it now that the week
                // is fully elapsed, then snapshot the week just ending.
                if self.run_weekly(week_start - chrono::Duration::days(7)).await {
                    break;
                }
                if self.run_weekly(week_start).await {
                    break;
                }
            }
        }
    }

    /// Run the daily generator with retries. Returns true if shutdown was
    /// requested mid-retry.
    async fn run_daily(&self, date: NaiveDate) -> bool {
        let mut attempts = 0;
        loop {
            match self.generator.run_for_date(date).await {
                Ok(report) => {
                    info!(%date, created = report.created, "Daily generation trigger done");
                    return false;
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        error!(%date, error = %e, "Daily generation failed; leaving for next trigger");
                        return false;
                    }
                    warn!(%date, error = %e, attempt = attempts, "Daily generation failed; retrying");
                }
            }
            tokio::select! {
                _ = self.shutdown.notified() => return true,
                _ = tokio::time::sleep(self.config.retry_backoff) => {}
            }
        }
    }

    /// Run the weekly reset with retries. Returns true if shutdown was
    /// requested mid-retry.
    async fn run_weekly(&self, week_start: NaiveDate) -> bool {
        let mut attempts = 0;
        loop {
            match self.weekly.run_for_week(week_start).await {
                Ok(report) => {
                    info!(%week_start, archived = report.archived, "Weekly snapshot trigger done");
                    return false;
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        error!(%week_start, error = %e, "Weekly snapshot failed; leaving for next trigger");
                        return false;
                    }
                    warn!(%week_start, error = %e, attempt = attempts, "Weekly snapshot failed; retrying");
                }
            }
            tokio::select! {
                _ = self.shutdown.notified() => return true,
                _ = tokio::time::sleep(self.config.retry_backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::{Havana, New_York, Sao_Paulo};

    #[test]
    fn test_next_daily_trigger_plain_day() {
        // 2025-03-05 12:00 in New York (EST, UTC-5) -> next midnight is
        // 2025-03-06 00:00 EST = 05:00 UTC.
        let after = Utc.with_ymd_and_hms(2025, 3, 5, 17, 0, 0).unwrap();
        let trigger = next_daily_trigger(after, New_York);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 3, 6, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_next_daily_trigger_spring_forward_shortens_day() {
        // New York springs forward 2025-03-09 02:00. Midnight itself exists
        // on both sides, but the UTC offset changes: the 03-10 trigger is at
        // 04:00 UTC (EDT), one hour of UTC earlier than a fixed 24h sleep
        // from the 03-09 trigger (05:00 UTC, EST) would land.
        let after = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let trigger = next_daily_trigger(after, New_York);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 3, 10, 4, 0, 0).unwrap());
    }

    #[test]
    fn test_next_daily_trigger_midnight_gap_resolves_forward() {
        // Sao Paulo DST (2018 rules) started at midnight: 2018-11-04 00:00
        // never existed, clocks jumped straight to 01:00 -02. The trigger
        // resolves to that first valid instant, 03:00 UTC.
        let after = Utc.with_ymd_and_hms(2018, 11, 3, 12, 0, 0).unwrap();
        let trigger = next_daily_trigger(after, Sao_Paulo);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2018, 11, 4, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_next_daily_trigger_ambiguous_midnight_takes_earliest() {
        // Havana falls back 2025-11-02 01:00 -> 00:00, so 00:00-01:00 local
        // happens twice. The earliest occurrence (00:00 CDT, -04) wins:
        // 04:00 UTC.
        let after = Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap();
        let trigger = next_daily_trigger(after, Havana);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 11, 2, 4, 0, 0).unwrap());
    }

    #[test]
    fn test_next_daily_trigger_is_strictly_future() {
        // Exactly at a trigger instant, the next trigger is tomorrow's.
        let at_midnight = Utc.with_ymd_and_hms(2025, 3, 6, 5, 0, 0).unwrap();
        let trigger = next_daily_trigger(at_midnight, New_York);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 3, 7, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_next_weekly_trigger_lands_on_saturday() {
        // From Monday 2025-03-10 in New York, the next Saturday midnight is
        // 2025-03-15 00:00 EDT = 04:00 UTC.
        let after = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let trigger = next_weekly_trigger(after, New_York);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 3, 15, 4, 0, 0).unwrap());
        assert_eq!(
            trigger.with_timezone(&New_York).date_naive().weekday(),
            Weekday::Sat
        );
    }

    #[test]
    fn test_next_weekly_trigger_from_saturday_is_next_week() {
        // Just past Saturday midnight, the next weekly trigger is 7 days out.
        let after = Utc.with_ymd_and_hms(2025, 3, 15, 4, 0, 1).unwrap();
        let trigger = next_weekly_trigger(after, New_York);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 3, 22, 4, 0, 0).unwrap());
    }

    #[test]
    fn test_trigger_maps_to_new_local_day() {
        let after = Utc.with_ymd_and_hms(2025, 3, 5, 17, 0, 0).unwrap();
        let trigger = next_daily_trigger(after, New_York);
        let generated_for = trigger.with_timezone(&New_York).date_naive();
        assert_eq!(generated_for, NaiveDate::from_ymd_opt(2025, 3, 6).unwrap());
    }
}
