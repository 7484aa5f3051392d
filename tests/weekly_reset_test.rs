// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for weekly leaderboard snapshots.

mod common;

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use chorecore::clock::Clock;
use chorecore::lifecycle::Actor;
use chorecore::persistence::{PlayerRecord, TaskCategory};

use common::TestContext;

/// Generate today's instance for (player, template) and walk it through
/// begin/complete/approve.
async fn earn(ctx: &TestContext, admin: &str, player: &str, template: &str) {
    let instance_id = ctx.generate_instance_for(player, template).await;
    let actor = Actor::player(player);
    ctx.lifecycle.begin(&instance_id, &actor).await.unwrap();
    ctx.lifecycle.complete(&instance_id, &actor).await.unwrap();
    ctx.lifecycle
        .approve(&instance_id, &Actor::admin(admin))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_snapshots_capture_each_players_weekly_total() {
    let ctx = TestContext::new().await;
    let parent = ctx.add_player("Mum", true).await;
    let maja = ctx.add_player("Maja", false).await;
    let tomek = ctx.add_player("Tomek", false).await;
    let tpl = ctx
        .add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;

    // Maja earns Monday and Tuesday; Tomek only Monday.
    earn(&ctx, &parent, &maja, &tpl).await;
    earn(&ctx, &parent, &tomek, &tpl).await;
    ctx.clock.advance(Duration::days(1));
    earn(&ctx, &parent, &maja, &tpl).await;

    let week_start = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    let report = ctx.weekly.run_for_week(week_start).await.unwrap();
    // Mum has a snapshot too; she is a player like everyone else.
    assert_eq!(report.archived, 3);

    let maja_snaps = ctx.persistence.list_weekly_snapshots(&maja).await.unwrap();
    assert_eq!(maja_snaps.len(), 1);
    assert_eq!(maja_snaps[0].week_start, week_start);
    assert_eq!(maja_snaps[0].total_points, 300);

    let tomek_snaps = ctx
        .persistence
        .list_weekly_snapshots(&tomek)
        .await
        .unwrap();
    assert_eq!(tomek_snaps[0].total_points, 150);
}

#[tokio::test]
async fn test_rerun_keeps_one_row_per_week() {
    let ctx = TestContext::new().await;
    let parent = ctx.add_player("Mum", true).await;
    let kid = ctx.add_player("Maja", false).await;
    let tpl = ctx
        .add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;
    earn(&ctx, &parent, &kid, &tpl).await;

    let week_start = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    ctx.weekly.run_for_week(week_start).await.unwrap();

    // A duplicate Saturday trigger rewrites the same rows in place.
    ctx.weekly.run_for_week(week_start).await.unwrap();

    let snaps = ctx.persistence.list_weekly_snapshots(&kid).await.unwrap();
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].total_points, 150);
}

#[tokio::test]
async fn test_rearchiving_picks_up_late_saturday_points() {
    // The Saturday 00:00 trigger archives a week whose own Saturday is
    // still ahead; a later re-run must fold those points in.
    let ctx = TestContext::new().await;
    let parent = ctx.add_player("Mum", true).await;
    let kid = ctx.add_player("Maja", false).await;
    let tpl = ctx
        .add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;
    let week_start = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();

    // Monday earnings, then the first archival pass at Saturday 00:00.
    earn(&ctx, &parent, &kid, &tpl).await;
    ctx.clock
        .set(Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
    ctx.weekly.run_for_week(week_start).await.unwrap();

    let snaps = ctx.persistence.list_weekly_snapshots(&kid).await.unwrap();
    assert_eq!(snaps[0].total_points, 150);

    // Saturday morning chores, approved after the archive was taken.
    ctx.clock.advance(Duration::hours(10));
    earn(&ctx, &parent, &kid, &tpl).await;
    assert_eq!(
        ctx.aggregator.weekly_score(&kid, week_start).await.unwrap(),
        300
    );

    // The next trigger's reconciliation run brings the archive up to date.
    ctx.weekly.run_for_week(week_start).await.unwrap();

    let snaps = ctx.persistence.list_weekly_snapshots(&kid).await.unwrap();
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].total_points, 300);
}

#[tokio::test]
async fn test_inactive_players_keep_their_history() {
    let ctx = TestContext::new().await;
    let inactive = PlayerRecord {
        player_id: "moved-out".to_string(),
        display_name: "Big Sister".to_string(),
        is_admin: false,
        active: false,
        created_at: ctx.clock.now(),
    };
    ctx.persistence.create_player(&inactive).await.unwrap();

    let week_start = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    let report = ctx.weekly.run_for_week(week_start).await.unwrap();
    assert_eq!(report.archived, 1);

    let snaps = ctx
        .persistence
        .list_weekly_snapshots("moved-out")
        .await
        .unwrap();
    assert_eq!(snaps[0].total_points, 0);
}

#[tokio::test]
async fn test_snapshots_list_newest_week_first() {
    let ctx = TestContext::new().await;
    let kid = ctx.add_player("Maja", false).await;

    let older = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
    let newer = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    ctx.weekly.run_for_week(older).await.unwrap();
    ctx.weekly.run_for_week(newer).await.unwrap();

    let snaps = ctx.persistence.list_weekly_snapshots(&kid).await.unwrap();
    assert_eq!(snaps.len(), 2);
    assert_eq!(snaps[0].week_start, newer);
    assert_eq!(snaps[1].week_start, older);
}

#[tokio::test]
async fn test_snapshot_is_immune_to_later_catalog_edits() {
    let ctx = TestContext::new().await;
    let parent = ctx.add_player("Mum", true).await;
    let kid = ctx.add_player("Maja", false).await;
    let tpl = ctx
        .add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;
    earn(&ctx, &parent, &kid, &tpl).await;

    let week_start = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    ctx.weekly.run_for_week(week_start).await.unwrap();

    ctx.catalog.set_template_points(&tpl, 10).await.unwrap();
    ctx.catalog.deactivate_template(&tpl).await.unwrap();

    // Even a re-archive computes from the instances' own point snapshots.
    ctx.weekly.run_for_week(week_start).await.unwrap();

    let snaps = ctx.persistence.list_weekly_snapshots(&kid).await.unwrap();
    assert_eq!(snaps[0].total_points, 150);
}
