// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for daily task instance generation.

mod common;

use chorecore::clock::Clock;
use chorecore::events::EventType;
use chorecore::persistence::TaskCategory;

use common::TestContext;

#[tokio::test]
async fn test_generates_one_instance_per_player_and_template() {
    let ctx = TestContext::new().await;
    let maja = ctx.add_player("Maja", false).await;
    let tomek = ctx.add_player("Tomek", false).await;
    ctx.add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;
    ctx.add_daily_template("Tidy Room", TaskCategory::Afternoon, 200)
        .await;

    let date = ctx.clock.now().date_naive();
    let report = ctx.generator.run_for_date(date).await.unwrap();
    assert_eq!(report.created, 4);

    for player in [&maja, &tomek] {
        let instances = ctx
            .persistence
            .list_instances_for_day(player, date)
            .await
            .unwrap();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.status == "pending"));
        assert!(instances.iter().all(|i| i.due_date == date));
    }
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let ctx = TestContext::new().await;
    let kid = ctx.add_player("Maja", false).await;
    ctx.add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;

    let date = ctx.clock.now().date_naive();
    let first = ctx.generator.run_for_date(date).await.unwrap();
    assert_eq!(first.created, 1);
    assert_eq!(first.skipped_existing, 0);

    let second = ctx.generator.run_for_date(date).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped_existing, 1);

    let instances = ctx
        .persistence
        .list_instances_for_day(&kid, date)
        .await
        .unwrap();
    assert_eq!(instances.len(), 1);
}

#[tokio::test]
async fn test_weekday_flags_control_generation() {
    let ctx = TestContext::new().await;
    ctx.add_player("Maja", false).await;
    // Weekdays only: Sunday and Saturday off.
    ctx.add_template(
        "Pack School Bag",
        TaskCategory::Bedtime,
        80,
        [false, true, true, true, true, true, false],
    )
    .await;

    // 2025-03-10 is a Monday.
    let monday = ctx.clock.now().date_naive();
    let report = ctx.generator.run_for_date(monday).await.unwrap();
    assert_eq!(report.created, 1);

    // 2025-03-15 is a Saturday.
    let saturday = chrono::NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
    let report = ctx.generator.run_for_date(saturday).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.skipped_not_required, 1);
}

#[tokio::test]
async fn test_removed_override_suppresses_only_that_player() {
    let ctx = TestContext::new().await;
    let maja = ctx.add_player("Maja", false).await;
    let tomek = ctx.add_player("Tomek", false).await;
    let tpl = ctx
        .add_daily_template("Water Plants", TaskCategory::Afternoon, 120)
        .await;
    ctx.catalog
        .set_override(&tomek, &tpl, false, true)
        .await
        .unwrap();

    let date = ctx.clock.now().date_naive();
    let report = ctx.generator.run_for_date(date).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped_removed, 1);

    let maja_instances = ctx
        .persistence
        .list_instances_for_day(&maja, date)
        .await
        .unwrap();
    assert_eq!(maja_instances.len(), 1);

    let tomek_instances = ctx
        .persistence
        .list_instances_for_day(&tomek, date)
        .await
        .unwrap();
    assert!(tomek_instances.is_empty());
}

#[tokio::test]
async fn test_inactive_template_and_growth_templates_are_skipped() {
    let ctx = TestContext::new().await;
    ctx.add_player("Maja", false).await;
    let retired = ctx
        .add_daily_template("Old Chore", TaskCategory::Afternoon, 50)
        .await;
    ctx.catalog.deactivate_template(&retired).await.unwrap();
    ctx.add_growth_template("Learn to Tie Shoes", 500).await;

    let date = ctx.clock.now().date_naive();
    let report = ctx.generator.run_for_date(date).await.unwrap();
    assert_eq!(report.created, 0);
    // The deactivated template shows up in the report rather than
    // disappearing silently.
    assert_eq!(report.skipped_inactive, 1);
}

#[tokio::test]
async fn test_inactive_player_is_skipped() {
    let ctx = TestContext::new().await;
    ctx.add_player("Maja", false).await;
    // Insert an inactive player directly.
    let inactive = chorecore::persistence::PlayerRecord {
        player_id: "retired-kid".to_string(),
        display_name: "Grown Up".to_string(),
        is_admin: false,
        active: false,
        created_at: ctx.clock.now(),
    };
    ctx.persistence.create_player(&inactive).await.unwrap();
    ctx.add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;

    let date = ctx.clock.now().date_naive();
    let report = ctx.generator.run_for_date(date).await.unwrap();
    assert_eq!(report.created, 1);

    let instances = ctx
        .persistence
        .list_instances_for_day("retired-kid", date)
        .await
        .unwrap();
    assert!(instances.is_empty());
}

#[tokio::test]
async fn test_instances_snapshot_the_template() {
    let ctx = TestContext::new().await;
    let kid = ctx.add_player("Maja", false).await;
    let tpl = ctx
        .add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;

    let date = ctx.clock.now().date_naive();
    ctx.generator.run_for_date(date).await.unwrap();

    let instance = &ctx
        .persistence
        .list_instances_for_day(&kid, date)
        .await
        .unwrap()[0];
    assert_eq!(instance.title, "Brush Teeth");
    assert_eq!(instance.category, "morning");
    assert_eq!(instance.points, 150);
    assert_eq!(instance.template_id, tpl);
}

#[tokio::test]
async fn test_generation_publishes_instance_created_events() {
    let ctx = TestContext::new().await;
    let kid = ctx.add_player("Maja", false).await;
    ctx.add_daily_template("Brush Teeth", TaskCategory::Morning, 150)
        .await;

    let mut rx = ctx.events.subscribe();
    let date = ctx.clock.now().date_naive();
    ctx.generator.run_for_date(date).await.unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::InstanceCreated);
    assert_eq!(event.player_id, kid);
    assert_eq!(event.date, date);
    assert_eq!(event.payload["title"], "Brush Teeth");

    // Idempotent re-run creates nothing and therefore publishes nothing.
    ctx.generator.run_for_date(date).await.unwrap();
    assert!(rx.try_recv().is_err());
}
