// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Chorecore - Task Lifecycle & Scheduling Engine
//!
//! This crate provides the engine behind a gamified household task system.
//! It generates per-player task instances from a recurring-template catalog,
//! drives each instance through an approval state machine, records once-ever
//! growth task completions, and aggregates daily/weekly scores, persisting
//! all state to PostgreSQL or SQLite.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      External Clients                           │
//! │              (HTTP API layer, admin tooling)                    │
//! └─────────────────────────────────────────────────────────────────┘
//!            │ begin/complete/approve        │ catalog edits
//!            ▼                               ▼
//! ┌───────────────────────┐       ┌───────────────────────┐
//! │   LifecycleManager    │       │       Catalog         │
//! │  (state machine +     │       │  (players, templates, │
//! │   growth completions) │       │   overrides)          │
//! └───────────┬───────────┘       └───────────┬───────────┘
//!             │                               │
//! ┌───────────┴───────────────────────────────┴───────────┐
//! │                  Persistence trait                    │
//! │          (PostgreSQL / SQLite via sqlx)               │
//! └───────────▲───────────────────────────────▲───────────┘
//!             │                               │
//! ┌───────────┴───────────┐       ┌───────────┴───────────┐
//! │    DailyGenerator     │       │     WeeklyReset       │
//! │  (midnight trigger)   │       │  (Saturday trigger)   │
//! └───────────▲───────────┘       └───────────▲───────────┘
//!             │                               │
//!             └───────────┬───────────────────┘
//!                         │
//!               ┌─────────┴─────────┐
//!               │   JobScheduler    │
//!               │ (tz-aware timers) │
//!               └───────────────────┘
//! ```
//!
//! # Task Instance State Machine
//!
//! ```text
//!  ┌─────────┐  begin   ┌─────────────┐  complete  ┌──────────────────┐
//!  │ pending │─────────►│ in_progress │───────────►│ pending_approval │
//!  └─────────┘          └──────┬──────┘            └────────┬─────────┘
//!                              │                            │ approve
//!                              │ complete                   ▼ (admin)
//!                              │ (auto-approve        ┌──────────┐
//!                              │  override)           │ approved │
//!                              └─────────────────────►└──────────┘
//! ```
//!
//! Transitions are strictly forward-only. Every transition is a guarded
//! single-statement update in the store, so concurrent callers race safely:
//! exactly one wins and the rest observe `InvalidTransition`.
//!
//! # Scoring
//!
//! Scores are pure functions of date ranges over approved instances and
//! growth completions; nothing is ever reset or decremented. The weekly
//! "reset" only archives week totals into snapshot rows, upserted so a
//! later pass can fold in points earned after the first archival.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `CHORECORE_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `CHORECORE_TIMEZONE` | No | `UTC` | IANA reference timezone |
//! | `CHORECORE_JOB_RETRY_SECS` | No | `60` | Scheduled-job retry backoff |
//! | `CHORECORE_JOB_MAX_RETRIES` | No | `3` | Retries per trigger |
//!
//! # Modules
//!
//! - [`catalog`]: Administrative CRUD over players, templates and overrides
//! - [`clock`]: Injectable time source
//! - [`config`]: Engine configuration from environment variables
//! - [`error`]: Error types with stable error code mapping
//! - [`events`]: Fire-and-forget engine event notifications
//! - [`generator`]: Daily task instance generation
//! - [`lifecycle`]: Instance state machine and growth completions
//! - [`migrations`]: Embedded database migrations
//! - [`persistence`]: Storage trait with PostgreSQL and SQLite backends
//! - [`scheduler`]: Timezone-aware midnight/Saturday triggers
//! - [`scoring`]: Daily and weekly score computation
//! - [`weekly`]: Weekly leaderboard snapshot job

#![deny(missing_docs)]

/// Administrative surface over players, task templates and overrides.
pub mod catalog;

/// Injectable time source for testable day boundaries.
pub mod clock;

/// Engine configuration loaded from environment variables.
pub mod config;

/// Error types for engine operations with stable error codes.
pub mod error;

/// Fire-and-forget engine event notifications.
pub mod events;

/// Daily task instance generation from the template catalog.
pub mod generator;

/// Task instance lifecycle and growth task completions.
pub mod lifecycle;

/// Embedded database migrations for PostgreSQL and SQLite.
pub mod migrations;

/// Persistence trait and database backends.
pub mod persistence;

/// Background scheduler for the daily and weekly jobs.
pub mod scheduler;

/// Daily and weekly score computation.
pub mod scoring;

/// Weekly leaderboard snapshot job.
pub mod weekly;
