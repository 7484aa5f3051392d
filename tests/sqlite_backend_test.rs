// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the file-backed SQLite persistence setup path.

use chorecore::persistence::{Persistence, SqlitePersistence};

#[tokio::test]
async fn test_from_path_creates_database_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("chores.db");

    let persistence = SqlitePersistence::from_path(&db_path).await.unwrap();
    assert!(db_path.exists());
    assert!(persistence.health_check_db().await.unwrap());

    // The schema is in place: an empty store answers queries.
    let players = persistence.list_players().await.unwrap();
    assert!(players.is_empty());
}

#[tokio::test]
async fn test_reopening_an_existing_database_is_safe() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chores.db");

    let first = SqlitePersistence::from_path(&db_path).await.unwrap();
    drop(first);

    // Migrations are recorded, so a second open re-applies nothing.
    let second = SqlitePersistence::from_path(&db_path).await.unwrap();
    assert!(second.health_check_db().await.unwrap());
}
