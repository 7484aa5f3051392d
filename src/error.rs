// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the chorecore engine.
//!
//! All lifecycle errors are deterministic and caller-facing; the engine never
//! retries them on its own. Scheduled-job failures are handled by the
//! scheduler's retry policy instead.

use std::fmt;

/// Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EngineError {
    /// A referenced entity (instance, template, player) does not exist.
    NotFound {
        /// What kind of entity was looked up ("instance", "template", "player").
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The actor lacks the identity or capability required for the operation.
    Forbidden {
        /// The player identifier of the actor.
        actor: String,
        /// Why the operation was refused.
        reason: String,
    },

    /// A state machine precondition was violated, including lost races.
    InvalidTransition {
        /// The instance that was in the wrong state.
        instance_id: String,
        /// The status the operation required.
        expected: &'static str,
        /// The status actually observed.
        actual: String,
    },

    /// A growth task was already completed by this player.
    AlreadyCompleted {
        /// The player who already completed the task.
        player_id: String,
        /// The growth template in question.
        template_id: String,
    },

    /// Input validation failed.
    Validation {
        /// The field that failed validation.
        field: &'static str,
        /// The validation error message.
        message: String,
    },

    /// Database operation failed.
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl EngineError {
    /// Get the stable error code string for this error type.
    ///
    /// The presentation layer maps these codes to user-facing messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AlreadyCompleted { .. } => "ALREADY_COMPLETED",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => {
                write!(f, "{} '{}' not found", entity, id)
            }
            Self::Forbidden { actor, reason } => {
                write!(f, "Actor '{}' is not allowed: {}", actor, reason)
            }
            Self::InvalidTransition {
                instance_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Instance '{}' is in invalid state: expected '{}', got '{}'",
                    instance_id, expected, actual
                )
            }
            Self::AlreadyCompleted {
                player_id,
                template_id,
            } => {
                write!(
                    f,
                    "Player '{}' already completed growth task '{}'",
                    player_id, template_id
                )
            }
            Self::Validation { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::Database { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}
