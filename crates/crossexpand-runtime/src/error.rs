// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime error types

use std::time::Duration;

use crossexpand_event_queue::QueueError;
use thiserror::Error;

use crate::services::ServiceError;
use crate::worker::WorkerState;

/// Failure of a single unit of work
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Logged at the loop boundary; the run-loop continues
    #[error("{0}")]
    Recoverable(String),

    /// Ends the run-loop; the worker becomes `Failed`
    #[error("{0}")]
    Fatal(String),
}

impl TaskError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::Fatal(_))
    }
}

/// Worker lifecycle errors
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker '{name}' is already running")]
    AlreadyRunning { name: String },

    #[error("Worker '{name}' failed to initialize: {reason}")]
    InitializationFailure { name: String, reason: String },

    #[error("Failed to spawn thread for worker '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker '{name}' did not report running within {timeout:?}")]
    StartTimeout { name: String, timeout: Duration },

    #[error("Worker '{name}' failed during startup")]
    StartFailed { name: String },

    #[error("Worker '{name}' cannot {operation} while {state}")]
    InvalidState {
        name: String,
        operation: &'static str,
        state: WorkerState,
    },

    #[error("Worker '{name}' thread panicked")]
    Panicked { name: String },
}

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Worker pool errors
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Event queue: {0}")]
    Queue(#[from] QueueError),

    #[error("Service initialization failed: {0}")]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Invalid pool state: {0}")]
    InvalidState(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
