// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fatal supervisor errors.

use thiserror::Error;

use baton_core::Signal;

/// Errors surfaced through [`Server::run`](crate::Server::run).
///
/// Transient reload failures (a replacement worker that could not be spawned
/// or died during startup) are logged and recovered instead; the old worker
/// keeps serving.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no endpoints registered")]
    NoEndpoints,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to install handler for {signal}: {source}")]
    Signal {
        signal: Signal,
        #[source]
        source: std::io::Error,
    },

    #[error("worker exited unexpectedly: {status}")]
    WorkerExited { status: String },

    #[error(transparent)]
    Inherit(#[from] InheritError),
}

/// Failures while a worker reconstructs its inherited listeners.
///
/// Always fatal for the worker: it exits non-zero and the master observes an
/// unexpected child exit.
#[derive(Debug, Error)]
pub enum InheritError {
    #[error("BATON_NUM_FDS is not set")]
    MissingNumFds,

    #[error("invalid BATON_NUM_FDS value {0:?}, expected a positive integer")]
    InvalidNumFds(String),

    #[error("inherited descriptor count does not match registered services, {inherited}!={registered}")]
    CountMismatch { inherited: usize, registered: usize },

    #[error("failed to rebuild listener from descriptor slot {slot}: {source}")]
    Listener {
        slot: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("no service registered for inherited port {0}")]
    UnknownPort(u16),
}
