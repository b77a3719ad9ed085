// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors owned by the service contract.

use thiserror::Error;

/// Abnormal end of a service's accept-and-handle loop.
///
/// Logged by the worker; never fatal to the process on its own.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure while draining a service during graceful shutdown.
///
/// Logged by the worker; the process still exits.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("graceful stop missed its deadline")]
    DeadlineExceeded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
