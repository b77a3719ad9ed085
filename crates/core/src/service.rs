// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The capability every registered endpoint must provide.

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::error::{ServeError, StopError};

/// A protocol server the supervisor can run on an inherited listener.
///
/// The supervisor owns the process lifecycle; a `Service` owns everything
/// protocol-specific. Implementations must treat a teardown initiated by
/// [`graceful_stop`](Service::graceful_stop) as a normal close (`serve`
/// returns `Ok(())`) and must be safe to drive concurrently with signal
/// delivery on the process.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Accept and handle connections on `listener` until shutdown.
    ///
    /// Blocks for the serving lifetime of the endpoint. An `Err` marks an
    /// abnormal end (e.g. a failing accept loop); the worker logs it and
    /// keeps its other endpoints running.
    async fn serve(&self, listener: TcpListener) -> Result<(), ServeError>;

    /// Stop accepting new connections and drain in-flight work.
    ///
    /// Must return no later than `deadline`; past it the implementation may
    /// abandon remaining work. Idempotent: a second invocation is a cheap
    /// no-op and does not restart the drain.
    async fn graceful_stop(&self, deadline: Instant) -> Result<(), StopError>;
}
