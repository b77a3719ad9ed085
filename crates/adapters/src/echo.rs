// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small services for demos and tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use baton_core::{ServeError, Service, StopError};

/// Echoes every byte it reads back to the peer.
pub struct LineEchoService {
    accept: CancellationToken,
    connections: TaskTracker,
}

impl Default for LineEchoService {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEchoService {
    pub fn new() -> Self {
        Self { accept: CancellationToken::new(), connections: TaskTracker::new() }
    }
}

#[async_trait]
impl Service for LineEchoService {
    async fn serve(&self, listener: TcpListener) -> Result<(), ServeError> {
        loop {
            let accepted = tokio::select! {
                _ = self.accept.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            let (mut stream, peer) = accepted.map_err(ServeError::Accept)?;
            let draining = self.accept.clone();
            self.connections.spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    let read = tokio::select! {
                        _ = draining.cancelled() => break,
                        read = stream.read(&mut buf) => read,
                    };
                    match read {
                        Ok(0) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(%peer, error = %e, "echo read failed");
                            break;
                        }
                    }
                }
            });
        }
        Ok(())
    }

    async fn graceful_stop(&self, deadline: Instant) -> Result<(), StopError> {
        self.accept.cancel();
        self.connections.close();
        if tokio::time::timeout_at(deadline, self.connections.wait()).await.is_err() {
            return Err(StopError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Wraps a service with an artificial stall in its stop path, for
/// exercising stop-timeout handling end to end.
pub struct SlowStopService<S> {
    inner: Arc<S>,
    stall: Duration,
}

impl<S: Service> SlowStopService<S> {
    pub fn new(inner: S, stall: Duration) -> Self {
        Self { inner: Arc::new(inner), stall }
    }
}

#[async_trait]
impl<S: Service> Service for SlowStopService<S> {
    async fn serve(&self, listener: TcpListener) -> Result<(), ServeError> {
        self.inner.serve(listener).await
    }

    async fn graceful_stop(&self, deadline: Instant) -> Result<(), StopError> {
        tokio::time::sleep(self.stall).await;
        self.inner.graceful_stop(deadline).await
    }
}

#[cfg(test)]
#[path = "echo_tests.rs"]
mod tests;
