// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary RPC service: framed request/response envelopes over TCP.
//!
//! Each connection carries a sequence of independent calls. A request frame
//! holds `{id, method, params}`; the matching response echoes the id with
//! either a result or an error string. Dispatch goes through a single
//! [`RpcHandler`] the embedder supplies.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use baton_core::{ServeError, Service, StopError};

use crate::wire::{self, ProtocolError};

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    pub fn err(id: u64, error: impl Into<String>) -> Self {
        Self { id, result: None, error: Some(error.into()) }
    }
}

/// Application failure while handling a call; rendered into the response's
/// error field.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RpcError(pub String);

impl RpcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Method dispatch supplied by the embedder.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// Framed-RPC endpoint service.
pub struct RpcService<H> {
    handler: Arc<H>,
    accept: CancellationToken,
    connections: TaskTracker,
}

impl<H: RpcHandler> RpcService<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            accept: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }
}

#[async_trait]
impl<H: RpcHandler> Service for RpcService<H> {
    async fn serve(&self, listener: TcpListener) -> Result<(), ServeError> {
        loop {
            let accepted = tokio::select! {
                _ = self.accept.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = accepted.map_err(ServeError::Accept)?;
            let handler = self.handler.clone();
            let draining = self.accept.clone();
            self.connections.spawn(async move {
                if let Err(e) = handle_connection(stream, handler, draining).await {
                    debug!(%peer, error = %e, "connection ended with error");
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

/// Serve calls on one connection until the peer hangs up or drain begins.
/// A call already being handled when drain starts still gets its response.
async fn handle_connection<H: RpcHandler>(
    mut stream: TcpStream,
    handler: Arc<H>,
    draining: CancellationToken,
) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.split();
    loop {
        let frame = tokio::select! {
            _ = draining.cancelled() => break,
            frame = wire::read_message(&mut reader) => match frame {
                Ok(frame) => frame,
                Err(ProtocolError::Io(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            },
        };

        let request: RpcRequest = wire::decode(&frame)?;
        let response = match handler.call(&request.method, request.params).await {
            Ok(result) => RpcResponse::ok(request.id, result),
            Err(e) => RpcResponse::err(request.id, e.to_string()),
        };
        wire::write_message(&mut writer, &wire::encode(&response)?).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
