// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Byte-stream HTTP service built on hyper's http1 connection driver.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use baton_core::{ServeError, Service, StopError};
use baton_supervisor::{RunError, Server};

pub type HttpRequest = hyper::Request<hyper::body::Incoming>;
pub type HttpResponse = hyper::Response<Full<Bytes>>;

/// Request handler supplied by the embedder.
#[async_trait]
pub trait HttpHandler: Send + Sync + 'static {
    async fn handle(&self, request: HttpRequest) -> HttpResponse;
}

/// Adapts a plain async closure into an [`HttpHandler`].
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> HttpHandler for HandlerFn<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = HttpResponse> + Send + 'static,
{
    async fn handle(&self, request: HttpRequest) -> HttpResponse {
        (self.0)(request).await
    }
}

/// HTTP endpoint service.
///
/// One hyper connection driver per accepted stream; draining asks every
/// live connection to finish its in-flight exchange and close.
pub struct HttpService<H> {
    handler: Arc<H>,
    accept: CancellationToken,
    connections: TaskTracker,
}

impl<H: HttpHandler> HttpService<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            accept: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }
}

#[async_trait]
impl<H: HttpHandler> Service for HttpService<H> {
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
                let io = TokioIo::new(stream);
                let service = service_fn(move |request| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle(request).await) }
                });

                let conn = http1::Builder::new().serve_connection(io, service);
                tokio::pin!(conn);
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            debug!(%peer, error = %e, "connection ended with error");
                        }
                    }
                    _ = draining.cancelled() => {
                        conn.as_mut().graceful_shutdown();
                        if let Err(e) = conn.as_mut().await {
                            debug!(%peer, error = %e, "connection ended during drain");
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

/// Build a server with a single HTTP endpoint and run it under supervision.
pub async fn listen_and_serve<H: HttpHandler>(addr: &str, handler: H) -> Result<(), RunError> {
    let mut server = Server::new();
    server.register(addr, Arc::new(HttpService::new(handler)));
    server.run().await
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
