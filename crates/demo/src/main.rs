// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! batond: demo daemon for the baton supervisor.
//!
//! Serves an HTTP endpoint and (optionally) a framed-RPC endpoint under
//! supervision. Doubles as the fixture the workspace specs drive: responses
//! carry the serving pid, and the RPC plane exposes a `reload` method so a
//! hot-restart can be triggered from inside a request handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use serde_json::{json, Value};
use tracing::info;

use baton_adapters::{
    HandlerFn, HttpRequest, HttpService, LineEchoService, RpcError, RpcHandler, RpcService,
    SlowStopService,
};
use baton_core::Options;
use baton_supervisor::{ReloadHandle, Server};

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("batond {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let (http_port, rpc_port) = match parse_ports(&args) {
        Ok(ports) => ports,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("Usage: batond [--help | --version] <http-port> [rpc-port]");
            std::process::exit(2);
        }
    };

    setup_logging();

    let mut server = Server::with_options(options_from_env());
    let reload = server.reload_handle();

    server.register(format!("127.0.0.1:{http_port}"), http_service());
    if let Some(port) = rpc_port {
        server.register(format!("127.0.0.1:{port}"), rpc_service(reload));
    }
    if let Some(port) = echo_port() {
        server.register(format!("127.0.0.1:{port}"), echo_service());
    }

    info!(http_port, rpc_port, "batond starting");
    if let Err(e) = server.run().await {
        eprintln!("batond: {e}");
        std::process::exit(1);
    }
}

fn http_service() -> Arc<HttpService<impl baton_adapters::HttpHandler>> {
    Arc::new(HttpService::new(HandlerFn(|request: HttpRequest| async move {
        let body = format!("pid={} path={}", std::process::id(), request.uri().path());
        hyper::Response::new(Full::new(Bytes::from(body)))
    })))
}

fn rpc_service(reload: ReloadHandle) -> Arc<RpcService<DemoRpc>> {
    Arc::new(RpcService::new(DemoRpc { reload }))
}

fn echo_service() -> Arc<dyn baton_core::Service> {
    let stall = std::env::var("BATOND_SLOW_STOP_MS").ok().and_then(|v| v.parse::<u64>().ok());
    match stall {
        Some(ms) => Arc::new(SlowStopService::new(
            LineEchoService::new(),
            Duration::from_millis(ms),
        )),
        None => Arc::new(LineEchoService::new()),
    }
}

struct DemoRpc {
    reload: ReloadHandle,
}

#[async_trait]
impl RpcHandler for DemoRpc {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "echo" => Ok(params),
            "pid" => Ok(json!(std::process::id())),
            "reload" => {
                self.reload.request().map_err(|e| RpcError::new(e.to_string()))?;
                Ok(json!({ "reloading": true }))
            }
            other => Err(RpcError::new(format!("unknown method {other:?}"))),
        }
    }
}

fn parse_ports(args: &[String]) -> Result<(u16, Option<u16>), String> {
    let mut ports = args.iter().filter(|a| !a.starts_with('-'));
    let http = ports
        .next()
        .ok_or("missing <http-port>")?
        .parse::<u16>()
        .map_err(|_| "invalid <http-port>".to_string())?;
    let rpc = match ports.next() {
        Some(raw) => Some(raw.parse::<u16>().map_err(|_| "invalid [rpc-port]".to_string())?),
        None => None,
    };
    if let Some(extra) = ports.next() {
        return Err(format!("unexpected argument '{extra}'"));
    }
    Ok((http, rpc))
}

/// Optional third endpoint: a raw echo server, wrapped with a stop stall
/// when `BATOND_SLOW_STOP_MS` is set.
fn echo_port() -> Option<u16> {
    std::env::var("BATOND_ECHO_PORT").ok().and_then(|v| v.parse().ok())
}

fn options_from_env() -> Options {
    let mut opt = Options::new();
    if let Some(ms) = env_ms("BATOND_STOP_TIMEOUT_MS") {
        opt = opt.with_stop_timeout(ms);
    }
    if let Some(ms) = env_ms("BATOND_WATCH_INTERVAL_MS") {
        opt = opt.with_watch_interval(ms);
    }
    opt
}

fn env_ms(name: &str) -> Option<Duration> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok()).map(Duration::from_millis)
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn print_help() {
    println!("batond {}", env!("CARGO_PKG_VERSION"));
    println!("Demo daemon for the baton supervisor");
    println!();
    println!("USAGE:");
    println!("    batond [--help | --version] <http-port> [rpc-port]");
    println!();
    println!("Serves HTTP on <http-port> and framed RPC on [rpc-port], both on");
    println!("127.0.0.1, under a master/worker pair. Send SIGHUP to the master");
    println!("for a zero-downtime reload, SIGTERM or SIGINT to stop.");
    println!();
    println!("ENVIRONMENT:");
    println!("    BATOND_ECHO_PORT         serve a raw echo endpoint on this port");
    println!("    BATOND_SLOW_STOP_MS      stall the echo endpoint's stop path");
    println!("    BATOND_STOP_TIMEOUT_MS   override the graceful-stop timeout");
    println!("    BATOND_WATCH_INTERVAL_MS override the master liveness poll");
}
