// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide server registry and the single `run` entry point.

use std::collections::HashMap;
use std::sync::Arc;

use nix::sys::signal::kill;
use nix::unistd::getppid;
use tracing::warn;

use baton_core::role::{self, Role};
use baton_core::{Options, Service, Signal};

use crate::error::RunError;
use crate::master::Master;
use crate::worker::Worker;

/// Registry of (address, service) bindings plus the supervisor options.
///
/// Registration order is significant: it fixes the positional mapping from
/// bindings to inherited descriptor slots. The port component of each
/// address is the stable key identifying a binding across the master and
/// worker processes, so each service is held in a single map keyed by port.
pub struct Server {
    opt: Options,
    addrs: Vec<String>,
    services: HashMap<u16, Arc<dyn Service>>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(opt: Options) -> Self {
        Self { opt, addrs: Vec::new(), services: HashMap::new() }
    }

    /// Register a `host:port` address with the service that will handle it.
    ///
    /// Malformed addresses (no parsable port) and duplicate ports are
    /// reported and dropped; the first binding for a port wins.
    pub fn register(&mut self, addr: impl Into<String>, service: Arc<dyn Service>) {
        let addr = addr.into();
        let Some(port) = parse_port(&addr) else {
            warn!(%addr, "invalid listen address, binding dropped");
            return;
        };
        if self.services.contains_key(&port) {
            warn!(%addr, port, "duplicate port registration, binding dropped");
            return;
        }
        self.addrs.push(addr);
        self.services.insert(port, service);
    }

    /// Run the registered services under supervision.
    ///
    /// The single entry point for both roles: the initial process becomes
    /// the master, the re-executed child the worker. Returns only on
    /// shutdown or a fatal error; configuration problems are reported here
    /// before any worker is spawned.
    pub async fn run(&self) -> Result<(), RunError> {
        if self.addrs.is_empty() {
            return Err(RunError::NoEndpoints);
        }
        role::mark_started();

        match Role::from_env() {
            Role::Worker => Worker::new(self.services.clone(), self.opt.clone()).run().await,
            Role::Master => Master::new(self.addrs.clone(), self.opt.clone()).run().await,
        }
    }

    /// Request a hot-restart of the worker.
    ///
    /// Meaningful from within a worker (typically a request handler): sends
    /// the first configured reload signal to the master. In the master role,
    /// or in a worker whose parent is gone, this is a no-op.
    pub fn reload(&self) -> std::io::Result<()> {
        self.reload_handle().request()
    }

    /// A cheap clonable handle for triggering reloads from request handlers.
    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle { signals: self.opt.reload_signals().to_vec() }
    }
}

/// Triggers a hot-restart without holding on to the whole [`Server`].
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    signals: Vec<Signal>,
}

impl ReloadHandle {
    /// Signal the master to spawn a replacement worker.
    ///
    /// No-op outside the worker role or when the parent is the init
    /// process (the master is already gone).
    pub fn request(&self) -> std::io::Result<()> {
        let ppid = getppid();
        if role::is_worker() && ppid.as_raw() != 1 {
            if let Some(signal) = self.signals.first() {
                kill(ppid, *signal)?;
            }
        }
        Ok(())
    }
}

fn parse_port(addr: &str) -> Option<u16> {
    let (_, port) = addr.rsplit_once(':')?;
    port.parse().ok()
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
