// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker role: rebuilds listeners from inherited descriptors, serves all
//! traffic, and hands over to its replacement on reload.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use baton_core::role::ENV_OLD_WORKER_PID;
use baton_core::{Options, Service};

use crate::error::RunError;
use crate::inherit;
use crate::watch;

pub(crate) struct Worker {
    services: HashMap<u16, Arc<dyn Service>>,
    opt: Options,
}

impl Worker {
    pub fn new(services: HashMap<u16, Arc<dyn Service>>, opt: Options) -> Self {
        Self { services, opt }
    }

    pub async fn run(&self) -> Result<(), RunError> {
        set_process_title();

        let endpoints = inherit::rebuild_endpoints(&self.services)?;

        // Start every serve before telling the old worker to go away: the
        // inherited sockets are already accepting at the kernel level, so
        // once the serve tasks run the hand-off window has no gap.
        let mut running: Vec<Arc<dyn Service>> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let port = endpoint.port;
            match endpoint.listener.local_addr() {
                Ok(addr) => info!(%addr, "serving"),
                Err(_) => info!(port, "serving"),
            }
            let service = endpoint.service.clone();
            let listener = endpoint.listener;
            tokio::spawn(async move {
                if let Err(e) = service.serve(listener).await {
                    // One failing endpoint does not take the others down.
                    warn!(port, error = %e, "serve ended with error");
                }
            });
            running.push(endpoint.service);
        }

        notify_old_worker();

        let stopper = Stopper::new(self.opt.clone(), running);
        self.wait_for_stop().await?;
        stopper.stop_all().await;
        Ok(())
    }

    /// Block until a stop condition: SIGTERM on this process, or the master
    /// watcher reporting that this process was reparented to init.
    async fn wait_for_stop(&self) -> Result<(), RunError> {
        let master_died = Arc::new(Notify::new());
        watch::spawn_master_watch(self.opt.watch_interval(), master_died.clone());

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|source| RunError::Signal { signal: Signal::SIGTERM, source })?;

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, stopping services"),
            _ = master_died.notified() => info!("master gone, stopping services"),
        }
        Ok(())
    }
}

/// Guarded shutdown fan-out.
///
/// The flag behind the mutex makes shutdown idempotent: concurrent stop
/// triggers neither double-stop the services nor restart the deadline.
struct Stopper {
    opt: Options,
    services: Vec<Arc<dyn Service>>,
    started: Mutex<bool>,
}

impl Stopper {
    fn new(opt: Options, services: Vec<Arc<dyn Service>>) -> Self {
        Self { opt, services, started: Mutex::new(false) }
    }

    async fn stop_all(&self) {
        {
            let mut started = self.started.lock();
            if *started {
                debug!("shutdown already in progress");
                return;
            }
            *started = true;
        }

        // One deadline for the whole fan-out; a single slow endpoint must
        // not extend total downtime past the stop timeout.
        let deadline = tokio::time::Instant::now() + self.opt.stop_timeout();
        let stops = self.services.iter().map(|service| {
            let service = service.clone();
            async move {
                match tokio::time::timeout_at(deadline, service.graceful_stop(deadline)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "graceful stop failed"),
                    Err(_) => warn!("graceful stop missed its deadline, abandoning"),
                }
            }
        });
        join_all(stops).await;
        info!("worker shutdown complete");
    }
}

/// Tell the worker being replaced that this one is serving. Failures only
/// warn: the old worker may already be gone.
fn notify_old_worker() {
    let Ok(raw) = std::env::var(ENV_OLD_WORKER_PID) else {
        return;
    };
    let Ok(pid) = raw.parse::<i32>() else {
        warn!(value = %raw, "unparseable old worker pid, skipping hand-off signal");
        return;
    };
    if pid <= 1 {
        return;
    }
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => info!(old_worker = pid, "signaled previous worker"),
        Err(e) => warn!(old_worker = pid, error = %e, "could not signal previous worker"),
    }
}

/// Cosmetic: mark the worker in process listings.
#[cfg(target_os = "linux")]
fn set_process_title() {
    if let Ok(name) = std::ffi::CString::new("baton-worker") {
        let _ = nix::sys::prctl::set_name(&name);
    }
}

#[cfg(not(target_os = "linux"))]
fn set_process_title() {}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
