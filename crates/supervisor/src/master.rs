// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master role: owns the listening sockets, spawns workers, mediates reload
//! and shutdown.
//!
//! The master never serves traffic and never closes its listening sockets
//! while workers are being swapped, so the kernel accept queue stays backed
//! by at least one serving process throughout a reload. Signal deliveries
//! and worker exits are funneled through one event channel and consumed by
//! a single state machine, so transitions cannot race.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use baton_core::role::{ENV_NUM_FDS, ENV_OLD_WORKER_PID, ENV_WORKER, WORKER_FLAG};
use baton_core::{catchable, Options};

use crate::error::RunError;
use crate::inherit;

/// What a received signal should do to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalAction {
    Reload,
    Stop,
}

/// Everything the master reacts to, serialized onto one channel.
enum MasterEvent {
    Signal { signal: Signal, action: SignalAction },
    WorkerExit { pid: Pid, status: String },
}

pub(crate) struct Master {
    addrs: Vec<String>,
    opt: Options,
}

impl Master {
    pub fn new(addrs: Vec<String>, opt: Options) -> Self {
        Self { addrs, opt }
    }

    pub async fn run(&self) -> Result<(), RunError> {
        let spawner = Spawner::bind(&self.addrs)?;

        let (tx, mut rx) = mpsc::channel::<MasterEvent>(32);
        subscribe_signals(&self.opt, &tx)?;

        let mut current = spawner.spawn(None, &tx).map_err(RunError::Spawn)?;
        info!(pid = current.as_raw(), "worker started");
        let mut pending: Option<Pid> = None;

        while let Some(event) = rx.recv().await {
            match event {
                MasterEvent::Signal { signal, action: SignalAction::Reload } => {
                    if pending.is_some() {
                        warn!(%signal, "reload already in progress, ignoring");
                        continue;
                    }
                    match spawner.spawn(Some(current), &tx) {
                        Ok(pid) => {
                            info!(%signal, old = current.as_raw(), new = pid.as_raw(),
                                "reload: spawned replacement worker");
                            pending = Some(pid);
                        }
                        // The old worker keeps serving; reload aborts.
                        Err(e) => warn!(%signal, error = %e,
                            "reload aborted: could not spawn replacement worker"),
                    }
                }
                MasterEvent::Signal { signal, action: SignalAction::Stop } => {
                    info!(%signal, "stopping");
                    return self.stop(current, pending, &mut rx).await;
                }
                MasterEvent::WorkerExit { pid, status } if pending == Some(pid) => {
                    warn!(pid = pid.as_raw(), %status,
                        "replacement worker exited during startup, keeping current worker");
                    pending = None;
                }
                MasterEvent::WorkerExit { pid, status } if pid == current => {
                    match pending.take() {
                        Some(next) => {
                            info!(old = pid.as_raw(), new = next.as_raw(), "reload complete");
                            current = next;
                        }
                        None => {
                            error!(pid = pid.as_raw(), %status, "worker exited unexpectedly");
                            return Err(RunError::WorkerExited { status });
                        }
                    }
                }
                MasterEvent::WorkerExit { pid, status } => {
                    debug!(pid = pid.as_raw(), %status, "exit of an already-replaced worker");
                }
            }
        }

        // Every sender is owned by a task we spawned; the channel closing
        // without a stop signal means the runtime is going away.
        Ok(())
    }

    /// Forward SIGTERM to every live worker and wait for them to drain,
    /// bounded by the stop timeout. Stragglers are terminated forcibly; the
    /// listening sockets close when the spawner drops.
    async fn stop(
        &self,
        current: Pid,
        pending: Option<Pid>,
        rx: &mut mpsc::Receiver<MasterEvent>,
    ) -> Result<(), RunError> {
        let mut live: Vec<Pid> = std::iter::once(current).chain(pending).collect();
        for pid in &live {
            if let Err(e) = kill(*pid, Signal::SIGTERM) {
                warn!(pid = pid.as_raw(), error = %e, "could not signal worker to stop");
            }
        }

        let deadline = tokio::time::Instant::now() + self.opt.stop_timeout();
        while !live.is_empty() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(MasterEvent::WorkerExit { pid, status })) => {
                    debug!(pid = pid.as_raw(), %status, "worker stopped");
                    live.retain(|p| *p != pid);
                }
                // Late signals while stopping change nothing.
                Ok(Some(MasterEvent::Signal { signal, .. })) => {
                    debug!(%signal, "signal ignored while stopping")
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(stragglers = live.len(), "stop timeout elapsed, killing workers");
                    for pid in &live {
                        let _ = kill(*pid, Signal::SIGKILL);
                    }
                    break;
                }
            }
        }
        if live.is_empty() {
            info!("all workers stopped");
        }
        Ok(())
    }
}

/// Binds the listening sockets once and re-executes the current binary with
/// them staged for inheritance. Owns the sockets for the master's lifetime.
struct Spawner {
    exe: PathBuf,
    args: Vec<std::ffi::OsString>,
    // NOTE(lifetime): held so the listening sockets stay open for the
    // master's lifetime; closed on drop
    #[allow(dead_code)]
    listeners: Vec<std::net::TcpListener>,
    staged: Vec<OwnedFd>,
}

impl Spawner {
    fn bind(addrs: &[String]) -> Result<Self, RunError> {
        let mut listeners = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let listener = std::net::TcpListener::bind(addr)
                .map_err(|source| RunError::Bind { addr: addr.clone(), source })?;
            info!(%addr, "listening");
            listeners.push(listener);
        }
        let staged = inherit::stage_inheritable(&listeners).map_err(RunError::Spawn)?;
        let exe = std::env::current_exe().map_err(RunError::Spawn)?;
        let args = std::env::args_os().skip(1).collect();
        Ok(Self { exe, args, listeners, staged })
    }

    /// Spawn a worker: same executable and argv, the role/descriptor
    /// environment contract, and the staged sockets dup2'd onto their slots
    /// in the pre-exec hook. Exit is reported onto the master channel.
    fn spawn(&self, old_worker: Option<Pid>, tx: &mpsc::Sender<MasterEvent>) -> std::io::Result<Pid> {
        let mut cmd = Command::new(&self.exe);
        cmd.args(&self.args)
            .env(ENV_WORKER, WORKER_FLAG)
            .env(ENV_NUM_FDS, self.staged.len().to_string());
        match old_worker {
            Some(pid) => cmd.env(ENV_OLD_WORKER_PID, pid.to_string()),
            None => cmd.env_remove(ENV_OLD_WORKER_PID),
        };

        let staged: Vec<RawFd> = self.staged.iter().map(AsRawFd::as_raw_fd).collect();
        // SAFETY: the hook only performs async-signal-safe syscalls (dup2,
        // prctl) on descriptors the parent keeps open.
        unsafe {
            cmd.pre_exec(move || {
                inherit::install_slots(&staged)?;
                #[cfg(target_os = "linux")]
                nix::sys::prctl::set_pdeathsig(Signal::SIGTERM)?;
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;
        let pid = child
            .id()
            .map(|id| Pid::from_raw(id as i32))
            .ok_or_else(|| std::io::Error::other("spawned worker has no pid"))?;
        watch_exit(pid, child, tx.clone());
        Ok(pid)
    }
}

/// Report the worker's exit onto the master channel. The master never polls
/// for liveness; this is its only child-reaping path.
fn watch_exit(pid: Pid, mut child: Child, tx: mpsc::Sender<MasterEvent>) {
    tokio::spawn(async move {
        let status = match child.wait().await {
            Ok(status) => status.to_string(),
            Err(e) => {
                error!(pid = pid.as_raw(), error = %e, "failed waiting on worker");
                "unknown".to_string()
            }
        };
        let _ = tx.send(MasterEvent::WorkerExit { pid, status }).await;
    });
}

/// One forwarder task per catchable configured signal, all feeding the
/// master channel. Reload entries take precedence when a signal appears in
/// both sets; uncatchable signals stay in the option sets as documentation
/// but are skipped here.
fn subscribe_signals(opt: &Options, tx: &mpsc::Sender<MasterEvent>) -> Result<(), RunError> {
    for (sig, action) in signal_plan(opt) {
        let mut stream = signal(SignalKind::from_raw(sig as i32))
            .map_err(|source| RunError::Signal { signal: sig, source })?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(MasterEvent::Signal { signal: sig, action }).await.is_err() {
                    break;
                }
            }
        });
    }
    Ok(())
}

pub(crate) fn signal_plan(opt: &Options) -> Vec<(Signal, SignalAction)> {
    let mut plan: Vec<(Signal, SignalAction)> = Vec::new();
    let reload = opt.reload_signals().iter().map(|s| (*s, SignalAction::Reload));
    let stop = opt.stop_signals().iter().map(|s| (*s, SignalAction::Stop));
    for (sig, action) in reload.chain(stop) {
        if !catchable(sig) {
            debug!(signal = %sig, "skipping uncatchable signal");
            continue;
        }
        if plan.iter().any(|(s, _)| *s == sig) {
            continue;
        }
        plan.push((sig, action));
    }
    plan
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
