// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration.

use std::time::Duration;

use nix::sys::signal::Signal;

/// Options for a [`Server`](../../baton_supervisor/struct.Server.html).
///
/// Immutable once `run` has been called; the worker half receives a clone
/// through the re-executed process, not through shared memory.
#[derive(Debug, Clone)]
pub struct Options {
    reload_signals: Vec<Signal>,
    stop_signals: Vec<Signal>,
    watch_interval: Duration,
    stop_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reload_signals: vec![Signal::SIGHUP, Signal::SIGUSR1],
            // SIGKILL stays in the default set as a documented sentinel for
            // "the process can always be killed"; handler registration skips
            // uncatchable signals (see `catchable`).
            stop_signals: vec![Signal::SIGTERM, Signal::SIGINT, Signal::SIGKILL],
            watch_interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(20),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the signals that trigger a worker reload. The first entry is
    /// the one [`reload`](../../baton_supervisor/struct.Server.html#method.reload)
    /// sends to the master.
    pub fn with_reload_signals(mut self, signals: Vec<Signal>) -> Self {
        self.reload_signals = signals;
        self
    }

    /// Replace the signals that trigger graceful shutdown of the master.
    pub fn with_stop_signals(mut self, signals: Vec<Signal>) -> Self {
        self.stop_signals = signals;
        self
    }

    /// Period at which the worker checks whether the master is still alive.
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Upper bound on graceful shutdown; past it in-flight work is abandoned
    /// and remaining workers are terminated forcibly.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn reload_signals(&self) -> &[Signal] {
        &self.reload_signals
    }

    pub fn stop_signals(&self) -> &[Signal] {
        &self.stop_signals
    }

    pub fn watch_interval(&self) -> Duration {
        self.watch_interval
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }
}

/// Whether a handler can actually be installed for `signal`.
///
/// SIGKILL and SIGSTOP are reserved by the kernel; they may appear in signal
/// sets as a semantic hint but are skipped at registration.
pub fn catchable(signal: Signal) -> bool {
    !matches!(signal, Signal::SIGKILL | Signal::SIGSTOP)
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
