// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role marker and the environment boundary between master and worker.
//!
//! The master re-executes its own binary to spawn a worker; these variables
//! and the start-of-range descriptor slot are the whole contract between the
//! two processes.

use std::sync::OnceLock;
use std::time::Instant;

/// Set to `"1"` in the environment of a spawned worker.
pub const ENV_WORKER: &str = "BATON_WORKER";

/// Count of listening descriptors inherited by the worker.
pub const ENV_NUM_FDS: &str = "BATON_NUM_FDS";

/// Pid of the worker being replaced; only present on reload spawns.
pub const ENV_OLD_WORKER_PID: &str = "BATON_OLD_WORKER_PID";

/// The value of [`ENV_WORKER`] that marks a worker process.
pub const WORKER_FLAG: &str = "1";

/// First descriptor slot carrying an inherited listener; slots are
/// consecutive from here, in registration order.
pub const FD_START: i32 = 3;

/// Which half of the supervisor this process runs.
///
/// Resolved once at `run`; the marker never changes after process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Worker,
}

impl Role {
    pub fn from_env() -> Role {
        if is_worker() {
            Role::Worker
        } else {
            Role::Master
        }
    }
}

pub fn is_worker() -> bool {
    std::env::var(ENV_WORKER).as_deref() == Ok(WORKER_FLAG)
}

pub fn is_master() -> bool {
    !is_worker()
}

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Stamp the process start time. First call wins; later calls are no-ops.
pub fn mark_started() {
    let _ = STARTED_AT.set(Instant::now());
}

/// When `run` was first entered in this process, if it has been.
pub fn started_at() -> Option<Instant> {
    STARTED_AT.get().copied()
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
