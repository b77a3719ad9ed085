// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master liveness watcher.
//!
//! If the master dies, the worker is reparented to init; polling the parent
//! pid catches that within one watch interval. On Linux the spawn path also
//! arms the parent-death signal, which delivers SIGTERM immediately; this
//! poll is the portable fallback and produces the same observable behavior.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::warn;

pub(crate) fn spawn_master_watch(interval: Duration, died: Arc<Notify>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        loop {
            tick.tick().await;
            if nix::unistd::getppid().as_raw() == 1 {
                warn!("reparented to init, master is dead");
                died.notify_one();
                break;
            }
        }
    });
}
