// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Descriptor plumbing across the exec boundary.
//!
//! The master stages a `F_DUPFD_CLOEXEC` duplicate of every listening
//! socket, guaranteed to land at or above `FD_START + count` so the
//! duplicates never collide with their target slots. A pre-exec hook in the
//! spawned worker then `dup2`s each staged descriptor onto its fixed slot
//! (`FD_START + index`, in registration order); `dup2` clears the
//! close-on-exec flag on the slot while the staged originals, still
//! close-on-exec, vanish at exec. The worker rebuilds its listeners from
//! those slots alone.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::dup2;

use baton_core::role::{ENV_NUM_FDS, FD_START};
use baton_core::Service;

use crate::error::InheritError;

/// A listener slot rebuilt inside the worker, paired with the service
/// registered for its port.
pub(crate) struct Endpoint {
    pub listener: tokio::net::TcpListener,
    pub service: Arc<dyn Service>,
    pub port: u16,
}

/// Stage inheritable duplicates of the master's listening sockets.
///
/// The returned descriptors are close-on-exec in the master and stay open
/// for its lifetime; every spawned worker installs them via
/// [`install_slots`].
pub(crate) fn stage_inheritable(
    listeners: &[std::net::TcpListener],
) -> std::io::Result<Vec<OwnedFd>> {
    let floor = FD_START + listeners.len() as i32;
    let mut staged = Vec::with_capacity(listeners.len());
    for listener in listeners {
        let fd = fcntl(listener.as_raw_fd(), FcntlArg::F_DUPFD_CLOEXEC(floor))?;
        // SAFETY: fcntl just returned this descriptor and nothing else owns it.
        staged.push(unsafe { OwnedFd::from_raw_fd(fd) });
    }
    Ok(staged)
}

/// Move staged descriptors onto their fixed slots. Runs in the pre-exec
/// hook of a freshly forked worker, so only async-signal-safe calls.
pub(crate) fn install_slots(staged: &[RawFd]) -> std::io::Result<()> {
    for (i, &fd) in staged.iter().enumerate() {
        let slot = FD_START + i as i32;
        dup2(fd, slot)?;
    }
    Ok(())
}

/// Rebuild one tokio listener per inherited descriptor slot and pair each
/// with the service registered for its local port. Fails fast on any
/// mismatch between the environment contract and the registry.
pub(crate) fn rebuild_endpoints(
    services: &HashMap<u16, Arc<dyn Service>>,
) -> Result<Vec<Endpoint>, InheritError> {
    let inherited = parse_num_fds(std::env::var(ENV_NUM_FDS).ok())?;
    if inherited != services.len() {
        return Err(InheritError::CountMismatch { inherited, registered: services.len() });
    }

    let mut endpoints = Vec::with_capacity(inherited);
    for i in 0..inherited {
        let slot = FD_START + i as i32;
        // SAFETY: the spawn contract puts an inherited listening socket at
        // every slot in FD_START..FD_START+BATON_NUM_FDS, owned by no one
        // else in this process.
        let std_listener = unsafe { std::net::TcpListener::from_raw_fd(slot) };
        std_listener
            .set_nonblocking(true)
            .map_err(|source| InheritError::Listener { slot, source })?;
        let local = std_listener
            .local_addr()
            .map_err(|source| InheritError::Listener { slot, source })?;
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|source| InheritError::Listener { slot, source })?;

        let service = services
            .get(&local.port())
            .cloned()
            .ok_or(InheritError::UnknownPort(local.port()))?;
        endpoints.push(Endpoint { listener, service, port: local.port() });
    }
    Ok(endpoints)
}

fn parse_num_fds(raw: Option<String>) -> Result<usize, InheritError> {
    let raw = raw.ok_or(InheritError::MissingNumFds)?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(InheritError::InvalidNumFds(raw)),
    }
}

#[cfg(test)]
#[path = "inherit_tests.rs"]
mod tests;
