// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! baton-supervisor: zero-downtime master/worker supervision for network
//! servers.
//!
//! A process embedding this library runs as one of two roles, decided by an
//! environment marker:
//!
//! - The **master** binds every registered address, keeps the listening
//!   sockets open for its whole lifetime, and re-executes its own binary as
//!   a single **worker** that inherits those sockets at fixed descriptor
//!   slots and serves all traffic.
//! - On a reload signal the master spawns a replacement worker against the
//!   same sockets. Once the replacement is serving it signals the old worker
//!   directly; the old worker drains in-flight connections and exits. The
//!   kernel accept queue is never without a serving process, so clients see
//!   neither refused connections nor rebind errors.
//!
//! ```no_run
//! use std::sync::Arc;
//! use baton_supervisor::Server;
//!
//! # async fn example(echo: Arc<dyn baton_core::Service>) -> Result<(), baton_supervisor::RunError> {
//! let mut server = Server::new();
//! server.register("127.0.0.1:9224", echo);
//! server.run().await
//! # }
//! ```

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod inherit;
mod master;
mod server;
mod watch;
mod worker;

pub use error::{InheritError, RunError};
pub use server::{ReloadHandle, Server};

pub use baton_core::{Options, ServeError, Service, Signal, StopError};
