// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! baton-adapters: built-in services for the baton supervisor.
//!
//! Two protocol planes ship with the library, a byte-stream HTTP server and
//! a length-prefixed binary RPC server, plus small echo services used by
//! demos and tests. All of them implement the
//! [`Service`](baton_core::Service) contract; anything an embedder writes
//! against the same trait plugs in identically.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod echo;
pub mod http;
pub mod rpc;
pub mod wire;

pub use echo::{LineEchoService, SlowStopService};
pub use http::{listen_and_serve, HandlerFn, HttpHandler, HttpRequest, HttpResponse, HttpService};
pub use rpc::{RpcError, RpcHandler, RpcRequest, RpcResponse, RpcService};
pub use wire::{decode, encode, read_message, write_message, ProtocolError};
