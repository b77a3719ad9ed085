// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hot-reload specs: worker swaps preserve the listening ports and clients
//! never see a refused connection.

use std::net::TcpStream;
use std::time::Duration;

use nix::sys::signal::Signal;
use serial_test::serial;

use crate::common::{self, connect_retry, http_get, pid_from_body, process_alive, rpc_call};

#[test]
#[serial]
fn reload_swaps_the_worker_and_preserves_the_port() {
    let daemon = common::spawn(17011, None, &[]);
    let old_pid = pid_from_body(&http_get(17011, "/before"));

    daemon.signal_master(Signal::SIGHUP);
    daemon.wait_for_line("reload complete", Duration::from_secs(5));

    let new_pid = pid_from_body(&http_get(17011, "/after"));
    assert_ne!(new_pid, old_pid, "a different worker must be serving");

    // The replaced worker drains and goes away.
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    while process_alive(old_pid) {
        assert!(std::time::Instant::now() < deadline, "old worker still alive");
        std::thread::sleep(Duration::from_millis(25));
    }
}

#[test]
#[serial]
fn new_worker_signals_the_old_one_before_it_exits() {
    let daemon = common::spawn(17013, None, &[]);
    let old_pid = pid_from_body(&http_get(17013, "/warm"));

    daemon.signal_master(Signal::SIGHUP);
    daemon.wait_for_line("reload complete", Duration::from_secs(5));

    // The hand-off goes worker-to-worker: the replacement reports signaling
    // its predecessor, and only then does the master see the old exit.
    let lines = daemon.lines();
    let signaled = lines
        .iter()
        .position(|l| l.contains("signaled previous worker"))
        .expect("new worker must log the hand-off signal");
    let completed = lines
        .iter()
        .position(|l| l.contains("reload complete"))
        .expect("master must log reload completion");
    assert!(signaled < completed, "hand-off signal must precede the old worker's exit");

    let line = &lines[signaled];
    assert!(line.contains(&old_pid.to_string()), "hand-off must target the old worker: {line}");
}

#[test]
#[serial]
fn clients_see_no_refused_connections_across_a_reload() {
    let daemon = common::spawn(17015, None, &[]);
    http_get(17015, "/warmup");

    let hammer = std::thread::spawn(|| {
        let mut attempts = 0u32;
        let mut refused = 0u32;
        let deadline = std::time::Instant::now() + Duration::from_millis(1500);
        while std::time::Instant::now() < deadline {
            attempts += 1;
            if TcpStream::connect(("127.0.0.1", 17015)).is_err() {
                refused += 1;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        (attempts, refused)
    });

    std::thread::sleep(Duration::from_millis(300));
    daemon.signal_master(Signal::SIGHUP);
    daemon.wait_for_line("reload complete", Duration::from_secs(5));

    let (attempts, refused) = hammer.join().expect("hammer thread panicked");
    assert!(attempts > 50, "hammer must actually run, got {attempts} attempts");
    assert_eq!(refused, 0, "no connection may be refused across the reload");
}

#[test]
#[serial]
fn reload_can_be_requested_from_a_worker_request_handler() {
    let daemon = common::spawn(17017, Some(17018), &[]);
    let old_pid = pid_from_body(&http_get(17017, "/pre"));

    let mut stream = connect_retry(17018, Duration::from_secs(5));
    let reply = rpc_call(&mut stream, 1, "reload", serde_json::Value::Null);
    assert_eq!(reply["result"]["reloading"], serde_json::json!(true));

    daemon.wait_for_line("reload complete", Duration::from_secs(5));
    let new_pid = pid_from_body(&http_get(17017, "/post"));
    assert_ne!(new_pid, old_pid);
}
