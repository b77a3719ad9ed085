// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown specs: stop signals cascade to the worker, deadlines bound the
//! drain, and repeated stop triggers collapse into one.

use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serial_test::serial;

use crate::common::{self, http_get, process_alive};

#[test]
#[serial]
fn stop_signal_cascades_and_master_exits_cleanly() {
    let mut daemon = common::spawn(17021, None, &[]);
    http_get(17021, "/up");
    let worker_pid = daemon.worker_pid(Duration::from_secs(5));

    daemon.signal_master(Signal::SIGINT);

    let status = daemon.wait_exit(Duration::from_secs(5));
    assert!(status.success(), "clean stop must exit zero, got {status}");
    daemon.wait_for_line("all workers stopped", Duration::from_secs(1));
    assert!(!process_alive(worker_pid), "worker must be gone after stop");
}

#[test]
#[serial]
fn slow_graceful_stop_is_abandoned_at_the_stop_timeout() {
    let mut daemon = common::spawn(
        17023,
        None,
        &[
            ("BATOND_ECHO_PORT", "17024"),
            ("BATOND_SLOW_STOP_MS", "30000"),
            ("BATOND_STOP_TIMEOUT_MS", "1000"),
        ],
    );
    http_get(17023, "/up");
    let worker_pid = daemon.worker_pid(Duration::from_secs(5));

    let begun = Instant::now();
    kill(Pid::from_raw(worker_pid), Signal::SIGTERM).expect("signal worker");

    // The worker abandons the stalled stop at its deadline and exits; the
    // master sees an unexpected worker exit and terminates with an error.
    let status = daemon.wait_exit(Duration::from_secs(4));
    assert!(begun.elapsed() < Duration::from_secs(3), "deadline must bound the drain");
    assert!(!status.success(), "unexpected worker exit is an error for the master");
    daemon.wait_for_line("missed its deadline", Duration::from_secs(1));
}

#[test]
#[serial]
fn repeated_sigterms_are_equivalent_to_one() {
    let mut daemon = common::spawn(17025, None, &[]);
    http_get(17025, "/up");
    let worker_pid = daemon.worker_pid(Duration::from_secs(5));

    for _ in 0..3 {
        let _ = kill(Pid::from_raw(worker_pid), Signal::SIGTERM);
        std::thread::sleep(Duration::from_millis(30));
    }

    daemon.wait_exit(Duration::from_secs(5));
    let completions = daemon
        .lines()
        .iter()
        .filter(|l| l.contains("worker shutdown complete"))
        .count();
    assert_eq!(completions, 1, "shutdown must run exactly once");
}
