// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side specs: the inheritance contract fails fast, and a worker
//! orphaned by its master shuts itself down.

use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use serial_test::serial;

use crate::common::{self, http_get, process_alive};

#[test]
#[serial]
fn descriptor_count_mismatch_fails_fast_with_a_diagnostic() {
    // A worker told to expect two descriptors while only one service is
    // registered must refuse to start.
    let output = common::batond()
        .arg("17041")
        .env("BATON_WORKER", "1")
        .env("BATON_NUM_FDS", "2")
        .output()
        .expect("run batond");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2!=1"), "diagnostic must name both counts: {stderr}");
}

#[test]
#[serial]
fn missing_descriptor_count_fails_fast() {
    let output = common::batond()
        .arg("17043")
        .env("BATON_WORKER", "1")
        .output()
        .expect("run batond");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BATON_NUM_FDS"), "diagnostic must name the variable: {stderr}");
}

#[test]
#[serial]
fn worker_detects_master_death_within_the_watch_interval() {
    let daemon = common::spawn(17045, None, &[("BATOND_WATCH_INTERVAL_MS", "200")]);
    http_get(17045, "/up");
    let worker_pid = daemon.worker_pid(Duration::from_secs(5));

    daemon.signal_master(Signal::SIGKILL);

    // Reparenting must be noticed within one watch interval (the Linux
    // parent-death signal makes it immediate); the worker then drains and
    // exits on its own.
    let deadline = Instant::now() + Duration::from_secs(2);
    while process_alive(worker_pid) {
        assert!(
            Instant::now() < deadline,
            "worker must shut down after losing its master"
        );
        std::thread::sleep(Duration::from_millis(25));
    }
}
