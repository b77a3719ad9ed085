// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for driving a `batond` master/worker pair.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// A running batond master with its captured log stream.
///
/// Master and worker share the inherited stderr pipe, so `log` carries the
/// interleaved tracing output of both processes.
pub struct Daemon {
    child: Child,
    log: Arc<Mutex<Vec<String>>>,
}

pub fn batond() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin("batond"))
}

pub fn spawn(http_port: u16, rpc_port: Option<u16>, envs: &[(&str, &str)]) -> Daemon {
    let mut cmd = batond();
    cmd.arg(http_port.to_string());
    if let Some(port) = rpc_port {
        cmd.arg(port.to_string());
    }
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.env("RUST_LOG", "info");
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().expect("failed to spawn batond");
    let stderr = child.stderr.take().expect("stderr must be piped");

    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            sink.lock().unwrap().push(line);
        }
    });

    Daemon { child, log }
}

impl Daemon {
    pub fn master_pid(&self) -> i32 {
        self.child.id() as i32
    }

    pub fn lines(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Block until a log line containing `needle` appears.
    pub fn wait_for_line(&self, needle: &str, timeout: Duration) -> String {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.lines().iter().find(|l| l.contains(needle)) {
                return line.clone();
            }
            assert!(
                Instant::now() < deadline,
                "no log line containing {needle:?} within {timeout:?}; log:\n{}",
                self.lines().join("\n")
            );
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Pid of the currently serving worker, taken from the master's log.
    pub fn worker_pid(&self, timeout: Duration) -> i32 {
        let deadline = Instant::now() + timeout;
        loop {
            for line in self.lines().iter().rev() {
                if line.contains("reload complete") {
                    if let Some(pid) = field_int(line, "new=") {
                        return pid;
                    }
                }
                if line.contains("worker started") {
                    if let Some(pid) = field_int(line, "pid=") {
                        return pid;
                    }
                }
            }
            assert!(
                Instant::now() < deadline,
                "no worker pid in log within {timeout:?}; log:\n{}",
                self.lines().join("\n")
            );
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    pub fn signal_master(&self, signal: Signal) {
        kill(Pid::from_raw(self.master_pid()), signal).expect("failed to signal master");
    }

    /// Wait for the master process to exit.
    pub fn wait_exit(&mut self, timeout: Duration) -> ExitStatus {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait().expect("try_wait failed") {
                return status;
            }
            assert!(
                Instant::now() < deadline,
                "master still running after {timeout:?}; log:\n{}",
                self.lines().join("\n")
            );
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let pid = Pid::from_raw(self.master_pid());
        let _ = kill(pid, Signal::SIGTERM);
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        let _ = kill(pid, Signal::SIGKILL);
        let _ = self.child.wait();
    }
}

/// Whether a process is still alive (signal 0 probe).
pub fn process_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

pub fn connect_retry(port: u16, timeout: Duration) -> TcpStream {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => {
                stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
                stream.set_write_timeout(Some(Duration::from_secs(5))).unwrap();
                return stream;
            }
            Err(e) => {
                assert!(
                    Instant::now() < deadline,
                    "could not connect to port {port} within {timeout:?}: {e}"
                );
                std::thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

/// One full HTTP exchange against the demo's HTTP endpoint.
pub fn http_get(port: u16, path: &str) -> String {
    let mut stream = connect_retry(port, Duration::from_secs(5));
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).expect("request write failed");

    let mut response = String::new();
    stream.read_to_string(&mut response).expect("response read failed");
    response
}

/// Pid the demo handler put in its response body (`pid=N path=...`).
pub fn pid_from_body(response: &str) -> i32 {
    field_int(response, "pid=").unwrap_or_else(|| panic!("no pid in response: {response:?}"))
}

/// One framed RPC call against the demo's RPC endpoint.
pub fn rpc_call(stream: &mut TcpStream, id: u64, method: &str, params: serde_json::Value) -> serde_json::Value {
    let payload =
        serde_json::to_vec(&serde_json::json!({ "id": id, "method": method, "params": params }))
            .unwrap();
    stream.write_all(&(payload.len() as u32).to_be_bytes()).unwrap();
    stream.write_all(&payload).unwrap();

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).unwrap();
    let mut frame = vec![0u8; u32::from_be_bytes(len_buf) as usize];
    stream.read_exact(&mut frame).unwrap();
    serde_json::from_slice(&frame).unwrap()
}

fn field_int(line: &str, key: &str) -> Option<i32> {
    let start = line.find(key)? + key.len();
    let digits: String = line[start..].chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
