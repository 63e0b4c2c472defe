//! Running the `fgmerge` binary.

#![allow(dead_code)]

use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Runs `fgmerge` with the given arguments.
pub fn run_fgmerge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fgmerge"))
        .args(args)
        .output()
        .expect("Failed to run fgmerge")
}

/// Runs `fgmerge` with `stdin` piped to the process.
pub fn run_fgmerge_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_fgmerge"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn fgmerge");

    child.stdin.take().expect("stdin is piped").write_all(stdin).expect("Failed to write stdin");
    child.wait_with_output().expect("Failed to wait for fgmerge")
}

/// Asserts that a run succeeded, showing its stderr otherwise.
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "fgmerge failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
