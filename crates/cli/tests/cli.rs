//! Drives the built `corvid` binary end-to-end (spec.md §6): file-mode
//! exit codes and the REPL's cross-line global persistence.

use std::io::Write;
use std::process::{Command, Stdio};

fn corvid_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_corvid"))
}

fn write_script(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("script.lox");
    std::fs::write(&path, contents).expect("write script");
    (dir, path)
}

#[test]
fn file_mode_exit_code_0_on_success() {
    let (_dir, path) = write_script("print 1 + 2 * 3;");
    let output = corvid_bin().arg(&path).output().expect("run corvid");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "7\n");
}

#[test]
fn file_mode_exit_code_65_on_compile_error() {
    let (_dir, path) = write_script("var = 1;");
    let output = corvid_bin().arg(&path).output().expect("run corvid");
    assert_eq!(output.status.code(), Some(65));
}

#[test]
fn file_mode_exit_code_70_on_runtime_error() {
    let (_dir, path) = write_script("print undefined_name;");
    let output = corvid_bin().arg(&path).output().expect("run corvid");
    assert_eq!(output.status.code(), Some(70));
}

#[test]
fn file_mode_exit_code_74_on_missing_file() {
    let (dir, _path) = write_script("print 1;");
    let missing = dir.path().join("does_not_exist.lox");
    let output = corvid_bin().arg(&missing).output().expect("run corvid");
    assert_eq!(output.status.code(), Some(74));
}

#[test]
fn repl_persists_globals_across_lines() {
    let mut child = corvid_bin()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn corvid REPL");

    {
        let mut stdin = child.stdin.take().expect("child stdin");
        writeln!(stdin, "var x = 1;").expect("write line");
        writeln!(stdin, "x = x + 1;").expect("write line");
        writeln!(stdin, "print x;").expect("write line");
        // Dropping `stdin` here closes the pipe so the REPL sees EOF.
    }

    let output = child.wait_with_output().expect("wait for corvid REPL");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n");
}
