//! Launching while the parent has its own standard descriptors closed.
//!
//! Closing descriptor 0 or 1 is visible to every thread in the process, so
//! all of it runs inside a single test in its own binary.

use std::io::{Read, Write};
use std::os::fd::RawFd;

use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::{close, dup2};
use proclaunch::{ProcessConfig, ProcessHandle, Stdio};

/// Closes a standard descriptor and puts it back on drop
struct ClosedStdio {
    fd: RawFd,
    saved: RawFd,
}

impl ClosedStdio {
    fn close(fd: RawFd) -> Self {
        let saved = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(10)).unwrap();
        close(fd).unwrap();
        Self { fd, saved }
    }
}

impl Drop for ClosedStdio {
    fn drop(&mut self) {
        let _ = dup2(self.saved, self.fd);
        let _ = close(self.saved);
    }
}

fn sh(script: &str) -> ProcessConfig {
    ProcessConfig::new("/bin/sh").args(["sh", "-c", script])
}

fn read_all(mut reader: impl Read) -> String {
    let mut out = String::new();
    reader.read_to_string(&mut out).unwrap();
    out
}

/// `cat` exits 0 on `/dev/null` and fails on a closed stdin
fn discarded_stdin_with_piped_stdout() -> String {
    let handle = ProcessHandle::new(
        sh("cat; echo $?")
            .stdin(Stdio::Discard)
            .stdout(Stdio::Pipe)
            .stderr(Stdio::Discard),
    )
    .unwrap();
    let mut pipes = handle.launch().unwrap();
    let output = read_all(pipes.stdout.take().unwrap());
    handle.wait_until_exit().unwrap();
    output
}

fn discarded_stdout_with_piped_stderr() -> String {
    let handle = ProcessHandle::new(
        sh("cat; echo $? >&2")
            .stdin(Stdio::Discard)
            .stdout(Stdio::Discard)
            .stderr(Stdio::Pipe),
    )
    .unwrap();
    let mut pipes = handle.launch().unwrap();
    let output = read_all(pipes.stderr.take().unwrap());
    handle.wait_until_exit().unwrap();
    output
}

fn cat_round_trip() -> String {
    let handle = ProcessHandle::new(
        ProcessConfig::new("cat")
            .stdin(Stdio::Pipe)
            .stdout(Stdio::Pipe)
            .stderr(Stdio::Discard),
    )
    .unwrap();
    let mut pipes = handle.launch().unwrap();
    let mut stdin = pipes.stdin.take().unwrap();
    stdin.write_all(b"hello\n").unwrap();
    drop(stdin);
    let output = read_all(pipes.stdout.take().unwrap());
    assert_eq!(handle.wait_until_exit().unwrap().exit_code(), Some(0));
    output
}

#[test]
fn test_wiring_survives_closed_parent_stdio() {
    {
        let _stdin = ClosedStdio::close(libc::STDIN_FILENO);

        // The stdout pipe's parent end would otherwise land on descriptor 0
        assert_eq!(discarded_stdin_with_piped_stdout(), "0\n");
        // The stdin pipe's child end would otherwise already be descriptor 0
        assert_eq!(cat_round_trip(), "hello\n");

        {
            let _stdout = ClosedStdio::close(libc::STDOUT_FILENO);
            // The stderr pipe's child end would otherwise be descriptor 1,
            // which the stdout redirect overwrites before it is duplicated
            assert_eq!(discarded_stdout_with_piped_stderr(), "0\n");
        }
    }

    assert_eq!(discarded_stdin_with_piped_stdout(), "0\n");
}
