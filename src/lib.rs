//! Shared helpers for the workspace-level integration tests

use std::io::{self, Read};

use proclaunch::{ProcessConfig, Stdio};

/// Read a pipe end to EOF
pub fn read_to_string(mut reader: impl Read) -> io::Result<String> {
    let mut out = String::new();
    reader.read_to_string(&mut out)?;
    Ok(out)
}

/// `/bin/sh -c script`
pub fn shell(script: &str) -> ProcessConfig {
    ProcessConfig::new("/bin/sh").args(["sh", "-c", script])
}

/// `cat` with stdin and stdout piped
pub fn cat_pipe() -> ProcessConfig {
    ProcessConfig::new("cat")
        .stdin(Stdio::Pipe)
        .stdout(Stdio::Pipe)
        .stderr(Stdio::Discard)
}

/// Number of descriptors open in this process
#[cfg(target_os = "linux")]
pub fn open_descriptors() -> io::Result<usize> {
    Ok(std::fs::read_dir("/proc/self/fd")?.count())
}
