//! Wait-status decoding
//!
//! The raw value is the `int` filled in by `waitpid(2)`. Decoding follows the
//! native layout bit for bit: the low seven bits hold the terminating signal
//! (0 for a normal exit, `0x7F` for a stopped child) and bits 8..16 hold the
//! exit code or stop signal.

use std::fmt;

use nix::sys::signal::Signal;

const SIGNAL_MASK: i32 = 0x7F;
const STOPPED_MARKER: i32 = 0x7F;

/// Raw wait status of a reaped child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(i32);

impl ExitStatus {
    /// Wrap a raw status as returned by `waitpid`
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw status value
    pub const fn into_raw(self) -> i32 {
        self.0
    }

    /// Child called `exit` (or returned from `main`)
    pub const fn exited_normally(self) -> bool {
        self.0 & SIGNAL_MASK == 0
    }

    /// Exit code, when the child exited normally
    pub const fn code(self) -> Option<i32> {
        if self.exited_normally() {
            Some((self.0 >> 8) & 0xFF)
        } else {
            None
        }
    }

    /// Child was terminated by a signal
    pub const fn terminated_by_signal(self) -> bool {
        let low = self.0 & SIGNAL_MASK;
        low != 0 && low != STOPPED_MARKER
    }

    /// Terminating signal number
    pub const fn signal(self) -> Option<i32> {
        if self.terminated_by_signal() {
            Some(self.0 & SIGNAL_MASK)
        } else {
            None
        }
    }

    /// Child is stopped rather than terminated
    pub const fn stopped(self) -> bool {
        self.0 & SIGNAL_MASK == STOPPED_MARKER
    }

    /// Signal that stopped the child
    pub const fn stop_signal(self) -> Option<i32> {
        if self.stopped() {
            Some((self.0 >> 8) & 0xFF)
        } else {
            None
        }
    }

    /// Exited normally with code 0
    pub const fn success(self) -> bool {
        self.0 & SIGNAL_MASK == 0 && (self.0 >> 8) & 0xFF == 0
    }
}

fn write_signal(f: &mut fmt::Formatter<'_>, label: &str, signo: i32) -> fmt::Result {
    match Signal::try_from(signo) {
        Ok(signal) => write!(f, "{label}: {signo} ({signal})"),
        Err(_) => write!(f, "{label}: {signo}"),
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code() {
            write!(f, "exit status: {code}")
        } else if let Some(signo) = self.signal() {
            write_signal(f, "signal", signo)
        } else if let Some(signo) = self.stop_signal() {
            write_signal(f, "stopped", signo)
        } else {
            write!(f, "unrecognised wait status: {:#x}", self.0)
        }
    }
}

/// Outcome of waiting for a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The child was reaped by this handle
    Status(ExitStatus),
    /// Someone else reaped the child first; no status is available
    Unknown,
}

impl Termination {
    /// Raw status, if this handle reaped the child
    pub fn status(self) -> Option<ExitStatus> {
        match self {
            Self::Status(status) => Some(status),
            Self::Unknown => None,
        }
    }

    pub fn exited_normally(self) -> bool {
        self.status().is_some_and(ExitStatus::exited_normally)
    }

    pub fn exit_code(self) -> Option<i32> {
        self.status().and_then(ExitStatus::code)
    }

    pub fn terminated_by_signal(self) -> bool {
        self.status().is_some_and(ExitStatus::terminated_by_signal)
    }

    pub fn signal(self) -> Option<i32> {
        self.status().and_then(ExitStatus::signal)
    }

    pub fn stopped(self) -> bool {
        self.status().is_some_and(ExitStatus::stopped)
    }

    pub fn stop_signal(self) -> Option<i32> {
        self.status().and_then(ExitStatus::stop_signal)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => status.fmt(f),
            Self::Unknown => f.write_str("unknown (already reaped)"),
        }
    }
}
