//! Error types for process launching and control

use std::fmt;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

use crate::stdio::StdStream;

/// Operation attempted in the wrong lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidState {
    /// Wait or signal requested before `launch()`
    NotLaunched,
    /// `launch()` called a second time
    AlreadyLaunched,
}

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLaunched => f.write_str("process has not been launched"),
            Self::AlreadyLaunched => f.write_str("process has already been launched"),
        }
    }
}

/// Process launch and control errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Lookup of a command name or literal path found nothing
    #[error("{}", not_found_message(name, search_path.as_deref()))]
    ExecutableNotFound {
        name: String,
        /// Search path that was scanned; `None` for literal paths
        search_path: Option<String>,
    },

    /// Path exists but cannot be executed
    #[error("Invalid executable {}: {source}", path.display())]
    InvalidExecutable {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    /// The kernel process-creation call failed
    #[error("Failed to spawn process ({context}): {source}")]
    SpawnFailed {
        context: String,
        #[source]
        source: Errno,
    },

    /// Blocking wait failed for a reason other than "no such child"
    #[error("Failed to wait for process {pid}: {source}")]
    WaitFailed {
        pid: i32,
        #[source]
        source: Errno,
    },

    /// Creating a pipe for a standard stream failed
    #[error("Failed to create {stream} pipe: {source}")]
    PipeCreationFailed {
        stream: StdStream,
        #[source]
        source: Errno,
    },

    /// Appending a descriptor action to the spawn file actions failed
    #[error("Failed to set up file action `{action}`: {source}")]
    FileActionSetupFailed {
        action: String,
        #[source]
        source: Errno,
    },

    /// Initializing or configuring spawn attributes failed
    #[error("Failed to set up spawn attributes ({context}): {source}")]
    AttributeSetupFailed {
        context: &'static str,
        #[source]
        source: Errno,
    },

    /// Signal delivery failed for a reason other than "no such process"
    #[error("Failed to send {signal} to process {pid}: {source}")]
    SignalDeliveryFailed {
        signal: Signal,
        pid: i32,
        #[source]
        source: Errno,
    },

    /// Operation attempted out of order
    #[error("Invalid process state: {0}")]
    InvalidState(InvalidState),

    /// Argument, environment entry or path cannot be passed to the OS
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ProcessError {
    /// Originating OS error code, when there is one
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::InvalidExecutable { source, .. }
            | Self::SpawnFailed { source, .. }
            | Self::WaitFailed { source, .. }
            | Self::PipeCreationFailed { source, .. }
            | Self::FileActionSetupFailed { source, .. }
            | Self::AttributeSetupFailed { source, .. }
            | Self::SignalDeliveryFailed { source, .. } => Some(*source),
            Self::ExecutableNotFound { .. } | Self::InvalidState(_) | Self::InvalidArgument(_) => {
                None
            }
        }
    }
}

fn not_found_message(name: &str, search_path: Option<&str>) -> String {
    match search_path {
        Some(path) => format!("Executable not found: `{name}` (searched {path:?})"),
        None => format!("Executable not found: {name}"),
    }
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_includes_search_path() {
        let err = ProcessError::ExecutableNotFound {
            name: "frobnicate".into(),
            search_path: Some("/opt/a::/opt/b".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("frobnicate"));
        assert!(msg.contains("/opt/a::/opt/b"));
        assert_eq!(err.errno(), None);
    }

    #[test]
    fn test_errno_is_exposed() {
        let err = ProcessError::SpawnFailed {
            context: "posix_spawn /bin/true".into(),
            source: Errno::EAGAIN,
        };
        assert_eq!(err.errno(), Some(Errno::EAGAIN));
    }
}
