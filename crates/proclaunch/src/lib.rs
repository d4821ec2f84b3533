//! # proclaunch
//!
//! **Purpose**: Low-level child process launching and control on Unix
//!
//! Launches executables through `posix_spawn` with declarative stdio wiring,
//! then tracks, signals and reaps them.
//!
//! ## Features
//!
//! - **Stdio Wiring**: Inherit, discard, pipe, redirect to a file or to an existing descriptor
//! - **Executable Resolution**: `PATH`-style lookup, read fresh on every call
//! - **Atomic Launch**: Descriptor actions run in the child before `exec`; no leaked pipe ends
//! - **Reaping**: Idempotent, `EINTR`-safe blocking wait plus a non-consuming liveness poll
//! - **Signal Delivery**: SIGINT / SIGTERM / SIGKILL / SIGTSTP / SIGCONT with benign-race handling
//! - **Status Decoding**: Bit-exact decoding of native wait statuses
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::io::{Read, Write};
//! use proclaunch::{ProcessConfig, ProcessHandle, Stdio};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = ProcessHandle::new(
//!     ProcessConfig::new("cat")
//!         .stdin(Stdio::Pipe)
//!         .stdout(Stdio::Pipe),
//! )?;
//!
//! let mut pipes = handle.launch()?;
//! let mut stdin = pipes.stdin.take().expect("stdin is piped");
//! stdin.write_all(b"hello\n")?;
//! drop(stdin);
//!
//! let mut output = String::new();
//! pipes.stdout.take().expect("stdout is piped").read_to_string(&mut output)?;
//!
//! let termination = handle.wait_until_exit()?;
//! assert_eq!(output, "hello\n");
//! assert_eq!(termination.exit_code(), Some(0));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
mod marshal;
pub mod resolve;
pub mod spawn;
pub mod status;
pub mod stdio;

pub use config::ProcessConfig;
pub use error::{InvalidState, ProcessError, Result};
pub use handle::ProcessHandle;
pub use nix::sys::signal::Signal;
pub use resolve::{resolve, which};
pub use spawn::{FileAction, FileActions};
pub use status::{ExitStatus, Termination};
pub use stdio::{ChildPipes, ChildStderr, ChildStdin, ChildStdout, StdStream, Stdio};
