//! `posix_spawn_file_actions_t` wrapper and stream wiring

use std::fmt;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use tracing::debug;

use super::check;
use crate::error::{ProcessError, Result};
use crate::marshal::path_to_cstring;
use crate::stdio::{ChildPipes, ResolvedStream, StdStream, Stdio};

/// Mode for files created by output redirection (`rw-r--r--`)
pub const DEFAULT_CREATE_MODE: u32 = 0o644;

/// One descriptor-table mutation performed in the child before `exec`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    Open {
        fd: RawFd,
        path: PathBuf,
        flags: OFlag,
        mode: Mode,
    },
    Dup {
        src: RawFd,
        dst: RawFd,
    },
    Close {
        fd: RawFd,
    },
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { fd, path, flags, mode } => write!(
                f,
                "open({fd}, {}, {:#o}, {:#o})",
                path.display(),
                flags.bits(),
                mode.bits()
            ),
            Self::Dup { src, dst } => write!(f, "dup2({src}, {dst})"),
            Self::Close { fd } => write!(f, "close({fd})"),
        }
    }
}

/// Ordered child-side descriptor actions plus the child-destined descriptors
/// the parent still holds.
///
/// Dropping the list destroys the native object once and closes every
/// pending parent-side descriptor, whether or not the spawn happened.
pub struct FileActions {
    raw: Box<MaybeUninit<libc::posix_spawn_file_actions_t>>,
    actions: Vec<FileAction>,
    parent_close: Vec<OwnedFd>,
}

impl FileActions {
    pub fn new() -> Result<Self> {
        let mut raw: Box<MaybeUninit<libc::posix_spawn_file_actions_t>> =
            Box::new(MaybeUninit::uninit());
        // SAFETY: `raw` points to writable storage for the object.
        check(unsafe { libc::posix_spawn_file_actions_init(raw.as_mut_ptr()) }).map_err(
            |source| ProcessError::FileActionSetupFailed {
                action: "posix_spawn_file_actions_init".to_string(),
                source,
            },
        )?;
        Ok(Self {
            raw,
            actions: Vec::new(),
            parent_close: Vec::new(),
        })
    }

    /// Build the list for stdin, stdout and stderr, in that order.
    ///
    /// Returns the parent ends of any pipes. If a later stream fails, pipes
    /// already created for earlier streams are closed on the way out.
    pub fn for_streams(stdin: &Stdio, stdout: &Stdio, stderr: &Stdio) -> Result<(Self, ChildPipes)> {
        let mut actions = Self::new()?;
        let mut pipes = ChildPipes::default();
        for (stream, config) in [
            (StdStream::Stdin, stdin),
            (StdStream::Stdout, stdout),
            (StdStream::Stderr, stderr),
        ] {
            let resolved = config.resolve(stream)?;
            if let Some(parent_end) = actions.add_stream(stream, resolved)? {
                pipes.set(stream, parent_end);
            }
        }
        debug!(actions = ?actions.actions, "Built spawn file actions");
        Ok((actions, pipes))
    }

    /// Append the actions for one resolved stream; returns the caller's pipe end.
    pub(crate) fn add_stream(
        &mut self,
        stream: StdStream,
        resolved: ResolvedStream,
    ) -> Result<Option<OwnedFd>> {
        let target = stream.fd();
        match resolved {
            ResolvedStream::Inherit => Ok(None),
            ResolvedStream::RawDescriptor(fd) => {
                if fd != target {
                    self.add_dup2(fd, target)?;
                }
                Ok(None)
            }
            ResolvedStream::OpenPath(path, flags) => {
                let mode = Mode::from_bits_truncate(DEFAULT_CREATE_MODE as _);
                self.add_open(target, &path, flags, mode)?;
                Ok(None)
            }
            ResolvedStream::PipePair { read, write } => {
                let (child_end, parent_end) = match stream {
                    StdStream::Stdin => (read, write),
                    StdStream::Stdout | StdStream::Stderr => (write, read),
                };
                let child_fd = child_end.as_raw_fd();
                let parent_fd = parent_end.as_raw_fd();
                self.parent_close.push(child_end);
                self.add_dup2(child_fd, target)?;
                self.add_close(parent_fd)?;
                Ok(Some(parent_end))
            }
        }
    }

    pub fn add_open(&mut self, fd: RawFd, path: &Path, flags: OFlag, mode: Mode) -> Result<()> {
        let action = FileAction::Open {
            fd,
            path: path.to_path_buf(),
            flags,
            mode,
        };
        let c_path = path_to_cstring(path)?;
        // SAFETY: the object is initialized; the path is copied by the call.
        let rc = unsafe {
            libc::posix_spawn_file_actions_addopen(
                self.raw.as_mut_ptr(),
                fd,
                c_path.as_ptr(),
                flags.bits(),
                mode.bits(),
            )
        };
        self.record(action, rc)
    }

    pub fn add_dup2(&mut self, src: RawFd, dst: RawFd) -> Result<()> {
        // SAFETY: the object is initialized.
        let rc = unsafe { libc::posix_spawn_file_actions_adddup2(self.raw.as_mut_ptr(), src, dst) };
        self.record(FileAction::Dup { src, dst }, rc)
    }

    pub fn add_close(&mut self, fd: RawFd) -> Result<()> {
        // SAFETY: the object is initialized.
        let rc = unsafe { libc::posix_spawn_file_actions_addclose(self.raw.as_mut_ptr(), fd) };
        self.record(FileAction::Close { fd }, rc)
    }

    fn record(&mut self, action: FileAction, rc: libc::c_int) -> Result<()> {
        check(rc).map_err(|source: Errno| ProcessError::FileActionSetupFailed {
            action: action.to_string(),
            source,
        })?;
        self.actions.push(action);
        Ok(())
    }

    /// Actions in the order the child will apply them
    pub fn actions(&self) -> &[FileAction] {
        &self.actions
    }

    /// Number of child-destined descriptors still open in the parent
    pub fn pending_parent_closes(&self) -> usize {
        self.parent_close.len()
    }

    /// Close the child-destined descriptors in the parent. Call once the
    /// spawn call has returned; dropping the list does the same.
    pub fn close_parent_ends(&mut self) {
        self.parent_close.clear();
    }

    pub(crate) fn as_ptr(&self) -> *const libc::posix_spawn_file_actions_t {
        self.raw.as_ptr()
    }
}

impl fmt::Debug for FileActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileActions")
            .field("actions", &self.actions)
            .field("parent_close", &self.parent_close)
            .finish()
    }
}

impl Drop for FileActions {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`, and `drop` runs once.
        unsafe {
            libc::posix_spawn_file_actions_destroy(self.raw.as_mut_ptr());
        }
    }
}
