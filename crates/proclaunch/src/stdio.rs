//! Standard stream configuration and the parent-side pipe endpoints

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd;

use crate::error::{ProcessError, Result};

/// One of the three standard streams of the child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    /// Descriptor number the stream occupies in the child
    pub const fn fd(self) -> RawFd {
        match self {
            Self::Stdin => libc::STDIN_FILENO,
            Self::Stdout => libc::STDOUT_FILENO,
            Self::Stderr => libc::STDERR_FILENO,
        }
    }
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// How a standard stream of the child is wired
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stdio {
    /// Share the parent's descriptor
    #[default]
    Inherit,
    /// Connect to `/dev/null`
    Discard,
    /// Create a pipe; the parent end is returned from `launch()`
    Pipe,
    /// Duplicate a descriptor the caller keeps owning
    ExternalDescriptor(RawFd),
    /// Open a file: read-only for stdin, create/truncate for output streams
    FilePath(PathBuf),
}

impl Stdio {
    /// Resolve into the form consumed by the file-action builder.
    ///
    /// Pipes are created here, so this must only run once per launch.
    pub(crate) fn resolve(&self, stream: StdStream) -> Result<ResolvedStream> {
        let resolved = match self {
            Self::Inherit => ResolvedStream::Inherit,
            Self::Discard => {
                ResolvedStream::OpenPath(PathBuf::from("/dev/null"), open_flags(stream, false))
            }
            Self::ExternalDescriptor(fd) => ResolvedStream::RawDescriptor(*fd),
            Self::FilePath(path) => ResolvedStream::OpenPath(path.clone(), open_flags(stream, true)),
            Self::Pipe => {
                let (read, write) = stream_pipe()
                    .map_err(|source| ProcessError::PipeCreationFailed { stream, source })?;
                ResolvedStream::PipePair { read, write }
            }
        };
        Ok(resolved)
    }
}

fn open_flags(stream: StdStream, create: bool) -> OFlag {
    match stream {
        StdStream::Stdin => OFlag::O_RDONLY,
        StdStream::Stdout | StdStream::Stderr if create => {
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC
        }
        StdStream::Stdout | StdStream::Stderr => OFlag::O_WRONLY,
    }
}

/// Pipe for one standard stream, with neither end on descriptors 0..=2.
///
/// With a standard descriptor closed in the parent, `pipe` hands out that
/// number, and the child's own wiring of the stream would then clobber or be
/// clobbered by the pipe end.
fn stream_pipe() -> std::result::Result<(OwnedFd, OwnedFd), Errno> {
    let (read, write) = cloexec_pipe()?;
    Ok((above_stdio(read)?, above_stdio(write)?))
}

fn above_stdio(fd: OwnedFd) -> std::result::Result<OwnedFd, Errno> {
    if fd.as_raw_fd() > libc::STDERR_FILENO {
        return Ok(fd);
    }
    let moved = fcntl(
        fd.as_raw_fd(),
        FcntlArg::F_DUPFD_CLOEXEC(libc::STDERR_FILENO + 1),
    )?;
    // SAFETY: `fcntl` just returned this descriptor and nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(moved) })
}

/// Both ends are close-on-exec so that children spawned concurrently from
/// other threads never inherit them; `dup2` in the child clears the flag on
/// the target descriptor.
#[cfg(not(target_vendor = "apple"))]
fn cloexec_pipe() -> std::result::Result<(OwnedFd, OwnedFd), Errno> {
    unistd::pipe2(OFlag::O_CLOEXEC)
}

#[cfg(target_vendor = "apple")]
fn cloexec_pipe() -> std::result::Result<(OwnedFd, OwnedFd), Errno> {
    use nix::fcntl::FdFlag;

    let (read, write) = unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}

/// Stream configuration after resolution; only alive during launch setup
#[derive(Debug)]
pub(crate) enum ResolvedStream {
    Inherit,
    RawDescriptor(RawFd),
    OpenPath(PathBuf, OFlag),
    PipePair { read: OwnedFd, write: OwnedFd },
}

macro_rules! pipe_end {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name {
            inner: File,
        }

        impl $name {
            pub(crate) fn from_owned(fd: OwnedFd) -> Self {
                Self { inner: File::from(fd) }
            }
        }

        impl AsFd for $name {
            fn as_fd(&self) -> BorrowedFd<'_> {
                self.inner.as_fd()
            }
        }

        impl AsRawFd for $name {
            fn as_raw_fd(&self) -> RawFd {
                self.inner.as_raw_fd()
            }
        }

        impl IntoRawFd for $name {
            fn into_raw_fd(self) -> RawFd {
                self.inner.into_raw_fd()
            }
        }

        impl From<$name> for OwnedFd {
            fn from(end: $name) -> OwnedFd {
                end.inner.into()
            }
        }

        impl From<$name> for File {
            fn from(end: $name) -> File {
                end.inner
            }
        }
    };
}

pipe_end! {
    /// Writable parent end of the child's stdin pipe
    ChildStdin
}

pipe_end! {
    /// Readable parent end of the child's stdout pipe
    ChildStdout
}

pipe_end! {
    /// Readable parent end of the child's stderr pipe
    ChildStderr
}

impl Write for ChildStdin {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Read for ChildStdout {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Read for ChildStderr {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Parent-side pipe ends produced by a successful launch.
///
/// Only streams configured as [`Stdio::Pipe`] are populated. Dropping a field
/// closes that end.
#[derive(Debug, Default)]
pub struct ChildPipes {
    pub stdin: Option<ChildStdin>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

impl ChildPipes {
    pub(crate) fn set(&mut self, stream: StdStream, fd: OwnedFd) {
        match stream {
            StdStream::Stdin => self.stdin = Some(ChildStdin::from_owned(fd)),
            StdStream::Stdout => self.stdout = Some(ChildStdout::from_owned(fd)),
            StdStream::Stderr => self.stderr = Some(ChildStderr::from_owned(fd)),
        }
    }
}
