//! Process handle: launch, poll, reap and signal one child

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libc::c_char;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::ProcessConfig,
    error::{InvalidState, ProcessError, Result},
    marshal,
    resolve::resolve,
    spawn::{check, FileActions, SpawnAttributes},
    status::{ExitStatus, Termination},
    stdio::{ChildPipes, Stdio},
};

/// Lifecycle phase; only ever moves forward
#[derive(Debug, Clone, Copy)]
enum Phase {
    Unlaunched,
    Running { pid: Pid },
    Waited { pid: Pid, termination: Termination },
}

#[derive(Debug)]
struct Inner {
    program: PathBuf,
    args: Vec<OsString>,
    env: Option<BTreeMap<OsString, OsString>>,
    stdin: Stdio,
    stdout: Stdio,
    stderr: Stdio,
    phase: Mutex<Phase>,
}

/// Handle to a single child process.
///
/// Clones share the same child and state. The state lock is never held across
/// the blocking wait, so polling and signalling stay non-blocking while
/// another thread waits.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    inner: Arc<Inner>,
}

impl ProcessHandle {
    /// Create a handle, resolving the executable now.
    ///
    /// # Examples
    /// ```no_run
    /// use proclaunch::{ProcessConfig, ProcessHandle, Stdio};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let handle = ProcessHandle::new(
    ///     ProcessConfig::new("/bin/sh")
    ///         .args(["sh", "-c", "exit 7"])
    ///         .stdout(Stdio::Discard)
    ///         .stderr(Stdio::Discard),
    /// )?;
    /// handle.launch()?;
    /// assert_eq!(handle.wait_until_exit()?.exit_code(), Some(7));
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: ProcessConfig) -> Result<Self> {
        let program = resolve(&config.command, config.search_path.as_deref())?;
        Ok(Self {
            inner: Arc::new(Inner {
                program,
                args: config.args,
                env: config.env,
                stdin: config.stdin,
                stdout: config.stdout,
                stderr: config.stderr,
                phase: Mutex::new(Phase::Unlaunched),
            }),
        })
    }

    /// Resolved executable path
    pub fn program(&self) -> &Path {
        &self.inner.program
    }

    /// Configured arguments (empty means `[program]`)
    pub fn args(&self) -> &[OsString] {
        &self.inner.args
    }

    /// Process ID once launched
    pub fn pid(&self) -> Option<u32> {
        match *self.inner.phase.lock() {
            Phase::Unlaunched => None,
            Phase::Running { pid } | Phase::Waited { pid, .. } => Some(pid.as_raw() as u32),
        }
    }

    pub fn is_launched(&self) -> bool {
        !matches!(*self.inner.phase.lock(), Phase::Unlaunched)
    }

    /// Cached wait result, if the child has been waited for
    pub fn termination(&self) -> Option<Termination> {
        match *self.inner.phase.lock() {
            Phase::Waited { termination, .. } => Some(termination),
            Phase::Unlaunched | Phase::Running { .. } => None,
        }
    }

    /// Spawn the child with the configured wiring.
    ///
    /// Either the child is running with its descriptors in place, or an error
    /// is returned and no process exists. Every descriptor created during
    /// setup that is not handed back in [`ChildPipes`] is closed before this
    /// returns.
    pub fn launch(&self) -> Result<ChildPipes> {
        let mut phase = self.inner.phase.lock();
        if !matches!(*phase, Phase::Unlaunched) {
            return Err(ProcessError::InvalidState(InvalidState::AlreadyLaunched));
        }

        let inner = &*self.inner;
        let program = marshal::path_to_cstring(&inner.program)?;
        let argv = marshal::build_argv(&inner.program, &inner.args)?;
        let envp = marshal::build_envp(inner.env.as_ref())?;

        let mut attrs = SpawnAttributes::new()?;
        attrs.reset_signals()?;
        let (mut actions, pipes) =
            FileActions::for_streams(&inner.stdin, &inner.stdout, &inner.stderr)?;

        debug!(
            program = %inner.program.display(),
            argc = argv.len(),
            inherit_env = inner.env.is_none(),
            "Spawning process"
        );

        let mut raw_pid: libc::pid_t = 0;
        // SAFETY: every pointer refers to an initialized object that outlives
        // the call; argv and envp are null-terminated arrays of C strings.
        let rc = unsafe {
            libc::posix_spawn(
                &mut raw_pid,
                program.as_ptr(),
                actions.as_ptr(),
                attrs.as_ptr(),
                argv.as_ptr() as *const *mut c_char,
                envp.as_ptr() as *const *mut c_char,
            )
        };
        actions.close_parent_ends();

        check(rc).map_err(|source| ProcessError::SpawnFailed {
            context: format!("posix_spawn {}", inner.program.display()),
            source,
        })?;

        let pid = Pid::from_raw(raw_pid);
        *phase = Phase::Running { pid };
        info!(pid = %pid, program = %inner.program.display(), "Process spawned");
        Ok(pipes)
    }

    /// Non-blocking liveness check.
    ///
    /// Uses `WNOWAIT`, so the exit status stays available for
    /// [`wait_until_exit`](Self::wait_until_exit).
    pub fn is_running(&self) -> bool {
        let pid = match *self.inner.phase.lock() {
            Phase::Running { pid } => pid,
            Phase::Unlaunched | Phase::Waited { .. } => return false,
        };

        match poll_exited(pid) {
            Ok(exited) => !exited,
            Err(Errno::EAGAIN) => true,
            Err(Errno::ECHILD) => false,
            Err(e) => {
                warn!(pid = %pid, error = %e, "Unexpected error polling process");
                false
            }
        }
    }

    /// Block until the child exits and reap it.
    ///
    /// Idempotent: later calls, from this handle or any clone, return the
    /// stored result without a syscall. A child already reaped elsewhere
    /// yields [`Termination::Unknown`].
    ///
    /// The blocking part only observes the exit (`WNOWAIT`); the reap itself
    /// happens under the state lock, so a signal can never be aimed at a pid
    /// that has been reaped but not yet recorded.
    pub fn wait_until_exit(&self) -> Result<Termination> {
        loop {
            let pid = match *self.inner.phase.lock() {
                Phase::Unlaunched => {
                    return Err(ProcessError::InvalidState(InvalidState::NotLaunched))
                }
                Phase::Waited { termination, .. } => return Ok(termination),
                Phase::Running { pid } => pid,
            };

            block_until_exited(pid)?;

            let mut phase = self.inner.phase.lock();
            match *phase {
                Phase::Running { pid } => {
                    if let Some(termination) = reap(pid)? {
                        *phase = Phase::Waited { pid, termination };
                        debug!(pid = %pid, status = %termination, "Process reaped");
                        return Ok(termination);
                    }
                }
                Phase::Waited { termination, .. } => return Ok(termination),
                Phase::Unlaunched => {
                    return Err(ProcessError::InvalidState(InvalidState::NotLaunched))
                }
            }
        }
    }

    /// [`wait_until_exit`](Self::wait_until_exit) on tokio's blocking pool
    pub async fn wait_until_exit_async(&self) -> Result<Termination> {
        let handle = self.clone();
        match tokio::task::spawn_blocking(move || handle.wait_until_exit()).await {
            Ok(result) => result,
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(_) => Err(ProcessError::WaitFailed {
                pid: self.pid().map_or(0, |pid| pid as i32),
                source: Errno::ECANCELED,
            }),
        }
    }

    /// Send `signal` to the child.
    ///
    /// A child that is already gone is not an error. After the child has been
    /// reaped nothing is sent, since its pid may belong to another process.
    pub fn send_signal(&self, signal: Signal) -> Result<()> {
        let phase = self.inner.phase.lock();
        let pid = match *phase {
            Phase::Unlaunched => return Err(ProcessError::InvalidState(InvalidState::NotLaunched)),
            Phase::Waited { pid, .. } => {
                debug!(pid = %pid, signal = %signal, "Process already reaped, not signalling");
                return Ok(());
            }
            Phase::Running { pid } => pid,
        };

        match signal::kill(pid, signal) {
            Ok(()) => {
                debug!(pid = %pid, signal = %signal, "Signal sent");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(pid = %pid, signal = %signal, "Process already exited");
                Ok(())
            }
            Err(source) => Err(ProcessError::SignalDeliveryFailed {
                signal,
                pid: pid.as_raw(),
                source,
            }),
        }
    }

    /// SIGINT
    pub fn interrupt(&self) -> Result<()> {
        self.send_signal(Signal::SIGINT)
    }

    /// SIGTERM
    pub fn terminate(&self) -> Result<()> {
        self.send_signal(Signal::SIGTERM)
    }

    /// SIGKILL
    pub fn kill(&self) -> Result<()> {
        self.send_signal(Signal::SIGKILL)
    }

    /// SIGTSTP
    pub fn suspend(&self) -> Result<()> {
        self.send_signal(Signal::SIGTSTP)
    }

    /// SIGCONT
    pub fn resume(&self) -> Result<()> {
        self.send_signal(Signal::SIGCONT)
    }
}

/// Block until the child has exited, leaving it unreaped. Retries `EINTR`.
///
/// `ECHILD` returns normally; the reap that follows reports it.
fn block_until_exited(pid: Pid) -> Result<()> {
    loop {
        // SAFETY: an all-zero siginfo_t is a valid value.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a valid out-pointer.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid.as_raw() as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        match Errno::result(rc) {
            Ok(_) | Err(Errno::ECHILD) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(source) => {
                return Err(ProcessError::WaitFailed {
                    pid: pid.as_raw(),
                    source,
                })
            }
        }
    }
}

/// Non-blocking `waitpid`, retried on `EINTR`. `None` while the child has not
/// exited yet.
fn reap(pid: Pid) -> Result<Option<Termination>> {
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: `status` is a valid out-pointer.
        let rc = unsafe { libc::waitpid(pid.as_raw(), &mut status, libc::WNOHANG) };
        match Errno::result(rc) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(Termination::Status(ExitStatus::from_raw(status)))),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                warn!(pid = %pid, "Process was reaped elsewhere; exit status unavailable");
                return Ok(Some(Termination::Unknown));
            }
            Err(source) => {
                return Err(ProcessError::WaitFailed {
                    pid: pid.as_raw(),
                    source,
                })
            }
        }
    }
}

/// `true` once the child has exited, without consuming its status
fn poll_exited(pid: Pid) -> std::result::Result<bool, Errno> {
    // SAFETY: an all-zero siginfo_t is a valid value.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    // SAFETY: `info` is a valid out-pointer.
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid.as_raw() as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    Errno::result(rc)?;
    Ok(siginfo_pid(&info) != 0)
}

#[cfg(target_os = "linux")]
fn siginfo_pid(info: &libc::siginfo_t) -> libc::pid_t {
    // SAFETY: filled in by waitid (or zeroed when nothing was ready).
    unsafe { info.si_pid() }
}

#[cfg(not(target_os = "linux"))]
fn siginfo_pid(info: &libc::siginfo_t) -> libc::pid_t {
    info.si_pid
}
