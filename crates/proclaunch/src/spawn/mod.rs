//! Scoped wrappers over the `posix_spawn` attribute and file-action objects

mod actions;
mod attr;

pub use actions::{FileAction, FileActions, DEFAULT_CREATE_MODE};
pub(crate) use attr::SpawnAttributes;

use nix::errno::Errno;

/// The `posix_spawn*` family returns the error number instead of setting `errno`
pub(crate) fn check(rc: libc::c_int) -> Result<(), Errno> {
    if rc == 0 {
        Ok(())
    } else {
        Err(Errno::from_raw(rc))
    }
}
