//! `posix_spawnattr_t` wrapper

use std::mem::MaybeUninit;

use nix::sys::signal::{SigSet, Signal};

use super::check;
use crate::error::{ProcessError, Result};

/// Owns one initialized `posix_spawnattr_t`, destroyed exactly once on drop.
///
/// Boxed so the native object keeps a stable address for its whole life.
pub(crate) struct SpawnAttributes {
    raw: Box<MaybeUninit<libc::posix_spawnattr_t>>,
    flags: libc::c_short,
}

impl SpawnAttributes {
    pub(crate) fn new() -> Result<Self> {
        let mut raw: Box<MaybeUninit<libc::posix_spawnattr_t>> = Box::new(MaybeUninit::uninit());
        // SAFETY: `raw` points to writable storage for the object.
        check(unsafe { libc::posix_spawnattr_init(raw.as_mut_ptr()) }).map_err(|source| {
            ProcessError::AttributeSetupFailed {
                context: "posix_spawnattr_init",
                source,
            }
        })?;
        Ok(Self { raw, flags: 0 })
    }

    /// Start the child with an empty signal mask and SIGPIPE at its default
    /// disposition. The Rust runtime ignores SIGPIPE and ignored signals
    /// survive `exec`.
    pub(crate) fn reset_signals(&mut self) -> Result<()> {
        let empty = SigSet::empty();
        // SAFETY: the attribute object is initialized; the set outlives the call.
        check(unsafe { libc::posix_spawnattr_setsigmask(self.raw.as_mut_ptr(), empty.as_ref()) })
            .map_err(|source| ProcessError::AttributeSetupFailed {
                context: "posix_spawnattr_setsigmask",
                source,
            })?;

        let mut defaults = SigSet::empty();
        defaults.add(Signal::SIGPIPE);
        // SAFETY: as above.
        check(unsafe {
            libc::posix_spawnattr_setsigdefault(self.raw.as_mut_ptr(), defaults.as_ref())
        })
        .map_err(|source| ProcessError::AttributeSetupFailed {
            context: "posix_spawnattr_setsigdefault",
            source,
        })?;

        self.set_flags((libc::POSIX_SPAWN_SETSIGMASK | libc::POSIX_SPAWN_SETSIGDEF) as libc::c_short)
    }

    /// OR `flags` into the attribute flags
    pub(crate) fn set_flags(&mut self, flags: libc::c_short) -> Result<()> {
        let combined = self.flags | flags;
        // SAFETY: the attribute object is initialized.
        check(unsafe { libc::posix_spawnattr_setflags(self.raw.as_mut_ptr(), combined) }).map_err(
            |source| ProcessError::AttributeSetupFailed {
                context: "posix_spawnattr_setflags",
                source,
            },
        )?;
        self.flags = combined;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn flags(&self) -> libc::c_short {
        self.flags
    }

    pub(crate) fn as_ptr(&self) -> *const libc::posix_spawnattr_t {
        self.raw.as_ptr()
    }
}

impl Drop for SpawnAttributes {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`, and `drop` runs once.
        unsafe {
            libc::posix_spawnattr_destroy(self.raw.as_mut_ptr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_signals_sets_flags() {
        let mut attrs = SpawnAttributes::new().unwrap();
        assert_eq!(attrs.flags(), 0);
        attrs.reset_signals().unwrap();
        let expected = (libc::POSIX_SPAWN_SETSIGMASK | libc::POSIX_SPAWN_SETSIGDEF) as libc::c_short;
        assert_eq!(attrs.flags() & expected, expected);

        let mut stored: libc::c_short = 0;
        // SAFETY: attrs is initialized.
        let rc = unsafe { libc::posix_spawnattr_getflags(attrs.as_ptr(), &mut stored) };
        assert_eq!(rc, 0);
        assert_eq!(stored, attrs.flags());
    }
}
