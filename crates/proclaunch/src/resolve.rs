//! Executable discovery, similar to shell `which`.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};
use tracing::debug;

use crate::error::{ProcessError, Result};

/// Searched when `PATH` is not set
pub const DEFAULT_SEARCH_PATH: &str = "/usr/bin:/bin";

/// Resolve `name` to an absolute executable path.
///
/// A name containing `/` is a literal path. Anything else is looked up in
/// `search_path` (colon-separated, empty entries skipped), or in `PATH` as it
/// is at the time of the call. The first executable regular file wins.
pub fn resolve(name: &OsStr, search_path: Option<&OsStr>) -> Result<PathBuf> {
    if name.as_bytes().contains(&b'/') {
        return resolve_literal(Path::new(name));
    }

    let from_env;
    let search_path = match search_path {
        Some(path) => path,
        None => {
            from_env = env::var_os("PATH");
            from_env
                .as_deref()
                .unwrap_or_else(|| OsStr::new(DEFAULT_SEARCH_PATH))
        }
    };

    if !name.is_empty() {
        for dir in search_path.as_bytes().split(|b| *b == b':') {
            if dir.is_empty() {
                continue;
            }
            let candidate = Path::new(OsStr::from_bytes(dir)).join(name);
            if check_executable(&candidate).is_ok() {
                let resolved = absolutize(candidate);
                debug!(name = ?name, path = %resolved.display(), "Resolved executable");
                return Ok(resolved);
            }
        }
    }

    Err(ProcessError::ExecutableNotFound {
        name: name.to_string_lossy().into_owned(),
        search_path: Some(search_path.to_string_lossy().into_owned()),
    })
}

/// Locate `name` using the current `PATH`, discarding the failure reason.
pub fn which(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    resolve(name.as_ref(), None).ok()
}

fn resolve_literal(path: &Path) -> Result<PathBuf> {
    match check_executable(path) {
        Ok(()) => Ok(absolutize(path.to_path_buf())),
        Err(Errno::ENOENT) | Err(Errno::ENOTDIR) => Err(ProcessError::ExecutableNotFound {
            name: path.to_string_lossy().into_owned(),
            search_path: None,
        }),
        Err(source) => Err(ProcessError::InvalidExecutable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Regular file with execute permission for this process
fn check_executable(path: &Path) -> std::result::Result<(), Errno> {
    let metadata = fs::metadata(path).map_err(io_errno)?;
    if metadata.is_dir() {
        return Err(Errno::EISDIR);
    }
    if !metadata.is_file() {
        return Err(Errno::EACCES);
    }
    access(path, AccessFlags::X_OK)
}

fn io_errno(err: io::Error) -> Errno {
    err.raw_os_error().map_or(Errno::EIO, Errno::from_raw)
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_literal_missing() {
        let err = resolve(OsStr::new("/no/such/binary"), None).unwrap_err();
        match err {
            ProcessError::ExecutableNotFound { name, search_path } => {
                assert_eq!(name, "/no/such/binary");
                assert_eq!(search_path, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_literal_directory_is_invalid() {
        let dir = TempDir::new().unwrap();
        let err = resolve(dir.path().as_os_str(), None).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::InvalidExecutable { source: Errno::EISDIR, .. }
        ));
    }

    #[test]
    fn test_literal_not_executable() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "plain", 0o644);
        let err = resolve(path.as_os_str(), None).unwrap_err();
        // root bypasses the permission check only when some execute bit is set
        assert!(matches!(err, ProcessError::InvalidExecutable { .. }));
    }

    #[test]
    fn test_search_first_match_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_file(first.path(), "tool", 0o755);
        write_file(second.path(), "tool", 0o755);

        let search = format!("::{}:{}", first.path().display(), second.path().display());
        let resolved = resolve(OsStr::new("tool"), Some(OsStr::new(&search))).unwrap();
        assert_eq!(resolved, first.path().join("tool"));
    }

    #[test]
    fn test_search_skips_non_executable() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_file(first.path(), "tool", 0o644);
        write_file(second.path(), "tool", 0o755);

        let search = format!("{}:{}", first.path().display(), second.path().display());
        let resolved = resolve(OsStr::new("tool"), Some(OsStr::new(&search))).unwrap();
        assert_eq!(resolved, second.path().join("tool"));
    }

    #[test]
    fn test_search_not_found_carries_path() {
        let dir = TempDir::new().unwrap();
        let search = dir.path().display().to_string();
        let err = resolve(OsStr::new("definitely-not-here"), Some(OsStr::new(&search))).unwrap_err();
        match err {
            ProcessError::ExecutableNotFound { search_path, .. } => {
                assert_eq!(search_path.as_deref(), Some(search.as_str()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_name_not_found() {
        assert!(matches!(
            resolve(OsStr::new(""), Some(OsStr::new("/bin"))),
            Err(ProcessError::ExecutableNotFound { .. })
        ));
    }
}
