//! Native argv / envp construction

use std::collections::BTreeMap;
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use libc::c_char;

use crate::error::{ProcessError, Result};

/// Null-terminated array of owned C strings.
///
/// The pointer table borrows from the owned strings, which never move once
/// pushed (a `CString` keeps its bytes on the heap). Everything is released
/// together when the array drops.
#[derive(Debug)]
pub(crate) struct CStringArray {
    items: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringArray {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut ptrs = Vec::with_capacity(capacity + 1);
        ptrs.push(ptr::null());
        Self {
            items: Vec::with_capacity(capacity),
            ptrs,
        }
    }

    pub(crate) fn push(&mut self, item: CString) {
        let terminator = self.ptrs.len() - 1;
        self.ptrs[terminator] = item.as_ptr();
        self.ptrs.push(ptr::null());
        self.items.push(item);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }

    #[cfg(test)]
    pub(crate) fn items(&self) -> &[CString] {
        &self.items
    }
}

pub(crate) fn to_cstring(bytes: &[u8], what: &str) -> Result<CString> {
    CString::new(bytes).map_err(|_| {
        ProcessError::InvalidArgument(format!(
            "{what} contains an interior NUL byte: {:?}",
            String::from_utf8_lossy(bytes)
        ))
    })
}

pub(crate) fn path_to_cstring(path: &Path) -> Result<CString> {
    to_cstring(path.as_os_str().as_bytes(), "path")
}

/// Build `argv`. Without explicit arguments the program path becomes `argv[0]`.
pub(crate) fn build_argv(program: &Path, args: &[OsString]) -> Result<CStringArray> {
    if args.is_empty() {
        let mut argv = CStringArray::with_capacity(1);
        argv.push(path_to_cstring(program)?);
        return Ok(argv);
    }

    let mut argv = CStringArray::with_capacity(args.len());
    for arg in args {
        argv.push(to_cstring(arg.as_bytes(), "argument")?);
    }
    Ok(argv)
}

/// Build `envp`.
///
/// `None` snapshots the parent's environment as it is right now; `Some` is
/// the child's complete environment, possibly empty.
pub(crate) fn build_envp(env: Option<&BTreeMap<OsString, OsString>>) -> Result<CStringArray> {
    match env {
        Some(vars) => {
            let mut envp = CStringArray::with_capacity(vars.len());
            for (key, value) in vars {
                envp.push(env_entry(key, value)?);
            }
            Ok(envp)
        }
        None => {
            let vars: Vec<(OsString, OsString)> = std::env::vars_os().collect();
            let mut envp = CStringArray::with_capacity(vars.len());
            for (key, value) in &vars {
                envp.push(env_entry(key, value)?);
            }
            Ok(envp)
        }
    }
}

fn env_entry(key: &OsStr, value: &OsStr) -> Result<CString> {
    let key = key.as_bytes();
    if key.is_empty() || key.contains(&b'=') {
        return Err(ProcessError::InvalidArgument(format!(
            "invalid environment variable name: {:?}",
            String::from_utf8_lossy(key)
        )));
    }
    let value = value.as_bytes();
    let mut entry = Vec::with_capacity(key.len() + value.len() + 1);
    entry.extend_from_slice(key);
    entry.push(b'=');
    entry.extend_from_slice(value);
    to_cstring(&entry, "environment entry")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn collect(array: &CStringArray) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = array.as_ptr();
        // SAFETY: the array is null-terminated and every entry is a valid C string.
        unsafe {
            while !(*cursor).is_null() {
                out.push(CStr::from_ptr(*cursor).to_string_lossy().into_owned());
                cursor = cursor.add(1);
            }
        }
        out
    }

    #[test]
    fn test_argv_defaults_to_program() {
        let argv = build_argv(Path::new("/bin/true"), &[]).unwrap();
        assert_eq!(collect(&argv), vec!["/bin/true"]);
        assert_eq!(argv.len(), 1);
    }

    #[test]
    fn test_argv_explicit() {
        let args: Vec<OsString> = ["sh", "-c", "exit 7"].iter().map(OsString::from).collect();
        let argv = build_argv(Path::new("/bin/sh"), &args).unwrap();
        assert_eq!(collect(&argv), vec!["sh", "-c", "exit 7"]);
        assert_eq!(argv.items().len(), 3);
    }

    #[test]
    fn test_argv_rejects_nul() {
        let args = vec![OsString::from("a\0b")];
        let err = build_argv(Path::new("/bin/echo"), &args).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_env_is_empty() {
        let vars = BTreeMap::new();
        let envp = build_envp(Some(&vars)).unwrap();
        assert!(collect(&envp).is_empty());
    }

    #[test]
    fn test_explicit_env_entries() {
        let mut vars = BTreeMap::new();
        vars.insert(OsString::from("B"), OsString::from("2"));
        vars.insert(OsString::from("A"), OsString::from("x=y"));
        let envp = build_envp(Some(&vars)).unwrap();
        assert_eq!(collect(&envp), vec!["A=x=y", "B=2"]);
    }

    #[test]
    fn test_env_rejects_bad_name() {
        let mut vars = BTreeMap::new();
        vars.insert(OsString::from("A=B"), OsString::from("1"));
        assert!(build_envp(Some(&vars)).is_err());
    }

    #[test]
    fn test_inherited_env_matches_parent() {
        let envp = build_envp(None).unwrap();
        assert_eq!(envp.len(), std::env::vars_os().count());
    }
}
