//! Process configuration

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use crate::stdio::Stdio;

/// Configuration for launching a process
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Command name (looked up in the search path) or path containing `/`
    pub command: OsString,
    /// Full argument vector including `argv[0]`; empty means `[resolved path]`
    pub args: Vec<OsString>,
    /// Child environment; `None` inherits the parent's at launch time
    pub env: Option<BTreeMap<OsString, OsString>>,
    /// Colon-separated search path; `None` uses `PATH`
    pub search_path: Option<OsString>,
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

impl ProcessConfig {
    /// Create new process configuration with all streams inherited
    pub fn new(command: impl AsRef<OsStr>) -> Self {
        Self {
            command: command.as_ref().to_os_string(),
            args: vec![],
            env: None,
            search_path: None,
            stdin: Stdio::Inherit,
            stdout: Stdio::Inherit,
            stderr: Stdio::Inherit,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Set the full argument vector, `argv[0]` included
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        self
    }

    /// Set one environment variable.
    ///
    /// The child environment becomes explicit: only variables set through
    /// this config are visible to it.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.as_ref().to_os_string(), value.as_ref().to_os_string());
        self
    }

    /// Set several environment variables (see [`ProcessConfig::env`])
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        let env = self.env.get_or_insert_with(BTreeMap::new);
        for (key, value) in vars {
            env.insert(key.as_ref().to_os_string(), value.as_ref().to_os_string());
        }
        self
    }

    /// Child starts with no environment variables at all
    pub fn env_clear(mut self) -> Self {
        self.env = Some(BTreeMap::new());
        self
    }

    /// Child inherits the parent's environment (the default)
    pub fn inherit_env(mut self) -> Self {
        self.env = None;
        self
    }

    /// Search these directories instead of `PATH`
    pub fn search_path(mut self, path: impl AsRef<OsStr>) -> Self {
        self.search_path = Some(path.as_ref().to_os_string());
        self
    }

    pub fn stdin(mut self, stdio: Stdio) -> Self {
        self.stdin = stdio;
        self
    }

    pub fn stdout(mut self, stdio: Stdio) -> Self {
        self.stdout = stdio;
        self
    }

    pub fn stderr(mut self, stdio: Stdio) -> Self {
        self.stderr = stdio;
        self
    }
}
