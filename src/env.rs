use std::collections::HashMap;
use std::env as stdenv;
use std::io;
use std::path::{Path, PathBuf};

use crate::expand::is_identifier;

/// Value the shell publishes as `$SHELL` to itself and its children.
pub const SHELL_NAME: &str = "pipeshell";

/// Mutable, process-wide state of the shell.
///
/// The environment contains:
/// - `vars`: shell variables, seeded from the inherited process environment.
/// - `current_dir`: the working directory; kept equal to the OS cwd.
/// - `running`: cleared by `exit` so the REPL stops after the current line.
///
/// Fields are public so tests can build a state without touching the real
/// process environment.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Shell variables, looked up before the process environment.
    pub vars: HashMap<String, String>,
    /// The current working directory, mirrors `getcwd()`.
    pub current_dir: PathBuf,
    /// When false the interactive loop terminates.
    pub running: bool,
}

impl Environment {
    /// Snapshot the current process into a new `Environment`.
    ///
    /// Variables come from `std::env::vars_os()` (entries that are not valid
    /// UTF-8 are skipped), then `PWD` and `SHELL` are overlaid.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let mut vars: HashMap<String, String> = stdenv::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        vars.insert("PWD".to_string(), current_dir.to_string_lossy().into_owned());
        vars.insert("SHELL".to_string(), SHELL_NAME.to_string());
        Self {
            vars,
            current_dir,
            running: true,
        }
    }

    /// Get the value of a variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a shell variable without touching the process environment.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Set a variable in both `self.vars` and the process environment, so that
    /// forked children inherit it.
    pub fn export_var(&mut self, key: &str, val: &str) -> Result<(), InvalidVariable> {
        if !is_identifier(key) || val.contains('\0') {
            return Err(InvalidVariable(format!("{key}={val}")));
        }
        // SAFETY: the shell mutates its environment only from its single
        // thread, between child lifetimes.
        unsafe { stdenv::set_var(key, val) };
        self.set_var(key, val);
        Ok(())
    }

    /// Change the OS working directory and resynchronize `current_dir` and `$PWD`.
    ///
    /// On failure neither the OS cwd nor the state is modified.
    pub fn change_dir(&mut self, target: &Path) -> io::Result<()> {
        stdenv::set_current_dir(target)?;
        let resolved = entered_dir(&self.current_dir, target, stdenv::current_dir());
        self.vars
            .insert("PWD".to_string(), resolved.to_string_lossy().into_owned());
        self.current_dir = resolved;
        Ok(())
    }
}

/// The directory just entered: what the OS reports, or `target` taken relative
/// to `previous` when the OS can no longer name it (it was removed meanwhile).
fn entered_dir(previous: &Path, target: &Path, reported: io::Result<PathBuf>) -> PathBuf {
    reported.unwrap_or_else(|e| {
        tracing::debug!(error = %e, path = %target.display(), "cannot read new working directory");
        previous.join(target)
    })
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// An `export` argument whose name is not an identifier or whose value cannot
/// be stored in the process environment.
#[derive(Debug, thiserror::Error)]
#[error("`{0}': not a valid identifier")]
pub struct InvalidVariable(pub String);
