use crate::external::ExecutableIndex;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;
use std::sync::Arc;

/// Mutable, session-wide state owned by the shell process.
///
/// One value is created at startup and threaded through every command
/// execution. It carries:
/// - `vars`: environment variables visible to executed commands;
/// - `current_dir`: the working directory for command execution;
/// - `history`: the raw input lines accepted so far, oldest first;
/// - `pending_exit`: set by the `exit` builtin, checked by the REPL loop;
/// - `index`: the read-only executable lookup built once from `PATH`.
///
/// Cloning is cheap enough for per-stage isolation: the index is shared, and
/// only the small mutable parts are copied.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Input lines accepted by the REPL, in order.
    pub history: Vec<String>,
    /// Exit code requested by the `exit` builtin, if any.
    pub pending_exit: Option<i32>,
    /// Name → absolute path lookup for external commands.
    pub index: Arc<ExecutableIndex>,
}

impl Environment {
    /// Capture the current process state into a new `Environment`.
    ///
    /// Copies variables from `std::env::vars()`, initializes `current_dir`
    /// from `std::env::current_dir()`, and builds the executable index by
    /// scanning `PATH`.
    pub fn new() -> Self {
        let mut vars = HashMap::new();
        for (k, v) in stdenv::vars() {
            vars.insert(k, v);
        }
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            history: Vec::new(),
            pending_exit: None,
            index: Arc::new(ExecutableIndex::from_path_env()),
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
