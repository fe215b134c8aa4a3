use std::collections::HashMap;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Read-only map from command name to the absolute path of its executable.
///
/// Built once at startup by scanning every directory on the search path in
/// order; the first directory that provides a name wins, later entries are
/// shadowed. The index is never rebuilt mid-session, so programs installed
/// after startup are not visible until the next shell launch.
#[derive(Debug, Default)]
pub struct ExecutableIndex {
    map: HashMap<String, PathBuf>,
}

impl ExecutableIndex {
    /// Build the index from the `PATH` of the current process.
    pub fn from_path_env() -> Self {
        Self::scan(env::var_os("PATH").as_deref())
    }

    /// Build the index from an explicit search-path value.
    ///
    /// Directories that cannot be read are skipped silently, matching the
    /// lenient behavior of `PATH` lookup in conventional shells.
    pub fn scan(path: Option<&OsStr>) -> Self {
        let mut map = HashMap::new();
        let Some(path) = path else {
            return Self { map };
        };
        for dir in env::split_paths(path) {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let full = entry.path();
                if !is_executable_file(&full) {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    map.entry(name.to_string()).or_insert(full);
                }
            }
        }
        Self { map }
    }

    /// Absolute path of `name`, if it is an executable on the search path.
    pub fn resolve(&self, name: &str) -> Option<&Path> {
        self.map.get(name).map(PathBuf::as_path)
    }

    /// Whether `name` resolves, without borrowing the path.
    pub fn exists(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// All indexed command names, for completion.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Whether `name` looks like an explicit path to an executable, bypassing the
/// index (`./script`, `/usr/bin/env`).
pub fn is_direct_path(name: &str) -> bool {
    name.contains('/') && is_executable_file(Path::new(name))
}
