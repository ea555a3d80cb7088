//! Storage path selection.
//!
//! Precedence:
//! 1. explicit `--data-path` (tilde-expanded)
//! 2. project store: `<root>/.todos.json` where `<root>` is the nearest
//!    ancestor of the working directory holding a project marker
//! 3. `$TODO_DB_PATH`
//! 4. `~/.todos.json`, or the data-dir store, when either exists
//! 5. `.todos.json` in the working directory
//!
//! `--global` skips the first two steps and falls back to the data-dir
//! store instead of the working directory.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::STORE_FILE;

/// Environment variable overriding the default store path
pub const DB_PATH_ENV: &str = "TODO_DB_PATH";

const DATA_DIR_NAME: &str = "todo";
const DATA_FILE_NAME: &str = "todos.json";

/// Process facts the resolver depends on, captured once so tests can
/// substitute their own.
#[derive(Debug, Clone, Default)]
pub struct ScopeEnv {
    pub cwd: PathBuf,
    pub home: Option<PathBuf>,
    pub db_path: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl ScopeEnv {
    pub fn from_process() -> Result<Self> {
        let base = directories::BaseDirs::new();
        let home = base.as_ref().map(|dirs| dirs.home_dir().to_path_buf());
        let data_dir = std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .filter(|path| path.is_absolute())
            .or_else(|| base.as_ref().map(|dirs| dirs.data_dir().to_path_buf()));
        Ok(Self {
            cwd: std::env::current_dir()?,
            home,
            db_path: std::env::var(DB_PATH_ENV).ok().filter(|v| !v.trim().is_empty()),
            data_dir,
        })
    }

    /// `~/.todos.json`
    pub fn home_store(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|home| home.join(STORE_FILE))
    }

    /// `<data dir>/todo/todos.json`
    pub fn data_store(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(DATA_DIR_NAME).join(DATA_FILE_NAME))
    }

    /// Expand a leading `~` and anchor relative paths at the working directory.
    pub fn expand(&self, raw: &str) -> Result<PathBuf> {
        let path = if raw == "~" {
            self.home.clone().ok_or_else(no_home)?
        } else if let Some(rest) = raw.strip_prefix("~/") {
            self.home.as_ref().ok_or_else(no_home)?.join(rest)
        } else {
            PathBuf::from(raw)
        };
        Ok(if path.is_absolute() {
            path
        } else {
            self.cwd.join(path)
        })
    }
}

fn no_home() -> Error {
    Error::Validation("cannot expand '~': home directory unknown".to_string())
}

/// Which rule picked the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Explicit,
    Project,
    Env,
    Home,
    Data,
    Local,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeKind::Explicit => "explicit",
            ScopeKind::Project => "project",
            ScopeKind::Env => "env",
            ScopeKind::Home => "home",
            ScopeKind::Data => "data",
            ScopeKind::Local => "local",
        };
        f.write_str(name)
    }
}

/// The chosen store path and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub path: PathBuf,
    pub kind: ScopeKind,
}

/// Picks the store path for one invocation.
#[derive(Debug, Clone)]
pub struct ScopeResolver<'a> {
    env: &'a ScopeEnv,
    markers: &'a [String],
    manage_gitignore: bool,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(env: &'a ScopeEnv, markers: &'a [String]) -> Self {
        Self {
            env,
            markers,
            manage_gitignore: true,
        }
    }

    pub fn manage_gitignore(mut self, enabled: bool) -> Self {
        self.manage_gitignore = enabled;
        self
    }

    pub fn resolve(&self, explicit: Option<&str>, global: bool) -> Result<Scope> {
        let scope = self.pick(explicit, global)?;
        tracing::debug!(path = %scope.path.display(), kind = %scope.kind, "store path resolved");
        Ok(scope)
    }

    fn pick(&self, explicit: Option<&str>, global: bool) -> Result<Scope> {
        if !global {
            if let Some(raw) = explicit.filter(|raw| !raw.trim().is_empty()) {
                return Ok(Scope {
                    path: self.env.expand(raw)?,
                    kind: ScopeKind::Explicit,
                });
            }

            if let Some(root) = self.find_project_root() {
                if self.manage_gitignore {
                    if let Err(err) = ensure_gitignore(&root) {
                        tracing::warn!(root = %root.display(), error = %err, "failed to update .gitignore");
                    }
                }
                return Ok(Scope {
                    path: root.join(STORE_FILE),
                    kind: ScopeKind::Project,
                });
            }
        }

        if let Some(raw) = &self.env.db_path {
            return Ok(Scope {
                path: self.env.expand(raw)?,
                kind: ScopeKind::Env,
            });
        }

        if let Some(home) = self.env.home_store().filter(|p| p.is_file()) {
            return Ok(Scope {
                path: home,
                kind: ScopeKind::Home,
            });
        }

        let data = self.env.data_store();
        if global {
            return data
                .map(|path| Scope {
                    path,
                    kind: ScopeKind::Data,
                })
                .ok_or_else(|| {
                    Error::Validation("no data directory available for the global store".to_string())
                });
        }
        if let Some(path) = data.filter(|p| p.is_file()) {
            return Ok(Scope {
                path,
                kind: ScopeKind::Data,
            });
        }

        Ok(Scope {
            path: self.env.cwd.join(STORE_FILE),
            kind: ScopeKind::Local,
        })
    }

    /// Nearest ancestor of the working directory that holds a marker.
    pub fn find_project_root(&self) -> Option<PathBuf> {
        self.env
            .cwd
            .ancestors()
            .find(|dir| self.markers.iter().any(|marker| dir.join(marker).exists()))
            .map(Path::to_path_buf)
    }
}

/// Make sure the project store is listed in `<root>/.gitignore`.
///
/// Returns whether the file was changed.
pub fn ensure_gitignore(root: &Path) -> io::Result<bool> {
    let path = root.join(".gitignore");
    if path.exists() && !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!(".gitignore exists but is not a file: {}", path.display()),
        ));
    }

    let existing = if path.exists() {
        fs::read_to_string(&path)?
    } else {
        String::new()
    };

    let rooted = format!("/{STORE_FILE}");
    let already_ignored = existing.lines().any(|line| {
        let trimmed = line.trim();
        trimmed == STORE_FILE || trimmed == rooted
    });
    if already_ignored {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{STORE_FILE}")?;
    tracing::info!(path = %path.display(), "added {STORE_FILE} to .gitignore");
    Ok(true)
}
