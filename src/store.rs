//! JSON persistence for the todo collection.
//!
//! # File format
//!
//! ```text
//! {
//!   "schema_version": 2,
//!   "todos": [
//!     { "uid": "…", "parent_uid": "", "text": "…",
//!       "statuses": { "completion": "pending" },
//!       "modified_at": "2026-01-01T00:00:00Z" }
//!   ]
//! }
//! ```
//!
//! Todos are written depth-first, so the array order inside each parent
//! scope is the sibling order. Older files nested children inside `items`
//! (or `children`) arrays; those are flattened on load and rewritten in
//! the current format on the next save.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock};
use crate::model::{self, Completion, Todo, COMPLETION, ROOT};

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Default store file name for project and home scopes
pub const STORE_FILE: &str = ".todos.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    schema_version: u32,
    #[serde(default)]
    todos: Vec<Todo>,
}

/// Pre-v2 document: nested items, loose field names.
///
/// An object must carry `todos` (or `items`) and every item needs text, so
/// unrelated JSON files are rejected instead of being read as empty stores.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyDocument {
    Wrapped {
        #[serde(alias = "items")]
        todos: Vec<LegacyItem>,
    },
    Bare(Vec<LegacyItem>),
}

#[derive(Debug, Deserialize)]
struct LegacyItem {
    #[serde(default, alias = "id")]
    uid: Option<String>,
    #[serde(alias = "title", alias = "content")]
    text: String,
    #[serde(default)]
    statuses: BTreeMap<String, String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    modified_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "children")]
    items: Vec<LegacyItem>,
}

/// Handle on a single store file.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Take the advisory write lock for this store.
    pub fn lock(&self, timeout_ms: u64) -> Result<FileLock> {
        FileLock::acquire(lock::lock_path_for(&self.path), timeout_ms)
    }

    /// Read the collection; an absent file yields an empty collection.
    pub fn load(&self) -> Result<Collection> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "store absent; starting empty");
                return Ok(Collection::new());
            }
            Err(err) => return Err(Error::Io(err)),
        };

        let todos = decode(&content).map_err(|reason| self.corrupt(reason))?;
        validate_statuses(&todos).map_err(|reason| self.corrupt(reason))?;
        let collection = Collection::from_todos(todos).map_err(|reason| self.corrupt(reason))?;
        tracing::debug!(path = %self.path.display(), todos = collection.len(), "store loaded");
        Ok(collection)
    }

    /// Write the collection atomically (temp file, fsync, rename).
    pub fn save(&self, collection: &Collection) -> Result<()> {
        let file = StoreFile {
            schema_version: SCHEMA_VERSION,
            todos: collection.to_todos(),
        };
        let mut json = serde_json::to_string_pretty(&file)?;
        json.push('\n');
        lock::write_atomic(&self.path, json.as_bytes())?;
        tracing::debug!(path = %self.path.display(), todos = file.todos.len(), "store saved");
        Ok(())
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::CorruptStore {
            path: self.path.clone(),
            reason,
        }
    }
}

fn decode(content: &str) -> std::result::Result<Vec<Todo>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|err| format!("invalid JSON: {err}"))?;

    let version = value.get("schema_version").and_then(|v| v.as_u64());
    match version {
        Some(v) if v > SCHEMA_VERSION as u64 => {
            Err(format!("unsupported schema_version {v} (newest known is {SCHEMA_VERSION})"))
        }
        Some(v) if v == SCHEMA_VERSION as u64 => {
            let file: StoreFile =
                serde_json::from_value(value).map_err(|err| format!("schema violation: {err}"))?;
            Ok(file.todos)
        }
        _ => {
            let legacy: LegacyDocument = serde_json::from_value(value)
                .map_err(|_| "not a todo store: expected `schema_version` and `todos`".to_string())?;
            let items = match legacy {
                LegacyDocument::Wrapped { todos } => todos,
                LegacyDocument::Bare(items) => items,
            };
            tracing::info!(items = items.len(), "flattening legacy store format");
            Ok(flatten_legacy(items))
        }
    }
}

fn flatten_legacy(items: Vec<LegacyItem>) -> Vec<Todo> {
    let now = Utc::now();
    let mut out = Vec::new();
    let mut stack: Vec<(LegacyItem, String)> = items
        .into_iter()
        .rev()
        .map(|item| (item, ROOT.to_string()))
        .collect();

    while let Some((item, parent_uid)) = stack.pop() {
        let uid = item
            .uid
            .filter(|uid| !uid.trim().is_empty())
            .unwrap_or_else(model::generate_uid);

        let mut statuses = item.statuses;
        if !statuses.contains_key(COMPLETION) {
            let completion = match (item.done, item.status.as_deref()) {
                (Some(true), _) => Completion::Done,
                (_, Some(status)) if status.eq_ignore_ascii_case("done") => Completion::Done,
                _ => Completion::Pending,
            };
            statuses.insert(COMPLETION.to_string(), completion.to_string());
        }

        for child in item.items.into_iter().rev() {
            stack.push((child, uid.clone()));
        }

        out.push(Todo {
            uid,
            parent_uid,
            text: item.text,
            statuses,
            modified_at: item.modified_at.unwrap_or(now),
        });
    }
    out
}

fn validate_statuses(todos: &[Todo]) -> std::result::Result<(), String> {
    for todo in todos {
        if let Some(state) = todo.statuses.get(COMPLETION) {
            state
                .parse::<Completion>()
                .map_err(|_| format!("todo {} has unknown completion state '{state}'", todo.uid))?;
        }
    }
    Ok(())
}
