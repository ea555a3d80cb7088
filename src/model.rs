//! Todo records and the status model.
//!
//! A todo carries a map of named status dimensions. Only the `completion`
//! dimension is interpreted by the core; other dimensions ride along
//! untouched so the schema can grow without migrations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Parent uid of every top-level todo.
pub const ROOT: &str = "";

/// Status dimension interpreted by the core.
pub const COMPLETION: &str = "completion";

/// Completion state of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    #[default]
    Pending,
    Done,
}

impl Completion {
    pub fn as_str(self) -> &'static str {
        match self {
            Completion::Pending => "pending",
            Completion::Done => "done",
        }
    }

    pub fn is_done(self) -> bool {
        self == Completion::Done
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Completion {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Completion::Pending),
            "done" => Ok(Completion::Done),
            other => Err(Error::Validation(format!(
                "invalid completion state '{other}': must be pending or done"
            ))),
        }
    }
}

/// A single todo as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub uid: String,
    #[serde(default)]
    pub parent_uid: String,
    pub text: String,
    #[serde(default)]
    pub statuses: BTreeMap<String, String>,
    pub modified_at: DateTime<Utc>,
}

impl Todo {
    /// Create a pending todo with a fresh uid.
    pub fn new(text: impl Into<String>, parent_uid: impl Into<String>) -> Self {
        let mut statuses = BTreeMap::new();
        statuses.insert(COMPLETION.to_string(), Completion::Pending.to_string());
        Self {
            uid: generate_uid(),
            parent_uid: parent_uid.into(),
            text: text.into(),
            statuses,
            modified_at: Utc::now(),
        }
    }

    /// Completion state; an absent or unknown value reads as pending.
    pub fn completion(&self) -> Completion {
        self.statuses
            .get(COMPLETION)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn is_done(&self) -> bool {
        self.completion().is_done()
    }

    pub fn is_root_child(&self) -> bool {
        self.parent_uid == ROOT
    }

    pub fn set_status(&mut self, dimension: &str, state: &str) {
        self.statuses
            .insert(dimension.to_string(), state.to_string());
        self.touch();
    }

    pub fn set_completion(&mut self, completion: Completion) {
        self.set_status(COMPLETION, completion.as_str());
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.touch();
    }

    /// Refresh `modified_at`, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.modified_at = if now > self.modified_at {
            now
        } else {
            self.modified_at + chrono::Duration::nanoseconds(1)
        };
    }
}

/// Generate an opaque todo uid: 32 lowercase hex characters.
pub fn generate_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_todo_is_pending_with_hex_uid() {
        let todo = Todo::new("Milk", ROOT);
        assert_eq!(todo.completion(), Completion::Pending);
        assert_eq!(todo.uid.len(), 32);
        assert!(todo.uid.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(todo.is_root_child());
    }

    #[test]
    fn missing_completion_defaults_to_pending() {
        let mut todo = Todo::new("Bread", ROOT);
        todo.statuses.clear();
        assert_eq!(todo.completion(), Completion::Pending);

        todo.set_status("priority", "high");
        assert_eq!(todo.completion(), Completion::Pending);
        assert_eq!(todo.statuses.get("priority").map(String::as_str), Some("high"));
    }

    #[test]
    fn touch_is_monotonic() {
        let mut todo = Todo::new("Eggs", ROOT);
        let future = Utc::now() + chrono::Duration::hours(1);
        todo.modified_at = future;
        todo.set_completion(Completion::Done);
        assert!(todo.modified_at > future);
        assert!(todo.is_done());
    }

    #[test]
    fn completion_parses_case_insensitively() {
        assert_eq!("DONE".parse::<Completion>().unwrap(), Completion::Done);
        assert!("finished".parse::<Completion>().is_err());
    }
}
