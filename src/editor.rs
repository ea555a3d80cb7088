//! Text input through the user's editor (`$VISUAL`, then `$EDITOR`, then `vi`).

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, ExitStatus};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Source of free-form text for `add -e` and `edit -e`.
pub trait TextEditor {
    /// Let the user edit `initial` and return the result with blank
    /// leading and trailing lines removed.
    fn edit(&self, initial: &str) -> Result<String>;
}

/// Spawns an external editor on a temp file and waits for it.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    candidates: Vec<String>,
}

impl ExternalEditor {
    pub fn from_env() -> Self {
        Self {
            candidates: editor_candidates(),
        }
    }

    pub fn with_candidates(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

impl TextEditor for ExternalEditor {
    fn edit(&self, initial: &str) -> Result<String> {
        let mut temp: NamedTempFile = tempfile::Builder::new()
            .prefix("todo-")
            .suffix(".md")
            .tempfile()
            .map_err(|err| Error::Editor(format!("failed to create temp file for editor: {err}")))?;
        temp.write_all(initial.as_bytes())
            .map_err(|err| Error::Editor(format!("failed to write temp file: {err}")))?;
        temp.flush()
            .map_err(|err| Error::Editor(format!("failed to flush temp file: {err}")))?;

        let status = launch_editor(&self.candidates, temp.path())?;
        if !status.success() {
            let detail = status
                .code()
                .map(|code| format!("exit code {code}"))
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::Editor(format!("editor exited with {detail}")));
        }

        let content = fs::read_to_string(temp.path())
            .map_err(|err| Error::Editor(format!("failed to read editor buffer: {err}")))?;
        Ok(trim_blank_lines(&content))
    }
}

fn launch_editor(candidates: &[String], path: &Path) -> Result<ExitStatus> {
    let mut attempted: Vec<String> = Vec::new();
    for candidate in candidates {
        let parts: Vec<&str> = candidate.split_whitespace().collect();
        let Some((program, args)) = parts.split_first() else {
            continue;
        };
        attempted.push(program.to_string());
        tracing::debug!(editor = %program, path = %path.display(), "launching editor");
        match Command::new(program).args(args).arg(path).status() {
            Ok(status) => return Ok(status),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(Error::Editor(format!(
                    "failed to launch editor '{program}': {err}"
                )));
            }
        }
    }
    let tried = if attempted.is_empty() {
        "no editor candidates".to_string()
    } else {
        attempted.join(", ")
    };
    Err(Error::Editor(format!(
        "no editor found (tried {tried}); set $VISUAL or $EDITOR"
    )))
}

fn editor_candidates() -> Vec<String> {
    let mut out = Vec::new();
    for var in ["VISUAL", "EDITOR"] {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                out.push(value);
            }
        }
    }
    out.push("vi".to_string());
    out
}

/// Drop whitespace-only lines from both ends; inner lines are kept as-is.
pub fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|line| !line.trim().is_empty());
    let end = lines.iter().rposition(|line| !line.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end]
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
