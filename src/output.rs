//! Output formats and rendering.
//!
//! Every format implements [`Renderer`]; the CLI picks one from
//! `--format` (or the configured default) and prints what it returns.
//! Machine formats (`json`, `yaml`) write errors to stdout so callers can
//! parse them; human formats write errors to stderr.

use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;

use crossterm::style::Stylize;
use serde::Serialize;

use crate::commands::{CommandResult, DisplayTodo, MessageLevel, ResultKind};
use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "todo.v1";

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Csv,
    Markdown,
    Plain,
    Terminal,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Json,
        Format::Yaml,
        Format::Csv,
        Format::Markdown,
        Format::Plain,
        Format::Terminal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Csv => "csv",
            Format::Markdown => "markdown",
            Format::Plain => "plain",
            Format::Terminal => "terminal",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Format::Json => "JSON envelope with schema_version, command, status and data",
            Format::Yaml => "YAML document of the command result",
            Format::Csv => "one row per todo with a header line",
            Format::Markdown => "task list with checkboxes",
            Format::Plain => "indented text without colors",
            Format::Terminal => "indented text, colored when stdout is a terminal",
        }
    }

    /// Machine formats report errors on stdout.
    pub fn is_machine(self) -> bool {
        matches!(self, Format::Json | Format::Yaml)
    }

    pub fn renderer(self) -> Box<dyn Renderer> {
        match self {
            Format::Json => Box::new(JsonRenderer),
            Format::Yaml => Box::new(YamlRenderer),
            Format::Csv => Box::new(CsvRenderer),
            Format::Markdown => Box::new(MarkdownRenderer),
            Format::Plain => Box::new(TextRenderer { color: false }),
            Format::Terminal => Box::new(TextRenderer {
                color: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
            }),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Format::ALL
            .into_iter()
            .find(|format| format.as_str() == lower)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown format '{s}' (expected one of: {})",
                    Format::ALL.map(Format::as_str).join(", ")
                ))
            })
    }
}

/// Turns command results into text for one format.
pub trait Renderer {
    fn render_change(&self, result: &CommandResult) -> Result<String>;
    fn render_list(&self, result: &CommandResult) -> Result<String>;
    fn render_search(&self, result: &CommandResult) -> Result<String>;
    fn render_message(&self, result: &CommandResult) -> Result<String>;
    fn render_error(&self, command: &str, err: &Error) -> Result<String>;
    fn render_formats(&self, formats: &[Format]) -> Result<String>;

    fn render(&self, result: &CommandResult) -> Result<String> {
        match result.kind {
            ResultKind::Change => self.render_change(result),
            ResultKind::List => self.render_list(result),
            ResultKind::Search => self.render_search(result),
            ResultKind::Message => self.render_message(result),
        }
    }
}

#[derive(Serialize)]
struct FormatInfo {
    name: &'static str,
    description: &'static str,
}

fn format_infos(formats: &[Format]) -> Vec<FormatInfo> {
    formats
        .iter()
        .map(|format| FormatInfo {
            name: format.as_str(),
            description: format.description(),
        })
        .collect()
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    error: ErrorBody,
}

fn success<'a, T: Serialize>(command: &'a str, data: &'a T) -> SuccessEnvelope<'a, T> {
    SuccessEnvelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "success",
        data,
    }
}

fn failure<'a>(command: &'a str, err: &Error) -> ErrorEnvelope<'a> {
    ErrorEnvelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "error",
        error: ErrorBody {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        },
    }
}

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_change(&self, result: &CommandResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(&success(&result.command, result))?)
    }

    fn render_list(&self, result: &CommandResult) -> Result<String> {
        self.render_change(result)
    }

    fn render_search(&self, result: &CommandResult) -> Result<String> {
        self.render_change(result)
    }

    fn render_message(&self, result: &CommandResult) -> Result<String> {
        self.render_change(result)
    }

    fn render_error(&self, command: &str, err: &Error) -> Result<String> {
        Ok(serde_json::to_string_pretty(&failure(command, err))?)
    }

    fn render_formats(&self, formats: &[Format]) -> Result<String> {
        let infos = format_infos(formats);
        Ok(serde_json::to_string_pretty(&success("formats", &infos))?)
    }
}

pub struct YamlRenderer;

impl Renderer for YamlRenderer {
    fn render_change(&self, result: &CommandResult) -> Result<String> {
        Ok(serde_yaml::to_string(&success(&result.command, result))?)
    }

    fn render_list(&self, result: &CommandResult) -> Result<String> {
        self.render_change(result)
    }

    fn render_search(&self, result: &CommandResult) -> Result<String> {
        self.render_change(result)
    }

    fn render_message(&self, result: &CommandResult) -> Result<String> {
        self.render_change(result)
    }

    fn render_error(&self, command: &str, err: &Error) -> Result<String> {
        Ok(serde_yaml::to_string(&failure(command, err))?)
    }

    fn render_formats(&self, formats: &[Format]) -> Result<String> {
        let infos = format_infos(formats);
        Ok(serde_yaml::to_string(&success("formats", &infos))?)
    }
}

pub struct CsvRenderer;

const CSV_HEADER: &str = "position,uid,text,completion,depth,modified_at";

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_rows(todos: &[DisplayTodo]) -> String {
    let mut lines = vec![CSV_HEADER.to_string()];
    for todo in todos {
        lines.push(
            [
                csv_field(&todo.position),
                csv_field(&todo.uid),
                csv_field(&todo.text),
                todo.completion.to_string(),
                todo.depth.to_string(),
                todo.modified_at.to_rfc3339(),
            ]
            .join(","),
        );
    }
    lines.join("\n")
}

impl Renderer for CsvRenderer {
    fn render_change(&self, result: &CommandResult) -> Result<String> {
        Ok(csv_rows(&result.affected))
    }

    fn render_list(&self, result: &CommandResult) -> Result<String> {
        Ok(csv_rows(&result.listed))
    }

    fn render_search(&self, result: &CommandResult) -> Result<String> {
        self.render_list(result)
    }

    fn render_message(&self, result: &CommandResult) -> Result<String> {
        let text = result
            .message
            .as_ref()
            .map(|message| message.text.as_str())
            .unwrap_or_default();
        Ok(format!("message\n{}", csv_field(text)))
    }

    fn render_error(&self, _command: &str, err: &Error) -> Result<String> {
        Ok(format!("error: {err}"))
    }

    fn render_formats(&self, formats: &[Format]) -> Result<String> {
        let mut lines = vec!["name,description".to_string()];
        for format in formats {
            lines.push(format!("{},{}", format.as_str(), csv_field(format.description())));
        }
        Ok(lines.join("\n"))
    }
}

pub struct MarkdownRenderer;

fn markdown_items(todos: &[DisplayTodo]) -> Vec<String> {
    todos
        .iter()
        .map(|todo| {
            let check = if todo.completion.is_done() { "x" } else { " " };
            let indent = "  ".repeat(todo.depth);
            let text = todo
                .text
                .replace('\n', &format!("\n{indent}      "));
            format!("{indent}- [{check}] {} {text}", todo.position)
        })
        .collect()
}

impl Renderer for MarkdownRenderer {
    fn render_change(&self, result: &CommandResult) -> Result<String> {
        let mut lines = Vec::new();
        if let Some(message) = &result.message {
            lines.push(format!("**{}**", message.text));
            lines.push(String::new());
        }
        lines.extend(markdown_items(&result.listed));
        Ok(lines.join("\n"))
    }

    fn render_list(&self, result: &CommandResult) -> Result<String> {
        let mut lines = vec![format!("# {}", result.command), String::new()];
        if result.listed.is_empty() {
            lines.push("_No todos_".to_string());
        } else {
            lines.extend(markdown_items(&result.listed));
        }
        lines.push(String::new());
        lines.push(format!("{} of {} done", result.totals.done, result.totals.total));
        Ok(lines.join("\n"))
    }

    fn render_search(&self, result: &CommandResult) -> Result<String> {
        self.render_change(result)
    }

    fn render_message(&self, result: &CommandResult) -> Result<String> {
        Ok(result
            .message
            .as_ref()
            .map(|message| message.text.clone())
            .unwrap_or_default())
    }

    fn render_error(&self, _command: &str, err: &Error) -> Result<String> {
        Ok(format!("**error:** {err}"))
    }

    fn render_formats(&self, formats: &[Format]) -> Result<String> {
        let mut lines = vec![
            "| format | description |".to_string(),
            "|--------|-------------|".to_string(),
        ];
        for format in formats {
            lines.push(format!("| {} | {} |", format.as_str(), format.description()));
        }
        Ok(lines.join("\n"))
    }
}

/// `plain` and `terminal`: indented lines, optionally styled.
pub struct TextRenderer {
    pub color: bool,
}

impl TextRenderer {
    fn todo_line(&self, todo: &DisplayTodo) -> String {
        let indent = "  ".repeat(todo.depth);
        let continuation = format!("\n{indent}{}", " ".repeat(todo.position.len() + 1));
        let text = todo.text.replace('\n', &continuation);
        if !self.color {
            return format!("{indent}{} {text}", todo.position);
        }
        if todo.completion.is_done() {
            format!("{indent}{} {}", todo.position.as_str().dark_grey(), text.dark_grey())
        } else {
            format!("{indent}{} {text}", todo.position.as_str().cyan().bold())
        }
    }

    fn message_line(&self, level: MessageLevel, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        match level {
            MessageLevel::Success => text.green().to_string(),
            MessageLevel::Info => text.to_string(),
            MessageLevel::Warning => text.yellow().to_string(),
            MessageLevel::Error => text.red().to_string(),
        }
    }

    fn lines(&self, todos: &[DisplayTodo]) -> Vec<String> {
        todos.iter().map(|todo| self.todo_line(todo)).collect()
    }
}

impl Renderer for TextRenderer {
    fn render_change(&self, result: &CommandResult) -> Result<String> {
        let mut lines = Vec::new();
        if let Some(message) = &result.message {
            lines.push(self.message_line(message.level, &message.text));
        }
        let listed = self.lines(&result.listed);
        if !listed.is_empty() {
            lines.push(String::new());
            lines.extend(listed);
        }
        Ok(lines.join("\n"))
    }

    fn render_list(&self, result: &CommandResult) -> Result<String> {
        if result.listed.is_empty() {
            return Ok(self.message_line(MessageLevel::Info, "No todos"));
        }
        Ok(self.lines(&result.listed).join("\n"))
    }

    fn render_search(&self, result: &CommandResult) -> Result<String> {
        if result.listed.is_empty() {
            return Ok(self.message_line(MessageLevel::Info, "No matches"));
        }
        Ok(self.lines(&result.listed).join("\n"))
    }

    fn render_message(&self, result: &CommandResult) -> Result<String> {
        Ok(result
            .message
            .as_ref()
            .map(|message| self.message_line(message.level, &message.text))
            .unwrap_or_default())
    }

    fn render_error(&self, _command: &str, err: &Error) -> Result<String> {
        let label = if self.color {
            "error:".red().bold().to_string()
        } else {
            "error:".to_string()
        };
        Ok(format!("{label} {err}"))
    }

    fn render_formats(&self, formats: &[Format]) -> Result<String> {
        let width = formats
            .iter()
            .map(|format| format.as_str().len())
            .max()
            .unwrap_or_default();
        Ok(formats
            .iter()
            .map(|format| format!("{:width$}  {}", format.as_str(), format.description()))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Print a successful result on stdout.
pub fn emit_success(format: Format, result: &CommandResult) -> Result<()> {
    let rendered = format.renderer().render(result)?;
    if !rendered.is_empty() {
        println!("{rendered}");
    }
    Ok(())
}

/// Print an error: stdout for machine formats, stderr otherwise.
pub fn emit_error(format: Format, command: &str, err: &Error) -> Result<()> {
    let rendered = format.renderer().render_error(command, err)?;
    if format.is_machine() {
        println!("{rendered}");
    } else {
        eprintln!("{rendered}");
    }
    Ok(())
}

/// Print the list of supported formats.
pub fn emit_formats(format: Format) -> Result<()> {
    println!("{}", format.renderer().render_formats(&Format::ALL)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Message, Totals};
    use crate::model::Completion;
    use chrono::Utc;

    fn todo(position: &str, text: &str, depth: usize, completion: Completion) -> DisplayTodo {
        DisplayTodo {
            uid: format!("uid-{position}"),
            position: position.to_string(),
            text: text.to_string(),
            completion,
            depth,
            modified_at: Utc::now(),
        }
    }

    fn list_result() -> CommandResult {
        CommandResult {
            command: "list".to_string(),
            kind: ResultKind::List,
            message: None,
            affected: Vec::new(),
            listed: vec![
                todo("1", "Groceries", 0, Completion::Pending),
                todo("1.1", "Milk, whole\n2 litres", 1, Completion::Pending),
                todo("1.c1", "Bread", 1, Completion::Done),
            ],
            totals: Totals { total: 3, done: 1 },
            path: None,
        }
    }

    #[test]
    fn formats_parse_by_name() {
        for format in Format::ALL {
            assert_eq!(format.as_str().parse::<Format>().unwrap(), format);
        }
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert!("xml".parse::<Format>().is_err());
    }

    #[test]
    fn plain_indents_by_depth() {
        let out = TextRenderer { color: false }.render(&list_result()).unwrap();
        assert_eq!(out, "1 Groceries\n  1.1 Milk, whole\n      2 litres\n  1.c1 Bread");
    }

    #[test]
    fn json_uses_envelope() {
        let out = JsonRenderer.render(&list_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["command"], "list");
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["listed"][2]["position"], "1.c1");
        assert_eq!(value["data"]["listed"][2]["completion"], "done");
        assert_eq!(value["data"]["totals"]["done"], 1);
    }

    #[test]
    fn json_error_carries_kind_and_details() {
        let err = Error::AmbiguousShortId {
            reference: "ab".to_string(),
            candidates: vec!["ab12".to_string(), "ab34".to_string()],
        };
        let out = JsonRenderer.render_error("complete", &err).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], 1);
        assert_eq!(value["error"]["kind"], "ambiguous_short_id");
        assert_eq!(value["error"]["details"]["candidates"][1], "ab34");
    }

    #[test]
    fn csv_quotes_fields() {
        let out = CsvRenderer.render(&list_result()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].starts_with("1.1,uid-1.1,\"Milk, whole"));
    }

    #[test]
    fn markdown_checkboxes() {
        let out = MarkdownRenderer.render(&list_result()).unwrap();
        assert!(out.contains("- [ ] 1 Groceries"));
        assert!(out.contains("  - [x] 1.c1 Bread"));
        assert!(out.ends_with("1 of 3 done"));
    }

    #[test]
    fn yaml_round_trips_through_value() {
        let out = YamlRenderer.render(&list_result()).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(value["data"]["listed"][0]["text"], "Groceries");
    }

    #[test]
    fn change_shows_message_then_listing() {
        let mut result = list_result();
        result.kind = ResultKind::Change;
        result.message = Some(Message::new(MessageLevel::Success, "Added 1 todo"));
        let out = TextRenderer { color: false }.render(&result).unwrap();
        assert!(out.starts_with("Added 1 todo\n\n1 Groceries"));
    }

    #[test]
    fn formats_listing_names_every_format() {
        let out = TextRenderer { color: false }.render_formats(&Format::ALL).unwrap();
        for format in Format::ALL {
            assert!(out.contains(format.as_str()));
        }
    }
}
