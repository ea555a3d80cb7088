//! Command table and dispatcher.
//!
//! Every user command is described by a [`CommandSpec`] record. The
//! dispatcher reads the record to decide whether to lock, which attribute
//! to change, which listing to show afterwards and how to word the
//! message; per-command code is limited to gathering input.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collection::Collection;
use crate::config::Config;
use crate::editor::TextEditor;
use crate::engine::{Attribute, Engine};
use crate::error::{Error, Result};
use crate::model::{Completion, ROOT};
use crate::parser;
use crate::position::{self, PositionMap, View};
use crate::store::Store;

/// Which todos a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFilter {
    /// Pending todos with active-only paths
    #[default]
    Pending,
    /// Done todos with full-view paths
    Done,
    /// Everything with full-view paths
    All,
}

impl ListFilter {
    pub fn from_flags(done: bool, all: bool) -> Self {
        if all {
            ListFilter::All
        } else if done {
            ListFilter::Done
        } else {
            ListFilter::Pending
        }
    }

    fn view(self) -> View {
        match self {
            ListFilter::Pending => View::ActiveOnly,
            ListFilter::Done | ListFilter::All => View::Full,
        }
    }
}

/// Typed input for one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Add {
        words: Vec<String>,
        to: Option<String>,
        editor: bool,
    },
    Complete {
        refs: Vec<String>,
    },
    Reopen {
        refs: Vec<String>,
    },
    Edit {
        reference: String,
        words: Vec<String>,
        editor: bool,
    },
    Move {
        reference: String,
        parent: String,
    },
    Clean,
    List {
        filter: ListFilter,
    },
    Search {
        words: Vec<String>,
        filter: ListFilter,
        case_sensitive: bool,
    },
    Init {
        home: bool,
    },
    Datapath,
}

impl Request {
    /// Canonical command name.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Add { .. } => "add",
            Request::Complete { .. } => "complete",
            Request::Reopen { .. } => "reopen",
            Request::Edit { .. } => "edit",
            Request::Move { .. } => "move",
            Request::Clean => "clean",
            Request::List { .. } => "list",
            Request::Search { .. } => "search",
            Request::Init { .. } => "init",
            Request::Datapath => "datapath",
        }
    }

    /// References naming the todos this request changes.
    pub fn refs(&self) -> Vec<&str> {
        match self {
            Request::Complete { refs } | Request::Reopen { refs } => {
                refs.iter().map(String::as_str).collect()
            }
            Request::Edit { reference, .. } | Request::Move { reference, .. } => {
                vec![reference.as_str()]
            }
            _ => Vec::new(),
        }
    }

    fn words(&self) -> &[String] {
        match self {
            Request::Add { words, .. }
            | Request::Edit { words, .. }
            | Request::Search { words, .. } => words,
            _ => &[],
        }
    }

    fn uses_editor(&self) -> bool {
        matches!(
            self,
            Request::Add { editor: true, .. } | Request::Edit { editor: true, .. }
        )
    }

    fn joined(&self) -> String {
        self.words().join(" ").trim().to_string()
    }
}

/// Severity of a result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// A todo as handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayTodo {
    pub uid: String,
    pub position: String,
    pub text: String,
    pub completion: Completion,
    pub depth: usize,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total: usize,
    pub done: usize,
}

impl Totals {
    fn of(collection: &Collection) -> Self {
        Self {
            total: collection.len(),
            done: collection.iterate_all().filter(|t| t.is_done()).count(),
        }
    }
}

/// How a result should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Change,
    List,
    Search,
    Message,
}

/// Everything a renderer needs to show the outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub command: String,
    #[serde(skip)]
    pub kind: ResultKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    pub affected: Vec<DisplayTodo>,
    pub listed: Vec<DisplayTodo>,
    pub totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CommandResult {
    fn new(command: &str, kind: ResultKind) -> Self {
        Self {
            command: command.to_string(),
            kind,
            message: None,
            affected: Vec::new(),
            listed: Vec::new(),
            totals: Totals::default(),
            path: None,
        }
    }
}

/// Declarative description of one command.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub about: &'static str,
    /// Needs at least one todo reference
    pub requires_ref: bool,
    /// Accepts several references, all resolved before any change
    pub multi_ref: bool,
    /// Needs text, from arguments or the editor
    pub requires_text: bool,
    /// Writes the store
    pub mutates: bool,
    /// Attribute changed on each referenced todo
    pub attribute: Option<Attribute>,
    /// Value written to `attribute`; otherwise taken from the request
    pub fixed_value: Option<&'static str>,
    pub validate: Option<fn(&Request) -> Result<()>>,
    /// Listing shown with the result
    pub filter: Option<fn(&Request) -> ListFilter>,
    pub message: Option<fn(&CommandResult) -> Message>,
}

impl CommandSpec {
    const fn query(name: &'static str, aliases: &'static [&'static str], about: &'static str) -> Self {
        Self {
            name,
            aliases,
            about,
            requires_ref: false,
            multi_ref: false,
            requires_text: false,
            mutates: false,
            attribute: None,
            fixed_value: None,
            validate: None,
            filter: None,
            message: None,
        }
    }

    pub fn matches(&self, word: &str) -> bool {
        self.name == word || self.aliases.contains(&word)
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("requires_ref", &self.requires_ref)
            .field("multi_ref", &self.multi_ref)
            .field("requires_text", &self.requires_text)
            .field("mutates", &self.mutates)
            .field("attribute", &self.attribute)
            .field("fixed_value", &self.fixed_value)
            .finish_non_exhaustive()
    }
}

/// The set of commands the CLI understands.
#[derive(Debug, Clone)]
pub struct CommandTable {
    specs: Vec<CommandSpec>,
}

impl CommandTable {
    pub fn new(specs: Vec<CommandSpec>) -> Self {
        Self { specs }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            CommandSpec {
                requires_text: true,
                mutates: true,
                filter: Some(|_: &Request| ListFilter::Pending),
                message: Some(|r: &CommandResult| counted(MessageLevel::Success, "Added", r.affected.len())),
                ..CommandSpec::query("add", &["a", "new", "create"], "Add a todo (or a bullet list of todos)")
            },
            CommandSpec {
                requires_ref: true,
                multi_ref: true,
                mutates: true,
                attribute: Some(Attribute::Completion),
                fixed_value: Some("done"),
                filter: Some(|_: &Request| ListFilter::Pending),
                message: Some(|r: &CommandResult| counted(MessageLevel::Success, "Completed", r.affected.len())),
                ..CommandSpec::query("complete", &["c"], "Mark todos done")
            },
            CommandSpec {
                requires_ref: true,
                multi_ref: true,
                mutates: true,
                attribute: Some(Attribute::Completion),
                fixed_value: Some("pending"),
                filter: Some(|_: &Request| ListFilter::Pending),
                message: Some(|r: &CommandResult| counted(MessageLevel::Success, "Reopened", r.affected.len())),
                ..CommandSpec::query("reopen", &["o"], "Mark todos pending again")
            },
            CommandSpec {
                requires_ref: true,
                requires_text: true,
                mutates: true,
                attribute: Some(Attribute::Text),
                filter: Some(|_: &Request| ListFilter::Pending),
                message: Some(|r: &CommandResult| counted(MessageLevel::Success, "Updated", r.affected.len())),
                ..CommandSpec::query("edit", &["modify", "e"], "Replace a todo's text")
            },
            CommandSpec {
                requires_ref: true,
                mutates: true,
                attribute: Some(Attribute::Parent),
                filter: Some(|_: &Request| ListFilter::Pending),
                message: Some(|r: &CommandResult| counted(MessageLevel::Success, "Moved", r.affected.len())),
                ..CommandSpec::query("move", &["m"], "Move a todo under another (\"\" for top level)")
            },
            CommandSpec {
                mutates: true,
                filter: Some(|_: &Request| ListFilter::Pending),
                message: Some(|r: &CommandResult| {
                    let level = if r.affected.is_empty() {
                        MessageLevel::Info
                    } else {
                        MessageLevel::Success
                    };
                    counted(level, "Removed", r.affected.len())
                }),
                ..CommandSpec::query("clean", &[], "Remove done todos")
            },
            CommandSpec {
                filter: Some(|request: &Request| match request {
                    Request::List { filter } => *filter,
                    _ => ListFilter::Pending,
                }),
                ..CommandSpec::query("list", &["ls"], "List todos")
            },
            CommandSpec {
                requires_text: true,
                validate: Some(|request: &Request| {
                    if request.joined().is_empty() {
                        return Err(Error::Validation("search needs a query".to_string()));
                    }
                    Ok(())
                }),
                filter: Some(|request: &Request| match request {
                    Request::Search { filter, .. } => *filter,
                    _ => ListFilter::Pending,
                }),
                message: Some(|r: &CommandResult| match r.listed.len() {
                    0 => Message::new(MessageLevel::Info, "No matches"),
                    1 => Message::new(MessageLevel::Info, "1 match"),
                    n => Message::new(MessageLevel::Info, format!("{n} matches")),
                }),
                ..CommandSpec::query("search", &["s"], "Find todos by text")
            },
            CommandSpec {
                mutates: true,
                ..CommandSpec::query("init", &["i"], "Create an empty store")
            },
            CommandSpec {
                message: Some(|r: &CommandResult| {
                    let path = r
                        .path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    Message::new(MessageLevel::Info, path)
                }),
                ..CommandSpec::query("datapath", &["path"], "Print the store path")
            },
        ])
    }

    pub fn find(&self, word: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.matches(word))
    }

    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }

    /// Whether `word` names a command or alias.
    pub fn is_command(&self, word: &str) -> bool {
        self.find(word).is_some()
    }
}

fn counted(level: MessageLevel, verb: &str, count: usize) -> Message {
    let noun = if count == 1 { "todo" } else { "todos" };
    Message::new(level, format!("{verb} {count} {noun}"))
}

/// Runs requests against one store.
pub struct Dispatcher<'a> {
    table: &'a CommandTable,
    store: Store,
    lock_timeout_ms: u64,
    short_id_min_len: usize,
    editor: &'a dyn TextEditor,
}

impl<'a> Dispatcher<'a> {
    pub fn new(table: &'a CommandTable, store: Store, config: &Config, editor: &'a dyn TextEditor) -> Self {
        Self {
            table,
            store,
            lock_timeout_ms: config.lock_timeout_ms,
            short_id_min_len: config.short_id_min_len,
            editor,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn run(&self, request: Request) -> Result<CommandResult> {
        let spec = self
            .table
            .find(request.name())
            .ok_or_else(|| Error::Validation(format!("unknown command '{}'", request.name())))?;
        check_arguments(spec, &request)?;
        tracing::debug!(command = spec.name, "dispatching");

        let mut result = match &request {
            Request::Init { .. } => self.init(spec)?,
            Request::Datapath => {
                let mut result = CommandResult::new(spec.name, ResultKind::Message);
                result.path = Some(self.store.path().to_path_buf());
                result
            }
            _ if spec.mutates => self.mutate(spec, &request)?,
            _ => self.query(spec, &request)?,
        };

        if let Some(build) = spec.message {
            result.message = Some(build(&result));
        }
        Ok(result)
    }

    fn engine(&self, collection: Collection) -> Engine {
        Engine::new(collection).with_short_id_min_len(self.short_id_min_len)
    }

    fn mutate(&self, spec: &CommandSpec, request: &Request) -> Result<CommandResult> {
        let _lock = self.store.lock(self.lock_timeout_ms)?;
        let mut engine = self.engine(self.store.load()?);
        let before = position::generate(engine.collection(), ROOT, View::Full);

        let mut changed: Vec<String> = Vec::new();
        let mut removed = Vec::new();
        match (request, spec.attribute) {
            (Request::Add { .. }, _) => changed = self.add(&mut engine, request)?,
            (Request::Clean, _) => removed = engine.clean(),
            (_, Some(attribute)) => {
                // Resolve everything first so earlier changes cannot shift
                // the paths used by later references.
                let mut uids = Vec::new();
                for reference in request.refs() {
                    let uid = engine.resolve(reference)?;
                    if !uids.contains(&uid) {
                        uids.push(uid);
                    }
                }
                for uid in uids {
                    let value = self.attribute_value(spec, request, &engine, &uid)?;
                    let change = engine.change_for(attribute, &value)?;
                    changed.extend(engine.apply(&uid, change)?);
                }
            }
            _ => {
                return Err(Error::Validation(format!(
                    "command '{}' has nothing to change",
                    spec.name
                )))
            }
        }

        self.store.save(engine.collection())?;

        let collection = engine.collection();
        let after = position::generate(collection, ROOT, View::Full);
        let mut result = CommandResult::new(spec.name, ResultKind::Change);
        result.affected = if removed.is_empty() {
            let mut seen = HashSet::new();
            changed
                .iter()
                .filter(|uid| seen.insert(uid.as_str()))
                .filter_map(|uid| display(collection, &after, uid))
                .collect()
        } else {
            removed
                .iter()
                .map(|todo| DisplayTodo {
                    uid: todo.uid.clone(),
                    position: before
                        .get(&todo.uid)
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    text: todo.text.clone(),
                    completion: todo.completion(),
                    depth: before
                        .get(&todo.uid)
                        .map(|path| path.segments().len().saturating_sub(1))
                        .unwrap_or_default(),
                    modified_at: todo.modified_at,
                })
                .collect()
        };
        let filter = spec.filter.map(|f| f(request)).unwrap_or_default();
        result.listed = listing(collection, filter);
        result.totals = Totals::of(collection);
        Ok(result)
    }

    fn add(&self, engine: &mut Engine, request: &Request) -> Result<Vec<String>> {
        let Request::Add { words, to, editor } = request else {
            return Ok(Vec::new());
        };

        let mut words: &[String] = words;
        let parent = match to {
            Some(reference) => engine.resolve_parent(reference)?,
            None => match words {
                [first, rest @ ..] if !rest.is_empty() && position::is_position_path(first) => {
                    match engine.resolve(first) {
                        Ok(uid) => {
                            words = rest;
                            uid
                        }
                        Err(_) => ROOT.to_string(),
                    }
                }
                _ => ROOT.to_string(),
            },
        };

        let text = if *editor {
            self.editor.edit(&words.join(" "))?
        } else {
            words.join(" ")
        };
        if text.trim().is_empty() {
            return Err(Error::Validation("add needs text".to_string()));
        }

        if parser::has_bullets(&text) {
            let nodes = parser::parse(&text);
            engine.add_tree(&nodes, &parent)
        } else {
            Ok(vec![engine.add(&text, &parent)?])
        }
    }

    fn attribute_value(&self, spec: &CommandSpec, request: &Request, engine: &Engine, uid: &str) -> Result<String> {
        if let Some(value) = spec.fixed_value {
            return Ok(value.to_string());
        }
        match request {
            Request::Edit { editor: true, .. } => {
                let current = engine
                    .collection()
                    .get(uid)
                    .map(|todo| todo.text.clone())
                    .unwrap_or_default();
                self.editor.edit(&current)
            }
            Request::Edit { .. } => Ok(request.joined()),
            Request::Move { parent, .. } => Ok(parent.clone()),
            _ => Err(Error::Validation(format!(
                "command '{}' needs a value",
                spec.name
            ))),
        }
    }

    fn query(&self, spec: &CommandSpec, request: &Request) -> Result<CommandResult> {
        let collection = self.store.load()?;
        let filter = spec.filter.map(|f| f(request)).unwrap_or_default();
        let mut listed = listing(&collection, filter);

        let kind = match request {
            Request::Search { case_sensitive, .. } => {
                let query = request.joined();
                if *case_sensitive {
                    listed.retain(|todo| todo.text.contains(&query));
                } else {
                    let needle = query.to_lowercase();
                    listed.retain(|todo| todo.text.to_lowercase().contains(&needle));
                }
                ResultKind::Search
            }
            _ => ResultKind::List,
        };

        let mut result = CommandResult::new(spec.name, kind);
        result.listed = listed;
        result.totals = Totals::of(&collection);
        Ok(result)
    }

    fn init(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let mut result = CommandResult::new(spec.name, ResultKind::Message);
        let path = self.store.path().to_path_buf();
        let _lock = self.store.lock(self.lock_timeout_ms)?;
        let message = if self.store.exists() {
            let collection = self.store.load()?;
            result.totals = Totals::of(&collection);
            Message::new(
                MessageLevel::Warning,
                format!("Store already exists at {}", path.display()),
            )
        } else {
            self.store.save(&Collection::new())?;
            Message::new(
                MessageLevel::Success,
                format!("Created store at {}", path.display()),
            )
        };
        result.message = Some(message);
        result.path = Some(path);
        Ok(result)
    }
}

fn check_arguments(spec: &CommandSpec, request: &Request) -> Result<()> {
    let refs = request.refs();
    if spec.requires_ref && refs.iter().all(|r| r.trim().is_empty()) {
        return Err(Error::Validation(format!("{} needs a todo reference", spec.name)));
    }
    if !spec.multi_ref && refs.len() > 1 {
        return Err(Error::Validation(format!("{} takes a single reference", spec.name)));
    }
    if spec.requires_text && !request.uses_editor() && request.joined().is_empty() {
        return Err(Error::Validation(format!("{} needs text", spec.name)));
    }
    if let Some(validate) = spec.validate {
        validate(request)?;
    }
    Ok(())
}

fn display(collection: &Collection, positions: &PositionMap, uid: &str) -> Option<DisplayTodo> {
    let todo = collection.get(uid)?;
    Some(DisplayTodo {
        uid: todo.uid.clone(),
        position: positions.get(uid)?.to_string(),
        text: todo.text.clone(),
        completion: todo.completion(),
        depth: collection.depth(uid),
        modified_at: todo.modified_at,
    })
}

/// Todos shown by `filter`, depth-first in stored order.
pub fn listing(collection: &Collection, filter: ListFilter) -> Vec<DisplayTodo> {
    let positions = position::generate(collection, ROOT, filter.view());
    positions
        .order()
        .iter()
        .filter_map(|uid| display(collection, &positions, uid))
        .filter(|todo| filter != ListFilter::Done || todo.completion.is_done())
        .collect()
}
