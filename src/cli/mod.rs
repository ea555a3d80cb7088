//! Command-line interface for todo
//!
//! This module defines the CLI structure using clap derive macros and
//! turns parsed arguments into dispatcher requests.

use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{CommandTable, Dispatcher, ListFilter, Request};
use crate::config::Config;
use crate::editor::ExternalEditor;
use crate::error::{Error, Result};
use crate::output::{self, Format};
use crate::scope::{Scope, ScopeEnv, ScopeKind, ScopeResolver};
use crate::store::Store;

mod args;

pub use args::prepare_args;

/// todo - hierarchical todo lists in a JSON file
///
/// Todos are addressed by position (`1`, `1.2`, `c1` for the first done
/// item), by a uid prefix, or by a fragment of their text. Running `todo`
/// alone lists pending todos; `todo <text>` adds one.
#[derive(Parser, Debug)]
#[command(name = "todo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store file to use instead of the project or global store
    #[arg(short = 'p', long = "data-path", global = true, value_name = "PATH")]
    pub data_path: Option<String>,

    /// Use the global store even inside a project
    #[arg(long, global = true, conflicts_with = "data_path")]
    pub global: bool,

    /// Output format: json, yaml, csv, markdown, plain, terminal (or `help`)
    #[arg(short, long, global = true, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a todo, or a bullet list of todos
    #[command(visible_aliases = ["a", "new", "create"])]
    Add {
        /// Todo text; a leading position path picks the parent
        #[arg(allow_hyphen_values = true, value_name = "TEXT")]
        words: Vec<String>,

        /// Parent todo reference
        #[arg(long, value_name = "REF")]
        to: Option<String>,

        /// Write the text in $VISUAL / $EDITOR
        #[arg(short, long)]
        editor: bool,
    },

    /// Mark todos done
    #[command(visible_aliases = ["c"])]
    Complete {
        /// Todo references
        #[arg(required = true, value_name = "REF")]
        refs: Vec<String>,
    },

    /// Mark done todos pending again
    #[command(visible_aliases = ["o"])]
    Reopen {
        /// Todo references
        #[arg(required = true, value_name = "REF")]
        refs: Vec<String>,
    },

    /// Replace a todo's text
    #[command(visible_aliases = ["modify", "e"])]
    Edit {
        /// Todo reference
        #[arg(value_name = "REF")]
        reference: String,

        /// New text
        #[arg(allow_hyphen_values = true, value_name = "TEXT")]
        words: Vec<String>,

        /// Edit the current text in $VISUAL / $EDITOR
        #[arg(short, long)]
        editor: bool,
    },

    /// Move a todo under another one ("" for the top level)
    #[command(visible_aliases = ["m"])]
    Move {
        /// Todo reference
        #[arg(value_name = "REF")]
        reference: String,

        /// New parent reference, or "" for the top level
        #[arg(value_name = "PARENT")]
        parent: String,
    },

    /// Remove done todos and everything below them
    Clean,

    /// List todos (pending only by default)
    #[command(visible_aliases = ["ls"])]
    List {
        /// Show done todos
        #[arg(short, long)]
        done: bool,

        /// Show pending and done todos
        #[arg(short, long, conflicts_with = "done")]
        all: bool,
    },

    /// Find todos whose text contains a query
    #[command(visible_aliases = ["s"])]
    Search {
        /// Query words
        #[arg(required = true, value_name = "QUERY")]
        words: Vec<String>,

        /// Search done todos
        #[arg(short, long)]
        done: bool,

        /// Search pending and done todos
        #[arg(short, long, conflicts_with = "done")]
        all: bool,

        /// Match case exactly
        #[arg(short = 's', long)]
        case_sensitive: bool,
    },

    /// Create an empty store
    #[command(visible_aliases = ["i"])]
    Init {
        /// Create ~/.todos.json regardless of project or --data-path
        #[arg(long)]
        home: bool,
    },

    /// Print the path of the store in use
    #[command(visible_aliases = ["path"])]
    Datapath,
}

impl Commands {
    fn into_request(self) -> Request {
        match self {
            Commands::Add { words, to, editor } => Request::Add { words, to, editor },
            Commands::Complete { refs } => Request::Complete { refs },
            Commands::Reopen { refs } => Request::Reopen { refs },
            Commands::Edit {
                reference,
                words,
                editor,
            } => Request::Edit {
                reference,
                words,
                editor,
            },
            Commands::Move { reference, parent } => Request::Move { reference, parent },
            Commands::Clean => Request::Clean,
            Commands::List { done, all } => Request::List {
                filter: ListFilter::from_flags(done, all),
            },
            Commands::Search {
                words,
                done,
                all,
                case_sensitive,
            } => Request::Search {
                words,
                filter: ListFilter::from_flags(done, all),
                case_sensitive,
            },
            Commands::Init { home } => Request::Init { home },
            Commands::Datapath => Request::Datapath,
        }
    }
}

impl Cli {
    /// Canonical name of the command being run, for error output
    pub fn command_name(&self) -> &'static str {
        match &self.command {
            Some(Commands::Add { .. }) => "add",
            Some(Commands::Complete { .. }) => "complete",
            Some(Commands::Reopen { .. }) => "reopen",
            Some(Commands::Edit { .. }) => "edit",
            Some(Commands::Move { .. }) => "move",
            Some(Commands::Clean) => "clean",
            Some(Commands::List { .. }) | None => "list",
            Some(Commands::Search { .. }) => "search",
            Some(Commands::Init { .. }) => "init",
            Some(Commands::Datapath) => "datapath",
        }
    }

    fn wants_format_help(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("help"))
    }

    /// Format from `--format`, else the configured default
    pub fn output_format(&self, config: &Config) -> Result<Format> {
        match self.format.as_deref() {
            Some(value) => value.parse(),
            None => config.default_format(),
        }
    }

    /// Best-effort format for reporting an error that happened anywhere
    pub fn error_format(&self) -> Format {
        if let Some(Ok(format)) = self.format.as_deref().map(str::parse::<Format>) {
            return format;
        }
        Config::load_default()
            .and_then(|config| config.default_format())
            .unwrap_or(Format::Terminal)
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let config = Config::load_default()?;
        if self.wants_format_help() {
            return output::emit_formats(Format::Terminal);
        }
        let format = self.output_format(&config)?;

        let env = ScopeEnv::from_process()?;
        let command = self.command.unwrap_or(Commands::List {
            done: false,
            all: false,
        });
        let request = command.into_request();

        let scope = match &request {
            Request::Init { home: true } => Scope {
                path: env.home_store().ok_or_else(|| {
                    Error::Validation("home directory unknown".to_string())
                })?,
                kind: ScopeKind::Home,
            },
            _ => ScopeResolver::new(&env, &config.project_markers)
                .manage_gitignore(config.manage_gitignore)
                .resolve(self.data_path.as_deref(), self.global)?,
        };

        let table = CommandTable::standard();
        let editor = ExternalEditor::from_env();
        let dispatcher = Dispatcher::new(&table, Store::new(scope.path), &config, &editor);
        let result = dispatcher.run(request)?;
        output::emit_success(format, &result)
    }
}
