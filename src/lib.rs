//! todo - hierarchical todo lists in a single JSON file
//!
//! This library provides the core of the `todo` CLI.
//!
//! # Core Concepts
//!
//! - **Uids**: every todo has an opaque, permanent identifier
//! - **Position paths**: derived coordinates such as `1.2` or `c1`,
//!   numbered separately for pending and done siblings
//! - **References**: a position path, a uid prefix, or a text fragment
//! - **Propagation**: completing a todo completes its subtree; parents
//!   follow their children
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `commands`: Declarative command table and dispatcher
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `model`: Todo records and completion states
//! - `collection`: In-memory todos with parent/child indices
//! - `store`: JSON persistence and legacy format migration
//! - `position`: Position path grammar, generation and lookup
//! - `resolver`: Reference resolution
//! - `engine`: Mutations and status propagation
//! - `parser`: Bullet-list parsing for bulk add
//! - `scope`: Store path selection (project vs. global)
//! - `editor`: External editor integration
//! - `output`: Output formats and renderers
//! - `lock`: File locking and atomic writes

pub mod cli;
pub mod collection;
pub mod commands;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod lock;
pub mod model;
pub mod output;
pub mod parser;
pub mod position;
pub mod resolver;
pub mod scope;
pub mod store;

pub use error::{Error, Result};
