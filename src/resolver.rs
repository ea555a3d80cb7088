//! Reference resolution: turn whatever the user typed into a uid.
//!
//! Order, first match wins:
//! 1. position path (`1.2`, `c1`), when the string fits the path grammar
//! 2. uid prefix (case-sensitive)
//! 3. text fragment (case-insensitive substring, exact match preferred)
//!
//! A string that looks like a path never falls through to text search, so
//! a typo such as `42` cannot silently pick an unrelated todo.

use crate::collection::Collection;
use crate::error::{Error, Result, TextCandidate};
use crate::model::ROOT;
use crate::position::{self, PositionPath, View};

/// Resolves references against one collection snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    collection: &'a Collection,
    scope: &'a str,
    short_id_min_len: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            scope: ROOT,
            short_id_min_len: 1,
        }
    }

    /// Resolve position paths relative to `scope` instead of the root.
    pub fn with_scope(mut self, scope: &'a str) -> Self {
        self.scope = scope;
        self
    }

    /// Ignore the uid-prefix step for references shorter than `len`.
    pub fn with_short_id_min_len(mut self, len: usize) -> Self {
        self.short_id_min_len = len.max(1);
        self
    }

    pub fn resolve(&self, reference: &str) -> Result<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::Validation("reference cannot be empty".to_string()));
        }

        if let Ok(path) = reference.parse::<PositionPath>() {
            match position::resolve(self.collection, self.scope, &path) {
                Ok(uid) => {
                    tracing::debug!(reference, uid = %uid, "resolved by position");
                    return Ok(uid);
                }
                Err(Error::RefNotFound(_)) => {
                    return self
                        .by_short_id(reference)?
                        .ok_or_else(|| Error::RefNotFound(reference.to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(uid) = self.by_short_id(reference)? {
            return Ok(uid);
        }

        self.by_text(reference)
    }

    fn by_short_id(&self, reference: &str) -> Result<Option<String>> {
        if reference.chars().count() < self.short_id_min_len {
            return Ok(None);
        }
        let mut matches: Vec<String> = self
            .collection
            .iterate_all()
            .filter(|todo| todo.uid.starts_with(reference))
            .map(|todo| todo.uid.clone())
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => {
                tracing::debug!(reference, "resolved by uid prefix");
                Ok(matches.pop())
            }
            _ => {
                matches.sort();
                Err(Error::AmbiguousShortId {
                    reference: reference.to_string(),
                    candidates: matches,
                })
            }
        }
    }

    fn by_text(&self, reference: &str) -> Result<String> {
        let needle = reference.to_lowercase();
        let matches: Vec<_> = self
            .collection
            .iterate_all()
            .filter(|todo| todo.text.to_lowercase().contains(&needle))
            .collect();

        if matches.len() == 1 {
            tracing::debug!(reference, "resolved by text");
            return Ok(matches[0].uid.clone());
        }
        if matches.is_empty() {
            return Err(Error::RefNotFound(reference.to_string()));
        }

        let exact: Vec<_> = matches
            .iter()
            .filter(|todo| todo.text.to_lowercase() == needle)
            .collect();
        if exact.len() == 1 {
            return Ok(exact[0].uid.clone());
        }

        let positions = position::generate(self.collection, ROOT, View::Full);
        Err(Error::AmbiguousText {
            reference: reference.to_string(),
            candidates: matches
                .iter()
                .map(|todo| TextCandidate {
                    position: positions
                        .get(&todo.uid)
                        .map(|path| path.to_string())
                        .unwrap_or_else(|| todo.uid.clone()),
                    text: todo.text.clone(),
                })
                .collect(),
        })
    }
}
