//! Position paths: derived, view-dependent coordinates for todos.
//!
//! A path such as `1.c2.3` walks from a scope (usually the root) through
//! one segment per level. Under every parent, pending children are
//! numbered `1, 2, …` and done children `c1, c2, …`, each in stored order.
//! Paths are computed on demand and never persisted; uids are the only
//! stable identity.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::model::Todo;

/// One level of a position path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// `n`: the n-th pending child.
    Active(usize),
    /// `cn`: the n-th done child.
    Completed(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Active(n) => write!(f, "{n}"),
            Segment::Completed(n) => write!(f, "c{n}"),
        }
    }
}

impl FromStr for Segment {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (digits, completed) = match s.strip_prefix('c') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        // Too large to exist, but still a path: it must never be read as text.
        let n: usize = digits.parse().unwrap_or(usize::MAX);
        Ok(if completed {
            Segment::Completed(n)
        } else {
            Segment::Active(n)
        })
    }
}

/// A dotted sequence of segments, e.g. `1.c2.3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionPath(Vec<Segment>);

impl PositionPath {
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    fn child(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }
}

impl fmt::Display for PositionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for PositionPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedPath(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(malformed());
        }
        let segments = trimmed
            .split('.')
            .map(|part| part.parse::<Segment>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(segments))
    }
}

/// Whether `s` is syntactically a position path.
pub fn is_position_path(s: &str) -> bool {
    s.parse::<PositionPath>().is_ok()
}

/// Which todos take part in numbering and traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Both namespaces; used when showing all or completed todos.
    Full,
    /// Done todos (and everything below them) are left out.
    ActiveOnly,
}

/// Uid → position path for every todo visible in a view.
#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    paths: HashMap<String, PositionPath>,
    order: Vec<String>,
}

impl PositionMap {
    pub fn get(&self, uid: &str) -> Option<&PositionPath> {
        self.paths.get(uid)
    }

    /// Visible uids, depth-first in stored sibling order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Number the children of `parent` in both namespaces.
fn number_children<'a>(collection: &'a Collection, parent: &str) -> Vec<(&'a Todo, Segment)> {
    let mut active = 0;
    let mut completed = 0;
    collection
        .iterate_children(parent)
        .map(|todo| {
            let segment = if todo.is_done() {
                completed += 1;
                Segment::Completed(completed)
            } else {
                active += 1;
                Segment::Active(active)
            };
            (todo, segment)
        })
        .collect()
}

/// Compute paths for every todo below `scope` in the given view.
pub fn generate(collection: &Collection, scope: &str, view: View) -> PositionMap {
    let mut map = PositionMap::default();
    let mut stack: Vec<(String, PositionPath)> = Vec::new();

    let push_children = |stack: &mut Vec<(String, PositionPath)>, parent: &str, prefix: &PositionPath| {
        let numbered = number_children(collection, parent);
        for (todo, segment) in numbered.into_iter().rev() {
            if view == View::ActiveOnly && todo.is_done() {
                continue;
            }
            stack.push((todo.uid.clone(), prefix.child(segment)));
        }
    };

    push_children(&mut stack, scope, &PositionPath(Vec::new()));
    while let Some((uid, path)) = stack.pop() {
        push_children(&mut stack, &uid, &path);
        map.order.push(uid.clone());
        map.paths.insert(uid, path);
    }
    map
}

/// Walk `path` from `scope` and return the uid it designates.
pub fn resolve(collection: &Collection, scope: &str, path: &PositionPath) -> Result<String> {
    let mut current = scope.to_string();
    for segment in path.segments() {
        current = number_children(collection, &current)
            .into_iter()
            .find(|(_, candidate)| candidate == segment)
            .map(|(todo, _)| todo.uid.clone())
            .ok_or_else(|| Error::RefNotFound(path.to_string()))?;
    }
    if path.segments().is_empty() {
        return Err(Error::RefNotFound(path.to_string()));
    }
    Ok(current)
}
