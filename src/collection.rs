//! In-memory todo collection.
//!
//! Todos live in a flat arena keyed by uid. A separate `parent -> children`
//! index keeps sibling order; the root sentinel (`""`) is an ordinary key
//! in that index. Position paths are never stored here.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::model::{Todo, ROOT};

#[derive(Debug, Clone, Default)]
pub struct Collection {
    todos: HashMap<String, Todo>,
    children: HashMap<String, Vec<String>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from todos in stored order.
    ///
    /// Sibling order follows the order of `todos`. Todos pointing at a
    /// missing parent are reattached to the root. Duplicate uids and
    /// parent cycles are rejected with a description of the problem.
    pub fn from_todos(todos: Vec<Todo>) -> std::result::Result<Self, String> {
        let mut collection = Self::new();
        let mut order = Vec::with_capacity(todos.len());

        for todo in todos {
            if todo.uid.is_empty() {
                return Err("todo with empty uid".to_string());
            }
            if collection.todos.contains_key(&todo.uid) {
                return Err(format!("duplicate uid {}", todo.uid));
            }
            order.push(todo.uid.clone());
            collection.todos.insert(todo.uid.clone(), todo);
        }

        for uid in &order {
            let parent = collection.todos[uid].parent_uid.clone();
            let parent = if parent != ROOT && !collection.todos.contains_key(&parent) {
                tracing::warn!(uid = %uid, parent = %parent, "parent missing; reattaching to root");
                if let Some(todo) = collection.todos.get_mut(uid) {
                    todo.parent_uid = ROOT.to_string();
                }
                ROOT.to_string()
            } else {
                parent
            };
            collection
                .children
                .entry(parent)
                .or_default()
                .push(uid.clone());
        }

        let reachable = collection.descendants(ROOT).len();
        if reachable != collection.todos.len() {
            return Err(format!(
                "parent cycle detected ({} of {} todos unreachable from root)",
                collection.todos.len() - reachable,
                collection.todos.len()
            ));
        }

        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.todos.contains_key(uid)
    }

    pub fn get(&self, uid: &str) -> Option<&Todo> {
        self.todos.get(uid)
    }

    fn get_mut(&mut self, uid: &str) -> Result<&mut Todo> {
        self.todos
            .get_mut(uid)
            .ok_or_else(|| Error::RefNotFound(uid.to_string()))
    }

    /// Insert a todo under its `parent_uid`, first or last among siblings.
    pub fn insert(&mut self, todo: Todo, at_end: bool) -> Result<()> {
        if self.todos.contains_key(&todo.uid) {
            return Err(Error::Validation(format!("duplicate uid {}", todo.uid)));
        }
        if todo.parent_uid != ROOT && !self.todos.contains_key(&todo.parent_uid) {
            return Err(Error::RefNotFound(todo.parent_uid.clone()));
        }

        let siblings = self.children.entry(todo.parent_uid.clone()).or_default();
        if at_end {
            siblings.push(todo.uid.clone());
        } else {
            siblings.insert(0, todo.uid.clone());
        }
        self.todos.insert(todo.uid.clone(), todo);
        Ok(())
    }

    /// Remove a todo together with all of its descendants.
    ///
    /// Returns the removed todos in depth-first order.
    pub fn remove(&mut self, uid: &str) -> Vec<Todo> {
        let Some(todo) = self.todos.get(uid) else {
            return Vec::new();
        };
        let parent = todo.parent_uid.clone();
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|sibling| sibling != uid);
        }

        let mut doomed = vec![uid.to_string()];
        doomed.extend(self.descendants(uid));

        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            self.children.remove(&id);
            if let Some(todo) = self.todos.remove(&id) {
                removed.push(todo);
            }
        }
        removed
    }

    /// Move a todo to the end of `new_parent`'s children.
    ///
    /// Does not check for cycles; callers must.
    pub fn reparent(&mut self, uid: &str, new_parent: &str) -> Result<()> {
        if new_parent != ROOT && !self.todos.contains_key(new_parent) {
            return Err(Error::RefNotFound(new_parent.to_string()));
        }
        let old_parent = self.get_mut(uid)?.parent_uid.clone();
        if let Some(siblings) = self.children.get_mut(&old_parent) {
            siblings.retain(|sibling| sibling != uid);
        }
        self.children
            .entry(new_parent.to_string())
            .or_default()
            .push(uid.to_string());

        let todo = self.get_mut(uid)?;
        todo.parent_uid = new_parent.to_string();
        todo.touch();
        Ok(())
    }

    /// Move a todo to the end of its current parent's children.
    pub fn move_to_end(&mut self, uid: &str) -> Result<()> {
        let parent = self
            .get(uid)
            .ok_or_else(|| Error::RefNotFound(uid.to_string()))?
            .parent_uid
            .clone();
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|sibling| sibling != uid);
            siblings.push(uid.to_string());
        }
        Ok(())
    }

    pub fn mutate_text(&mut self, uid: &str, text: &str) -> Result<()> {
        self.get_mut(uid)?.set_text(text);
        Ok(())
    }

    pub fn mutate_status(&mut self, uid: &str, dimension: &str, state: &str) -> Result<()> {
        self.get_mut(uid)?.set_status(dimension, state);
        Ok(())
    }

    /// Child uids of `parent_uid` in stored order.
    pub fn children(&self, parent_uid: &str) -> &[String] {
        self.children
            .get(parent_uid)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iterate_children<'a>(&'a self, parent_uid: &str) -> impl Iterator<Item = &'a Todo> + 'a {
        self.children(parent_uid)
            .iter()
            .filter_map(move |uid| self.todos.get(uid))
    }

    /// Every todo, depth-first in stored sibling order.
    pub fn iterate_all(&self) -> impl Iterator<Item = &Todo> + '_ {
        self.descendants(ROOT)
            .into_iter()
            .filter_map(move |uid| self.todos.get(&uid))
    }

    /// Uids below `uid`, depth-first, excluding `uid` itself.
    pub fn descendants(&self, uid: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&String> = self.children(uid).iter().rev().collect();
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.as_str()) {
                continue;
            }
            out.push(current.clone());
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Uids from the parent of `uid` up to (excluding) the root.
    pub fn ancestors(&self, uid: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.get(uid).map(|todo| todo.parent_uid.clone());
        while let Some(parent) = current {
            if parent == ROOT || !seen.insert(parent.clone()) {
                break;
            }
            current = self.get(&parent).map(|todo| todo.parent_uid.clone());
            out.push(parent);
        }
        out
    }

    /// Whether `candidate` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        self.ancestors(candidate).iter().any(|uid| uid == ancestor)
    }

    /// Number of ancestors between `uid` and the root.
    pub fn depth(&self, uid: &str) -> usize {
        self.ancestors(uid).len()
    }

    /// Todos in the order they should be persisted.
    pub fn to_todos(&self) -> Vec<Todo> {
        self.iterate_all().cloned().collect()
    }
}
