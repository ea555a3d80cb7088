//! Mutation engine: attribute changes and their consequences.
//!
//! Completion propagates in both directions:
//! - completing a todo completes every pending descendant
//! - after any completion or structure change, ancestors are rolled up:
//!   all children done makes the parent done, all children pending makes
//!   it pending, and a done parent with mixed children is reopened.
//!   The walk stops at the first ancestor that does not change.

use std::fmt;
use std::str::FromStr;

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::model::{Completion, Todo, COMPLETION, ROOT};
use crate::parser::Node;
use crate::resolver::Resolver;

/// Attributes that `set_attribute` can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Completion,
    Text,
    Parent,
}

impl Attribute {
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Completion => "completion",
            Attribute::Text => "text",
            Attribute::Parent => "parent",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "completion" => Ok(Attribute::Completion),
            "text" => Ok(Attribute::Text),
            "parent" => Ok(Attribute::Parent),
            other => Err(Error::Validation(format!("unknown attribute '{other}'"))),
        }
    }
}

/// A resolved attribute change, ready to apply to a uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Completion(Completion),
    Text(String),
    /// New parent uid; `ROOT` for top level.
    Parent(String),
}

/// Owns a collection for the duration of one command.
#[derive(Debug, Clone)]
pub struct Engine {
    collection: Collection,
    short_id_min_len: usize,
}

impl Engine {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            short_id_min_len: 1,
        }
    }

    pub fn with_short_id_min_len(mut self, len: usize) -> Self {
        self.short_id_min_len = len;
        self
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn into_collection(self) -> Collection {
        self.collection
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.collection).with_short_id_min_len(self.short_id_min_len)
    }

    pub fn resolve(&self, reference: &str) -> Result<String> {
        self.resolver().resolve(reference)
    }

    /// Resolve a parent reference; an empty string (or `root`) is the root.
    pub fn resolve_parent(&self, reference: &str) -> Result<String> {
        let trimmed = reference.trim();
        if trimmed.is_empty() || trimmed == "root" {
            return Ok(ROOT.to_string());
        }
        self.resolve(trimmed)
    }

    /// Create a pending todo at the end of `parent_uid`'s children.
    pub fn add(&mut self, text: &str, parent_uid: &str) -> Result<String> {
        let text = validate_text(text)?;
        let todo = Todo::new(text, parent_uid);
        let uid = todo.uid.clone();
        self.collection.insert(todo, true)?;
        tracing::debug!(uid = %uid, parent = %parent_uid, "todo added");
        self.rollup(parent_uid)?;
        Ok(uid)
    }

    /// Create a parsed forest under `parent_uid`; returns new uids in document order.
    pub fn add_tree(&mut self, nodes: &[Node], parent_uid: &str) -> Result<Vec<String>> {
        if nodes.is_empty() {
            return Err(Error::Validation("nothing to add".to_string()));
        }
        let mut created = Vec::new();
        self.insert_nodes(nodes, parent_uid, &mut created)?;
        self.rollup(parent_uid)?;
        Ok(created)
    }

    fn insert_nodes(&mut self, nodes: &[Node], parent_uid: &str, created: &mut Vec<String>) -> Result<()> {
        for node in nodes {
            let todo = Todo::new(validate_text(&node.text)?, parent_uid);
            let uid = todo.uid.clone();
            self.collection.insert(todo, true)?;
            created.push(uid.clone());
            self.insert_nodes(&node.children, &uid, created)?;
        }
        Ok(())
    }

    /// Resolve `reference` and set `attribute` to `value`.
    ///
    /// Returns the uids whose state changed, the target first.
    pub fn set_attribute(&mut self, reference: &str, attribute: Attribute, value: &str) -> Result<Vec<String>> {
        let uid = self.resolve(reference)?;
        let change = self.change_for(attribute, value)?;
        self.apply(&uid, change)
    }

    /// Turn a raw attribute value into a `Change`, resolving parent references.
    pub fn change_for(&self, attribute: Attribute, value: &str) -> Result<Change> {
        match attribute {
            Attribute::Completion => Ok(Change::Completion(value.parse()?)),
            Attribute::Text => Ok(Change::Text(validate_text(value)?.to_string())),
            Attribute::Parent => Ok(Change::Parent(self.resolve_parent(value)?)),
        }
    }

    /// Apply a change to an already-resolved uid.
    pub fn apply(&mut self, uid: &str, change: Change) -> Result<Vec<String>> {
        if !self.collection.contains(uid) {
            return Err(Error::RefNotFound(uid.to_string()));
        }
        match change {
            Change::Completion(Completion::Done) => self.complete(uid),
            Change::Completion(Completion::Pending) => self.reopen(uid),
            Change::Text(text) => {
                self.collection.mutate_text(uid, validate_text(&text)?)?;
                Ok(vec![uid.to_string()])
            }
            Change::Parent(parent) => self.reparent(uid, &parent),
        }
    }

    fn complete(&mut self, uid: &str) -> Result<Vec<String>> {
        let mut changed = vec![uid.to_string()];
        if let Some(todo) = self.collection.get(uid) {
            if !todo.is_done() {
                self.set_completion(uid, Completion::Done)?;
            }
        }

        for descendant in self.collection.descendants(uid) {
            let pending = self
                .collection
                .get(&descendant)
                .map(|todo| !todo.is_done())
                .unwrap_or(false);
            if pending {
                self.set_completion(&descendant, Completion::Done)?;
                changed.push(descendant);
            }
        }

        if let Some(parent) = self.parent_of(uid) {
            changed.extend(self.rollup(&parent)?);
        }
        Ok(changed)
    }

    fn reopen(&mut self, uid: &str) -> Result<Vec<String>> {
        let mut changed = vec![uid.to_string()];
        let was_done = self
            .collection
            .get(uid)
            .map(Todo::is_done)
            .unwrap_or(false);
        if was_done {
            self.set_completion(uid, Completion::Pending)?;
            self.collection.move_to_end(uid)?;
        }
        if let Some(parent) = self.parent_of(uid) {
            changed.extend(self.rollup(&parent)?);
        }
        Ok(changed)
    }

    fn reparent(&mut self, uid: &str, new_parent: &str) -> Result<Vec<String>> {
        if new_parent == uid || self.collection.is_descendant(new_parent, uid) {
            return Err(Error::CycleWouldResult {
                todo: uid.to_string(),
                parent: new_parent.to_string(),
            });
        }
        let old_parent = self.parent_of(uid).unwrap_or_default();
        self.collection.reparent(uid, new_parent)?;
        tracing::debug!(uid, from = %old_parent, to = %new_parent, "todo moved");

        let mut changed = vec![uid.to_string()];
        changed.extend(self.rollup(&old_parent)?);
        changed.extend(self.rollup(new_parent)?);
        Ok(changed)
    }

    /// Remove every done todo together with its descendants.
    pub fn clean(&mut self) -> Vec<Todo> {
        let done: Vec<String> = self
            .collection
            .iterate_all()
            .filter(|todo| todo.is_done())
            .map(|todo| todo.uid.clone())
            .collect();

        let mut removed = Vec::new();
        for uid in done {
            if self.collection.contains(&uid) {
                removed.extend(self.collection.remove(&uid));
            }
        }
        tracing::debug!(removed = removed.len(), "cleaned done todos");
        removed
    }

    /// Walk from `start` towards the root, updating derived completion.
    ///
    /// Returns the uids that changed.
    fn rollup(&mut self, start: &str) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        let mut current = start.to_string();

        while current != ROOT {
            let Some(todo) = self.collection.get(&current) else {
                break;
            };
            let state = todo.completion();
            let parent = todo.parent_uid.clone();

            let children: Vec<Completion> = self
                .collection
                .iterate_children(&current)
                .map(Todo::completion)
                .collect();
            if children.is_empty() {
                break;
            }

            let all_done = children.iter().all(|c| c.is_done());
            let all_pending = children.iter().all(|c| !c.is_done());
            let target = if all_done {
                Completion::Done
            } else if all_pending || state.is_done() {
                Completion::Pending
            } else {
                state
            };

            if target == state {
                break;
            }
            tracing::debug!(uid = %current, from = %state, to = %target, "rollup");
            self.set_completion(&current, target)?;
            changed.push(current);
            current = parent;
        }
        Ok(changed)
    }

    fn set_completion(&mut self, uid: &str, completion: Completion) -> Result<()> {
        self.collection
            .mutate_status(uid, COMPLETION, completion.as_str())
    }

    fn parent_of(&self, uid: &str) -> Option<String> {
        self.collection.get(uid).map(|todo| todo.parent_uid.clone())
    }
}

fn validate_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("text cannot be empty".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{self, View};

    fn paths(engine: &Engine, view: View) -> Vec<(String, String)> {
        let map = position::generate(engine.collection(), ROOT, view);
        map.order()
            .iter()
            .map(|uid| {
                let todo = engine.collection().get(uid).unwrap();
                (map.get(uid).unwrap().to_string(), todo.text.clone())
            })
            .collect()
    }

    fn listing(engine: &Engine, view: View) -> Vec<String> {
        paths(engine, view)
            .into_iter()
            .map(|(path, text)| format!("{path} {text}"))
            .collect()
    }

    fn state(engine: &Engine, uid: &str) -> Completion {
        engine.collection().get(uid).unwrap().completion()
    }

    fn assert_invariants(engine: &Engine) {
        let c = engine.collection();
        for todo in c.iterate_all() {
            if todo.parent_uid != ROOT {
                assert!(c.contains(&todo.parent_uid), "dangling parent");
            }
            if todo.is_done() {
                for d in c.descendants(&todo.uid) {
                    assert!(c.get(&d).unwrap().is_done(), "downward closure broken");
                }
            }
        }
        assert_eq!(c.iterate_all().count(), c.len(), "forest broken");
    }

    #[test]
    fn groceries_paths() {
        let mut engine = Engine::new(Collection::new());
        let g = engine.add("Groceries", ROOT).unwrap();
        engine.add("Milk", &g).unwrap();
        let bread = engine.add("Bread", &g).unwrap();
        assert_eq!(listing(&engine, View::Full), ["1 Groceries", "1.1 Milk", "1.2 Bread"]);

        engine.set_attribute("1.2", Attribute::Completion, "done").unwrap();
        assert_eq!(listing(&engine, View::Full), ["1 Groceries", "1.1 Milk", "1.c1 Bread"]);

        engine.set_attribute("1.c1", Attribute::Completion, "pending").unwrap();
        assert_eq!(state(&engine, &bread), Completion::Pending);
        assert_eq!(listing(&engine, View::Full), ["1 Groceries", "1.1 Milk", "1.2 Bread"]);
        assert_invariants(&engine);
    }

    #[test]
    fn root_siblings_do_not_roll_up() {
        let mut engine = Engine::new(Collection::new());
        let a = engine.add("A", ROOT).unwrap();
        let b = engine.add("B", ROOT).unwrap();
        engine.add("C", ROOT).unwrap();

        engine.apply(&a, Change::Completion(Completion::Done)).unwrap();
        engine.apply(&b, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(listing(&engine, View::ActiveOnly), ["1 C"]);
        assert_eq!(listing(&engine, View::Full), ["c1 A", "c2 B", "1 C"]);
    }

    #[test]
    fn parent_completes_when_all_children_done() {
        let mut engine = Engine::new(Collection::new());
        let p = engine.add("P", ROOT).unwrap();
        let x = engine.add("X", &p).unwrap();
        let y = engine.add("Y", &p).unwrap();

        let changed = engine.apply(&x, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(changed, [x.clone()]);
        assert_eq!(state(&engine, &p), Completion::Pending);

        let changed = engine.apply(&y, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(changed, [y.clone(), p.clone()]);
        assert_eq!(state(&engine, &p), Completion::Done);
        assert!(listing(&engine, View::ActiveOnly).is_empty());
        assert_invariants(&engine);
    }

    #[test]
    fn completing_parent_completes_descendants() {
        let mut engine = Engine::new(Collection::new());
        let p = engine.add("P", ROOT).unwrap();
        let x = engine.add("X", &p).unwrap();
        let deep = engine.add("X1", &x).unwrap();

        engine.apply(&p, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(state(&engine, &x), Completion::Done);
        assert_eq!(state(&engine, &deep), Completion::Done);
        assert_invariants(&engine);
    }

    #[test]
    fn reopening_child_reopens_done_ancestors() {
        let mut engine = Engine::new(Collection::new());
        let p = engine.add("P", ROOT).unwrap();
        let x = engine.add("X", &p).unwrap();
        let y = engine.add("Y", &p).unwrap();
        engine.apply(&p, Change::Completion(Completion::Done)).unwrap();

        let changed = engine.apply(&x, Change::Completion(Completion::Pending)).unwrap();
        assert_eq!(changed, [x.clone(), p.clone()]);
        assert_eq!(state(&engine, &p), Completion::Pending);
        assert_eq!(state(&engine, &y), Completion::Done);
        // Reopened todos go to the end of their siblings.
        assert_eq!(listing(&engine, View::Full), ["1 P", "1.c1 Y", "1.1 X"]);
        assert_invariants(&engine);
    }

    #[test]
    fn all_children_pending_reopens_parent() {
        let mut engine = Engine::new(Collection::new());
        let p = engine.add("P", ROOT).unwrap();
        let x = engine.add("X", &p).unwrap();
        engine.apply(&x, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(state(&engine, &p), Completion::Done);

        engine.apply(&x, Change::Completion(Completion::Pending)).unwrap();
        assert_eq!(state(&engine, &p), Completion::Pending);
    }

    #[test]
    fn adding_under_done_parent_reopens_it() {
        let mut engine = Engine::new(Collection::new());
        let p = engine.add("P", ROOT).unwrap();
        let x = engine.add("X", &p).unwrap();
        engine.apply(&x, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(state(&engine, &p), Completion::Done);

        engine.add("Z", &p).unwrap();
        assert_eq!(state(&engine, &p), Completion::Pending);
        assert_invariants(&engine);
    }

    #[test]
    fn rollup_walks_multiple_levels() {
        let mut engine = Engine::new(Collection::new());
        let a = engine.add("A", ROOT).unwrap();
        let b = engine.add("B", &a).unwrap();
        let c = engine.add("C", &b).unwrap();

        let changed = engine.apply(&c, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(changed, [c.clone(), b.clone(), a.clone()]);
        assert_eq!(state(&engine, &a), Completion::Done);
    }

    #[test]
    fn move_rejects_cycles() {
        let mut engine = Engine::new(Collection::new());
        let a = engine.add("A", ROOT).unwrap();
        let b = engine.add("B", &a).unwrap();
        let before = engine.collection().to_todos();

        let err = engine.set_attribute("1", Attribute::Parent, "1.1").unwrap_err();
        assert!(matches!(err, Error::CycleWouldResult { .. }));
        let err = engine.apply(&a, Change::Parent(a.clone())).unwrap_err();
        assert!(matches!(err, Error::CycleWouldResult { .. }));
        assert_eq!(engine.collection().to_todos(), before);

        engine.set_attribute("1.1", Attribute::Parent, "").unwrap();
        assert_eq!(engine.collection().get(&b).unwrap().parent_uid, ROOT);
        assert_eq!(listing(&engine, View::Full), ["1 A", "2 B"]);
    }

    #[test]
    fn move_rolls_up_both_parents() {
        let mut engine = Engine::new(Collection::new());
        let p = engine.add("P", ROOT).unwrap();
        let x = engine.add("X", &p).unwrap();
        let y = engine.add("Y", &p).unwrap();
        let q = engine.add("Q", ROOT).unwrap();
        let z = engine.add("Z", &q).unwrap();
        engine.apply(&x, Change::Completion(Completion::Done)).unwrap();
        engine.apply(&z, Change::Completion(Completion::Done)).unwrap();
        assert_eq!(state(&engine, &q), Completion::Done);

        // Moving the last pending child out completes the old parent,
        // landing under a done parent reopens it.
        engine.apply(&y, Change::Parent(q.clone())).unwrap();
        assert_eq!(state(&engine, &p), Completion::Done);
        assert_eq!(state(&engine, &q), Completion::Pending);
        assert_invariants(&engine);
    }

    #[test]
    fn edit_replaces_text_and_touches() {
        let mut engine = Engine::new(Collection::new());
        let a = engine.add("Draft", ROOT).unwrap();
        let before = engine.collection().get(&a).unwrap().modified_at;
        engine.set_attribute("1", Attribute::Text, "Final\nwith notes").unwrap();
        let todo = engine.collection().get(&a).unwrap();
        assert_eq!(todo.text, "Final\nwith notes");
        assert!(todo.modified_at > before);

        let err = engine.set_attribute("1", Attribute::Text, "   ").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn completion_on_unknown_uid_is_an_error() {
        let mut engine = Engine::new(Collection::new());
        let p = engine.add("P", ROOT).unwrap();

        assert!(matches!(
            engine.set_completion("missing", Completion::Done),
            Err(Error::RefNotFound(_))
        ));
        assert!(matches!(
            engine.apply("missing", Change::Completion(Completion::Done)),
            Err(Error::RefNotFound(_))
        ));
        assert_eq!(engine.rollup(&p).unwrap(), Vec::<String>::new());
        assert_eq!(engine.rollup("missing").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn clean_removes_done_subtrees() {
        let mut engine = Engine::new(Collection::new());
        let a = engine.add("A", ROOT).unwrap();
        engine.add("A1", &a).unwrap();
        let b = engine.add("B", ROOT).unwrap();
        let b1 = engine.add("B1", &b).unwrap();
        engine.add("B2", &b).unwrap();
        engine.apply(&a, Change::Completion(Completion::Done)).unwrap();
        engine.apply(&b1, Change::Completion(Completion::Done)).unwrap();

        let removed = engine.clean();
        let texts: Vec<_> = removed.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["A", "A1", "B1"]);
        assert_eq!(listing(&engine, View::Full), ["1 B", "1.1 B2"]);
    }

    #[test]
    fn add_tree_creates_nested_todos() {
        let mut engine = Engine::new(Collection::new());
        let nodes = crate::parser::parse("- A\n  - A1\n  - A2\n- B");
        let created = engine.add_tree(&nodes, ROOT).unwrap();
        assert_eq!(created.len(), 4);
        assert_eq!(listing(&engine, View::Full), ["1 A", "1.1 A1", "1.2 A2", "2 B"]);
    }

    #[test]
    fn propagation_invariants_hold_over_mixed_sequences() {
        let mut engine = Engine::new(Collection::new());
        let mut uids: Vec<String> = Vec::new();
        for i in 0..30 {
            let parent = if i < 3 { ROOT.to_string() } else { uids[(i * 5) % uids.len()].clone() };
            uids.push(engine.add(&format!("t{i}"), &parent).unwrap());
        }
        for step in 0..60 {
            let uid = uids[(step * 11) % uids.len()].clone();
            let completion = if step % 3 == 0 { Completion::Pending } else { Completion::Done };
            engine.apply(&uid, Change::Completion(completion)).unwrap();
            assert_invariants(&engine);

            let c = engine.collection();
            for ancestor in c.ancestors(&uid) {
                let children: Vec<_> = c.iterate_children(&ancestor).collect();
                let a = c.get(&ancestor).unwrap();
                if children.iter().all(|t| t.is_done()) {
                    assert!(a.is_done());
                }
                if children.iter().all(|t| !t.is_done()) {
                    assert!(!a.is_done());
                }
            }
        }
    }
}
