//! Bullet-list parser for bulk add.
//!
//! ```text
//! - Groceries
//!   - Milk
//!     whole, not skimmed
//!   * Bread
//! - Chores
//! ```
//!
//! A todo line is optional indentation, `-` or `*`, at least one space,
//! then the body. Extra spaces after the marker are dropped with the rest
//! of the surrounding whitespace, so `-  A` is the todo `A`; `-A` is not a
//! bullet. Tabs count as four spaces and every two spaces is one level.
//! Other non-blank lines continue the previous todo's text.

use serde::Serialize;

const TAB_WIDTH: usize = 4;
const LEVEL_WIDTH: usize = 2;

/// A parsed todo and its nested children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }
}

struct Line<'a> {
    level: usize,
    body: &'a str,
}

fn bullet(line: &str) -> Option<Line<'_>> {
    let indent: usize = line
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum();
    let rest = line.trim_start_matches([' ', '\t']);
    let body = rest.strip_prefix("- ").or_else(|| rest.strip_prefix("* "))?;
    Some(Line {
        level: indent / LEVEL_WIDTH,
        body: body.trim(),
    })
}

/// Whether `text` contains at least one bullet line.
pub fn has_bullets(text: &str) -> bool {
    text.lines().any(|line| bullet(line).is_some())
}

/// Parse `text` into a forest of nodes in document order.
///
/// A nested line attaches to the closest preceding todo with a smaller
/// level; when there is none it becomes a top-level node. Text before the
/// first bullet starts a top-level node of its own.
pub fn parse(text: &str) -> Vec<Node> {
    let mut roots: Vec<Node> = Vec::new();
    // Open todos from the outermost to the most recent, with their levels.
    let mut open: Vec<(usize, Node)> = Vec::new();

    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }

        match bullet(raw) {
            Some(line) => {
                if line.body.is_empty() {
                    continue;
                }
                close_to(&mut open, &mut roots, line.level);
                open.push((line.level, Node::new(line.body)));
            }
            None => {
                let content = raw.trim();
                match open.last_mut() {
                    Some((_, node)) => {
                        node.text.push('\n');
                        node.text.push_str(content);
                    }
                    None => open.push((0, Node::new(content))),
                }
            }
        }
    }

    close_to(&mut open, &mut roots, 0);
    roots
}

/// Close every open todo at `level` or deeper, attaching each to its parent.
fn close_to(open: &mut Vec<(usize, Node)>, roots: &mut Vec<Node>, level: usize) {
    while open.last().is_some_and(|(open_level, _)| *open_level >= level) {
        let Some((_, node)) = open.pop() else {
            break;
        };
        match open.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}
