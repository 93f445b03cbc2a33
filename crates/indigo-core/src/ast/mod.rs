//! Abstract syntax tree for the indigo language
//!
//! The node types are shared by both surface forms. Every node exposes its
//! source extent through [`Node::pos`] and [`Node::end`]; identifiers carry
//! their resolved [`Object`](scope::Object) through a shared cell so that
//! resolution can complete after the tree is built.

mod decl;
mod expr;
mod imports;
mod scope;
mod stmt;

pub use decl::*;
pub use expr::*;
pub use imports::sort_imports;
pub use scope::{DeclRef, ObjId, ObjKind, ObjRef, Object, ScopeId, SymbolTable};
pub use stmt::*;

use std::cell::Cell;
use std::rc::Rc;

use crate::token::Pos;

/// Source extent of an AST node
pub trait Node {
    /// Position of the first character of the node
    fn pos(&self) -> Pos;
    /// Position immediately after the node
    fn end(&self) -> Pos;
}

/// An identifier. Identifiers are shared (`Rc`) so that late resolution can
/// link the same node from the unresolved list and the tree.
#[derive(Debug)]
pub struct Ident {
    pub pos: Pos,
    pub name: String,
    /// Resolution state; see [`ObjRef`]
    pub obj: Cell<ObjRef>,
}

impl Ident {
    /// Create a fresh, unbound identifier
    #[must_use]
    pub fn new(pos: Pos, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            pos,
            name: name.into(),
            obj: Cell::new(ObjRef::None),
        })
    }

    /// Returns true for the blank identifier `_`
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

impl Node for Ident {
    fn pos(&self) -> Pos {
        self.pos
    }

    fn end(&self) -> Pos {
        self.pos + self.name.len() as u32
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A single `//` or `/* */` comment
#[derive(Debug, Clone)]
pub struct Comment {
    /// Position of the leading `/`
    pub slash: Pos,
    /// Comment text including delimiters, with carriage returns stripped
    pub text: String,
}

impl Node for Comment {
    fn pos(&self) -> Pos {
        self.slash
    }

    fn end(&self) -> Pos {
        self.slash + self.text.len() as u32
    }
}

/// A group of adjacent comments with no other tokens and at most one empty
/// line between them
#[derive(Debug, Clone, Default)]
pub struct CommentGroup {
    pub list: Vec<Comment>,
}

impl CommentGroup {
    /// The uninterpreted text of the group with comment markers, leading
    /// `*` decorations and `//line` directives removed. Suitable as
    /// documentation text.
    #[must_use]
    pub fn text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for c in &self.list {
            let mut t = c.text.as_str();
            if let Some(rest) = t.strip_prefix("//") {
                if rest.starts_with("line ") {
                    continue;
                }
                t = rest.strip_prefix(' ').unwrap_or(rest);
                lines.push(t.to_string());
            } else {
                t = t.strip_prefix("/*").unwrap_or(t);
                t = t.strip_suffix("*/").unwrap_or(t);
                for l in t.lines() {
                    let l = l.trim_start();
                    let l = l.strip_prefix('*').map_or(l, |r| r.strip_prefix(' ').unwrap_or(r));
                    lines.push(l.to_string());
                }
            }
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        while lines.first().is_some_and(|l| l.is_empty()) {
            lines.remove(0);
        }
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

impl Node for CommentGroup {
    fn pos(&self) -> Pos {
        self.list.first().map_or(Pos::NONE, Node::pos)
    }

    fn end(&self) -> Pos {
        self.list.last().map_or(Pos::NONE, Node::end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_group_text() {
        let g = CommentGroup {
            list: vec![
                Comment {
                    slash: Pos::NONE,
                    text: "// Foo does things.".into(),
                },
                Comment {
                    slash: Pos::NONE,
                    text: "// Second line.".into(),
                },
            ],
        };
        assert_eq!(g.text(), "Foo does things.\nSecond line.\n");
    }

    #[test]
    fn block_comment_text() {
        let g = CommentGroup {
            list: vec![Comment {
                slash: Pos::NONE,
                text: "/* one\n * two\n */".into(),
            }],
        };
        assert_eq!(g.text(), "one\ntwo\n");
    }

    #[test]
    fn ident_extent() {
        let id = Ident::new(Pos::NONE + 5, "hello");
        assert_eq!(id.pos().value(), 5);
        assert_eq!(id.end().value(), 10);
    }
}
