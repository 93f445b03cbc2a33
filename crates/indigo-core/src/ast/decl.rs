//! Declarations, specs and the file root

use std::rc::Rc;

use super::{
    BasicLit, BlockStmt, CommentGroup, Expr, FieldList, FuncType, Ident, Node, ScopeId,
    SymbolTable,
};
use crate::token::{Pos, Token};

/// An import spec: `name "path"`
#[derive(Debug)]
pub struct ImportSpec {
    pub doc: Option<Rc<CommentGroup>>,
    pub name: Option<Rc<Ident>>,
    pub path: BasicLit,
    pub comment: Option<Rc<CommentGroup>>,
}

impl ImportSpec {
    /// The unquoted import path, or the raw literal if unquoting fails
    #[must_use]
    pub fn path_value(&self) -> &str {
        let v = self.path.value.as_str();
        v.strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| v.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
            .unwrap_or(v)
    }
}

impl Node for ImportSpec {
    fn pos(&self) -> Pos {
        self.name.as_ref().map_or(self.path.pos, |n| n.pos)
    }

    fn end(&self) -> Pos {
        self.path.pos + self.path.value.len() as u32
    }
}

/// A constant or variable spec: `names [type] [= values]`
#[derive(Debug)]
pub struct ValueSpec {
    pub doc: Option<Rc<CommentGroup>>,
    pub names: Vec<Rc<Ident>>,
    pub typ: Option<Expr>,
    pub values: Vec<Expr>,
    pub comment: Option<Rc<CommentGroup>>,
}

impl Node for ValueSpec {
    fn pos(&self) -> Pos {
        self.names.first().map_or(Pos::NONE, |n| n.pos)
    }

    fn end(&self) -> Pos {
        if let Some(v) = self.values.last() {
            return v.end();
        }
        if let Some(t) = &self.typ {
            return t.end();
        }
        self.names.last().map_or(Pos::NONE, |n| n.end())
    }
}

/// A type spec: `name type`
#[derive(Debug)]
pub struct TypeSpec {
    pub doc: Option<Rc<CommentGroup>>,
    pub name: Rc<Ident>,
    pub typ: Expr,
    pub comment: Option<Rc<CommentGroup>>,
}

impl Node for TypeSpec {
    fn pos(&self) -> Pos {
        self.name.pos
    }

    fn end(&self) -> Pos {
        self.typ.end()
    }
}

/// A declaration spec
#[derive(Debug)]
pub enum Spec {
    Import(Rc<ImportSpec>),
    Value(Box<ValueSpec>),
    Type(Box<TypeSpec>),
}

impl Spec {
    /// Leading documentation, if any
    #[must_use]
    pub fn doc(&self) -> Option<&Rc<CommentGroup>> {
        match self {
            Spec::Import(s) => s.doc.as_ref(),
            Spec::Value(s) => s.doc.as_ref(),
            Spec::Type(s) => s.doc.as_ref(),
        }
    }
}

impl Node for Spec {
    fn pos(&self) -> Pos {
        match self {
            Spec::Import(s) => s.pos(),
            Spec::Value(s) => s.pos(),
            Spec::Type(s) => s.pos(),
        }
    }

    fn end(&self) -> Pos {
        match self {
            Spec::Import(s) => s.end(),
            Spec::Value(s) => s.end(),
            Spec::Type(s) => s.end(),
        }
    }
}

/// A placeholder for a syntactically bad declaration
#[derive(Debug)]
pub struct BadDecl {
    pub from: Pos,
    pub to: Pos,
}

/// A `const`, `type`, `var` or `import` declaration with one or more specs.
/// `indent`/`dedent` frame the grouped (indented) form and are invalid for
/// single-spec declarations.
#[derive(Debug)]
pub struct GenDecl {
    pub doc: Option<Rc<CommentGroup>>,
    pub tok_pos: Pos,
    pub tok: Token,
    pub indent: Pos,
    pub specs: Vec<Spec>,
    pub dedent: Pos,
}

impl GenDecl {
    /// Returns true for the grouped (indented) form
    #[must_use]
    pub const fn is_grouped(&self) -> bool {
        self.indent.is_valid()
    }
}

/// A function or method declaration
#[derive(Debug)]
pub struct FuncDecl {
    pub doc: Option<Rc<CommentGroup>>,
    /// Receiver field list; `None` for plain functions
    pub recv: Option<FieldList>,
    pub name: Rc<Ident>,
    pub typ: FuncType,
    pub body: Option<BlockStmt>,
}

/// A declaration node
#[derive(Debug)]
pub enum Decl {
    Bad(Box<BadDecl>),
    Gen(Box<GenDecl>),
    Func(Box<FuncDecl>),
}

impl Node for Decl {
    fn pos(&self) -> Pos {
        match self {
            Decl::Bad(d) => d.from,
            Decl::Gen(d) => d.tok_pos,
            Decl::Func(d) => d.typ.pos,
        }
    }

    fn end(&self) -> Pos {
        match self {
            Decl::Bad(d) => d.to,
            Decl::Gen(d) => {
                if d.dedent.is_valid() {
                    d.dedent + 1
                } else {
                    d.specs.last().map_or(d.tok_pos, Node::end)
                }
            }
            Decl::Func(d) => d
                .body
                .as_ref()
                .map_or_else(|| func_type_end(&d.typ), Node::end),
        }
    }
}

fn func_type_end(t: &FuncType) -> Pos {
    t.results.as_ref().map_or_else(|| t.params.end(), Node::end)
}

/// A parsed source file
#[derive(Debug)]
pub struct File {
    /// Documentation preceding the package clause
    pub doc: Option<Rc<CommentGroup>>,
    /// Position of the `package` keyword
    pub package: Pos,
    /// Package name
    pub name: Rc<Ident>,
    /// Top-level declarations in source order
    pub decls: Vec<Decl>,
    /// The package scope for this file
    pub scope: ScopeId,
    /// Scope and object arena
    pub symbols: SymbolTable,
    /// All imports, in source order
    pub imports: Vec<Rc<ImportSpec>>,
    /// Identifiers that could not be resolved within this file
    pub unresolved: Vec<Rc<Ident>>,
    /// All comment groups, in source order
    pub comments: Vec<Rc<CommentGroup>>,
}

impl Node for File {
    fn pos(&self) -> Pos {
        self.package
    }

    fn end(&self) -> Pos {
        self.decls.last().map_or_else(|| self.name.end(), Node::end)
    }
}
