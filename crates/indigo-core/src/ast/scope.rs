//! Scopes and the objects they contain
//!
//! Scopes and objects live in a [`SymbolTable`] arena owned by the parser
//! while parsing and frozen into the [`File`](super::File) afterwards.
//! Cross-links are integer ids, so the pointer graph of name resolution has
//! no ownership cycles.

use std::collections::HashMap;

use crate::token::Pos;

/// Index of a scope in a [`SymbolTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// Index of an object in a [`SymbolTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(u32);

/// Resolution state of an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjRef {
    /// Blank, unbound, or never subject to resolution
    #[default]
    None,
    /// Resolution was attempted and failed; the identifier sits in the
    /// file's unresolved list
    Unresolved,
    /// Resolved to an object
    Obj(ObjId),
}

/// What an object represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    Bad,
    Pkg,
    Con,
    Typ,
    Var,
    Fun,
    Lbl,
}

impl std::fmt::Display for ObjKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Bad => "bad",
            Self::Pkg => "package",
            Self::Con => "const",
            Self::Typ => "type",
            Self::Var => "var",
            Self::Fun => "func",
            Self::Lbl => "label",
        })
    }
}

/// Kind of the node that declared an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclRef {
    None,
    Field,
    ImportSpec,
    ValueSpec,
    TypeSpec,
    FuncDecl,
    LabeledStmt,
    AssignStmt,
    /// Predeclared, owned by a scope rather than a syntax node
    Scope,
}

/// A bound name: kind, name, declaring-node tag and declaration position
#[derive(Debug, Clone)]
pub struct Object {
    pub kind: ObjKind,
    pub name: String,
    pub decl: DeclRef,
    decl_pos: Pos,
    /// `iota` index for constants declared in a grouped `const`
    pub iota: Option<i32>,
}

impl Object {
    /// Create an object recording where its name was declared
    #[must_use]
    pub fn new(kind: ObjKind, name: impl Into<String>, decl: DeclRef, decl_pos: Pos) -> Self {
        Self {
            kind,
            name: name.into(),
            decl,
            decl_pos,
            iota: None,
        }
    }

    /// Position of the identifier that declared this object, or the invalid
    /// position when it cannot be computed (predeclared objects)
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self.decl {
            DeclRef::None | DeclRef::Scope => Pos::NONE,
            _ => self.decl_pos,
        }
    }
}

#[derive(Debug, Default)]
struct ScopeData {
    outer: Option<ScopeId>,
    objects: HashMap<String, ObjId>,
}

/// Arena of scopes and objects for one file
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<ScopeData>,
    objects: Vec<Object>,
}

impl SymbolTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new scope nested in `outer`
    pub fn new_scope(&mut self, outer: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            outer,
            objects: HashMap::new(),
        });
        id
    }

    /// The enclosing scope, if any
    #[must_use]
    pub fn outer(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].outer
    }

    /// Intern an object
    pub fn new_object(&mut self, obj: Object) -> ObjId {
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(obj);
        id
    }

    /// Access an object by id
    #[must_use]
    pub fn object(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    /// Attempt to insert `obj` into `scope`. If the scope already contains
    /// an object with the same name, the scope is left unchanged and the
    /// existing object's id is returned.
    pub fn insert(&mut self, scope: ScopeId, obj: ObjId) -> Option<ObjId> {
        let name = self.objects[obj.0 as usize].name.clone();
        let data = &mut self.scopes[scope.0 as usize];
        if let Some(&alt) = data.objects.get(&name) {
            return Some(alt);
        }
        data.objects.insert(name, obj);
        None
    }

    /// Look up `name` in `scope` only; outer scopes are ignored
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<ObjId> {
        self.scopes[scope.0 as usize].objects.get(name).copied()
    }

    /// Look up `name` walking the outer chain from `scope`
    #[must_use]
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<ObjId> {
        let mut s = Some(scope);
        while let Some(id) = s {
            if let Some(obj) = self.lookup(id, name) {
                return Some(obj);
            }
            s = self.outer(id);
        }
        None
    }

    /// Names declared directly in `scope`, sorted
    #[must_use]
    pub fn names(&self, scope: ScopeId) -> Vec<String> {
        let mut v: Vec<String> = self.scopes[scope.0 as usize].objects.keys().cloned().collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_shadowing() {
        let mut tab = SymbolTable::new();
        let outer = tab.new_scope(None);
        let inner = tab.new_scope(Some(outer));

        let a = tab.new_object(Object::new(ObjKind::Var, "x", DeclRef::ValueSpec, Pos::NONE + 1));
        assert!(tab.insert(outer, a).is_none());

        let b = tab.new_object(Object::new(ObjKind::Var, "x", DeclRef::ValueSpec, Pos::NONE + 9));
        assert!(tab.insert(inner, b).is_none());

        // most recently inserted wins per scope, no shadowing across outer
        assert_eq!(tab.resolve(inner, "x"), Some(b));
        assert_eq!(tab.resolve(outer, "x"), Some(a));
        assert_eq!(tab.lookup(outer, "x"), Some(a));
    }

    #[test]
    fn duplicate_insert_returns_existing() {
        let mut tab = SymbolTable::new();
        let s = tab.new_scope(None);
        let a = tab.new_object(Object::new(ObjKind::Var, "v", DeclRef::ValueSpec, Pos::NONE + 1));
        let b = tab.new_object(Object::new(ObjKind::Var, "v", DeclRef::ValueSpec, Pos::NONE + 5));
        assert!(tab.insert(s, a).is_none());
        assert_eq!(tab.insert(s, b), Some(a));
        assert_eq!(tab.lookup(s, "v"), Some(a));
    }

    #[test]
    fn object_pos_contract() {
        let obj = Object::new(ObjKind::Fun, "f", DeclRef::FuncDecl, Pos::NONE + 3);
        assert_eq!(obj.pos(), Pos::NONE + 3);
        let pre = Object::new(ObjKind::Typ, "int", DeclRef::Scope, Pos::NONE);
        assert!(!pre.pos().is_valid());
    }
}
