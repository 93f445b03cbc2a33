//! Recursive-descent parser for the indented form
//!
//! The parser consumes the scanner's layout-normalized token stream and
//! produces a fully-formed AST: it maintains nested scopes, resolves
//! identifiers, attaches lead and line comments, and recovers from syntax
//! errors. Errors are collected in an [`ErrorList`]; in the default mode at
//! most one error per line is recorded and parsing is abandoned after more
//! than ten errors.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{
    AssignStmt, BadDecl, BadExpr, BadStmt, BasicLit, BinaryExpr, BlockStmt, BranchStmt, CallExpr,
    CaseClause, ChanDir, ChanType, Comment, CommentGroup, CommClause, CompositeLit, Decl, DeclRef,
    DeferStmt, Ellipsis, EmptyStmt, Expr, ExprStmt, Field, FieldList, File, ForStmt, FuncDecl,
    FuncLit, FuncType, GenDecl, GoStmt, Ident, IfStmt, ImportSpec, IncDecStmt, IndexExpr,
    InterfaceType, KeyValueExpr, LabeledStmt, MapType, Node, ObjKind, ObjRef, ParenExpr,
    RangeStmt, ReturnStmt, ScopeId, SelectStmt, SelectorExpr, SendStmt, SliceExpr, StarExpr, Stmt,
    StructType, SwitchStmt, SymbolTable, TypeAssertExpr, TypeSpec, TypeSwitchStmt, UnaryExpr,
    ValueSpec,
};
use crate::scanner::{self, ErrorList, Scanner};
use crate::token::{FileSet, Pos, Token, LOWEST_PREC};

/// Parser mode bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode(u32);

impl Mode {
    /// No special behavior
    pub const NONE: Mode = Mode(0);
    /// Retain comments in the AST
    pub const PARSE_COMMENTS: Mode = Mode(1);
    /// Print a trace of parsed productions
    pub const TRACE: Mode = Mode(1 << 1);
    /// Report declaration errors (redeclarations, undefined labels)
    pub const DECLARATION_ERRORS: Mode = Mode(1 << 2);
    /// Report all errors, not just the first per line, without the cap
    pub const ALL_ERRORS: Mode = Mode(1 << 3);
    /// Stop parsing after the package clause
    pub const PACKAGE_CLAUSE_ONLY: Mode = Mode(1 << 4);
    /// Stop parsing after the import declarations
    pub const IMPORTS_ONLY: Mode = Mode(1 << 5);

    /// Returns true if all bits of `other` are set
    #[must_use]
    pub const fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Mode {
    type Output = Mode;

    fn bitor(self, rhs: Mode) -> Mode {
        Mode(self.0 | rhs.0)
    }
}

// One-shot abort of parsing after the error cap is exceeded; propagated as
// an explicit short-circuit up the call stack.
#[derive(Debug)]
struct Bailout;

type PResult<T> = Result<T, Bailout>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleMode {
    Basic,
    LabelOk,
    RangeOk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecKind {
    Import,
    Value,
    Type,
}

macro_rules! internal_error {
    ($($arg:tt)*) => {
        panic!("indigo parser internal error: {}", format!($($arg)*))
    };
}

struct Parser {
    file: Arc<crate::token::File>,
    errors: Rc<RefCell<ErrorList>>,
    scanner: Scanner,

    mode: Mode,
    trace: bool,
    trace_indent: usize,

    comments: Vec<Rc<CommentGroup>>,
    lead_comment: Option<Rc<CommentGroup>>,
    line_comment: Option<Rc<CommentGroup>>,

    pos: Pos,
    tok: Token,
    ptok: Token,
    lit: String,

    sync_pos: Pos,
    sync_cnt: u32,

    expr_lev: i32,
    in_rhs: bool,
    allow_empty_block: bool,

    symbols: SymbolTable,
    pkg_scope: Option<ScopeId>,
    top_scope: Option<ScopeId>,
    unresolved: Vec<Rc<Ident>>,
    imports: Vec<Rc<ImportSpec>>,

    label_scope: Option<ScopeId>,
    target_stack: Vec<Vec<Rc<Ident>>>,
}

/// Parse the source of one file in the indented form.
///
/// The file is registered in `fset`; the returned error list is sorted by
/// position and, unless [`Mode::ALL_ERRORS`] is set, reduced to one error
/// per line. A partial AST is returned alongside errors whenever parsing
/// got past the package clause; `None` is returned when scanning the first
/// token failed, the package clause was malformed, or the error cap forced
/// a bailout.
pub fn parse_file(fset: &FileSet, filename: &str, src: &str, mode: Mode) -> (Option<File>, ErrorList) {
    let file = fset.add_file(filename, None, src.len() as u32);
    let errors = Rc::new(RefCell::new(ErrorList::new()));
    let handler: scanner::ErrorHandler = {
        let errs = Rc::clone(&errors);
        Box::new(move |pos, msg| errs.borrow_mut().add(pos, msg))
    };
    let smode = if mode.contains(Mode::PARSE_COMMENTS) {
        scanner::Mode::SCAN_COMMENTS
    } else {
        scanner::Mode::NONE
    };
    let scanner = Scanner::new(Arc::clone(&file), src, handler, smode);

    let mut p = Parser {
        file,
        errors: Rc::clone(&errors),
        scanner,
        mode,
        trace: mode.contains(Mode::TRACE),
        trace_indent: 0,
        comments: Vec::new(),
        lead_comment: None,
        line_comment: None,
        pos: Pos::NONE,
        tok: Token::Illegal,
        ptok: Token::Illegal,
        lit: String::new(),
        sync_pos: Pos::NONE,
        sync_cnt: 0,
        expr_lev: 0,
        in_rhs: false,
        allow_empty_block: false,
        symbols: SymbolTable::new(),
        pkg_scope: None,
        top_scope: None,
        unresolved: Vec::new(),
        imports: Vec::new(),
        label_scope: None,
        target_stack: Vec::new(),
    };
    p.next();

    let parsed = match p.parse_file_node() {
        Ok(f) => f,
        Err(Bailout) => None,
    };

    let mut list = errors.borrow().clone();
    list.sort();
    if !mode.contains(Mode::ALL_ERRORS) {
        list.remove_multiples();
    }
    (parsed, list)
}

impl Parser {
    // ==================== Scoping support ====================

    fn current_scope(&self) -> ScopeId {
        match self.top_scope {
            Some(s) => s,
            None => internal_error!("no open scope"),
        }
    }

    fn open_scope(&mut self) {
        self.top_scope = Some(self.symbols.new_scope(self.top_scope));
    }

    fn close_scope(&mut self) {
        self.top_scope = self.symbols.outer(self.current_scope());
    }

    fn open_label_scope(&mut self) {
        self.label_scope = Some(self.symbols.new_scope(self.label_scope));
        self.target_stack.push(Vec::new());
    }

    // Resolves the labels collected for the current function.
    fn close_label_scope(&mut self) -> PResult<()> {
        let targets = self.target_stack.pop().unwrap_or_default();
        let scope = match self.label_scope {
            Some(s) => s,
            None => internal_error!("no open label scope"),
        };
        for ident in targets {
            match self.symbols.lookup(scope, &ident.name) {
                Some(obj) => ident.obj.set(ObjRef::Obj(obj)),
                None => {
                    ident.obj.set(ObjRef::None);
                    if self.mode.contains(Mode::DECLARATION_ERRORS) {
                        let pos = ident.pos;
                        self.error(pos, format!("label {} undefined", ident.name))?;
                    }
                }
            }
        }
        self.label_scope = self.symbols.outer(scope);
        Ok(())
    }

    fn declare(
        &mut self,
        decl: DeclRef,
        iota: Option<i32>,
        scope: ScopeId,
        kind: ObjKind,
        idents: &[Rc<Ident>],
    ) -> PResult<()> {
        for ident in idents {
            if ident.obj.get() != ObjRef::None {
                internal_error!("identifier '{}' already declared or resolved", ident.name);
            }
            let mut obj = crate::ast::Object::new(kind, &ident.name, decl, ident.pos);
            obj.iota = iota;
            let id = self.symbols.new_object(obj);
            ident.obj.set(ObjRef::Obj(id));
            if !ident.is_blank() {
                if let Some(alt) = self.symbols.insert(scope, id) {
                    if self.mode.contains(Mode::DECLARATION_ERRORS) {
                        let alt_pos = self.symbols.object(alt).pos();
                        let prev = if alt_pos.is_valid() {
                            format!(
                                "\n\tprevious declaration at {}",
                                self.file.position(alt_pos)
                            )
                        } else {
                            String::new()
                        };
                        let pos = ident.pos;
                        self.error(
                            pos,
                            format!("{} redeclared in this block{}", ident.name, prev),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    // A short variable declaration may redeclare variables declared in the
    // same block; at least one non-blank variable must be new.
    fn short_var_decl(&mut self, list: &[Expr]) -> PResult<()> {
        let mut n = 0;
        for x in list {
            if let Expr::Ident(ident) = x {
                if ident.obj.get() != ObjRef::None {
                    internal_error!("identifier '{}' already declared or resolved", ident.name);
                }
                let obj =
                    crate::ast::Object::new(ObjKind::Var, &ident.name, DeclRef::AssignStmt, ident.pos);
                let id = self.symbols.new_object(obj);
                ident.obj.set(ObjRef::Obj(id));
                if !ident.is_blank() {
                    let scope = self.current_scope();
                    match self.symbols.insert(scope, id) {
                        Some(alt) => ident.obj.set(ObjRef::Obj(alt)),
                        None => n += 1,
                    }
                }
            } else {
                self.error_expected(x.pos(), "identifier on left side of :=")?;
            }
        }
        if n == 0 && self.mode.contains(Mode::DECLARATION_ERRORS) {
            let pos = list.first().map_or(self.pos, Node::pos);
            self.error(pos, "no new variables on left side of :=")?;
        }
        Ok(())
    }

    // If x is an identifier, attempt to resolve it against the open scopes.
    // On a miss with collect_unresolved set, x is linked to the unresolved
    // sentinel and remembered for the end-of-file resolution pass.
    fn try_resolve(&mut self, x: &Expr, collect_unresolved: bool) {
        let Expr::Ident(ident) = x else { return };
        if ident.obj.get() != ObjRef::None {
            internal_error!("identifier '{}' already declared or resolved", ident.name);
        }
        if ident.is_blank() {
            return;
        }
        let mut s = self.top_scope;
        while let Some(id) = s {
            if let Some(obj) = self.symbols.lookup(id, &ident.name) {
                ident.obj.set(ObjRef::Obj(obj));
                return;
            }
            s = self.symbols.outer(id);
        }
        if collect_unresolved {
            ident.obj.set(ObjRef::Unresolved);
            self.unresolved.push(Rc::clone(ident));
        }
    }

    fn resolve(&mut self, x: &Expr) {
        self.try_resolve(x, true);
    }

    // ==================== Parsing support ====================

    fn file_line(&self, pos: Pos) -> u32 {
        if pos.is_valid() {
            self.file.line(pos)
        } else {
            0
        }
    }

    fn is_indent(&self) -> bool {
        self.tok == Token::Semicolon && self.lit == "\n"
    }

    fn print_trace(&self, msg: &str) {
        const DOTS: &str = ". . . . . . . . . . . . . . . . ";
        let pos = self.file.position(self.pos);
        let mut prefix = String::new();
        let mut i = 2 * self.trace_indent;
        while i > DOTS.len() {
            prefix.push_str(DOTS);
            i -= DOTS.len();
        }
        prefix.push_str(&DOTS[..i]);
        eprintln!("{:5}:{:3}: {}{}", pos.line, pos.column, prefix, msg);
    }

    fn trace_begin(&mut self, msg: &str) {
        if self.trace {
            self.print_trace(&format!("{msg} ("));
            self.trace_indent += 1;
        }
    }

    fn trace_end(&mut self) {
        if self.trace {
            self.trace_indent -= 1;
            self.print_trace(")");
        }
    }

    // Advance to the next raw token.
    fn next0(&mut self) {
        if self.trace && self.pos.is_valid() {
            let s = self.tok.to_string();
            if self.tok.is_literal() {
                self.print_trace(&format!("{s} {}", self.lit));
            } else if self.tok.is_operator() || self.tok.is_keyword() {
                self.print_trace(&format!("\"{s}\""));
            } else {
                self.print_trace(&s);
            }
        }
        self.ptok = self.tok;
        let (pos, tok, lit) = self.scanner.scan();
        self.pos = pos;
        self.tok = tok;
        self.lit = lit;
    }

    fn consume_comment(&mut self) -> (Comment, u32) {
        let mut endline = self.file_line(self.pos);
        if self.lit.starts_with("/*") {
            endline += self.lit.bytes().filter(|&b| b == b'\n').count() as u32;
        }
        let comment = Comment {
            slash: self.pos,
            text: self.lit.clone(),
        };
        self.next0();
        (comment, endline)
    }

    // Consume a group of adjacent comments and add it to the comments list.
    // A non-comment token or n empty lines terminate a comment group.
    fn consume_comment_group(&mut self, n: u32) -> (Rc<CommentGroup>, u32) {
        let mut list = Vec::new();
        let mut endline = self.file_line(self.pos);
        while self.tok == Token::Comment && self.file_line(self.pos) <= endline + n {
            let (comment, el) = self.consume_comment();
            endline = el;
            list.push(comment);
        }
        let group = Rc::new(CommentGroup { list });
        self.comments.push(Rc::clone(&group));
        (group, endline)
    }

    // Advance to the next non-comment token, collecting comment groups and
    // remembering the last lead and line comments.
    fn next(&mut self) {
        self.lead_comment = None;
        self.line_comment = None;
        let prev = self.pos;
        self.next0();

        if self.tok == Token::Comment {
            let mut comment: Option<Rc<CommentGroup>> = None;
            if self.file_line(self.pos) == self.file_line(prev) {
                // cannot be a lead comment but may be a line comment
                let (c, endline) = self.consume_comment_group(0);
                if self.file_line(self.pos) != endline {
                    self.line_comment = Some(c);
                } else {
                    comment = Some(c);
                }
            }
            let mut endline = None;
            while self.tok == Token::Comment {
                let (c, e) = self.consume_comment_group(1);
                comment = Some(c);
                endline = Some(e);
            }
            if let (Some(e), Some(c)) = (endline, comment) {
                if e + 1 == self.file_line(self.pos) {
                    self.lead_comment = Some(c);
                }
            }
        }
    }

    // Record an error. In the default mode, errors on the line of the last
    // recorded error are discarded and more than ten errors abort the
    // parse.
    fn error(&mut self, pos: Pos, msg: impl Into<String>) -> PResult<()> {
        let epos = self.file.position(pos);
        if !self.mode.contains(Mode::ALL_ERRORS) {
            let errors = self.errors.borrow();
            // discard errors on the line of the last recorded error; they
            // are likely spurious
            if errors
                .last()
                .is_some_and(|e| e.pos.filename == epos.filename && e.pos.line == epos.line)
            {
                return Ok(());
            }
            if errors.len() > 10 {
                return Err(Bailout);
            }
        }
        self.errors.borrow_mut().add(epos, msg);
        Ok(())
    }

    fn error_expected(&mut self, pos: Pos, what: &str) -> PResult<()> {
        let mut msg = format!("expected {what}");
        if pos == self.pos {
            // make the message more specific
            if self.is_indent() {
                msg.push_str(", found newline");
            } else {
                msg.push_str(&format!(", found '{}'", self.tok));
                if self.tok.is_literal() {
                    msg.push(' ');
                    msg.push_str(&self.lit);
                }
            }
        }
        self.error(pos, msg)
    }

    fn expect(&mut self, tok: Token) -> PResult<Pos> {
        let pos = self.pos;
        if self.tok != tok {
            self.error_expected(pos, &format!("'{tok}'"))?;
        }
        self.next(); // make progress
        Ok(pos)
    }

    // Like expect but with a better message for a missing comma before a
    // newline.
    fn expect_closing(&mut self, tok: Token, context: &str) -> PResult<Pos> {
        if self.tok != tok && self.is_indent() {
            let pos = self.pos;
            self.error(pos, format!("missing ',' before newline in {context}"))?;
            self.next();
        }
        self.expect(tok)
    }

    // A semicolon is optional before a closing paren or brace and before a
    // dedent; a preceding semicolon, comment or dedent also satisfies it.
    fn expect_semi(&mut self) -> PResult<()> {
        if self.tok != Token::Rparen && self.tok != Token::Rbrace && self.tok != Token::Dedent {
            if self.tok == Token::Semicolon {
                self.next();
            } else if self.ptok == Token::Semicolon
                || self.ptok == Token::Comment
                || self.ptok == Token::Dedent
            {
                // already terminated
            } else {
                self.error_expected(self.pos, "';'")?;
                self.sync_stmt();
            }
        }
        Ok(())
    }

    fn at_comma(&mut self, context: &str) -> PResult<bool> {
        if self.tok == Token::Comma {
            return Ok(true);
        }
        if self.is_indent() {
            let pos = self.pos;
            self.error(pos, format!("missing ',' before newline in {context}"))?;
            return Ok(true); // "insert" the comma and continue
        }
        Ok(false)
    }

    // Advance to the next statement after an error. The invocation limit
    // avoids endless loops when recovery fails to make progress.
    fn sync_stmt(&mut self) {
        loop {
            match self.tok {
                Token::Break
                | Token::Const
                | Token::Continue
                | Token::Defer
                | Token::Fallthrough
                | Token::For
                | Token::Go
                | Token::Goto
                | Token::If
                | Token::Return
                | Token::Select
                | Token::Switch
                | Token::Type
                | Token::Var => {
                    if self.pos == self.sync_pos && self.sync_cnt < 10 {
                        self.sync_cnt += 1;
                        return;
                    }
                    if self.pos > self.sync_pos {
                        self.sync_pos = self.pos;
                        self.sync_cnt = 0;
                        return;
                    }
                }
                Token::Eof => return,
                _ => {}
            }
            self.next();
        }
    }

    // Advance to the next declaration after an error.
    fn sync_decl(&mut self) {
        loop {
            match self.tok {
                Token::Const | Token::Type | Token::Var => {
                    if self.pos == self.sync_pos && self.sync_cnt < 10 {
                        self.sync_cnt += 1;
                        return;
                    }
                    if self.pos > self.sync_pos {
                        self.sync_pos = self.pos;
                        self.sync_cnt = 0;
                        return;
                    }
                }
                Token::Eof => return,
                _ => {}
            }
            self.next();
        }
    }

    fn take_first(&mut self, list: Vec<Expr>) -> Expr {
        match list.into_iter().next() {
            Some(x) => x,
            None => Expr::Bad(Box::new(BadExpr {
                from: self.pos,
                to: self.pos,
            })),
        }
    }

    // ==================== Identifiers ====================

    fn parse_ident(&mut self) -> PResult<Rc<Ident>> {
        let pos = self.pos;
        let name = if self.tok == Token::Ident {
            let name = self.lit.clone();
            self.next();
            name
        } else {
            self.expect(Token::Ident)?; // use expect() error handling
            "_".to_string()
        };
        Ok(Ident::new(pos, name))
    }

    fn parse_ident_list(&mut self) -> PResult<Vec<Rc<Ident>>> {
        let mut list = vec![self.parse_ident()?];
        while self.tok == Token::Comma {
            self.next();
            list.push(self.parse_ident()?);
        }
        Ok(list)
    }

    // ==================== Common productions ====================

    // If lhs is set, result list elements which are identifiers are not
    // resolved.
    fn parse_expr_list(&mut self, lhs: bool) -> PResult<Vec<Expr>> {
        let x = self.parse_expr(lhs)?;
        let mut list = vec![self.check_expr(x)?];
        while self.tok == Token::Comma {
            self.next();
            let x = self.parse_expr(lhs)?;
            list.push(self.check_expr(x)?);
        }
        Ok(list)
    }

    fn parse_lhs_list(&mut self) -> PResult<Vec<Expr>> {
        let old = self.in_rhs;
        self.in_rhs = false;
        let list = self.parse_expr_list(true)?;
        match self.tok {
            // lhs of a short variable declaration; the caller declares via
            // short_var_decl at the appropriate time
            Token::Define => {}
            // lhs of a label declaration or a communication clause
            Token::Colon => {}
            _ => {
                // identifiers must be declared elsewhere
                for x in &list {
                    self.resolve(x);
                }
            }
        }
        self.in_rhs = old;
        Ok(list)
    }

    fn parse_rhs_list(&mut self) -> PResult<Vec<Expr>> {
        let old = self.in_rhs;
        self.in_rhs = true;
        let list = self.parse_expr_list(false)?;
        self.in_rhs = old;
        Ok(list)
    }

    // ==================== Types ====================

    fn parse_type(&mut self) -> PResult<Expr> {
        match self.try_type()? {
            Some(typ) => Ok(typ),
            None => {
                let pos = self.pos;
                self.error_expected(pos, "type")?;
                self.next(); // make progress
                Ok(Expr::Bad(Box::new(BadExpr { from: pos, to: self.pos })))
            }
        }
    }

    // If the result is an identifier, it is not resolved.
    fn parse_type_name(&mut self) -> PResult<Expr> {
        let ident = self.parse_ident()?;
        // don't resolve ident yet - it may be a parameter or field name
        if self.tok == Token::Period {
            // ident is a package name
            self.next();
            let x = Expr::Ident(ident);
            self.resolve(&x);
            let sel = self.parse_ident()?;
            return Ok(Expr::Selector(Box::new(SelectorExpr { x, sel })));
        }
        Ok(Expr::Ident(ident))
    }

    fn parse_array_type(&mut self) -> PResult<Expr> {
        let lbrack = self.expect(Token::Lbrack)?;
        let mut len = None;
        // always permit ellipsis for more fault-tolerant parsing
        if self.tok == Token::Ellipsis {
            len = Some(Expr::Ellipsis(Box::new(Ellipsis {
                pos: self.pos,
                elt: None,
            })));
            self.next();
        } else if self.tok != Token::Rbrack {
            len = Some(self.parse_rhs()?);
        }
        self.expect(Token::Rbrack)?;
        let elt = self.parse_type()?;
        Ok(Expr::ArrayType(Box::new(crate::ast::ArrayType {
            lbrack,
            len,
            elt,
        })))
    }

    fn make_ident_list(&mut self, list: Vec<Expr>) -> PResult<Vec<Rc<Ident>>> {
        let mut idents = Vec::with_capacity(list.len());
        for x in list {
            match x {
                Expr::Ident(id) => idents.push(id),
                other => {
                    if !matches!(other, Expr::Bad(_)) {
                        // only report error if it's a new one
                        self.error_expected(other.pos(), "identifier")?;
                    }
                    idents.push(Ident::new(other.pos(), "_"));
                }
            }
        }
        Ok(idents)
    }

    fn parse_field_decl(&mut self, scope: ScopeId) -> PResult<Field> {
        let doc = self.lead_comment.take();
        let (list, typ) = self.parse_var_list(false)?;

        let tag = if self.tok == Token::String {
            let tag = BasicLit {
                pos: self.pos,
                kind: self.tok,
                value: self.lit.clone(),
            };
            self.next();
            Some(tag)
        } else {
            None
        };

        // analyze case
        let (names, typ) = if let Some(typ) = typ {
            // IdentifierList Type
            (self.make_ident_list(list)?, typ)
        } else {
            // ["*"] TypeName (anonymous field)
            let last_end = list.last().map_or(Pos::NONE, Node::end);
            let n = list.len();
            let mut iter = list.into_iter();
            let first = match iter.next() {
                Some(x) => x,
                None => internal_error!("empty var list"),
            };
            let typ = if n > 1 || !first.deref().is_type_name() {
                let pos = first.pos();
                self.error_expected(pos, "anonymous field")?;
                Expr::Bad(Box::new(BadExpr { from: pos, to: last_end }))
            } else {
                first
            };
            (Vec::new(), typ)
        };

        // allow multiple fields on the same line
        if self.tok == Token::Semicolon {
            self.expect_semi()?; // call before accessing line_comment
        }

        let field = Field {
            doc,
            names,
            typ,
            tag,
            comment: self.line_comment.take(),
        };
        self.declare(DeclRef::Field, None, scope, ObjKind::Var, &field.names)?;
        self.resolve(&field.typ);
        Ok(field)
    }

    fn parse_struct_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::Struct)?;
        let scope = self.symbols.new_scope(None); // struct scope

        let mut start = pos;
        let mut end = pos;
        let mut list = Vec::new();

        match self.tok {
            Token::Colon => {
                start = self.expect(Token::Colon)?;
                end = Pos::NONE;
                if matches!(self.tok, Token::Ident | Token::Mul | Token::Lparen) {
                    list.push(self.parse_field_decl(scope)?);
                } else {
                    self.expect(Token::Ident)?;
                }
            }
            Token::Semicolon => {
                self.expect_semi()?;
                if self.tok == Token::Indent {
                    start = self.expect(Token::Indent)?;
                    while self.tok == Token::Ident || self.tok == Token::Mul {
                        list.push(self.parse_field_decl(scope)?);
                    }
                    end = self.expect(Token::Dedent)?;
                }
            }
            _ => {
                // unbraced or empty struct type
            }
        }
        Ok(Expr::StructType(Box::new(StructType {
            pos,
            fields: FieldList {
                opening: start,
                list,
                closing: end,
            },
        })))
    }

    fn parse_pointer_type(&mut self) -> PResult<Expr> {
        let star = self.expect(Token::Mul)?;
        let base = self.parse_type()?;
        Ok(Expr::Star(Box::new(StarExpr { star, x: base })))
    }

    // If the result is an identifier, it is not resolved.
    fn try_var_type(&mut self, is_param: bool) -> PResult<Option<Expr>> {
        if is_param && self.tok == Token::Ellipsis {
            let pos = self.pos;
            self.next();
            let elt = match self.try_ident_or_type()? {
                Some(typ) => {
                    self.resolve(&typ);
                    Some(typ)
                }
                None => {
                    self.error(pos, "'...' parameter is missing type")?;
                    Some(Expr::Bad(Box::new(BadExpr { from: pos, to: self.pos })))
                }
            };
            return Ok(Some(Expr::Ellipsis(Box::new(Ellipsis { pos, elt }))));
        }
        self.try_ident_or_type()
    }

    fn parse_var_type(&mut self, is_param: bool) -> PResult<Expr> {
        match self.try_var_type(is_param)? {
            Some(typ) => Ok(typ),
            None => {
                let pos = self.pos;
                self.error_expected(pos, "type")?;
                self.next(); // make progress
                Ok(Expr::Bad(Box::new(BadExpr { from: pos, to: self.pos })))
            }
        }
    }

    // A list of identifiers looks like a list of type names; accept any
    // type for robust parsing and complain later.
    fn parse_var_list(&mut self, is_param: bool) -> PResult<(Vec<Expr>, Option<Expr>)> {
        let mut list = Vec::new();
        let mut typ = Some(self.parse_var_type(is_param)?);
        while let Some(t) = typ {
            list.push(t);
            if self.tok != Token::Comma {
                break;
            }
            self.next();
            typ = self.try_var_type(is_param)?; // maybe none as in: func f(int,)
        }
        // if we had a list of identifiers, it must be followed by a type
        let typ = self.try_var_type(is_param)?;
        Ok((list, typ))
    }

    fn parse_parameter_list(&mut self, scope: ScopeId, ellipsis_ok: bool) -> PResult<Vec<Field>> {
        let (list, typ) = self.parse_var_list(ellipsis_ok)?;
        let mut params = Vec::new();

        if let Some(typ) = typ {
            // IdentifierList Type
            let idents = self.make_ident_list(list)?;
            let field = Field {
                doc: None,
                names: idents,
                typ,
                tag: None,
                comment: None,
            };
            // parameters are in scope within the function body
            self.declare(DeclRef::Field, None, scope, ObjKind::Var, &field.names)?;
            self.resolve(&field.typ);
            params.push(field);
            if self.tok == Token::Comma {
                self.next();
            }
            while self.tok != Token::Rparen && self.tok != Token::Eof {
                let idents = self.parse_ident_list()?;
                let typ = self.parse_var_type(ellipsis_ok)?;
                let field = Field {
                    doc: None,
                    names: idents,
                    typ,
                    tag: None,
                    comment: None,
                };
                self.declare(DeclRef::Field, None, scope, ObjKind::Var, &field.names)?;
                self.resolve(&field.typ);
                params.push(field);
                if !self.at_comma("parameter list")? {
                    break;
                }
                self.next();
            }
        } else {
            // Type { "," Type } (anonymous parameters)
            for typ in list {
                self.resolve(&typ);
                params.push(Field {
                    doc: None,
                    names: Vec::new(),
                    typ,
                    tag: None,
                    comment: None,
                });
            }
        }
        Ok(params)
    }

    fn parse_parameters(&mut self, scope: ScopeId, ellipsis_ok: bool) -> PResult<FieldList> {
        let lparen = self.expect(Token::Lparen)?;
        let mut params = Vec::new();
        if self.tok != Token::Rparen {
            params = self.parse_parameter_list(scope, ellipsis_ok)?;
        }
        let rparen = self.expect(Token::Rparen)?;
        Ok(FieldList {
            opening: lparen,
            list: params,
            closing: rparen,
        })
    }

    fn parse_result(&mut self, scope: ScopeId) -> PResult<Option<FieldList>> {
        if self.tok == Token::Lparen {
            return Ok(Some(self.parse_parameters(scope, false)?));
        }
        if let Some(typ) = self.try_type()? {
            return Ok(Some(FieldList {
                opening: Pos::NONE,
                list: vec![Field {
                    doc: None,
                    names: Vec::new(),
                    typ,
                    tag: None,
                    comment: None,
                }],
                closing: Pos::NONE,
            }));
        }
        Ok(None)
    }

    fn parse_signature(&mut self, scope: ScopeId) -> PResult<(FieldList, Option<FieldList>)> {
        let params = self.parse_parameters(scope, true)?;
        let results = self.parse_result(scope)?;
        Ok((params, results))
    }

    fn parse_func_type(&mut self) -> PResult<(FuncType, ScopeId)> {
        let pos = self.expect(Token::Func)?;
        let scope = self.symbols.new_scope(self.top_scope); // function scope
        let (params, results) = self.parse_signature(scope)?;
        Ok((
            FuncType {
                pos,
                params,
                results,
            },
            scope,
        ))
    }

    fn parse_method_spec(&mut self, scope: ScopeId) -> PResult<Field> {
        let doc = self.lead_comment.take();
        let mut names = Vec::new();
        let typ;
        let x = self.parse_type_name()?;
        let is_plain_ident = matches!(&x, Expr::Ident(_));
        if is_plain_ident && self.tok == Token::Lparen {
            // method
            let Expr::Ident(ident) = x else { unreachable!() };
            names = vec![ident];
            let mscope = self.symbols.new_scope(None); // method scope
            let (params, results) = self.parse_signature(mscope)?;
            typ = Expr::FuncType(Box::new(FuncType {
                pos: Pos::NONE,
                params,
                results,
            }));
        } else {
            // embedded interface
            typ = x;
            self.resolve(&typ);
        }
        // methods may sit on the same line as the interface header
        if self.tok == Token::Semicolon {
            self.expect_semi()?; // call before accessing line_comment
        }
        let field = Field {
            doc,
            names,
            typ,
            tag: None,
            comment: self.line_comment.take(),
        };
        self.declare(DeclRef::Field, None, scope, ObjKind::Fun, &field.names)?;
        Ok(field)
    }

    fn parse_interface_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::Interface)?;
        let scope = self.symbols.new_scope(None); // interface scope

        let mut start = pos;
        let mut end = pos;
        let mut list = Vec::new();

        match self.tok {
            Token::Colon => {
                start = self.expect(Token::Colon)?;
                end = Pos::NONE;
                if self.tok == Token::Ident {
                    list.push(self.parse_method_spec(scope)?);
                } else {
                    self.expect(Token::Ident)?;
                }
            }
            Token::Semicolon => {
                self.expect_semi()?;
                if self.tok == Token::Indent {
                    start = self.expect(Token::Indent)?;
                    while self.tok == Token::Ident {
                        list.push(self.parse_method_spec(scope)?);
                    }
                    end = self.expect(Token::Dedent)?;
                }
            }
            _ => {
                // unbraced or empty interface type
            }
        }
        Ok(Expr::InterfaceType(Box::new(InterfaceType {
            pos,
            methods: FieldList {
                opening: start,
                list,
                closing: end,
            },
        })))
    }

    fn parse_map_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::Map)?;
        self.expect(Token::Lbrack)?;
        let key = self.parse_type()?;
        self.expect(Token::Rbrack)?;
        let value = self.parse_type()?;
        Ok(Expr::MapType(Box::new(MapType { pos, key, value })))
    }

    fn parse_chan_type(&mut self) -> PResult<Expr> {
        let pos = self.pos;
        let mut dir = ChanDir::BOTH;
        let mut arrow = Pos::NONE;
        if self.tok == Token::Chan {
            self.next();
            if self.tok == Token::Arrow {
                arrow = self.pos;
                self.next();
                dir = ChanDir::SEND;
            }
        } else {
            arrow = self.expect(Token::Arrow)?;
            self.expect(Token::Chan)?;
            dir = ChanDir::RECV;
        }
        let value = self.parse_type()?;
        Ok(Expr::ChanType(Box::new(ChanType {
            begin: pos,
            arrow,
            dir,
            value,
        })))
    }

    // If the result is an identifier, it is not resolved.
    fn try_ident_or_type(&mut self) -> PResult<Option<Expr>> {
        match self.tok {
            Token::Ident => Ok(Some(self.parse_type_name()?)),
            Token::Lbrack => Ok(Some(self.parse_array_type()?)),
            Token::Struct => Ok(Some(self.parse_struct_type()?)),
            Token::Mul => Ok(Some(self.parse_pointer_type()?)),
            Token::Func => {
                let (typ, _) = self.parse_func_type()?;
                Ok(Some(Expr::FuncType(Box::new(typ))))
            }
            Token::Interface => Ok(Some(self.parse_interface_type()?)),
            Token::Map => Ok(Some(self.parse_map_type()?)),
            Token::Chan | Token::Arrow => Ok(Some(self.parse_chan_type()?)),
            Token::Lparen => {
                let lparen = self.pos;
                self.next();
                let typ = self.parse_type()?;
                let rparen = self.expect(Token::Rparen)?;
                Ok(Some(Expr::Paren(Box::new(ParenExpr {
                    lparen,
                    x: typ,
                    rparen,
                }))))
            }
            _ => Ok(None), // no type found
        }
    }

    fn try_type(&mut self) -> PResult<Option<Expr>> {
        match self.try_ident_or_type()? {
            Some(typ) => {
                self.resolve(&typ);
                Ok(Some(typ))
            }
            None => Ok(None),
        }
    }

    // ==================== Blocks ====================

    fn parse_stmt_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut list = Vec::new();
        while self.tok != Token::Case
            && self.tok != Token::Default
            && self.tok != Token::Dedent
            && self.tok != Token::Eof
        {
            list.push(self.parse_stmt()?);
        }
        Ok(list)
    }

    // A function body: either the short colon form with one small
    // statement, or an indented statement list.
    fn parse_body(&mut self, scope: ScopeId) -> PResult<BlockStmt> {
        if self.tok == Token::Colon {
            let colon = self.expect(Token::Colon)?;
            self.top_scope = Some(scope); // open function scope
            let mut list = Vec::new();
            if self.tok == Token::Semicolon {
                // allow empty body
                self.expect_semi()?;
            } else {
                list.push(self.parse_small_stmt()?);
            }
            self.close_scope();
            Ok(BlockStmt {
                opening: colon,
                list,
                closing: self.pos,
                small: true,
            })
        } else {
            self.expect_semi()?;
            if self.tok == Token::Indent {
                let indent = self.expect(Token::Indent)?;
                self.top_scope = Some(scope); // open function scope
                self.open_label_scope();
                let list = self.parse_stmt_list()?;
                self.close_label_scope()?;
                self.close_scope();
                let dedent = self.expect(Token::Dedent)?;
                return Ok(BlockStmt {
                    opening: indent,
                    list,
                    closing: dedent,
                    small: false,
                });
            }
            if !self.allow_empty_block {
                self.error_expected(self.pos, "block")?;
            }
            Ok(BlockStmt {
                opening: self.pos,
                list: Vec::new(),
                closing: self.pos,
                small: false,
            })
        }
    }

    fn parse_block_stmt(&mut self) -> PResult<BlockStmt> {
        if self.tok == Token::Colon {
            let colon = self.expect(Token::Colon)?;
            self.open_scope();
            let list = vec![self.parse_small_stmt()?];
            self.close_scope();
            let pos = self.pos;
            self.expect_semi()?;
            Ok(BlockStmt {
                opening: colon,
                list,
                closing: pos,
                small: true,
            })
        } else {
            self.expect_semi()?;
            if self.tok == Token::Indent {
                let indent = self.expect(Token::Indent)?;
                self.open_scope();
                let list = self.parse_stmt_list()?;
                self.close_scope();
                let dedent = self.expect(Token::Dedent)?;
                return Ok(BlockStmt {
                    opening: indent,
                    list,
                    closing: dedent,
                    small: false,
                });
            }
            if !self.allow_empty_block {
                self.error_expected(self.pos, "block")?;
            }
            Ok(BlockStmt {
                opening: self.pos,
                list: Vec::new(),
                closing: self.pos,
                small: false,
            })
        }
    }

    // ==================== Expressions ====================

    fn parse_func_type_or_lit(&mut self) -> PResult<Expr> {
        let (typ, scope) = self.parse_func_type()?;
        self.expr_lev += 1;
        let body = self.parse_body(scope)?;
        self.expr_lev -= 1;
        // a function type has no body: `a := func()` vs `func a():`
        if !body.small && body.list.is_empty() {
            return Ok(Expr::FuncType(Box::new(typ)));
        }
        Ok(Expr::FuncLit(Box::new(FuncLit { typ, body })))
    }

    // parse_operand may return an expression or a raw type; callers must
    // verify the result. If lhs is set and the result is an identifier, it
    // is not resolved.
    fn parse_operand(&mut self, lhs: bool) -> PResult<Expr> {
        loop {
            match self.tok {
                Token::Semicolon if self.lit == "\n" => {
                    self.next();
                    continue;
                }
                Token::Ident => {
                    let ident = self.parse_ident()?;
                    let x = Expr::Ident(ident);
                    if !lhs {
                        self.resolve(&x);
                    }
                    return Ok(x);
                }
                Token::Int | Token::Float | Token::Imag | Token::Char | Token::String => {
                    let x = Expr::BasicLit(Box::new(BasicLit {
                        pos: self.pos,
                        kind: self.tok,
                        value: self.lit.clone(),
                    }));
                    self.next();
                    return Ok(x);
                }
                Token::Lparen => {
                    let lparen = self.pos;
                    self.next();
                    self.expr_lev += 1;
                    let x = self.parse_rhs_or_type()?; // types may be parenthesized
                    self.expr_lev -= 1;
                    let rparen = self.expect(Token::Rparen)?;
                    return Ok(Expr::Paren(Box::new(ParenExpr { lparen, x, rparen })));
                }
                Token::Func => return self.parse_func_type_or_lit(),
                _ => {}
            }
            break;
        }

        if let Some(typ) = self.try_ident_or_type()? {
            // could be a type for a composite literal or a conversion
            if matches!(typ, Expr::Ident(_)) {
                internal_error!("type cannot be identifier");
            }
            return Ok(typ);
        }

        // we have an error
        let pos = self.pos;
        self.error_expected(pos, "operand")?;
        self.sync_stmt();
        Ok(Expr::Bad(Box::new(BadExpr { from: pos, to: self.pos })))
    }

    fn parse_type_assertion(&mut self, x: Expr) -> PResult<Expr> {
        self.expect(Token::Lparen)?;
        let typ = if self.tok == Token::Type {
            // type switch: typ == None
            self.next();
            None
        } else {
            Some(self.parse_type()?)
        };
        let rparen = self.expect(Token::Rparen)?;
        Ok(Expr::TypeAssert(Box::new(TypeAssertExpr { x, typ, rparen })))
    }

    fn parse_index_or_slice(&mut self, x: Expr) -> PResult<Expr> {
        let lbrack = self.expect(Token::Lbrack)?;
        self.expr_lev += 1;
        let mut low = None;
        let mut high = None;
        let mut is_slice = false;
        if self.tok != Token::Colon {
            low = Some(self.parse_rhs()?);
        }
        if self.tok == Token::Colon {
            is_slice = true;
            self.next();
            if self.tok != Token::Rbrack {
                high = Some(self.parse_rhs()?);
            }
        }
        self.expr_lev -= 1;
        let rbrack = self.expect(Token::Rbrack)?;

        if is_slice {
            return Ok(Expr::Slice(Box::new(SliceExpr {
                x,
                lbrack,
                low,
                high,
                rbrack,
            })));
        }
        let index = match low {
            Some(i) => i,
            None => Expr::Bad(Box::new(BadExpr {
                from: lbrack,
                to: rbrack,
            })),
        };
        Ok(Expr::Index(Box::new(IndexExpr {
            x,
            lbrack,
            index,
            rbrack,
        })))
    }

    fn parse_call_or_conversion(&mut self, fun: Expr) -> PResult<CallExpr> {
        let lparen = self.expect(Token::Lparen)?;
        self.expr_lev += 1;
        let mut args = Vec::new();
        let mut ellipsis = Pos::NONE;
        while self.tok != Token::Rparen && self.tok != Token::Eof && !ellipsis.is_valid() {
            args.push(self.parse_rhs_or_type()?); // builtins may expect a type
            if self.tok == Token::Ellipsis {
                ellipsis = self.pos;
                self.next();
            }
            if !self.at_comma("argument list")? {
                break;
            }
            self.next();
        }
        self.expr_lev -= 1;
        let rparen = self.expect_closing(Token::Rparen, "argument list")?;

        // trailing callback: `f(args) do (params): body` appends a function
        // literal argument
        if self.tok == Token::Do {
            let pos = self.expect(Token::Do)?;
            let scope = self.symbols.new_scope(self.top_scope); // function scope
            let (params, results) = self.parse_signature(scope)?;
            let typ = FuncType {
                pos,
                params,
                results,
            };
            self.expr_lev += 1;
            let body = self.parse_body(scope)?;
            self.expr_lev -= 1;
            args.push(Expr::FuncLit(Box::new(FuncLit { typ, body })));
        }

        Ok(CallExpr {
            fun,
            lparen,
            args,
            ellipsis,
            rparen,
        })
    }

    fn parse_element(&mut self, key_ok: bool) -> PResult<Expr> {
        if self.tok == Token::Lbrace {
            return self.parse_literal_value(None);
        }

        // A key that is an identifier may be a struct field name or a value
        // name; try to resolve but never collect it as unresolved.
        let x = self.parse_expr(key_ok)?;
        let x = self.check_expr(x)?;
        if key_ok {
            if self.tok == Token::Colon {
                let colon = self.pos;
                self.next();
                self.try_resolve(&x, false);
                let value = self.parse_element(false)?;
                return Ok(Expr::KeyValue(Box::new(KeyValueExpr {
                    key: x,
                    colon,
                    value,
                })));
            }
            self.resolve(&x); // not a key
        }
        Ok(x)
    }

    fn parse_element_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = Vec::new();
        while self.tok != Token::Rbrace && self.tok != Token::Eof {
            list.push(self.parse_element(true)?);
            if !self.at_comma("composite literal")? {
                break;
            }
            self.next();
        }
        Ok(list)
    }

    fn parse_literal_value(&mut self, typ: Option<Expr>) -> PResult<Expr> {
        let lbrace = self.expect(Token::Lbrace)?;
        let mut elts = Vec::new();
        self.expr_lev += 1;
        if self.tok != Token::Rbrace {
            elts = self.parse_element_list()?;
        }
        self.expr_lev -= 1;
        let rbrace = self.expect_closing(Token::Rbrace, "composite literal")?;
        Ok(Expr::CompositeLit(Box::new(CompositeLit {
            typ,
            lbrace,
            elts,
            rbrace,
        })))
    }

    // Checks that x is an expression (and not a type).
    fn check_expr(&mut self, x: Expr) -> PResult<Expr> {
        let is_expr = matches!(
            x.unparen(),
            Expr::Bad(_)
                | Expr::Ident(_)
                | Expr::BasicLit(_)
                | Expr::FuncLit(_)
                | Expr::CompositeLit(_)
                | Expr::Selector(_)
                | Expr::Index(_)
                | Expr::Slice(_)
                | Expr::TypeAssert(_)
                | Expr::Call(_)
                | Expr::Star(_)
                | Expr::Unary(_)
                | Expr::Binary(_)
        );
        if is_expr {
            Ok(x)
        } else {
            let (from, to) = (x.pos(), x.end());
            self.error_expected(from, "expression")?;
            Ok(Expr::Bad(Box::new(BadExpr { from, to })))
        }
    }

    // Checks that x is an expression or a type (but not a raw type such as
    // [...]T).
    fn check_expr_or_type(&mut self, x: Expr) -> PResult<Expr> {
        let bad_len = match x.unparen() {
            Expr::ArrayType(a) => match &a.len {
                Some(Expr::Ellipsis(e)) => Some(e.pos),
                _ => None,
            },
            _ => None,
        };
        if let Some(pos) = bad_len {
            let (from, to) = (x.pos(), x.end());
            self.error(pos, "expected array length, found '...'")?;
            return Ok(Expr::Bad(Box::new(BadExpr { from, to })));
        }
        Ok(x)
    }

    // If lhs is set and the result is an identifier, it is not resolved.
    fn parse_primary_expr(&mut self, lhs: bool) -> PResult<Expr> {
        let mut lhs = lhs;
        let mut x = self.parse_operand(lhs)?;
        loop {
            match self.tok {
                Token::Period => {
                    self.next();
                    if lhs {
                        self.resolve(&x);
                    }
                    match self.tok {
                        Token::Ident => {
                            let checked = self.check_expr(x)?;
                            let sel = self.parse_ident()?;
                            x = Expr::Selector(Box::new(SelectorExpr { x: checked, sel }));
                        }
                        Token::Lparen => {
                            let checked = self.check_expr(x)?;
                            x = self.parse_type_assertion(checked)?;
                        }
                        _ => {
                            let pos = self.pos;
                            self.error_expected(pos, "selector or type assertion")?;
                            self.next(); // make progress
                            x = Expr::Bad(Box::new(BadExpr { from: pos, to: self.pos }));
                        }
                    }
                }
                Token::Lbrack => {
                    if lhs {
                        self.resolve(&x);
                    }
                    let checked = self.check_expr(x)?;
                    x = self.parse_index_or_slice(checked)?;
                }
                Token::Lparen => {
                    if lhs {
                        self.resolve(&x);
                    }
                    let checked = self.check_expr_or_type(x)?;
                    x = Expr::Call(Box::new(self.parse_call_or_conversion(checked)?));
                }
                Token::Lbrace => {
                    if x.is_literal_type() && (self.expr_lev >= 0 || !x.is_type_name()) {
                        if lhs {
                            self.resolve(&x);
                        }
                        x = self.parse_literal_value(Some(x))?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
            lhs = false; // no need to try to resolve again
        }
        Ok(x)
    }

    // If lhs is set and the result is an identifier, it is not resolved.
    fn parse_unary_expr(&mut self, lhs: bool) -> PResult<Expr> {
        match self.tok {
            Token::Add | Token::Sub | Token::Not | Token::Xor | Token::And => {
                let (pos, op) = (self.pos, self.tok);
                self.next();
                let x = self.parse_unary_expr(false)?;
                let x = self.check_expr(x)?;
                return Ok(Expr::Unary(Box::new(UnaryExpr { op_pos: pos, op, x })));
            }
            Token::Arrow => {
                // channel type or receive expression
                let arrow = self.pos;
                self.next();

                // <-type must be a channel type; <-expr is a receive.
                // For channel types, re-associate the arrow with the
                // innermost channels.
                let mut x = self.parse_unary_expr(false)?;
                if matches!(x, Expr::ChanType(_)) {
                    let mut arrow_pos = arrow;
                    let mut dir = ChanDir::SEND;
                    let mut node = &mut x;
                    while dir == ChanDir::SEND {
                        let Expr::ChanType(ct) = node else { break };
                        if ct.dir == ChanDir::RECV {
                            // error: (<-type) is (<-(<-chan T))
                            let pos = ct.arrow;
                            self.error_expected(pos, "'chan'")?;
                        }
                        let old_arrow = ct.arrow;
                        ct.begin = arrow_pos;
                        ct.arrow = arrow_pos;
                        arrow_pos = old_arrow;
                        let old_dir = ct.dir;
                        ct.dir = ChanDir::RECV;
                        dir = old_dir;
                        node = &mut ct.value;
                    }
                    if dir == ChanDir::SEND {
                        self.error_expected(arrow_pos, "channel type")?;
                    }
                    return Ok(x);
                }

                // <-(expr)
                let x = self.check_expr(x)?;
                return Ok(Expr::Unary(Box::new(UnaryExpr {
                    op_pos: arrow,
                    op: Token::Arrow,
                    x,
                })));
            }
            Token::Mul => {
                // pointer type or unary "*" expression
                let pos = self.pos;
                self.next();
                let x = self.parse_unary_expr(false)?;
                let x = self.check_expr_or_type(x)?;
                return Ok(Expr::Star(Box::new(StarExpr { star: pos, x })));
            }
            _ => {}
        }
        self.parse_primary_expr(lhs)
    }

    fn tok_prec(&self) -> (Token, i32) {
        let mut tok = self.tok;
        if self.in_rhs && tok == Token::Assign {
            tok = Token::Eql;
        }
        (tok, tok.precedence())
    }

    // If lhs is set and the result is an identifier, it is not resolved.
    fn parse_binary_expr(&mut self, lhs: bool, prec1: i32) -> PResult<Expr> {
        let mut lhs = lhs;
        let mut x = self.parse_unary_expr(lhs)?;
        let (_, mut prec) = self.tok_prec();
        while prec >= prec1 {
            loop {
                let (op, oprec) = self.tok_prec();
                if oprec != prec {
                    break;
                }
                let pos = self.expect(op)?;
                if lhs {
                    self.resolve(&x);
                    lhs = false;
                }
                let y = self.parse_binary_expr(false, prec + 1)?;
                let xc = self.check_expr(x)?;
                let yc = self.check_expr(y)?;
                x = Expr::Binary(Box::new(BinaryExpr {
                    x: xc,
                    op_pos: pos,
                    op,
                    y: yc,
                }));
            }
            prec -= 1;
        }
        Ok(x)
    }

    // The result may be a type or even a raw type ([...]int); callers must
    // check the result.
    fn parse_expr(&mut self, lhs: bool) -> PResult<Expr> {
        self.parse_binary_expr(lhs, LOWEST_PREC + 1)
    }

    fn parse_rhs(&mut self) -> PResult<Expr> {
        let old = self.in_rhs;
        self.in_rhs = true;
        let x = self.parse_expr(false)?;
        let x = self.check_expr(x)?;
        self.in_rhs = old;
        Ok(x)
    }

    fn parse_rhs_or_type(&mut self) -> PResult<Expr> {
        let old = self.in_rhs;
        self.in_rhs = true;
        let x = self.parse_expr(false)?;
        let x = self.check_expr_or_type(x)?;
        self.in_rhs = old;
        Ok(x)
    }

    // ==================== Statements ====================

    // Returns true as second result if it parsed the assignment of a range
    // clause; the right-hand side is then a single unary expression of the
    // form `range x`.
    fn parse_simple_stmt(&mut self, mode: SimpleMode) -> PResult<(Stmt, bool)> {
        let x = self.parse_lhs_list()?;

        match self.tok {
            Token::Define
            | Token::Assign
            | Token::AddAssign
            | Token::SubAssign
            | Token::MulAssign
            | Token::QuoAssign
            | Token::RemAssign
            | Token::AndAssign
            | Token::OrAssign
            | Token::XorAssign
            | Token::ShlAssign
            | Token::ShrAssign
            | Token::AndNotAssign => {
                // assignment statement, possibly part of a range clause
                let (pos, tok) = (self.pos, self.tok);
                self.next();
                let mut is_range = false;
                let rhs = if mode == SimpleMode::RangeOk
                    && self.tok == Token::Range
                    && (tok == Token::Define || tok == Token::Assign)
                {
                    let rpos = self.pos;
                    self.next();
                    is_range = true;
                    vec![Expr::Unary(Box::new(UnaryExpr {
                        op_pos: rpos,
                        op: Token::Range,
                        x: self.parse_rhs()?,
                    }))]
                } else {
                    self.parse_rhs_list()?
                };
                let stmt = AssignStmt {
                    lhs: x,
                    tok_pos: pos,
                    tok,
                    rhs,
                };
                if tok == Token::Define {
                    self.short_var_decl(&stmt.lhs)?;
                }
                return Ok((Stmt::Assign(Box::new(stmt)), is_range));
            }
            _ => {}
        }

        if x.len() > 1 {
            self.error_expected(x[0].pos(), "1 expression")?;
            // continue with first expression
        }

        match self.tok {
            Token::Colon => {
                // labeled statement; the label scope is the function body
                if mode == SimpleMode::LabelOk && matches!(x.first(), Some(Expr::Ident(_))) {
                    let colon = self.pos;
                    self.next();
                    let Some(Expr::Ident(label)) = x.into_iter().next() else {
                        internal_error!("label vanished");
                    };
                    let stmt = LabeledStmt {
                        label: Rc::clone(&label),
                        colon,
                        stmt: self.parse_stmt()?,
                    };
                    if let Some(scope) = self.label_scope {
                        self.declare(DeclRef::LabeledStmt, None, scope, ObjKind::Lbl, &[label])?;
                    }
                    return Ok((Stmt::Labeled(Box::new(stmt)), false));
                }
            }
            Token::Arrow => {
                // send statement
                let arrow = self.pos;
                self.next();
                let value = self.parse_rhs()?;
                let chan = self.take_first(x);
                return Ok((
                    Stmt::Send(Box::new(SendStmt { chan, arrow, value })),
                    false,
                ));
            }
            Token::Inc | Token::Dec => {
                // increment or decrement
                let stmt = IncDecStmt {
                    x: self.take_first(x),
                    tok_pos: self.pos,
                    tok: self.tok,
                };
                self.next();
                return Ok((Stmt::IncDec(Box::new(stmt)), false));
            }
            _ => {}
        }

        // expression
        let x = self.take_first(x);
        Ok((Stmt::Expr(Box::new(ExprStmt { x })), false))
    }

    fn parse_call_expr(&mut self) -> PResult<Option<CallExpr>> {
        let x = self.parse_rhs_or_type()?; // could be a conversion
        match x {
            Expr::Call(call) => Ok(Some(*call)),
            Expr::Bad(_) => Ok(None),
            other => {
                // only report error if it's a new one
                self.error_expected(other.pos(), "function/method call")?;
                Ok(None)
            }
        }
    }

    fn parse_go_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Go)?;
        let call = self.parse_call_expr()?;
        self.expect_semi()?;
        match call {
            Some(call) => Ok(Stmt::Go(Box::new(GoStmt { go_pos: pos, call }))),
            None => Ok(Stmt::Bad(Box::new(BadStmt {
                from: pos,
                to: pos + 2, // len("go")
            }))),
        }
    }

    fn parse_defer_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Defer)?;
        let call = self.parse_call_expr()?;
        self.expect_semi()?;
        match call {
            Some(call) => Ok(Stmt::Defer(Box::new(DeferStmt {
                defer_pos: pos,
                call,
            }))),
            None => Ok(Stmt::Bad(Box::new(BadStmt {
                from: pos,
                to: pos + 5, // len("defer")
            }))),
        }
    }

    fn parse_return_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        self.expect(Token::Return)?;
        let mut results = Vec::new();
        if self.tok != Token::Semicolon && self.tok != Token::Dedent {
            results = self.parse_rhs_list()?;
        }
        self.expect_semi()?;
        Ok(Stmt::Return(Box::new(ReturnStmt {
            return_pos: pos,
            results,
        })))
    }

    fn parse_branch_stmt(&mut self, tok: Token) -> PResult<Stmt> {
        let pos = self.expect(tok)?;
        let mut label = None;
        if tok != Token::Fallthrough && self.tok == Token::Ident {
            let ident = self.parse_ident()?;
            // add to the list of unresolved targets
            if let Some(targets) = self.target_stack.last_mut() {
                targets.push(Rc::clone(&ident));
            }
            label = Some(ident);
        }
        self.expect_semi()?;
        Ok(Stmt::Branch(Box::new(BranchStmt {
            tok_pos: pos,
            tok,
            label,
        })))
    }

    fn make_expr(&mut self, s: Stmt) -> PResult<Expr> {
        if let Stmt::Expr(es) = s {
            return self.check_expr(es.x);
        }
        let (from, to) = (s.pos(), s.end());
        self.error(from, "expected condition, found simple statement")?;
        Ok(Expr::Bad(Box::new(BadExpr { from, to })))
    }

    fn make_expr_opt(&mut self, s: Option<Stmt>) -> PResult<Option<Expr>> {
        match s {
            Some(s) => Ok(Some(self.make_expr(s)?)),
            None => Ok(None),
        }
    }

    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::If)?;
        self.open_scope();

        let mut init = None;
        let cond;
        {
            let prev_lev = self.expr_lev;
            self.expr_lev = -1;
            if self.tok == Token::Semicolon && !self.is_indent() {
                cond = self.parse_rhs()?;
            } else {
                let (s, _) = self.parse_simple_stmt(SimpleMode::Basic)?;
                if self.tok == Token::Semicolon && !self.is_indent() {
                    self.next();
                    init = Some(s);
                    cond = self.parse_rhs()?;
                } else {
                    cond = self.make_expr(s)?;
                }
            }
            self.expr_lev = prev_lev;
        }

        let body = self.parse_block_stmt()?;
        let mut else_branch = None;
        if self.tok == Token::Else {
            self.next();
            else_branch = Some(self.parse_stmt()?);
        }
        self.close_scope();
        Ok(Stmt::If(Box::new(IfStmt {
            if_pos: pos,
            init,
            cond,
            body,
            else_branch,
        })))
    }

    fn parse_type_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.parse_type()?];
        while self.tok == Token::Comma {
            self.next();
            list.push(self.parse_type()?);
        }
        Ok(list)
    }

    fn parse_case_clause(&mut self, type_switch: bool) -> PResult<Stmt> {
        let pos = self.pos;
        let mut list = Vec::new();
        if self.tok == Token::Case {
            self.next();
            if type_switch {
                list = self.parse_type_list()?;
            } else {
                list = self.parse_rhs_list()?;
            }
        } else {
            self.expect(Token::Default)?;
        }
        let colon = self.expect(Token::Colon)?;
        self.open_scope();
        self.allow_empty_block = true;
        let body = self.parse_stmt_list()?;
        self.allow_empty_block = false;
        self.close_scope();
        Ok(Stmt::Case(Box::new(CaseClause {
            case_pos: pos,
            list,
            colon,
            body,
        })))
    }

    fn parse_switch_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Switch)?;
        self.open_scope();

        let mut s1 = None;
        let mut s2 = None;
        let mut extra_scope = false;

        if !self.is_indent() {
            let prev_lev = self.expr_lev;
            self.expr_lev = -1;
            if self.tok != Token::Semicolon {
                s2 = Some(self.parse_simple_stmt(SimpleMode::Basic)?.0);
            }
            if self.tok == Token::Semicolon && !self.is_indent() {
                self.next();
                s1 = s2.take();
                if self.tok != Token::Semicolon && !self.is_indent() {
                    // A TypeSwitchGuard may declare an extra variable;
                    // introduce an extra scope to avoid spurious
                    // redeclaration errors.
                    self.open_scope();
                    extra_scope = true;
                    s2 = Some(self.parse_simple_stmt(SimpleMode::Basic)?.0);
                }
            }
            self.expr_lev = prev_lev;
        }

        let type_switch = s2.as_ref().is_some_and(is_type_switch_guard);
        self.expect_semi()?;
        let indent = self.expect(Token::Indent)?;
        let mut list = Vec::new();
        while self.tok == Token::Case || self.tok == Token::Default {
            list.push(self.parse_case_clause(type_switch)?);
        }
        let dedent = self.expect(Token::Dedent)?;
        let body = BlockStmt {
            opening: indent,
            list,
            closing: dedent,
            small: false,
        };

        let result = match (type_switch, s2) {
            (true, Some(assign)) => Stmt::TypeSwitch(Box::new(TypeSwitchStmt {
                switch_pos: pos,
                init: s1,
                assign,
                body,
            })),
            (_, s2) => {
                let tag = self.make_expr_opt(s2)?;
                Stmt::Switch(Box::new(SwitchStmt {
                    switch_pos: pos,
                    init: s1,
                    tag,
                    body,
                }))
            }
        };

        if extra_scope {
            self.close_scope();
        }
        self.close_scope();
        Ok(result)
    }

    fn parse_comm_clause(&mut self) -> PResult<Stmt> {
        self.open_scope();
        let pos = self.pos;
        let mut comm = None;
        if self.tok == Token::Case {
            self.next();
            let mut lhs = self.parse_lhs_list()?;
            if self.tok == Token::Arrow {
                // SendStmt
                if lhs.len() > 1 {
                    self.error_expected(lhs[0].pos(), "1 expression")?;
                    // continue with first expression
                }
                let arrow = self.pos;
                self.next();
                let value = self.parse_rhs()?;
                let chan = self.take_first(lhs);
                comm = Some(Stmt::Send(Box::new(SendStmt { chan, arrow, value })));
            } else {
                let tok = self.tok;
                if tok == Token::Assign || tok == Token::Define {
                    // RecvStmt with assignment
                    if lhs.len() > 2 {
                        self.error_expected(lhs[0].pos(), "1 or 2 expressions")?;
                        // continue with first two expressions
                        lhs.truncate(2);
                    }
                    let tok_pos = self.pos;
                    self.next();
                    let rhs = self.parse_rhs()?;
                    let stmt = AssignStmt {
                        lhs,
                        tok_pos,
                        tok,
                        rhs: vec![rhs],
                    };
                    if tok == Token::Define {
                        self.short_var_decl(&stmt.lhs)?;
                    }
                    comm = Some(Stmt::Assign(Box::new(stmt)));
                } else {
                    // lhs must be a single receive operation
                    if lhs.len() > 1 {
                        self.error_expected(lhs[0].pos(), "1 expression")?;
                    }
                    let x = self.take_first(lhs);
                    comm = Some(Stmt::Expr(Box::new(ExprStmt { x })));
                }
            }
        } else {
            self.expect(Token::Default)?;
        }
        let colon = self.expect(Token::Colon)?;
        self.allow_empty_block = true;
        let body = self.parse_stmt_list()?;
        self.allow_empty_block = false;
        self.close_scope();
        Ok(Stmt::Comm(Box::new(CommClause {
            case_pos: pos,
            comm,
            colon,
            body,
        })))
    }

    fn parse_select_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Select)?;
        self.expect_semi()?;
        let indent = self.expect(Token::Indent)?;
        let mut list = Vec::new();
        while self.tok == Token::Case || self.tok == Token::Default {
            list.push(self.parse_comm_clause()?);
        }
        let dedent = self.expect(Token::Dedent)?;
        self.expect_semi()?;
        let body = BlockStmt {
            opening: indent,
            list,
            closing: dedent,
            small: false,
        };
        Ok(Stmt::Select(Box::new(SelectStmt {
            select_pos: pos,
            body,
        })))
    }

    fn parse_for_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::For)?;
        self.open_scope();

        let mut s1 = None;
        let mut s2 = None;
        let mut s3 = None;
        let mut is_range = false;
        if !self.is_indent() && self.tok != Token::Colon {
            let prev_lev = self.expr_lev;
            self.expr_lev = -1;
            if self.tok != Token::Semicolon {
                let (s, r) = self.parse_simple_stmt(SimpleMode::RangeOk)?;
                s2 = Some(s);
                is_range = r;
            }
            if !is_range && self.tok == Token::Semicolon && !self.is_indent() {
                self.next();
                s1 = s2.take();
                if self.tok != Token::Semicolon && !self.is_indent() {
                    s2 = Some(self.parse_simple_stmt(SimpleMode::Basic)?.0);
                }
                self.expect_semi()?;
                if !self.is_indent() {
                    s3 = Some(self.parse_simple_stmt(SimpleMode::Basic)?.0);
                }
            }
            self.expr_lev = prev_lev;
        }

        let body = self.parse_block_stmt()?;

        let result = if is_range {
            let Some(Stmt::Assign(assign)) = s2 else {
                internal_error!("range clause without assignment");
            };
            let AssignStmt {
                mut lhs,
                tok_pos,
                tok,
                mut rhs,
            } = *assign;
            let (key, value) = match lhs.len() {
                2 => {
                    let value = lhs.pop();
                    let key = lhs.pop();
                    (key, value)
                }
                1 => (lhs.pop(), None),
                _ => {
                    let epos = lhs.first().map_or(pos, Node::pos);
                    self.error_expected(epos, "1 or 2 expressions")?;
                    self.close_scope();
                    return Ok(Stmt::Bad(Box::new(BadStmt {
                        from: pos,
                        to: body.end(),
                    })));
                }
            };
            // the right-hand side is a single `range x` unary expression
            let x = match rhs.pop() {
                Some(Expr::Unary(u)) if u.op == Token::Range => u.x,
                _ => internal_error!("range clause lost its operand"),
            };
            Stmt::Range(Box::new(RangeStmt {
                for_pos: pos,
                key,
                value,
                tok_pos,
                tok,
                x,
                body,
            }))
        } else {
            // regular for statement
            let cond = self.make_expr_opt(s2)?;
            Stmt::For(Box::new(ForStmt {
                for_pos: pos,
                init: s1,
                cond,
                post: s3,
                body,
            }))
        };
        self.close_scope();
        Ok(result)
    }

    fn parse_small_stmt(&mut self) -> PResult<Stmt> {
        match self.tok {
            Token::Const | Token::Type | Token::Var => {
                let decl = self.parse_decl_stmt()?;
                Ok(Stmt::Decl(Box::new(decl)))
            }
            // tokens that may start an expression
            Token::Ident
            | Token::Int
            | Token::Float
            | Token::Imag
            | Token::Char
            | Token::String
            | Token::Func
            | Token::Lparen
            | Token::Lbrack
            | Token::Struct
            | Token::Add
            | Token::Sub
            | Token::Mul
            | Token::And
            | Token::Xor
            | Token::Arrow
            | Token::Not => Ok(self.parse_simple_stmt(SimpleMode::Basic)?.0),
            Token::Return => self.parse_return_stmt(),
            Token::Break | Token::Continue | Token::Goto | Token::Fallthrough => {
                let tok = self.tok;
                self.parse_branch_stmt(tok)
            }
            Token::Semicolon => {
                // allow empty statements
                Ok(Stmt::Empty(Box::new(EmptyStmt {
                    semicolon: self.pos,
                })))
            }
            _ => {
                // no statement found
                let pos = self.pos;
                self.error_expected(pos, "small statement")?;
                self.sync_stmt();
                Ok(Stmt::Bad(Box::new(BadStmt { from: pos, to: self.pos })))
            }
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        self.trace_begin("Statement");
        let result = self.parse_stmt0();
        self.trace_end();
        result
    }

    fn parse_stmt0(&mut self) -> PResult<Stmt> {
        match self.tok {
            Token::Const | Token::Type | Token::Var => {
                let decl = self.parse_decl_stmt()?;
                Ok(Stmt::Decl(Box::new(decl)))
            }
            // tokens that may start an expression
            Token::Ident
            | Token::Int
            | Token::Float
            | Token::Imag
            | Token::Char
            | Token::String
            | Token::Func
            | Token::Lparen
            | Token::Lbrack
            | Token::Struct
            | Token::Add
            | Token::Sub
            | Token::Mul
            | Token::And
            | Token::Xor
            | Token::Arrow
            | Token::Not => {
                let (s, _) = self.parse_simple_stmt(SimpleMode::LabelOk)?;
                // labeled statements consume their own terminator through
                // the nested statement
                if !matches!(s, Stmt::Labeled(_)) {
                    self.expect_semi()?;
                }
                Ok(s)
            }
            Token::Go => self.parse_go_stmt(),
            Token::Defer => self.parse_defer_stmt(),
            Token::Return => self.parse_return_stmt(),
            Token::Break | Token::Continue | Token::Goto | Token::Fallthrough => {
                let tok = self.tok;
                self.parse_branch_stmt(tok)
            }
            Token::If => self.parse_if_stmt(),
            Token::Switch => self.parse_switch_stmt(),
            Token::Select => self.parse_select_stmt(),
            Token::For => self.parse_for_stmt(),
            Token::Do => {
                self.next();
                Ok(Stmt::Block(Box::new(self.parse_block_stmt()?)))
            }
            Token::Semicolon => {
                if self.lit == "\n" {
                    Ok(Stmt::Block(Box::new(self.parse_block_stmt()?)))
                } else {
                    let s = Stmt::Empty(Box::new(EmptyStmt {
                        semicolon: self.pos,
                    }));
                    self.next();
                    Ok(s)
                }
            }
            Token::Colon => Ok(Stmt::Block(Box::new(self.parse_block_stmt()?))),
            Token::Dedent => {
                // a semicolon may be omitted before a closing dedent
                Ok(Stmt::Empty(Box::new(EmptyStmt {
                    semicolon: self.pos,
                })))
            }
            _ => {
                // no statement found
                let pos = self.pos;
                self.error_expected(pos, "statement")?;
                self.sync_stmt();
                Ok(Stmt::Bad(Box::new(BadStmt { from: pos, to: self.pos })))
            }
        }
    }

    // ==================== Declarations ====================

    fn parse_import_spec(&mut self, doc: Option<Rc<CommentGroup>>) -> PResult<crate::ast::Spec> {
        let mut name = None;
        match self.tok {
            Token::Period => {
                name = Some(Ident::new(self.pos, "."));
                self.next();
            }
            Token::Ident => {
                name = Some(self.parse_ident()?);
            }
            _ => {}
        }

        let path = if self.tok == Token::String {
            if !is_valid_import(&self.lit) {
                let pos = self.pos;
                let lit = self.lit.clone();
                self.error(pos, format!("invalid import path: {lit}"))?;
            }
            let path = BasicLit {
                pos: self.pos,
                kind: self.tok,
                value: self.lit.clone(),
            };
            self.next();
            path
        } else {
            let pos = self.pos;
            self.expect(Token::String)?; // use expect() error handling
            BasicLit {
                pos,
                kind: Token::String,
                value: String::new(),
            }
        };
        if self.tok == Token::Semicolon {
            self.expect_semi()?; // call before accessing line_comment
        }

        let spec = Rc::new(ImportSpec {
            doc,
            name,
            path,
            comment: self.line_comment.take(),
        });
        self.imports.push(Rc::clone(&spec));
        Ok(crate::ast::Spec::Import(spec))
    }

    fn parse_value_spec(
        &mut self,
        doc: Option<Rc<CommentGroup>>,
        keyword: Token,
        iota: i32,
    ) -> PResult<crate::ast::Spec> {
        let names = self.parse_ident_list()?;
        let typ = self.try_type()?;
        let mut values = Vec::new();
        if self.tok == Token::Assign
            || keyword == Token::Const && (typ.is_some() || iota == 0)
            || keyword == Token::Var && typ.is_none()
        {
            self.expect(Token::Assign)?;
            values = self.parse_rhs_list()?;
        }
        if self.tok == Token::Semicolon {
            self.expect_semi()?; // call before accessing line_comment
        }
        let comment = self.line_comment.take();

        // The scope of a value identifier declared inside a function begins
        // after the spec; global identifiers are re-resolved after parsing.
        let kind = if keyword == Token::Var {
            ObjKind::Var
        } else {
            ObjKind::Con
        };
        let iota_data = if keyword == Token::Const {
            Some(iota)
        } else {
            None
        };
        let scope = self.current_scope();
        self.declare(DeclRef::ValueSpec, iota_data, scope, kind, &names)?;

        Ok(crate::ast::Spec::Value(Box::new(ValueSpec {
            doc,
            names,
            typ,
            values,
            comment,
        })))
    }

    fn parse_type_spec(&mut self, doc: Option<Rc<CommentGroup>>) -> PResult<crate::ast::Spec> {
        let name = self.parse_ident()?;

        // The type name is in scope while its own definition is parsed, so
        // recursive types resolve.
        let scope = self.current_scope();
        self.declare(
            DeclRef::TypeSpec,
            None,
            scope,
            ObjKind::Typ,
            std::slice::from_ref(&name),
        )?;

        let typ = self.parse_type()?;
        self.expect_semi()?; // call before accessing line_comment
        let comment = self.line_comment.take();

        Ok(crate::ast::Spec::Type(Box::new(TypeSpec {
            doc,
            name,
            typ,
            comment,
        })))
    }

    fn parse_spec(
        &mut self,
        doc: Option<Rc<CommentGroup>>,
        keyword: Token,
        iota: i32,
        kind: SpecKind,
    ) -> PResult<crate::ast::Spec> {
        match kind {
            SpecKind::Import => self.parse_import_spec(doc),
            SpecKind::Value => self.parse_value_spec(doc, keyword, iota),
            SpecKind::Type => self.parse_type_spec(doc),
        }
    }

    fn parse_gen_decl(&mut self, keyword: Token, kind: SpecKind) -> PResult<Decl> {
        let doc = self.lead_comment.take();
        let pos = self.expect(keyword)?;
        let mut indent = Pos::NONE;
        let mut dedent = Pos::NONE;
        let mut specs = Vec::new();

        if self.tok == Token::Semicolon {
            // grouped form
            self.expect_semi()?;
            indent = self.expect(Token::Indent)?;
            let mut iota = 0;
            while self.tok != Token::Dedent && self.tok != Token::Eof {
                let spec_doc = self.lead_comment.take();
                specs.push(self.parse_spec(spec_doc, keyword, iota, kind)?);
                iota += 1;
            }
            dedent = self.expect(Token::Dedent)?;
        } else {
            specs.push(self.parse_spec(None, keyword, 0, kind)?);
        }

        Ok(Decl::Gen(Box::new(GenDecl {
            doc,
            tok_pos: pos,
            tok: keyword,
            indent,
            specs,
            dedent,
        })))
    }

    fn parse_receiver(&mut self, typ: Expr, scope: ScopeId) -> PResult<Field> {
        let ident = Ident::new(Pos::NONE, "self");
        let field = Field {
            doc: None,
            names: vec![Rc::clone(&ident)],
            typ,
            tag: None,
            comment: None,
        };
        self.declare(DeclRef::Field, None, scope, ObjKind::Var, &[ident])?;
        if matches!(field.typ, Expr::Ident(_)) {
            self.resolve(&field.typ);
        }
        Ok(field)
    }

    fn parse_func_decl(&mut self) -> PResult<Decl> {
        let doc = self.lead_comment.take();
        let pos = self.expect(Token::Func)?;
        let scope = self.symbols.new_scope(self.top_scope); // function scope

        let mut recv = None;
        let ident;
        let recv_open = self.pos;

        if self.tok == Token::Mul {
            // *T.ident
            let star = self.expect(Token::Mul)?;
            let typ = self.parse_ident()?;
            let expr = Expr::Star(Box::new(StarExpr {
                star,
                x: Expr::Ident(typ),
            }));
            recv = Some(self.parse_receiver(expr, scope)?);
            self.expect(Token::Period)?;
            ident = self.parse_ident()?;
        } else {
            let first = self.parse_ident()?;
            if self.tok == Token::Period {
                // T.ident
                recv = Some(self.parse_receiver(Expr::Ident(Rc::clone(&first)), scope)?);
                self.next();
                ident = self.parse_ident()?;
            } else {
                ident = first;
            }
        }

        let recv_list = recv.map(|field| FieldList {
            opening: recv_open,
            list: vec![field],
            closing: self.pos,
        });

        let (params, results) = self.parse_signature(scope)?;
        let body = self.parse_body(scope)?;

        let is_method = recv_list.is_some();
        let decl = FuncDecl {
            doc,
            recv: recv_list,
            name: Rc::clone(&ident),
            typ: FuncType {
                pos,
                params,
                results,
            },
            body: Some(body),
        };
        if !is_method && ident.name != "init" {
            // functions (but not methods) are declared in the package
            // scope; init functions cannot be referred to
            let pkg = match self.pkg_scope {
                Some(s) => s,
                None => internal_error!("no package scope"),
            };
            self.declare(DeclRef::FuncDecl, None, pkg, ObjKind::Fun, &[ident])?;
        }
        Ok(Decl::Func(Box::new(decl)))
    }

    fn parse_decl_stmt(&mut self) -> PResult<Decl> {
        self.parse_decl(false)
    }

    fn parse_decl(&mut self, top_level: bool) -> PResult<Decl> {
        self.trace_begin("Declaration");
        let result = self.parse_decl0(top_level);
        self.trace_end();
        result
    }

    fn parse_decl0(&mut self, top_level: bool) -> PResult<Decl> {
        let kind = match self.tok {
            Token::Const | Token::Var => SpecKind::Value,
            Token::Type => SpecKind::Type,
            Token::Func => return self.parse_func_decl(),
            _ => {
                let pos = self.pos;
                self.error_expected(pos, "declaration")?;
                if top_level {
                    self.sync_decl();
                } else {
                    self.sync_stmt();
                }
                return Ok(Decl::Bad(Box::new(BadDecl { from: pos, to: self.pos })));
            }
        };
        self.parse_gen_decl(self.tok, kind)
    }

    // ==================== Source files ====================

    fn parse_file_node(&mut self) -> PResult<Option<File>> {
        self.trace_begin("File");
        let result = self.parse_file_node0();
        self.trace_end();
        result
    }

    fn parse_file_node0(&mut self) -> PResult<Option<File>> {
        // Don't bother parsing the rest if scanning the first token failed;
        // likely not a source file at all.
        if !self.errors.borrow().is_empty() {
            return Ok(None);
        }

        // package clause; the package name does not appear in any scope
        let doc = self.lead_comment.take();
        let package = self.expect(Token::Package)?;
        let name = self.parse_ident()?;
        if name.name == "_" {
            let pos = self.pos;
            self.error(pos, "invalid package name _")?;
        }
        self.expect_semi()?;

        if !self.errors.borrow().is_empty() {
            return Ok(None);
        }

        self.open_scope();
        self.pkg_scope = self.top_scope;
        let mut decls = Vec::new();
        if !self.mode.contains(Mode::PACKAGE_CLAUSE_ONLY) {
            // import decls
            while self.tok == Token::Import {
                decls.push(self.parse_gen_decl(Token::Import, SpecKind::Import)?);
            }
            if !self.mode.contains(Mode::IMPORTS_ONLY) {
                // rest of package body
                while self.tok != Token::Eof {
                    decls.push(self.parse_decl(true)?);
                }
            }
        }
        self.close_scope();
        if self.top_scope.is_some() {
            internal_error!("unbalanced scopes");
        }
        if self.label_scope.is_some() {
            internal_error!("unbalanced label scopes");
        }

        // resolve global identifiers within the same file
        let pkg_scope = match self.pkg_scope {
            Some(s) => s,
            None => internal_error!("no package scope"),
        };
        let mut still_unresolved = Vec::new();
        for ident in std::mem::take(&mut self.unresolved) {
            debug_assert_eq!(ident.obj.get(), ObjRef::Unresolved, "object already resolved");
            match self.symbols.lookup(pkg_scope, &ident.name) {
                Some(obj) => ident.obj.set(ObjRef::Obj(obj)),
                None => still_unresolved.push(ident),
            }
        }

        Ok(Some(File {
            doc,
            package,
            name,
            decls,
            scope: pkg_scope,
            symbols: std::mem::take(&mut self.symbols),
            imports: std::mem::take(&mut self.imports),
            unresolved: still_unresolved,
            comments: std::mem::take(&mut self.comments),
        }))
    }
}

fn is_type_switch_assert(x: &Expr) -> bool {
    matches!(x, Expr::TypeAssert(a) if a.typ.is_none())
}

fn is_type_switch_guard(s: &Stmt) -> bool {
    match s {
        // x.(type)
        Stmt::Expr(es) => is_type_switch_assert(&es.x),
        // v := x.(type)
        Stmt::Assign(a) => {
            a.lhs.len() == 1
                && a.tok == Token::Define
                && a.rhs.len() == 1
                && is_type_switch_assert(&a.rhs[0])
        }
        _ => false,
    }
}

fn is_valid_import(lit: &str) -> bool {
    const ILLEGAL: &str = "!\"#$%&'()*,:;<=>?[\\]^{|}`\u{FFFD}";
    let s = lit
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| lit.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(lit);
    if s.is_empty() {
        return false;
    }
    for r in s.chars() {
        if r.is_whitespace() || r.is_control() || ILLEGAL.contains(r) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Option<File>, ErrorList) {
        let fset = FileSet::new();
        parse_file(&fset, "test.ing", src, Mode::PARSE_COMMENTS | Mode::DECLARATION_ERRORS)
    }

    fn parse_ok(src: &str) -> File {
        let (file, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected errors: {errors}");
        file.expect("no file produced")
    }

    #[test]
    fn package_clause() {
        let f = parse_ok("package main\n");
        assert_eq!(f.name.name, "main");
        assert!(f.decls.is_empty());
    }

    #[test]
    fn short_form_if() {
        let f = parse_ok("package main\n\nfunc f(x int) int\n\tif x > 0: return 1\n\treturn 0\n");
        let Decl::Func(d) = &f.decls[0] else { panic!("want func decl") };
        let body = d.body.as_ref().expect("body");
        let Stmt::If(s) = &body.list[0] else { panic!("want if stmt") };
        assert!(s.body.small);
        assert_eq!(s.body.list.len(), 1);
        assert!(matches!(s.body.list[0], Stmt::Return(_)));
        assert!(s.else_branch.is_none());
    }

    #[test]
    fn do_sugar_appends_func_lit() {
        let f = parse_ok("package main\n\nfunc g()\n\tf(1, 2) do (x int): return x * 2\n");
        let Decl::Func(d) = &f.decls[0] else { panic!("want func decl") };
        let body = d.body.as_ref().expect("body");
        let Stmt::Expr(es) = &body.list[0] else { panic!("want expr stmt") };
        let Expr::Call(call) = &es.x else { panic!("want call") };
        assert_eq!(call.args.len(), 3);
        assert!(matches!(call.args[2], Expr::FuncLit(_)));
    }

    #[test]
    fn method_receiver_declares_self() {
        let f = parse_ok("package main\n\nfunc MyType.foo(n int) int: return n\n");
        let Decl::Func(d) = &f.decls[0] else { panic!("want func decl") };
        let recv = d.recv.as_ref().expect("receiver");
        assert_eq!(recv.list[0].names[0].name, "self");
        let Expr::Ident(t) = &recv.list[0].typ else { panic!("want ident receiver type") };
        assert_eq!(t.name, "MyType");
    }

    #[test]
    fn redeclaration_reports_previous_position() {
        let (_, errors) = parse("package main\n\nfunc f()\n\tvar x int\n\tvar x string\n");
        assert_eq!(errors.len(), 1);
        let err = errors.iter().next().expect("one error");
        assert!(err.msg.contains("x redeclared in this block"));
        assert!(err.msg.contains("previous declaration at"));
    }

    #[test]
    fn error_cap_bails_out() {
        let mut src = String::from("package main\n\n");
        for _ in 0..50 {
            src.push_str("var 1\n");
        }
        let (file, errors) = parse(&src);
        assert!(file.is_none());
        assert!(!errors.is_empty());
        assert!(errors.len() <= 11);
    }

    #[test]
    fn unresolved_collects_externals() {
        let f = parse_ok("package main\n\nfunc f() int: return undefined1 + undefined2\n");
        let names: Vec<&str> = f.unresolved.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"undefined1"));
        assert!(names.contains(&"undefined2"));
    }

    #[test]
    fn package_level_resolution() {
        let f = parse_ok("package main\n\nfunc helper() int: return 1\n\nfunc main()\n\tx := helper()\n\t_ = x\n");
        // helper resolves at end of file against the package scope
        assert!(!f.unresolved.iter().any(|i| i.name == "helper"));
    }

    #[test]
    fn imports_collected() {
        let f = parse_ok("package main\n\nimport \"fmt\"\nimport io \"io\"\n");
        assert_eq!(f.imports.len(), 2);
        assert_eq!(f.imports[0].path_value(), "fmt");
        assert_eq!(f.imports[1].name.as_ref().map(|n| n.name.as_str()), Some("io"));
    }

    #[test]
    fn package_clause_only_mode() {
        let fset = FileSet::new();
        let (file, errors) = parse_file(
            &fset,
            "t.ing",
            "package main\n\nfunc f():\n",
            Mode::PACKAGE_CLAUSE_ONLY,
        );
        assert!(errors.is_empty(), "{errors}");
        let f = file.expect("file");
        assert_eq!(f.name.name, "main");
        assert!(f.decls.is_empty());
    }

    #[test]
    fn imports_only_mode() {
        let fset = FileSet::new();
        let (file, errors) = parse_file(
            &fset,
            "t.ing",
            "package main\n\nimport \"fmt\"\n\nfunc f():\n",
            Mode::IMPORTS_ONLY,
        );
        assert!(errors.is_empty(), "{errors}");
        let f = file.expect("file");
        assert_eq!(f.imports.len(), 1);
        assert_eq!(f.decls.len(), 1);
    }

    #[test]
    fn comments_in_source_order() {
        let f = parse_ok("package main\n\n// one\nfunc a():\n\n// two\nfunc b():\n");
        let mut last = Pos::NONE;
        for g in &f.comments {
            assert!(g.pos() > last);
            last = g.pos();
        }
        assert_eq!(f.comments.len(), 2);
        // lead comments attach as doc comments
        let Decl::Func(d) = &f.decls[0] else { panic!("want func") };
        assert_eq!(d.doc.as_ref().map(|d| d.text()), Some("one\n".to_string()));
    }
}
