//! Statement nodes

use std::rc::Rc;

use super::{CallExpr, Decl, Expr, Ident, Node};
use crate::token::{Pos, Token};

/// A placeholder for a syntactically bad statement
#[derive(Debug)]
pub struct BadStmt {
    pub from: Pos,
    pub to: Pos,
}

/// An empty statement (an explicit or implicit semicolon)
#[derive(Debug)]
pub struct EmptyStmt {
    pub semicolon: Pos,
}

/// `label: stmt`
#[derive(Debug)]
pub struct LabeledStmt {
    pub label: Rc<Ident>,
    pub colon: Pos,
    pub stmt: Stmt,
}

/// A standalone expression in statement position
#[derive(Debug)]
pub struct ExprStmt {
    pub x: Expr,
}

/// `chan <- value`
#[derive(Debug)]
pub struct SendStmt {
    pub chan: Expr,
    pub arrow: Pos,
    pub value: Expr,
}

/// `x++` or `x--`
#[derive(Debug)]
pub struct IncDecStmt {
    pub x: Expr,
    pub tok_pos: Pos,
    pub tok: Token,
}

/// An assignment or short variable declaration
#[derive(Debug)]
pub struct AssignStmt {
    pub lhs: Vec<Expr>,
    pub tok_pos: Pos,
    pub tok: Token,
    pub rhs: Vec<Expr>,
}

/// `go call(...)`
#[derive(Debug)]
pub struct GoStmt {
    pub go_pos: Pos,
    pub call: CallExpr,
}

/// `defer call(...)`
#[derive(Debug)]
pub struct DeferStmt {
    pub defer_pos: Pos,
    pub call: CallExpr,
}

/// `return results...`
#[derive(Debug)]
pub struct ReturnStmt {
    pub return_pos: Pos,
    pub results: Vec<Expr>,
}

/// `break`, `continue`, `goto` or `fallthrough`
#[derive(Debug)]
pub struct BranchStmt {
    pub tok_pos: Pos,
    pub tok: Token,
    pub label: Option<Rc<Ident>>,
}

/// A block. `small` is true when the body was written in the short
/// colon-prefixed form; printers may use this as a hint but it never alters
/// semantics.
#[derive(Debug)]
pub struct BlockStmt {
    pub opening: Pos,
    pub list: Vec<Stmt>,
    pub closing: Pos,
    pub small: bool,
}

/// `if init; cond body else ...`
#[derive(Debug)]
pub struct IfStmt {
    pub if_pos: Pos,
    pub init: Option<Stmt>,
    pub cond: Expr,
    pub body: BlockStmt,
    pub else_branch: Option<Stmt>,
}

/// One `case`/`default` clause of an expression or type switch
#[derive(Debug)]
pub struct CaseClause {
    pub case_pos: Pos,
    pub list: Vec<Expr>,
    pub colon: Pos,
    pub body: Vec<Stmt>,
}

/// An expression switch
#[derive(Debug)]
pub struct SwitchStmt {
    pub switch_pos: Pos,
    pub init: Option<Stmt>,
    pub tag: Option<Expr>,
    pub body: BlockStmt,
}

/// A type switch; `assign` is the `x.(type)` expression or `v := x.(type)`
#[derive(Debug)]
pub struct TypeSwitchStmt {
    pub switch_pos: Pos,
    pub init: Option<Stmt>,
    pub assign: Stmt,
    pub body: BlockStmt,
}

/// One communication clause of a `select`
#[derive(Debug)]
pub struct CommClause {
    pub case_pos: Pos,
    pub comm: Option<Stmt>,
    pub colon: Pos,
    pub body: Vec<Stmt>,
}

/// `select` statement
#[derive(Debug)]
pub struct SelectStmt {
    pub select_pos: Pos,
    pub body: BlockStmt,
}

/// A `for` loop with optional init/cond/post
#[derive(Debug)]
pub struct ForStmt {
    pub for_pos: Pos,
    pub init: Option<Stmt>,
    pub cond: Option<Expr>,
    pub post: Option<Stmt>,
    pub body: BlockStmt,
}

/// `for key, value := range x`
#[derive(Debug)]
pub struct RangeStmt {
    pub for_pos: Pos,
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    pub tok_pos: Pos,
    pub tok: Token,
    pub x: Expr,
    pub body: BlockStmt,
}

/// A statement node
#[derive(Debug)]
pub enum Stmt {
    Bad(Box<BadStmt>),
    Decl(Box<Decl>),
    Empty(Box<EmptyStmt>),
    Labeled(Box<LabeledStmt>),
    Expr(Box<ExprStmt>),
    Send(Box<SendStmt>),
    IncDec(Box<IncDecStmt>),
    Assign(Box<AssignStmt>),
    Go(Box<GoStmt>),
    Defer(Box<DeferStmt>),
    Return(Box<ReturnStmt>),
    Branch(Box<BranchStmt>),
    Block(Box<BlockStmt>),
    If(Box<IfStmt>),
    Case(Box<CaseClause>),
    Switch(Box<SwitchStmt>),
    TypeSwitch(Box<TypeSwitchStmt>),
    Comm(Box<CommClause>),
    Select(Box<SelectStmt>),
    For(Box<ForStmt>),
    Range(Box<RangeStmt>),
}

impl Node for BlockStmt {
    fn pos(&self) -> Pos {
        self.opening
    }

    fn end(&self) -> Pos {
        if self.closing.is_valid() {
            self.closing + 1
        } else {
            self.list.last().map_or(self.opening, Node::end)
        }
    }
}

impl Node for Stmt {
    fn pos(&self) -> Pos {
        match self {
            Stmt::Bad(s) => s.from,
            Stmt::Decl(s) => s.pos(),
            Stmt::Empty(s) => s.semicolon,
            Stmt::Labeled(s) => s.label.pos,
            Stmt::Expr(s) => s.x.pos(),
            Stmt::Send(s) => s.chan.pos(),
            Stmt::IncDec(s) => s.x.pos(),
            Stmt::Assign(s) => s.lhs.first().map_or(s.tok_pos, Node::pos),
            Stmt::Go(s) => s.go_pos,
            Stmt::Defer(s) => s.defer_pos,
            Stmt::Return(s) => s.return_pos,
            Stmt::Branch(s) => s.tok_pos,
            Stmt::Block(s) => s.pos(),
            Stmt::If(s) => s.if_pos,
            Stmt::Case(s) => s.case_pos,
            Stmt::Switch(s) => s.switch_pos,
            Stmt::TypeSwitch(s) => s.switch_pos,
            Stmt::Comm(s) => s.case_pos,
            Stmt::Select(s) => s.select_pos,
            Stmt::For(s) => s.for_pos,
            Stmt::Range(s) => s.for_pos,
        }
    }

    fn end(&self) -> Pos {
        match self {
            Stmt::Bad(s) => s.to,
            Stmt::Decl(s) => s.end(),
            Stmt::Empty(s) => s.semicolon + 1,
            Stmt::Labeled(s) => s.stmt.end(),
            Stmt::Expr(s) => s.x.end(),
            Stmt::Send(s) => s.value.end(),
            Stmt::IncDec(s) => s.tok_pos + 2,
            Stmt::Assign(s) => s.rhs.last().map_or(s.tok_pos, Node::end),
            Stmt::Go(s) => call_end(&s.call),
            Stmt::Defer(s) => call_end(&s.call),
            Stmt::Return(s) => s
                .results
                .last()
                .map_or(s.return_pos + 6, Node::end),
            Stmt::Branch(s) => s
                .label
                .as_ref()
                .map_or_else(|| s.tok_pos + s.tok.to_string().len() as u32, |l| l.end()),
            Stmt::Block(s) => s.end(),
            Stmt::If(s) => s
                .else_branch
                .as_ref()
                .map_or_else(|| s.body.end(), Node::end),
            Stmt::Case(s) => s.body.last().map_or(s.colon + 1, Node::end),
            Stmt::Switch(s) => s.body.end(),
            Stmt::TypeSwitch(s) => s.body.end(),
            Stmt::Comm(s) => s.body.last().map_or(s.colon + 1, Node::end),
            Stmt::Select(s) => s.body.end(),
            Stmt::For(s) => s.body.end(),
            Stmt::Range(s) => s.body.end(),
        }
    }
}

fn call_end(call: &CallExpr) -> Pos {
    let r = call.rparen + 1;
    match call.args.last() {
        Some(last) if last.end() > r => last.end(),
        _ => r,
    }
}
