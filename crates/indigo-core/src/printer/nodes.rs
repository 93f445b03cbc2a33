//! AST node rendering
//!
//! Expression, statement, declaration and file printing for both surface
//! forms. Operator spacing is precedence driven: levels 5 and 4 bind tight
//! and drop their spaces below the cutoff, levels 3 and below are always
//! spaced.

use std::rc::Rc;

use super::{Form, PrintNode, Printer, Ws, INFINITY};
use crate::ast::{
    BinaryExpr, BlockStmt, CallExpr, ChanDir, Decl, Expr, Field, FieldList, File, FuncDecl,
    GenDecl, Ident, Node, Spec, Stmt, ValueSpec,
};
use crate::token::{Pos, Token, HIGHEST_PREC, LOWEST_PREC, UNARY_PREC};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ListMode(u32);

impl ListMode {
    pub const NONE: ListMode = ListMode(0);
    /// the list is optionally terminated by a comma
    pub const COMMA_TERM: ListMode = ListMode(1);
    /// no extra indentation in multi-line lists
    pub const NO_INDENT: ListMode = ListMode(2);

    const fn contains(self, other: ListMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ListMode {
    type Output = ListMode;

    fn bitor(self, rhs: ListMode) -> ListMode {
        ListMode(self.0 | rhs.0)
    }
}

fn strip_parens_always(x: &Expr) -> &Expr {
    if let Expr::Paren(p) = x {
        return strip_parens_always(&p.x);
    }
    x
}

// Parentheses protect enclosed composite literals whose type is a type
// name; such parentheses must not be stripped.
fn contains_exposed_composite(x: &Expr) -> bool {
    match x {
        Expr::Paren(_) => false,
        Expr::CompositeLit(c) => {
            if c.typ.as_ref().is_some_and(Expr::is_type_name) {
                return true;
            }
            c.elts.iter().any(contains_exposed_composite)
        }
        Expr::Binary(b) => contains_exposed_composite(&b.x) || contains_exposed_composite(&b.y),
        Expr::Unary(u) => contains_exposed_composite(&u.x),
        Expr::Star(s) => contains_exposed_composite(&s.x),
        Expr::Selector(s) => contains_exposed_composite(&s.x),
        Expr::Index(i) => {
            contains_exposed_composite(&i.x) || contains_exposed_composite(&i.index)
        }
        Expr::Slice(s) => {
            contains_exposed_composite(&s.x)
                || s.low.as_ref().is_some_and(|x| contains_exposed_composite(x))
                || s.high.as_ref().is_some_and(|x| contains_exposed_composite(x))
        }
        Expr::Call(c) => {
            contains_exposed_composite(&c.fun) || c.args.iter().any(contains_exposed_composite)
        }
        Expr::KeyValue(kv) => {
            contains_exposed_composite(&kv.key) || contains_exposed_composite(&kv.value)
        }
        Expr::TypeAssert(t) => contains_exposed_composite(&t.x),
        _ => false,
    }
}

fn strip_parens(x: &Expr) -> &Expr {
    if let Expr::Paren(p) = x {
        if !contains_exposed_composite(&p.x) {
            return strip_parens(&p.x);
        }
    }
    x
}

// Reports whether any binary operator has a right operand whose leading
// token would visually merge with the operator, and which precedence
// levels occur.
fn walk_binary(e: &BinaryExpr) -> (bool, bool, i32) {
    let mut has4 = false;
    let mut has5 = false;
    let mut max_problem = 0;
    match e.op.precedence() {
        4 => has4 = true,
        5 => has5 = true,
        _ => {}
    }
    if let Expr::Binary(l) = &e.x {
        if l.op.precedence() >= e.op.precedence() {
            let (h4, h5, mp) = walk_binary(l);
            has4 |= h4;
            has5 |= h5;
            max_problem = max_problem.max(mp);
        }
    }
    match &e.y {
        Expr::Binary(r) => {
            if r.op.precedence() > e.op.precedence() {
                let (h4, h5, mp) = walk_binary(r);
                has4 |= h4;
                has5 |= h5;
                max_problem = max_problem.max(mp);
            }
        }
        Expr::Star(_) => {
            if e.op == Token::Quo {
                // `/*` would read as a comment opener
                max_problem = 5;
            }
        }
        Expr::Unary(u) => {
            let pair = format!("{}{}", e.op, u.op);
            match pair.as_str() {
                "/*" | "&&" | "&^" => max_problem = 5,
                "++" | "--" => max_problem = max_problem.max(4),
                _ => {}
            }
        }
        _ => {}
    }
    (has4, has5, max_problem)
}

fn cutoff(e: &BinaryExpr, depth: i32) -> i32 {
    let (has4, has5, max_problem) = walk_binary(e);
    if max_problem > 0 {
        return max_problem + 1;
    }
    if has4 && has5 {
        if depth == 1 {
            return 5;
        }
        return 4;
    }
    if depth == 1 {
        return 6;
    }
    4
}

fn diff_prec(expr: &Expr, prec: i32) -> i32 {
    match expr {
        Expr::Binary(x) if prec == x.op.precedence() => 0,
        _ => 1,
    }
}

fn reduce_depth(depth: i32) -> i32 {
    (depth - 1).max(1)
}

fn is_binary(x: &Expr) -> bool {
    matches!(x, Expr::Binary(_))
}

// A clause body parsed from an indented block arrives as a single layout
// block; its statements print directly under the clause header.
fn clause_body(body: &[Stmt]) -> &[Stmt] {
    if let [Stmt::Block(b)] = body {
        if !b.small {
            return &b.list;
        }
    }
    body
}

fn get_doc(d: &Decl) -> bool {
    match d {
        Decl::Gen(g) => g.doc.is_some(),
        Decl::Func(f) => f.doc.is_some(),
        Decl::Bad(_) => false,
    }
}

fn decl_token(d: &Decl) -> Token {
    match d {
        Decl::Gen(g) => g.tok,
        Decl::Func(_) => Token::Func,
        Decl::Bad(_) => Token::Illegal,
    }
}

fn ident_list_size(list: &[Rc<Ident>], max_size: usize) -> usize {
    let mut size = 0;
    for (i, x) in list.iter().enumerate() {
        if i > 0 {
            size += 2; // ", "
        }
        size += x.name.chars().count();
        if size >= max_size {
            break;
        }
    }
    size
}

impl Printer<'_> {
    // ==================== Expressions ====================

    pub(crate) fn ident(&mut self, x: &Ident) {
        self.set_pos(x.pos);
        // inside a method body the receiver's declared name prints as self
        let substitute = self
            .rcv_name
            .as_ref()
            .is_some_and(|name| *name == x.name);
        if substitute {
            self.lit("self");
        } else {
            self.lit(&x.name);
        }
    }

    fn ident_list(&mut self, list: &[Rc<Ident>], indent: bool) {
        // reuse the expression-list layout
        let xlist: Vec<Expr> = list.iter().map(|i| Expr::Ident(Rc::clone(i))).collect();
        let mode = if indent {
            ListMode::NONE
        } else {
            ListMode::NO_INDENT
        };
        self.expr_list(Pos::NONE, &xlist, 1, mode, Pos::NONE);
    }

    // Print a list of expressions. If the list spans multiple source
    // lines, the original line breaks between expressions are respected.
    fn expr_list(&mut self, prev0: Pos, list: &[Expr], depth: i32, mode: ListMode, next0: Pos) {
        if list.is_empty() {
            return;
        }
        let prev_line0 = self.line_for(prev0);
        let next_line = self.line_for(next0);
        let mut line = self.line_for(list[0].pos());
        let end_line = self.line_for(list[list.len() - 1].end());

        if prev_line0 > 0 && prev_line0 == line && line == end_line {
            // all list entries on a single line
            for (i, x) in list.iter().enumerate() {
                if i > 0 {
                    // comma position tracks the following expression for
                    // correct comment placement
                    self.set_pos(x.pos());
                    self.tok(Token::Comma);
                    self.blank();
                }
                self.expr0(x, depth);
            }
            return;
        }

        // list entries span multiple lines; use source positions to guide
        // line breaks
        let mut ws = Ws::Indent;
        if mode.contains(ListMode::NO_INDENT) {
            ws = Ws::Ignore;
        }

        // the first linebreak is a formfeed since this section must not
        // depend on previous formatting
        let mut prev_break: isize = -1;
        if prev_line0 > 0 && prev_line0 < line && self.linebreak(line, 0, ws, true) {
            ws = Ws::Ignore;
            prev_break = 0;
        }

        let mut size = 0usize;
        for (i, x) in list.iter().enumerate() {
            let prev_line = line;
            line = self.line_for(x.pos());

            let mut use_ff = true;

            // element size; zero when the element does not fit on a line
            // or layout information is missing
            let prev_size = size;
            size = self.node_size(PrintNode::Expr(x), INFINITY);
            let pair_key_size = if let Expr::KeyValue(pair) = x {
                Some(self.node_size(PrintNode::Expr(&pair.key), INFINITY))
            } else {
                None
            };
            if size <= INFINITY && prev_line0 > 0 && next_line > 0 {
                if let Some(key_size) = pair_key_size {
                    size = key_size;
                }
            } else {
                size = 0;
            }

            // align columns when consecutive single-line elements have
            // comparable sizes
            if prev_size > 0 && size > 0 {
                const SMALL_SIZE: usize = 20;
                if prev_size <= SMALL_SIZE && size <= SMALL_SIZE {
                    use_ff = false;
                } else {
                    const R: f64 = 4.0;
                    let ratio = size as f64 / prev_size as f64;
                    use_ff = ratio <= 1.0 / R || R <= ratio;
                }
            }

            if i > 0 {
                let needs_linebreak = prev_line < line && prev_line > 0 && line > 0;
                if !needs_linebreak {
                    self.set_pos(x.pos());
                }
                self.tok(Token::Comma);
                let mut needs_blank = true;
                if needs_linebreak
                    && self.linebreak(line, 0, ws, use_ff || prev_break + 1 < i as isize)
                {
                    ws = Ws::Ignore;
                    prev_break = i as isize;
                    needs_blank = false;
                }
                if needs_blank {
                    self.blank();
                }
            }

            if let (Expr::KeyValue(pair), true) = (x, size > 0 && list.len() > 1) {
                // key:value in a multi-entry list gets a key column so
                // consecutive entries can align
                self.expr(&pair.key);
                self.token_at(pair.colon, Token::Colon);
                self.vtab();
                self.expr(&pair.value);
            } else {
                self.expr0(x, depth);
            }
        }

        if mode.contains(ListMode::COMMA_TERM) && next_line > 0 && self.cur_line() < next_line {
            // print a terminating comma if the next token is on a new line
            self.tok(Token::Comma);
            if ws == Ws::Ignore && !mode.contains(ListMode::NO_INDENT) {
                self.unindent();
            }
            self.formfeed();
            return;
        }

        if ws == Ws::Ignore && !mode.contains(ListMode::NO_INDENT) {
            self.unindent();
        }
    }

    fn parameters(&mut self, fields: &FieldList) {
        self.token_at(fields.opening, Token::Lparen);
        if !fields.list.is_empty() {
            let mut prev_line = self.line_for(fields.opening);
            let mut ws = Ws::Indent;
            for (i, par) in fields.list.iter().enumerate() {
                let par_line_beg = if let Some(name) = par.names.first() {
                    self.line_for(name.pos)
                } else {
                    self.line_for(par.typ.pos())
                };
                let par_line_end = self.line_for(par.typ.end());
                let needs_linebreak = 0 < prev_line && prev_line < par_line_beg;
                if i > 0 {
                    if !needs_linebreak {
                        self.set_pos(par.pos());
                    }
                    self.tok(Token::Comma);
                }
                if needs_linebreak && self.linebreak(par_line_beg, 0, ws, true) {
                    ws = Ws::Ignore;
                } else if i > 0 {
                    self.blank();
                }
                if !par.names.is_empty() {
                    self.ident_list(&par.names, ws == Ws::Indent);
                    self.blank();
                }
                self.expr(strip_parens_always(&par.typ));
                prev_line = par_line_end;
            }
            let closing = self.line_for(fields.closing);
            if 0 < prev_line && prev_line < closing {
                self.tok(Token::Comma);
                self.linebreak(closing, 0, Ws::Ignore, true);
            }
            if ws == Ws::Ignore {
                self.unindent();
            }
        }
        self.token_at(fields.closing, Token::Rparen);
    }

    fn signature(&mut self, params: &FieldList, results: Option<&FieldList>) {
        self.parameters(params);
        let Some(results) = results else { return };
        if results.num_fields() > 0 {
            self.blank();
            if results.num_fields() == 1 && results.list[0].names.is_empty() {
                // single anonymous result; no parentheses
                self.expr(strip_parens_always(&results.list[0].typ));
                return;
            }
            self.parameters(results);
        }
    }

    fn is_one_line_field_list(&mut self, list: &[Field]) -> bool {
        if list.len() != 1 {
            return false;
        }
        let f = &list[0];
        if f.tag.is_some() || f.comment.is_some() {
            return false;
        }
        const MAX_SIZE: usize = 30;
        let mut names_size = ident_list_size(&f.names, MAX_SIZE);
        if names_size > 0 {
            names_size = 1; // blank between names and type
        }
        let type_size = self.node_size(PrintNode::Expr(&f.typ), MAX_SIZE);
        names_size + type_size <= MAX_SIZE
    }

    fn field_list(&mut self, fields: &FieldList, is_struct: bool) {
        let lbrace = fields.opening;
        let rbrace = fields.closing;
        let list = &fields.list;
        let has_comments = rbrace.is_valid() && self.comment_before(rbrace);
        let src_is_one_line = if rbrace.is_valid() {
            lbrace.is_valid() && self.line_for(lbrace) == self.line_for(rbrace)
        } else {
            // colon single-member form has no recorded closing
            lbrace.is_valid()
                && list.len() <= 1
                && list
                    .first()
                    .map_or(true, |f| self.line_for(f.pos()) == self.line_for(lbrace))
        };
        let canonical = self.cfg.form == Form::Canonical;

        if !has_comments && src_is_one_line {
            if list.is_empty() {
                if canonical {
                    self.set_pos(lbrace);
                    self.word("{}");
                }
                // layout form: an empty field list prints nothing
                return;
            } else if is_struct && self.is_one_line_field_list(list) {
                // small enough: print on one line
                self.set_pos(lbrace);
                if canonical {
                    self.word("{");
                    self.blank();
                } else {
                    self.tok(Token::Colon);
                    self.blank();
                }
                let f = &list[0];
                for (i, x) in f.names.iter().enumerate() {
                    if i > 0 {
                        self.tok(Token::Comma);
                        self.blank();
                    }
                    self.ident(x);
                }
                if !f.names.is_empty() {
                    self.blank();
                }
                self.expr(&f.typ);
                if canonical {
                    self.blank();
                    self.word("}");
                }
                return;
            }
        }

        if canonical {
            self.set_pos(lbrace);
            self.tok(Token::Lbrace);
        }
        if has_comments || !list.is_empty() {
            self.formfeed();
        }
        self.indent();

        if is_struct {
            let sep = if list.len() == 1 { Ws::Blank } else { Ws::Vtab };
            let mut new_section = false;
            for (i, f) in list.iter().enumerate() {
                if i > 0 {
                    let line = self.line_for(f.pos());
                    self.linebreak(line, 1, Ws::Ignore, new_section);
                }
                let mut extra_tabs = 0;
                self.set_comment(f.doc.as_ref());
                if !f.names.is_empty() {
                    // named fields
                    self.ident_list(&f.names, false);
                    self.ws(sep);
                    self.expr(&f.typ);
                    extra_tabs = 1;
                } else {
                    // anonymous field
                    self.expr(&f.typ);
                    extra_tabs = 2;
                }
                if let Some(tag) = &f.tag {
                    if !f.names.is_empty() && sep == Ws::Vtab {
                        self.ws(sep);
                    }
                    self.ws(sep);
                    self.set_pos(tag.pos);
                    self.lit(&tag.value);
                    extra_tabs = 0;
                }
                if f.comment.is_some() {
                    while extra_tabs > 0 {
                        self.ws(sep);
                        extra_tabs -= 1;
                    }
                    self.set_comment(f.comment.as_ref());
                }
                new_section = self.is_multi_line(f);
            }
        } else {
            // interface
            let mut new_section = false;
            for (i, f) in list.iter().enumerate() {
                if i > 0 {
                    let line = self.line_for(f.pos());
                    self.linebreak(line, 1, Ws::Ignore, new_section);
                }
                self.set_comment(f.doc.as_ref());
                if let Expr::FuncType(ftyp) = &f.typ {
                    if let Some(name) = f.names.first() {
                        // method
                        self.ident(name);
                        self.signature(&ftyp.params, ftyp.results.as_ref());
                    } else {
                        self.expr(&f.typ);
                    }
                } else {
                    // embedded interface
                    self.expr(&f.typ);
                }
                self.set_comment(f.comment.as_ref());
                new_section = self.is_multi_line(f);
            }
        }

        self.unindent();
        self.formfeed();
        if canonical {
            self.token_at(rbrace, Token::Rbrace);
        }
    }

    // Format a binary expression, deciding the cutoff. Depth 1 is normal
    // mode, deeper is compact mode: the only decision is whether levels 4
    // and 5 carry spaces.
    fn binary_expr(&mut self, x: &BinaryExpr, prec1: i32, cutoff: i32, depth: i32) {
        let prec = x.op.precedence();
        if prec < prec1 {
            // parenthesis needed; the parser inserts ParenExpr nodes, so
            // this only happens for synthesized trees
            self.tok(Token::Lparen);
            self.expr0_as_binary(x, reduce_depth(depth));
            self.tok(Token::Rparen);
            return;
        }

        let print_blank = prec < cutoff;
        let mut ws = Ws::Indent;
        self.expr1(&x.x, prec, depth + diff_prec(&x.x, prec));
        if print_blank {
            self.blank();
        }
        let xline = self.cur_line(); // before the operator
        let yline = self.line_for(x.y.pos());
        self.token_at(x.op_pos, x.op);
        let mut print_blank_after = print_blank;
        if xline != yline && xline > 0 && yline > 0 {
            // at least one line break, but respect an extra empty line in
            // the source
            if self.linebreak(yline, 1, ws, true) {
                ws = Ws::Ignore;
                print_blank_after = false;
            }
        }
        if print_blank_after {
            self.blank();
        }
        self.expr1(&x.y, prec + 1, depth + 1);
        if ws == Ws::Ignore {
            self.unindent();
        }
    }

    fn expr0_as_binary(&mut self, x: &BinaryExpr, depth: i32) {
        self.binary_expr(x, LOWEST_PREC, cutoff(x, depth), depth);
    }

    pub(crate) fn expr(&mut self, x: &Expr) {
        self.expr1(x, LOWEST_PREC, 1);
    }

    fn expr0(&mut self, x: &Expr, depth: i32) {
        self.expr1(x, LOWEST_PREC, depth);
    }

    fn expr1(&mut self, expr: &Expr, prec1: i32, depth: i32) {
        self.set_pos(expr.pos());
        match expr {
            Expr::Bad(_) => self.word("BadExpr"),
            Expr::Ident(x) => self.ident(x),
            Expr::Binary(x) => {
                let depth = depth.max(1);
                self.binary_expr(x, prec1, cutoff(x, depth), depth);
            }
            Expr::KeyValue(x) => {
                self.expr(&x.key);
                self.token_at(x.colon, Token::Colon);
                self.blank();
                self.expr(&x.value);
            }
            Expr::Star(x) => {
                if UNARY_PREC < prec1 {
                    // parenthesis needed
                    self.tok(Token::Lparen);
                    self.tok(Token::Mul);
                    self.expr(&x.x);
                    self.tok(Token::Rparen);
                } else {
                    self.tok(Token::Mul);
                    self.expr1(&x.x, UNARY_PREC, depth);
                }
            }
            Expr::Unary(x) => {
                if UNARY_PREC < prec1 {
                    // parenthesis needed
                    self.tok(Token::Lparen);
                    self.token_at(x.op_pos, x.op);
                    if x.op == Token::Range {
                        self.blank();
                    }
                    self.expr1(&x.x, UNARY_PREC, depth);
                    self.tok(Token::Rparen);
                } else {
                    self.token_at(x.op_pos, x.op);
                    if x.op == Token::Range {
                        self.blank();
                    }
                    self.expr1(&x.x, UNARY_PREC, depth);
                }
            }
            Expr::BasicLit(x) => {
                self.lit(&x.value);
            }
            Expr::FuncLit(x) => {
                self.set_pos(x.typ.pos);
                self.tok(Token::Func);
                self.signature(&x.typ.params, x.typ.results.as_ref());
                self.adj_block(Some(&x.body));
            }
            Expr::Paren(x) => {
                if matches!(x.x, Expr::Paren(_)) {
                    // don't print double parentheses
                    self.expr0(&x.x, reduce_depth(depth));
                } else {
                    // parentheses undo one level of depth
                    self.tok(Token::Lparen);
                    self.expr0(&x.x, reduce_depth(depth));
                    self.token_at(x.rparen, Token::Rparen);
                }
            }
            Expr::Selector(x) => {
                self.expr1(&x.x, HIGHEST_PREC, depth);
                self.tok(Token::Period);
                let line = self.line_for(x.sel.pos);
                if self.pos_valid() && self.cur_line() < line {
                    self.indent();
                    self.newline();
                    self.ident(&x.sel);
                    self.unindent();
                } else {
                    self.ident(&x.sel);
                }
            }
            Expr::TypeAssert(x) => {
                self.expr1(&x.x, HIGHEST_PREC, depth);
                self.tok(Token::Period);
                self.tok(Token::Lparen);
                match &x.typ {
                    Some(typ) => self.expr(typ),
                    None => self.tok(Token::Type),
                }
                self.token_at(x.rparen, Token::Rparen);
            }
            Expr::Index(x) => {
                self.expr1(&x.x, HIGHEST_PREC, 1);
                self.token_at(x.lbrack, Token::Lbrack);
                self.expr0(&x.index, depth + 1);
                self.token_at(x.rbrack, Token::Rbrack);
            }
            Expr::Slice(x) => {
                self.expr1(&x.x, HIGHEST_PREC, 1);
                self.token_at(x.lbrack, Token::Lbrack);
                if let Some(low) = &x.low {
                    self.expr0(low, depth + 1);
                }
                // blanks around ":" if both sides exist and either is a
                // binary expression
                let spaced = depth <= 1
                    && x.low.is_some()
                    && x.high.is_some()
                    && (x.low.as_ref().is_some_and(|l| is_binary(l))
                        || x.high.as_ref().is_some_and(|h| is_binary(h)));
                if spaced {
                    self.blank();
                    self.tok(Token::Colon);
                    self.blank();
                } else {
                    self.tok(Token::Colon);
                }
                if let Some(high) = &x.high {
                    self.expr0(high, depth + 1);
                }
                self.token_at(x.rbrack, Token::Rbrack);
            }
            Expr::Call(x) => self.call_expr(x, depth),
            Expr::CompositeLit(x) => {
                // nested composite literals may have the type omitted
                if let Some(typ) = &x.typ {
                    self.expr1(typ, HIGHEST_PREC, depth);
                }
                self.token_at(x.lbrace, Token::Lbrace);
                self.expr_list(x.lbrace, &x.elts, 1, ListMode::COMMA_TERM, x.rbrace);
                // no extra line break before the closing brace: it might
                // move past a trailing comma
                self.set_suppress_linebreak(true);
                self.token_at(x.rbrace, Token::Rbrace);
                self.set_suppress_linebreak(false);
            }
            Expr::Ellipsis(x) => {
                self.tok(Token::Ellipsis);
                if let Some(elt) = &x.elt {
                    self.expr(elt);
                }
            }
            Expr::ArrayType(x) => {
                self.token_at(x.lbrack, Token::Lbrack);
                if let Some(len) = &x.len {
                    self.expr(len);
                }
                self.tok(Token::Rbrack);
                self.expr(&x.elt);
            }
            Expr::StructType(x) => {
                self.tok(Token::Struct);
                self.field_list(&x.fields, true);
            }
            Expr::FuncType(x) => {
                self.tok(Token::Func);
                self.signature(&x.params, x.results.as_ref());
            }
            Expr::InterfaceType(x) => {
                self.tok(Token::Interface);
                self.field_list(&x.methods, false);
            }
            Expr::MapType(x) => {
                self.tok(Token::Map);
                self.tok(Token::Lbrack);
                self.expr(&x.key);
                self.tok(Token::Rbrack);
                self.expr(&x.value);
            }
            Expr::ChanType(x) => {
                match x.dir {
                    ChanDir::BOTH => self.tok(Token::Chan),
                    ChanDir::RECV => {
                        self.tok(Token::Arrow);
                        self.tok(Token::Chan);
                    }
                    _ => {
                        self.tok(Token::Chan);
                        self.token_at(x.arrow, Token::Arrow);
                    }
                }
                self.blank();
                self.expr(&x.value);
            }
        }
    }

    fn call_expr(&mut self, x: &CallExpr, mut depth: i32) {
        if x.args.len() > 1 {
            depth += 1;
        }
        if matches!(x.fun, Expr::FuncType(_)) {
            // conversions to literal function types need parentheses
            self.tok(Token::Lparen);
            self.expr1(&x.fun, HIGHEST_PREC, depth);
            self.tok(Token::Rparen);
        } else {
            self.expr1(&x.fun, HIGHEST_PREC, depth);
        }
        self.token_at(x.lparen, Token::Lparen);
        if x.ellipsis.is_valid() {
            self.expr_list(x.lparen, &x.args, depth, ListMode::NONE, x.ellipsis);
            self.token_at(x.ellipsis, Token::Ellipsis);
            if x.rparen.is_valid() && self.line_for(x.ellipsis) < self.line_for(x.rparen) {
                self.tok(Token::Comma);
                self.formfeed();
            }
            self.token_at(x.rparen, Token::Rparen);
            return;
        }

        let do_form = self.cfg.form == Form::Indented
            && matches!(x.args.last(), Some(Expr::FuncLit(_)));
        if do_form {
            // the inverse of the parser's do sugar: the trailing function
            // literal argument becomes a do block after the call
            let (last, rest) = match x.args.split_last() {
                Some(pair) => pair,
                None => return,
            };
            self.expr_list(x.lparen, rest, depth, ListMode::COMMA_TERM, x.rparen);
            self.token_at(x.rparen, Token::Rparen);
            self.blank();
            self.tok(Token::Do);
            let Expr::FuncLit(fl) = last else { return };
            self.signature(&fl.typ.params, fl.typ.results.as_ref());
            self.adj_block(Some(&fl.body));
        } else {
            self.expr_list(x.lparen, &x.args, depth, ListMode::COMMA_TERM, x.rparen);
            self.token_at(x.rparen, Token::Rparen);
        }
    }

    // ==================== Statements ====================

    // Print the statement list indented, but without a newline after the
    // last statement; extra line breaks between statements in the source
    // are respected but at most one empty line is printed.
    fn stmt_list(&mut self, list: &[Stmt], nindent: usize, next_is_closing: bool) {
        if nindent > 0 {
            self.indent();
        }
        if self.in_func && self.findent == 0 {
            self.findent = self.logical_indent();
        }
        let total = list.iter().filter(|s| !matches!(s, Stmt::Empty(_))).count();
        let mut multi_line = false;
        let mut i = 0;
        for s in list {
            if matches!(s, Stmt::Empty(_)) {
                continue;
            }
            if self.has_output() {
                let line = self.line_for(s.pos());
                self.linebreak(line, 1, Ws::Ignore, i == 0 || nindent == 0 || multi_line);
            }
            self.stmt(s, next_is_closing && i + 1 == total);
            multi_line = self.is_multi_line(s);
            i += 1;
        }
        if !self.in_func {
            self.findent = 0;
        }
        if nindent > 0 {
            self.unindent();
        }
    }

    // Layout block: an indented statement list followed by a break to the
    // closing position.
    fn block_i(&mut self, b: &BlockStmt, nindent: usize) {
        self.stmt_list(&b.list, nindent, true);
        let line = self.line_for(b.closing);
        self.linebreak(line, 1, Ws::Ignore, true);
    }

    // Braced block for the canonical form.
    fn block_c(&mut self, b: &BlockStmt, nindent: usize) {
        self.set_pos(b.opening);
        self.tok(Token::Lbrace);
        self.stmt_list(&b.list, nindent, true);
        let line = self.line_for(b.closing);
        self.linebreak(line, 1, Ws::Ignore, true);
        self.token_at(b.closing, Token::Rbrace);
    }

    // An adjacent block following a header. In the indented form an empty
    // body collapses to a single colon and a one-statement simple body
    // stays on the header line; otherwise the block is printed in full.
    pub(crate) fn adj_block(&mut self, b: Option<&BlockStmt>) {
        let Some(b) = b else { return };
        match self.cfg.form {
            Form::Canonical => {
                self.blank();
                if b.list.is_empty() && !self.comment_before(b.end()) {
                    self.set_pos(b.opening);
                    self.word("{}");
                    return;
                }
                self.block_c(b, 1);
            }
            Form::Indented => {
                if b.list.is_empty() {
                    // the colon attaches directly to the header
                    self.drop_trailing_blank();
                    self.tok(Token::Colon);
                    return;
                }
                if b.list.len() == 1 && !self.comment_newline {
                    if matches!(
                        b.list[0],
                        Stmt::Return(_) | Stmt::Branch(_) | Stmt::Empty(_) | Stmt::IncDec(_)
                    ) {
                        self.drop_trailing_blank();
                        self.tok(Token::Colon);
                        self.blank();
                        self.stmt(&b.list[0], true);
                        return;
                    }
                }
                self.block_i(b, 1);
            }
        }
    }

    fn control_clause(
        &mut self,
        is_for: bool,
        init: Option<&Stmt>,
        expr: Option<&Expr>,
        post: Option<&Stmt>,
    ) {
        self.blank();
        let mut needs_blank = false;
        if init.is_none() && post.is_none() {
            // no semicolons required
            if let Some(expr) = expr {
                self.expr(strip_parens(expr));
                needs_blank = true;
            }
        } else {
            // all semicolons required
            if let Some(init) = init {
                self.stmt(init, false);
            }
            self.tok(Token::Semicolon);
            self.blank();
            if let Some(expr) = expr {
                self.expr(strip_parens(expr));
                needs_blank = true;
            }
            if is_for {
                self.tok(Token::Semicolon);
                self.blank();
                needs_blank = false;
                if let Some(post) = post {
                    self.stmt(post, false);
                    needs_blank = true;
                }
            }
        }
        if needs_blank {
            self.blank();
        }
    }

    // Reports whether an expression list would look better indented
    // wholesale rather than from the first line break on.
    fn indent_list(&mut self, list: &[Expr]) -> bool {
        if list.len() >= 2 {
            let b = self.line_for(list[0].pos());
            let e = self.line_for(list[list.len() - 1].end());
            if 0 < b && b < e {
                // list spans multiple lines
                let mut n = 0; // multi-line element count
                let mut line = b;
                for x in list {
                    let xb = self.line_for(x.pos());
                    let xe = self.line_for(x.end());
                    if line < xb {
                        // x does not start on the line the previous one
                        // ended
                        return true;
                    }
                    if xb < xe {
                        n += 1;
                    }
                    line = xe;
                }
                return n > 1;
            }
        }
        false
    }

    pub(crate) fn stmt(&mut self, stmt: &Stmt, next_is_closing: bool) {
        self.set_pos(stmt.pos());
        let canonical = self.cfg.form == Form::Canonical;
        match stmt {
            Stmt::Bad(_) => self.word("BadStmt"),
            Stmt::Decl(d) => self.decl(d),
            Stmt::Empty(_) => {
                // nothing to do
            }
            Stmt::Labeled(s) => {
                self.align_func_indent();
                self.ident(&s.label);
                self.token_at(s.colon, Token::Colon);
                self.indent();
                if let Stmt::Empty(e) = &s.stmt {
                    if !next_is_closing {
                        self.newline();
                        self.set_pos(e.semicolon);
                        self.tok(Token::Semicolon);
                    }
                } else {
                    let line = self.line_for(s.stmt.pos());
                    self.linebreak(line, 1, Ws::Ignore, true);
                    self.stmt(&s.stmt, next_is_closing);
                }
            }
            Stmt::Expr(s) => self.expr0(&s.x, 1),
            Stmt::Send(s) => {
                self.expr0(&s.chan, 1);
                self.blank();
                self.token_at(s.arrow, Token::Arrow);
                self.blank();
                self.expr0(&s.value, 1);
            }
            Stmt::IncDec(s) => {
                self.expr0(&s.x, 2);
                self.token_at(s.tok_pos, s.tok);
            }
            Stmt::Assign(s) => {
                let mut depth = 1;
                if s.lhs.len() > 1 && s.rhs.len() > 1 {
                    depth += 1;
                }
                self.expr_list(stmt.pos(), &s.lhs, depth, ListMode::NONE, s.tok_pos);
                self.blank();
                self.token_at(s.tok_pos, s.tok);
                self.blank();
                self.expr_list(s.tok_pos, &s.rhs, depth, ListMode::NONE, Pos::NONE);
            }
            Stmt::Go(s) => {
                self.tok(Token::Go);
                self.blank();
                self.call_expr(&s.call, 1);
            }
            Stmt::Defer(s) => {
                self.tok(Token::Defer);
                self.blank();
                self.call_expr(&s.call, 1);
            }
            Stmt::Return(s) => {
                self.tok(Token::Return);
                if !s.results.is_empty() {
                    self.blank();
                    // indent multi-line result lists wholesale when that
                    // reads better
                    if self.indent_list(&s.results) {
                        self.indent();
                        self.expr_list(stmt.pos(), &s.results, 1, ListMode::NO_INDENT, Pos::NONE);
                        self.unindent();
                    } else {
                        self.expr_list(stmt.pos(), &s.results, 1, ListMode::NONE, Pos::NONE);
                    }
                }
            }
            Stmt::Branch(s) => {
                self.token_at(s.tok_pos, s.tok);
                if let Some(label) = &s.label {
                    self.blank();
                    self.ident(label);
                }
            }
            Stmt::Block(s) => {
                if canonical {
                    self.block_c(s, 1);
                } else if s.small {
                    self.adj_block(Some(s));
                } else {
                    self.block_i(s, 1);
                }
            }
            Stmt::If(s) => {
                self.token_at(s.if_pos, Token::If);
                self.control_clause(false, s.init.as_ref(), Some(&s.cond), None);
                if canonical {
                    self.block_c(&s.body, 1);
                } else {
                    self.adj_block(Some(&s.body));
                }
                if let Some(else_branch) = &s.else_branch {
                    if canonical {
                        self.blank();
                        self.tok(Token::Else);
                        match else_branch {
                            Stmt::Block(_) | Stmt::If(_) => {
                                self.blank();
                                self.stmt(else_branch, next_is_closing);
                            }
                            _ => {
                                self.indent();
                                self.formfeed();
                                self.stmt(else_branch, true);
                                self.unindent();
                                self.formfeed();
                            }
                        }
                    } else {
                        // else always starts its own line
                        self.linebreak(0, 1, Ws::Ignore, false);
                        self.tok(Token::Else);
                        match else_branch {
                            Stmt::Block(_) => self.stmt(else_branch, next_is_closing),
                            Stmt::If(_) => {
                                self.blank();
                                self.stmt(else_branch, next_is_closing);
                            }
                            _ => {
                                self.indent();
                                self.formfeed();
                                self.stmt(else_branch, true);
                                self.unindent();
                                self.formfeed();
                            }
                        }
                    }
                }
            }
            Stmt::Case(s) => {
                if !s.list.is_empty() {
                    self.tok(Token::Case);
                    self.blank();
                    self.expr_list(stmt.pos(), &s.list, 1, ListMode::NONE, s.colon);
                } else {
                    self.tok(Token::Default);
                }
                self.token_at(s.colon, Token::Colon);
                self.stmt_list(clause_body(&s.body), 1, next_is_closing);
            }
            Stmt::Switch(s) => {
                self.tok(Token::Switch);
                self.control_clause(false, s.init.as_ref(), s.tag.as_ref(), None);
                if canonical {
                    self.block_c(&s.body, 0);
                } else {
                    self.indent();
                    self.block_i(&s.body, 0);
                    self.unindent();
                }
            }
            Stmt::TypeSwitch(s) => {
                self.tok(Token::Switch);
                if let Some(init) = &s.init {
                    self.blank();
                    self.stmt(init, false);
                    self.tok(Token::Semicolon);
                }
                self.blank();
                self.stmt(&s.assign, false);
                if canonical {
                    self.blank();
                    self.block_c(&s.body, 0);
                } else {
                    self.indent();
                    self.block_i(&s.body, 0);
                    self.unindent();
                }
            }
            Stmt::Comm(s) => {
                if let Some(comm) = &s.comm {
                    self.tok(Token::Case);
                    self.blank();
                    self.stmt(comm, false);
                } else {
                    self.tok(Token::Default);
                }
                self.token_at(s.colon, Token::Colon);
                self.stmt_list(clause_body(&s.body), 1, next_is_closing);
            }
            Stmt::Select(s) => {
                self.tok(Token::Select);
                self.blank();
                if s.body.list.is_empty() && !self.comment_before(s.body.end()) {
                    if canonical {
                        self.word("{}");
                    } else {
                        self.internal_error("select without communication clauses");
                    }
                } else if canonical {
                    self.block_c(&s.body, 0);
                } else {
                    self.indent();
                    self.block_i(&s.body, 0);
                    self.unindent();
                }
            }
            Stmt::For(s) => {
                self.tok(Token::For);
                self.control_clause(true, s.init.as_ref(), s.cond.as_ref(), s.post.as_ref());
                if canonical {
                    self.block_c(&s.body, 1);
                } else {
                    self.adj_block(Some(&s.body));
                }
            }
            Stmt::Range(s) => {
                self.tok(Token::For);
                self.blank();
                if let Some(key) = &s.key {
                    self.expr(key);
                    if let Some(value) = &s.value {
                        // comma position tracks the value for comment
                        // placement
                        self.set_pos(value.pos());
                        self.tok(Token::Comma);
                        self.blank();
                        self.expr(value);
                    }
                    self.blank();
                    self.token_at(s.tok_pos, s.tok);
                    self.blank();
                }
                self.tok(Token::Range);
                self.blank();
                self.expr(strip_parens(&s.x));
                if !canonical {
                    self.blank();
                }
                self.adj_block(Some(&s.body));
            }
        }
    }

    // ==================== Declarations ====================

    // Decides whether the type column of a run of consecutive value specs
    // must be kept or whether values may slide into it. Only whole runs
    // move so columns stay aligned.
    fn keep_type_column(specs: &[Spec]) -> Vec<bool> {
        let mut keep = vec![false; specs.len()];
        let mut populate = |m: &mut Vec<bool>, from: usize, to: usize, keep_type: bool| {
            if keep_type {
                for v in &mut m[from..to] {
                    *v = true;
                }
            }
        };
        let mut i0: Option<usize> = None;
        let mut keep_type = false;
        for (i, s) in specs.iter().enumerate() {
            let Spec::Value(t) = s else { continue };
            if !t.values.is_empty() {
                if i0.is_none() {
                    // start of a run with initialization values
                    i0 = Some(i);
                    keep_type = false;
                }
            } else if let Some(start) = i0 {
                // end of a run
                populate(&mut keep, start, i, keep_type);
                i0 = None;
            }
            if t.typ.is_some() {
                keep_type = true;
            }
        }
        if let Some(start) = i0 {
            populate(&mut keep, start, specs.len(), keep_type);
        }
        keep
    }

    fn value_spec(&mut self, s: &ValueSpec, keep_type: bool) {
        self.set_comment(s.doc.as_ref());
        self.ident_list(&s.names, false); // always present
        let mut extra_tabs = 3;
        if s.typ.is_some() || keep_type {
            self.vtab();
            extra_tabs -= 1;
        }
        if let Some(typ) = &s.typ {
            self.expr(typ);
        }
        if !s.values.is_empty() {
            self.vtab();
            self.tok(Token::Assign);
            self.blank();
            self.expr_list(Pos::NONE, &s.values, 1, ListMode::NONE, Pos::NONE);
            extra_tabs -= 1;
        }
        if s.comment.is_some() {
            while extra_tabs > 0 {
                self.vtab();
                extra_tabs -= 1;
            }
            self.set_comment(s.comment.as_ref());
        }
    }

    // n is the number of specs in the containing group.
    pub(crate) fn spec(&mut self, spec: &Spec, n: usize, do_indent: bool) {
        match spec {
            Spec::Import(s) => {
                self.set_comment(s.doc.as_ref());
                if let Some(name) = &s.name {
                    self.ident(name);
                    self.blank();
                }
                self.set_pos(s.path.pos);
                self.lit(&s.path.value);
                self.set_comment(s.comment.as_ref());
            }
            Spec::Value(s) => {
                if n != 1 {
                    self.internal_error("expected exactly one spec");
                }
                self.set_comment(s.doc.as_ref());
                self.ident_list(&s.names, do_indent); // always present
                if let Some(typ) = &s.typ {
                    self.blank();
                    self.expr(typ);
                }
                if !s.values.is_empty() {
                    self.blank();
                    self.tok(Token::Assign);
                    self.blank();
                    self.expr_list(Pos::NONE, &s.values, 1, ListMode::NONE, Pos::NONE);
                }
                self.set_comment(s.comment.as_ref());
            }
            Spec::Type(s) => {
                self.set_comment(s.doc.as_ref());
                self.ident(&s.name);
                if n == 1 {
                    self.blank();
                } else {
                    self.vtab();
                }
                self.expr(&s.typ);
                self.set_comment(s.comment.as_ref());
            }
        }
    }

    fn gen_decl(&mut self, d: &GenDecl) {
        self.set_comment(d.doc.as_ref());
        self.token_at(d.tok_pos, d.tok);
        self.blank();

        if d.is_grouped() {
            // grouped declarations
            let canonical = self.cfg.form == Form::Canonical;
            if canonical {
                self.set_pos(d.indent);
                self.tok(Token::Lparen);
            }
            if !d.specs.is_empty() {
                self.indent();
                self.formfeed();
                let n = d.specs.len();
                if n > 1 && (d.tok == Token::Const || d.tok == Token::Var) {
                    // two or more grouped const/var declarations: decide
                    // whether the type column must be kept
                    let keep = Self::keep_type_column(&d.specs);
                    let mut new_section = false;
                    for (i, s) in d.specs.iter().enumerate() {
                        if i > 0 {
                            let line = self.line_for(s.pos());
                            self.linebreak(line, 1, Ws::Ignore, new_section);
                        }
                        if let Spec::Value(vs) = s {
                            self.value_spec(vs, keep[i]);
                        } else {
                            self.spec(s, n, false);
                        }
                        new_section = self.is_multi_line(s);
                    }
                } else {
                    let mut new_section = false;
                    for (i, s) in d.specs.iter().enumerate() {
                        if i > 0 {
                            let line = self.line_for(s.pos());
                            self.linebreak(line, 1, Ws::Ignore, new_section);
                        }
                        self.spec(s, n, false);
                        new_section = self.is_multi_line(s);
                    }
                }
                self.unindent();
                self.formfeed();
            }
            if canonical {
                self.token_at(d.dedent, Token::Rparen);
            }
        } else if let Some(first) = d.specs.first() {
            // single declaration
            self.spec(first, 1, true);
        }
    }

    fn func_decl(&mut self, d: &FuncDecl) {
        self.set_comment(d.doc.as_ref());
        self.token_at(d.typ.pos, Token::Func);
        self.blank();
        let mut substituting = false;
        if let Some(recv) = &d.recv {
            match self.cfg.form {
                Form::Indented => {
                    // method: receiver type, then the name; occurrences of
                    // the receiver's name print as self inside the body
                    if let Some(field) = recv.list.first() {
                        self.expr(&field.typ);
                        self.word(".");
                        if let Some(name) = field.names.first() {
                            if name.name != "_" {
                                self.rcv_name = Some(name.name.clone());
                                substituting = true;
                            }
                        }
                    }
                }
                Form::Canonical => {
                    self.parameters(recv);
                    self.blank();
                }
            }
        }
        self.ident(&d.name);
        self.signature(&d.typ.params, d.typ.results.as_ref());
        self.in_func = true;
        self.adj_block(d.body.as_ref());
        self.in_func = false;
        self.findent = 0;
        if substituting {
            self.rcv_name = None;
        }
    }

    pub(crate) fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Bad(d) => {
                self.set_pos(d.from);
                self.word("BadDecl");
            }
            Decl::Gen(d) => self.gen_decl(d),
            Decl::Func(d) => self.func_decl(d),
        }
    }

    fn decl_list(&mut self, list: &[Decl]) {
        let mut tok = Token::Illegal;
        for d in list {
            let prev = tok;
            tok = decl_token(d);
            // an empty line between declarations when the kind changes or
            // the next declaration is documented
            if self.has_output() {
                let min = if prev != tok || get_doc(d) { 2 } else { 1 };
                let line = self.line_for(d.pos());
                self.linebreak(line, min, Ws::Ignore, false);
            }
            self.decl(d);
        }
    }

    // ==================== Files ====================

    pub(crate) fn file(&mut self, f: &File) {
        self.set_pos(f.package);
        self.tok(Token::Package);
        self.blank();
        self.ident(&f.name);
        self.decl_list(&f.decls);
        self.linebreak(0, 1, Ws::Ignore, false);
    }
}
