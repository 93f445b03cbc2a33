//! Printer for the indigo AST
//!
//! Walks an AST and emits source text in either surface form, interleaving
//! buffered comments at their source positions and applying alignment and
//! compaction heuristics. Output is assembled from text cells separated by
//! alignment tabs; cells in a section are elastically column-aligned and
//! sections are flushed at formfeeds.

mod nodes;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{CommentGroup, Decl, Expr, File, Node, Spec, Stmt};
use crate::token::{FileSet, Pos, Token};

/// Printer mode bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode(u32);

impl Mode {
    /// No special behavior
    pub const NONE: Mode = Mode(0);
    /// Do not use the column aligner; control characters pass through
    pub const RAW_FORMAT: Mode = Mode(1);
    /// Indent with tabs
    pub const TAB_INDENT: Mode = Mode(1 << 1);
    /// Indent and pad with spaces
    pub const USE_SPACES: Mode = Mode(1 << 2);
    /// Emit `//line` directives mapping output back to source
    pub const SOURCE_POS: Mode = Mode(1 << 3);

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

/// Which surface form to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Form {
    /// Indentation-delimited blocks, newline-terminated statements
    #[default]
    Indented,
    /// Brace-delimited blocks, the translate target
    Canonical,
}

/// Printer configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub tabwidth: usize,
    pub form: Form,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::TAB_INDENT,
            tabwidth: 8,
            form: Form::Indented,
        }
    }
}

/// Map from printed byte offsets to the source positions they were printed
/// from; enables error-message back-translation from printed form
pub type Positions = BTreeMap<usize, Pos>;

/// Printing failure
#[derive(Debug, Error)]
pub enum PrintError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("printer internal error: {0}")]
    Internal(String),
}

/// A node that can be handed to [`Config::fprint`]
#[derive(Clone, Copy)]
pub enum PrintNode<'a> {
    File(&'a File),
    Expr(&'a Expr),
    Stmt(&'a Stmt),
    Decl(&'a Decl),
    Spec(&'a Spec),
}

impl<'a> From<&'a File> for PrintNode<'a> {
    fn from(f: &'a File) -> Self {
        PrintNode::File(f)
    }
}

impl<'a> From<&'a Expr> for PrintNode<'a> {
    fn from(x: &'a Expr) -> Self {
        PrintNode::Expr(x)
    }
}

impl<'a> From<&'a Stmt> for PrintNode<'a> {
    fn from(s: &'a Stmt) -> Self {
        PrintNode::Stmt(s)
    }
}

impl<'a> From<&'a Decl> for PrintNode<'a> {
    fn from(d: &'a Decl) -> Self {
        PrintNode::Decl(d)
    }
}

impl PrintNode<'_> {
    fn key(&self) -> usize {
        match self {
            PrintNode::File(n) => *n as *const File as usize,
            PrintNode::Expr(n) => *n as *const Expr as usize,
            PrintNode::Stmt(n) => *n as *const Stmt as usize,
            PrintNode::Decl(n) => *n as *const Decl as usize,
            PrintNode::Spec(n) => *n as *const Spec as usize,
        }
    }
}

impl Config {
    /// Replace the output form
    #[must_use]
    pub fn with_form(mut self, form: Form) -> Self {
        self.form = form;
        self
    }

    /// Print `node` to `out`, returning the printed-offset position map.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or when the AST has an unexpected shape.
    pub fn fprint<'a, W: Write>(
        &self,
        out: &mut W,
        fset: &FileSet,
        node: impl Into<PrintNode<'a>>,
    ) -> Result<Positions, PrintError> {
        self.fprint_internal(out, fset, node.into(), Rc::new(RefCell::new(HashMap::new())))
    }

    fn fprint_internal<W: Write>(
        &self,
        out: &mut W,
        fset: &FileSet,
        node: PrintNode<'_>,
        sizes: Rc<RefCell<HashMap<usize, usize>>>,
    ) -> Result<Positions, PrintError> {
        let mut p = Printer::new(self.clone(), fset, sizes);
        match node {
            PrintNode::File(f) => {
                p.comments = f.comments.clone();
                p.file(f);
            }
            PrintNode::Expr(x) => {
                p.use_node_comments = true;
                p.expr(x);
            }
            PrintNode::Stmt(s) => {
                p.use_node_comments = true;
                p.stmt(s, false);
            }
            PrintNode::Decl(d) => {
                p.use_node_comments = true;
                p.decl(d);
            }
            PrintNode::Spec(s) => {
                p.use_node_comments = true;
                p.spec(s, 1, false);
            }
        }
        p.finish();
        if let Some(msg) = p.internal_error.take() {
            return Err(PrintError::Internal(msg));
        }
        out.write_all(&p.rendered)?;
        Ok(p.positions)
    }
}

/// Print a parsed file using the given configuration
///
/// # Errors
///
/// Fails on I/O errors or when the AST has an unexpected shape.
pub fn print_file<W: Write>(
    out: &mut W,
    fset: &FileSet,
    file: &File,
    config: &Config,
) -> Result<Positions, PrintError> {
    config.fprint(out, fset, file)
}

// Whitespace control tokens understood by the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ws {
    Ignore,
    Blank,
    Vtab,
    Newline,
    Formfeed,
    Indent,
    Unindent,
}

pub(crate) const INFINITY: usize = 1 << 30;

fn nlimit(n: u32) -> u32 {
    n.min(2)
}

#[derive(Default)]
struct Cell {
    text: String,
    pos: Option<Pos>,
}

#[derive(Default)]
struct Line {
    indent: usize,
    cells: Vec<Cell>,
    current: Cell,
    started: bool,
}

impl Line {
    fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.current.text.is_empty()
    }
}

pub(crate) struct Printer<'a> {
    cfg: Config,
    fset: &'a FileSet,

    // pending whitespace
    wsbuf: Vec<Ws>,
    indent_level: usize,

    // output assembly
    section: Vec<Line>,
    line: Line,
    rendered: Vec<u8>,
    positions: Positions,

    // estimated source position of the output point
    src_line: u32,
    src_col: u32,
    pending_pos: Option<Pos>,

    // comment state
    comments: Vec<Rc<CommentGroup>>,
    cindex: usize,
    use_node_comments: bool,
    need_nl_after_comment: bool,
    pub(crate) comment_newline: bool,
    suppress_extra_linebreak: bool,

    // node walking state
    pub(crate) rcv_name: Option<String>,
    pub(crate) in_func: bool,
    pub(crate) findent: usize,
    node_sizes: Rc<RefCell<HashMap<usize, usize>>>,
    internal_error: Option<String>,
    // last file/line emitted as a //line directive
    source_pos_line: u32,
}

impl<'a> Printer<'a> {
    fn new(cfg: Config, fset: &'a FileSet, sizes: Rc<RefCell<HashMap<usize, usize>>>) -> Self {
        Printer {
            cfg,
            fset,
            wsbuf: Vec::new(),
            indent_level: 0,
            section: Vec::new(),
            line: Line::default(),
            rendered: Vec::new(),
            positions: BTreeMap::new(),
            src_line: 0,
            src_col: 0,
            pending_pos: None,
            comments: Vec::new(),
            cindex: 0,
            use_node_comments: false,
            need_nl_after_comment: false,
            comment_newline: false,
            suppress_extra_linebreak: false,
            rcv_name: None,
            in_func: false,
            findent: 0,
            node_sizes: sizes,
            internal_error: None,
            source_pos_line: 0,
        }
    }

    pub(crate) fn internal_error(&mut self, msg: impl Into<String>) {
        if self.internal_error.is_none() {
            self.internal_error = Some(msg.into());
        }
    }

    pub(crate) fn raw(&self) -> bool {
        self.cfg.mode.contains(Mode::RAW_FORMAT)
    }

    // ==================== Position estimation ====================

    pub(crate) fn line_for(&self, pos: Pos) -> u32 {
        if pos.is_valid() {
            self.fset.position(pos).line
        } else {
            0
        }
    }

    pub(crate) fn pos_valid(&self) -> bool {
        self.src_line > 0
    }

    pub(crate) fn cur_line(&self) -> u32 {
        self.src_line
    }

    /// Record the source position of the next token and flush any comments
    /// that precede it.
    pub(crate) fn set_pos(&mut self, pos: Pos) {
        if !pos.is_valid() {
            return;
        }
        self.flush_comments_before(pos);
        self.pending_pos = Some(pos);
        let resolved = self.fset.position(pos);
        if resolved.is_valid() {
            self.src_line = resolved.line;
            self.src_col = resolved.column;
        }
    }

    // ==================== Whitespace ====================

    pub(crate) fn ws(&mut self, ws: Ws) {
        if ws == Ws::Ignore {
            return;
        }
        if ws == Ws::Unindent {
            // cancel a pending indent instead of stacking the pair
            if self.wsbuf.last() == Some(&Ws::Indent) {
                self.wsbuf.pop();
                return;
            }
        }
        self.wsbuf.push(ws);
    }

    pub(crate) fn blank(&mut self) {
        self.ws(Ws::Blank);
    }

    pub(crate) fn vtab(&mut self) {
        self.ws(Ws::Vtab);
    }

    pub(crate) fn newline(&mut self) {
        self.ws(Ws::Newline);
    }

    pub(crate) fn formfeed(&mut self) {
        self.ws(Ws::Formfeed);
    }

    pub(crate) fn indent(&mut self) {
        self.ws(Ws::Indent);
    }

    pub(crate) fn unindent(&mut self) {
        self.ws(Ws::Unindent);
    }

    // Logical indent including pending whitespace.
    pub(crate) fn logical_indent(&self) -> usize {
        let mut level = self.indent_level as isize;
        for w in &self.wsbuf {
            match w {
                Ws::Indent => level += 1,
                Ws::Unindent => level -= 1,
                _ => {}
            }
        }
        level.max(0) as usize
    }

    pub(crate) fn align_func_indent(&mut self) {
        let target = self.findent;
        let mut level = self.logical_indent();
        while level < target {
            self.ws(Ws::Indent);
            level += 1;
        }
        while level > target {
            self.ws(Ws::Unindent);
            level -= 1;
        }
    }

    fn pending_breaks(&self) -> u32 {
        self.wsbuf
            .iter()
            .filter(|w| matches!(w, Ws::Newline | Ws::Formfeed))
            .count() as u32
    }

    // Print as many newlines as necessary (but at least min) to get to the
    // given source line, counting breaks already pending. ws is printed
    // before the first break; if new_section is set, the first break is a
    // formfeed. Returns true if any break was printed.
    pub(crate) fn linebreak(&mut self, line: u32, min: u32, ws: Ws, new_section: bool) -> bool {
        let mut n = if line > self.src_line && self.pos_valid() {
            nlimit(line - self.src_line)
        } else {
            0
        };
        if n < min {
            n = min;
        }
        n = n.saturating_sub(self.pending_breaks());
        if n > 0 {
            self.ws(ws);
            if new_section {
                self.ws(Ws::Formfeed);
                n -= 1;
            }
            for _ in 0..n {
                self.ws(Ws::Newline);
            }
            return true;
        }
        false
    }

    fn flush_ws(&mut self) {
        let pending = std::mem::take(&mut self.wsbuf);
        for w in pending {
            match w {
                Ws::Ignore => {}
                Ws::Blank => self.append_text(" "),
                Ws::Vtab => self.end_cell(),
                Ws::Newline => self.end_line(false),
                Ws::Formfeed => self.end_line(true),
                Ws::Indent => self.indent_level += 1,
                Ws::Unindent => self.indent_level = self.indent_level.saturating_sub(1),
            }
        }
    }

    // ==================== Text assembly ====================

    fn append_text(&mut self, s: &str) {
        if self.raw() {
            self.rendered.extend_from_slice(s.as_bytes());
            return;
        }
        if !self.line.started && !s.trim().is_empty() {
            self.line.indent = self.indent_level;
            self.line.started = true;
        }
        if self.line.current.pos.is_none() {
            self.line.current.pos = self.pending_pos.take();
        }
        self.line.current.text.push_str(s);
        self.src_col += s.chars().count() as u32;
    }

    fn end_cell(&mut self) {
        if self.raw() {
            self.rendered.push(b'\x0b');
            return;
        }
        let cell = std::mem::take(&mut self.line.current);
        self.line.cells.push(cell);
    }

    fn end_line(&mut self, flush: bool) {
        if self.raw() {
            self.rendered.push(if flush { b'\x0c' } else { b'\n' });
            self.src_line += 1;
            self.src_col = 1;
            return;
        }
        self.end_cell();
        let line = std::mem::take(&mut self.line);
        self.section.push(line);
        if flush {
            self.flush_section();
        }
        self.src_line += 1;
        self.src_col = 1;
        self.need_nl_after_comment = false;
    }

    fn flush_section(&mut self) {
        let tw = self.cfg.tabwidth.max(1);
        let use_spaces = self.cfg.mode.contains(Mode::USE_SPACES);
        let mut lines = std::mem::take(&mut self.section);

        // drop empty trailing cells so single-cell lines stay unaligned
        for line in &mut lines {
            while line
                .cells
                .last()
                .is_some_and(|c| c.text.is_empty() && c.pos.is_none())
            {
                line.cells.pop();
            }
        }

        // column widths; only cells followed by another cell participate
        let mut widths: Vec<usize> = Vec::new();
        for line in &lines {
            let n = line.cells.len();
            for (j, cell) in line.cells.iter().enumerate() {
                if j + 1 < n {
                    let w = cell.text.chars().count();
                    if j >= widths.len() {
                        widths.resize(j + 1, 0);
                    }
                    if w > widths[j] {
                        widths[j] = w;
                    }
                }
            }
        }

        for line in lines {
            // trailing whitespace never survives a flush
            let is_blank = line.cells.iter().all(|c| c.text.trim().is_empty());
            if is_blank {
                self.rendered.push(b'\n');
                continue;
            }
            let mut col;
            if use_spaces {
                let pad = line.indent * tw;
                self.rendered.extend(std::iter::repeat(b' ').take(pad));
                col = pad;
            } else {
                self.rendered.extend(std::iter::repeat(b'\t').take(line.indent));
                // tabs keep column math in tab stops
                col = line.indent * tw;
            }
            let n = line.cells.len();
            for (j, cell) in line.cells.iter().enumerate() {
                let text = if j + 1 == n {
                    cell.text.trim_end()
                } else {
                    cell.text.as_str()
                };
                if let Some(pos) = cell.pos {
                    self.positions.insert(self.rendered.len(), pos);
                }
                self.rendered.extend_from_slice(text.as_bytes());
                col += text.chars().count();
                if j + 1 < n {
                    let target = widths.get(j).copied().unwrap_or(0);
                    let cell_w = cell.text.chars().count();
                    if use_spaces {
                        let pad = target.saturating_sub(cell_w) + 1;
                        self.rendered.extend(std::iter::repeat(b' ').take(pad));
                        col += pad;
                    } else {
                        // pad to the next tab stop past the column width
                        let base = col - cell_w;
                        let stop = base + (target / tw + 1) * tw;
                        while col < stop {
                            self.rendered.push(b'\t');
                            col = (col / tw + 1) * tw;
                        }
                    }
                }
            }
            self.rendered.push(b'\n');
        }
    }

    // Writes a token or literal string at the current output point.
    pub(crate) fn word(&mut self, s: &str) {
        self.flush_deferred_comment_break();
        self.flush_ws();
        self.emit_source_pos();
        self.append_text(s);
    }

    fn flush_deferred_comment_break(&mut self) {
        if self.need_nl_after_comment {
            self.need_nl_after_comment = false;
            // a line comment must not swallow the following token
            let has_break = self
                .wsbuf
                .iter()
                .any(|w| matches!(w, Ws::Newline | Ws::Formfeed));
            if !has_break {
                self.wsbuf.insert(0, Ws::Newline);
            }
        }
    }

    fn emit_source_pos(&mut self) {
        if !self.cfg.mode.contains(Mode::SOURCE_POS) || self.raw() {
            return;
        }
        if let Some(pos) = self.pending_pos {
            let resolved = self.fset.position(pos);
            if resolved.is_valid()
                && self.line.is_empty()
                && resolved.line != self.source_pos_line
            {
                self.source_pos_line = resolved.line;
                let directive = format!("//line {}:{}", resolved.filename, resolved.line);
                self.line.indent = 0;
                self.line.started = true;
                self.line.current.text.push_str(&directive);
                self.end_line(false);
            }
        }
    }

    pub(crate) fn tok(&mut self, tok: Token) {
        self.word(&tok.to_string());
    }

    pub(crate) fn token_at(&mut self, pos: Pos, tok: Token) {
        self.set_pos(pos);
        self.tok(tok);
    }

    pub(crate) fn lit(&mut self, s: &str) {
        self.word(s);
    }

    // ==================== Comments ====================

    pub(crate) fn set_comment(&mut self, g: Option<&Rc<CommentGroup>>) {
        let Some(g) = g else { return };
        if !self.use_node_comments {
            return;
        }
        // queue the group for position-driven flushing
        self.comments.push(Rc::clone(g));
    }

    pub(crate) fn comment_before(&self, pos: Pos) -> bool {
        self.cindex < self.comments.len() && {
            let cpos = self.comments[self.cindex].pos();
            cpos.is_valid() && cpos < pos
        }
    }

    fn flush_comments_before(&mut self, limit: Pos) {
        while self.cindex < self.comments.len() {
            let g = Rc::clone(&self.comments[self.cindex]);
            let gpos = g.pos();
            if gpos.is_valid() && gpos < limit {
                self.cindex += 1;
                self.write_comment_group(&g);
            } else {
                break;
            }
        }
    }

    fn write_comment_group(&mut self, g: &CommentGroup) {
        self.comment_newline = false;
        for (i, c) in g.list.iter().enumerate() {
            let cline = self.line_for(c.slash);
            let own_line = cline > 0 && self.pos_valid() && cline > self.src_line;
            let at_start = self.at_output_start();
            let mut saved_ws = None;
            if at_start && i == 0 {
                // nothing precedes the very first comment
            } else if own_line {
                // break to the comment's line, replacing pending breaks
                let mut n = nlimit(cline - self.src_line);
                if self.suppress_extra_linebreak {
                    n = 1;
                }
                self.consume_pending_breaks(n);
                for _ in 0..n {
                    self.flush_ws_break();
                }
            } else if i == 0 {
                // trailing comment: it precedes any pending line breaks
                saved_ws = Some(std::mem::take(&mut self.wsbuf));
                self.end_cell();
            } else {
                // group-mate on the same line
                self.append_text(" ");
            }

            // write the comment text, line by line
            let mut first = true;
            for part in c.text.split('\n') {
                if !first {
                    self.end_line(false);
                }
                first = false;
                self.append_text(part);
            }
            if cline > 0 {
                self.src_line = cline + c.text.matches('\n').count() as u32;
            }
            if c.text.starts_with("//") {
                self.need_nl_after_comment = true;
                self.comment_newline = true;
            }
            if let Some(ws) = saved_ws {
                self.wsbuf = ws;
            }
        }
    }

    fn at_output_start(&self) -> bool {
        self.rendered.is_empty() && self.section.is_empty() && self.line.is_empty()
    }

    // Remove up to n pending line breaks so comment-driven breaks replace
    // them instead of stacking.
    fn consume_pending_breaks(&mut self, n: u32) {
        let mut left = n;
        self.wsbuf.retain(|w| {
            if left > 0 && matches!(w, Ws::Newline | Ws::Formfeed) {
                left -= 1;
                false
            } else {
                true
            }
        });
    }

    fn flush_ws_break(&mut self) {
        // apply pending indent changes, then break the line
        self.flush_ws();
        self.end_line(false);
    }

    pub(crate) fn set_suppress_linebreak(&mut self, on: bool) {
        self.suppress_extra_linebreak = on;
    }

    pub(crate) fn drop_trailing_blank(&mut self) {
        while self.wsbuf.last() == Some(&Ws::Blank) {
            self.wsbuf.pop();
        }
    }

    fn finish(&mut self) {
        // flush whatever comments remain past the last node
        while self.cindex < self.comments.len() {
            let g = Rc::clone(&self.comments[self.cindex]);
            self.cindex += 1;
            self.write_comment_group(&g);
        }
        if self.need_nl_after_comment && !self.raw() {
            self.end_line(false);
        }
        self.flush_ws();
        if !self.raw() {
            if !self.line.is_empty() {
                self.end_line(false);
            }
            self.flush_section();
            // exactly one newline at the end of a file
            while self.rendered.ends_with(b"\n\n") {
                self.rendered.pop();
            }
            if !self.rendered.is_empty() && !self.rendered.ends_with(b"\n") {
                self.rendered.push(b'\n');
            }
        }
    }

    // ==================== Node sizing ====================

    // Size of the node in characters after formatting; greater than
    // max_size when the node does not fit on one line. Memoized to bound
    // the cost of nested composite literals.
    pub(crate) fn node_size(&mut self, node: PrintNode<'_>, max_size: usize) -> usize {
        let key = node.key();
        if let Some(&size) = self.node_sizes.borrow().get(&key) {
            return size;
        }
        self.node_sizes.borrow_mut().insert(key, max_size + 1);

        let cfg = Config {
            mode: Mode::RAW_FORMAT,
            tabwidth: self.cfg.tabwidth,
            form: self.cfg.form,
        };
        let mut buf = Vec::new();
        if cfg
            .fprint_internal(&mut buf, self.fset, node, Rc::clone(&self.node_sizes))
            .is_err()
        {
            return max_size + 1;
        }
        if buf.len() <= max_size && !buf.iter().any(|&b| b < b' ') {
            self.node_sizes.borrow_mut().insert(key, buf.len());
            return buf.len();
        }
        max_size + 1
    }

    pub(crate) fn is_multi_line(&self, n: &dyn Node) -> bool {
        let (s, e) = (self.line_for(n.pos()), self.line_for(n.end()));
        s > 0 && e > s
    }

    pub(crate) fn has_output(&self) -> bool {
        !self.at_output_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.tabwidth, 8);
        assert_eq!(cfg.form, Form::Indented);
        assert!(cfg.mode.contains(Mode::TAB_INDENT));
    }

    #[test]
    fn mode_bits_compose() {
        let m = Mode::RAW_FORMAT | Mode::SOURCE_POS;
        assert!(m.contains(Mode::RAW_FORMAT));
        assert!(m.contains(Mode::SOURCE_POS));
        assert!(!m.contains(Mode::USE_SPACES));
    }
}
