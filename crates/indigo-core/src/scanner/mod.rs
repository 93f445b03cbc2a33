//! Scanner for the indented form
//!
//! Produces a layout-normalized `(Pos, Token, literal)` stream from raw
//! source bytes: it tracks indentation, emits the synthetic `Indent`,
//! `Dedent` and `Semicolon` tokens that expose layout structure to the
//! parser, and recognizes comment tokens.
//!
//! Indentation is measured in columns at the start of each physical line; a
//! tab advances the column to the next multiple of [`TAB_WIDTH`]. Lines
//! whose lexical content sits inside an unclosed `(`, `[` or `{` are exempt
//! from the layout machinery, blank lines are skipped, and a line whose only
//! content is a comment does not alter the indent state.

mod error;
mod raw;

pub use error::{Error, ErrorList};

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use logos::Logos;

use crate::token::{File, Pos, Position, Token};
use raw::{RawError, RawTok};

/// Columns per tab in leading whitespace. Fixed independently of the
/// printer's configured tab width so that layout is stable across runs.
pub const TAB_WIDTH: u32 = 8;

/// Callback invoked for every scan error
pub type ErrorHandler = Box<dyn FnMut(Position, &str)>;

/// Scanner mode bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode(u32);

impl Mode {
    /// No special behavior
    pub const NONE: Mode = Mode(0);
    /// Emit comment tokens instead of skipping them
    pub const SCAN_COMMENTS: Mode = Mode(1);

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

// Tokens after which a newline terminates a statement. Besides the classic
// set (identifiers, literals, closing brackets, break/continue/return/
// fallthrough and ++/--), block headers that end a physical line need the
// inserted terminator so the parser can find the indented body: a trailing
// colon, `else`, `for`, `select`, `switch`, `do`, unbraced `struct` and
// `interface` types, and the grouped-declaration keywords.
const fn can_end_statement(tok: Token) -> bool {
    matches!(
        tok,
        Token::Ident
            | Token::Int
            | Token::Float
            | Token::Imag
            | Token::Char
            | Token::String
            | Token::Rparen
            | Token::Rbrack
            | Token::Rbrace
            | Token::Break
            | Token::Continue
            | Token::Fallthrough
            | Token::Return
            | Token::Inc
            | Token::Dec
            | Token::Colon
            | Token::Else
            | Token::For
            | Token::Select
            | Token::Switch
            | Token::Do
            | Token::Struct
            | Token::Interface
            | Token::Import
            | Token::Const
            | Token::Var
            | Token::Type
    )
}

/// The layout-normalizing scanner
pub struct Scanner {
    file: Arc<File>,
    src: Rc<str>,
    offset: usize,
    line_start: usize,
    pending: VecDeque<(Pos, Token, String)>,
    indents: Vec<u32>,
    depth: u32,
    prev: Token,
    need_layout: bool,
    done: bool,
    mode: Mode,
    err: ErrorHandler,
    error_count: usize,
}

impl Scanner {
    /// Create a scanner over `src`, which must be the contents of `file`
    pub fn new(file: Arc<File>, src: &str, err: ErrorHandler, mode: Mode) -> Self {
        debug_assert_eq!(file.size() as usize, src.len(), "file size mismatch");
        Self {
            file,
            src: Rc::from(src),
            offset: 0,
            line_start: 0,
            pending: VecDeque::new(),
            indents: vec![0],
            depth: 0,
            prev: Token::Illegal,
            need_layout: false,
            done: false,
            mode,
            err,
            error_count: 0,
        }
    }

    /// Number of errors reported so far
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.error_count
    }

    /// Scan the next token. After the end of input, returns `Eof` forever.
    pub fn scan(&mut self) -> (Pos, Token, String) {
        loop {
            if let Some(t) = self.pending.pop_front() {
                return t;
            }
            if self.offset >= self.src.len() {
                match self.finish() {
                    Some(t) => return t,
                    None => continue,
                }
            }
            let src = Rc::clone(&self.src);
            let rem = &src[self.offset..];
            let mut lx = RawTok::lexer(rem);
            let Some(res) = lx.next() else {
                self.offset = self.src.len();
                continue;
            };
            let span = lx.span();
            let start = self.offset + span.start;
            let end = self.offset + span.end;
            self.offset = end;
            match res {
                Ok(tok) => {
                    if let Some(t) = self.dispatch(tok, start, end, &src[start..end]) {
                        return t;
                    }
                }
                Err(e) => {
                    self.record_lines(start, end);
                    self.error(start, &e.to_string());
                    let tok = match e {
                        RawError::UnterminatedString | RawError::UnterminatedRawString => {
                            Token::String
                        }
                        RawError::UnterminatedRune => Token::Char,
                        RawError::UnterminatedComment => {
                            if self.mode.contains(Mode::SCAN_COMMENTS) {
                                let pos = self.file.pos(start as u32);
                                return (pos, Token::Comment, src[start..end].replace('\r', ""));
                            }
                            continue;
                        }
                        RawError::IllegalChar => Token::Illegal,
                    };
                    return self.emit(tok, start, src[start..end].to_string());
                }
            }
        }
    }

    fn dispatch(
        &mut self,
        tok: RawTok,
        start: usize,
        end: usize,
        slice: &str,
    ) -> Option<(Pos, Token, String)> {
        match tok {
            RawTok::Bom => {
                if start != 0 {
                    self.error(start, "illegal byte order mark");
                }
                None
            }
            RawTok::Newline => {
                self.file.add_line(end as u32);
                self.line_start = end;
                if self.depth == 0 {
                    self.need_layout = true;
                    if can_end_statement(self.prev) {
                        self.prev = Token::Semicolon;
                        return Some((self.file.pos(start as u32), Token::Semicolon, "\n".into()));
                    }
                }
                None
            }
            RawTok::LineComment => {
                if start == self.line_start {
                    self.line_directive(end, slice);
                }
                if self.mode.contains(Mode::SCAN_COMMENTS) {
                    Some((self.file.pos(start as u32), Token::Comment, slice.to_string()))
                } else {
                    None
                }
            }
            RawTok::BlockComment => {
                self.record_lines(start, end);
                if self.mode.contains(Mode::SCAN_COMMENTS) {
                    Some((
                        self.file.pos(start as u32),
                        Token::Comment,
                        slice.replace('\r', ""),
                    ))
                } else {
                    None
                }
            }
            RawTok::Ident => Some(self.emit(Token::lookup(slice), start, slice.to_string())),
            RawTok::Number => {
                let kind = self.classify_number(start, slice);
                Some(self.emit(kind, start, slice.to_string()))
            }
            RawTok::String => Some(self.emit(Token::String, start, slice.to_string())),
            RawTok::RawString => {
                self.record_lines(start, end);
                Some(self.emit(Token::String, start, slice.to_string()))
            }
            RawTok::Rune => Some(self.emit(Token::Char, start, slice.to_string())),
            RawTok::Unknown => {
                let ch = slice.chars().next().unwrap_or('\u{FFFD}');
                self.error(start, &format!("illegal character {:?}", ch));
                Some(self.emit(Token::Illegal, start, slice.to_string()))
            }
            RawTok::Semicolon => Some(self.emit(Token::Semicolon, start, ";".into())),
            _ => {
                let kind = operator_token(tok);
                Some(self.emit(kind, start, String::new()))
            }
        }
    }

    // Emits a significant token, flushing any pending layout change first.
    fn emit(&mut self, tok: Token, start: usize, lit: String) -> (Pos, Token, String) {
        if self.need_layout && self.depth == 0 {
            self.apply_layout();
        }
        self.need_layout = false;
        match tok {
            Token::Lparen | Token::Lbrack | Token::Lbrace => self.depth += 1,
            Token::Rparen | Token::Rbrack | Token::Rbrace => {
                self.depth = self.depth.saturating_sub(1);
            }
            _ => {}
        }
        self.prev = tok;
        let entry = (self.file.pos(start as u32), tok, lit);
        if self.pending.is_empty() {
            entry
        } else {
            self.pending.push_back(entry);
            // at least one layout token was queued first
            self.pending.pop_front().unwrap_or((Pos::NONE, Token::Eof, String::new()))
        }
    }

    fn apply_layout(&mut self) {
        let col = self.leading_columns();
        let lpos = self.file.pos(self.line_start as u32);
        let top = self.indents.last().copied().unwrap_or(0);
        if col > top {
            self.indents.push(col);
            self.pending.push_back((lpos, Token::Indent, String::new()));
        } else if col < top {
            while self.indents.last().copied().unwrap_or(0) > col {
                self.indents.pop();
                self.pending.push_back((lpos, Token::Dedent, String::new()));
            }
            if self.indents.last().copied().unwrap_or(0) != col {
                self.error(self.line_start, "inconsistent indentation");
            }
        }
    }

    fn leading_columns(&self) -> u32 {
        let mut col = 0u32;
        for b in self.src[self.line_start..].bytes() {
            match b {
                b' ' => col += 1,
                b'\t' => col = (col / TAB_WIDTH + 1) * TAB_WIDTH,
                _ => break,
            }
        }
        col
    }

    fn record_lines(&mut self, start: usize, end: usize) {
        let bytes = self.src.as_bytes();
        for i in start..end {
            if bytes[i] == b'\n' {
                self.file.add_line((i + 1) as u32);
                self.line_start = i + 1;
            }
        }
    }

    // Recognizes a `//line filename:n` directive at the start of a line; the
    // override takes effect on the following line.
    fn line_directive(&mut self, end: usize, text: &str) {
        let Some(rest) = text.strip_prefix("//line ") else {
            return;
        };
        let Some((name, line)) = rest.rsplit_once(':') else {
            return;
        };
        if let Ok(line) = line.trim().parse::<u32>() {
            if line > 0 {
                // the override names the line FOLLOWING the directive
                self.file.add_line_info(end as u32 + 1, name.trim(), line);
            }
        }
    }

    fn classify_number(&mut self, start: usize, text: &str) -> Token {
        if text.ends_with('i') {
            return Token::Imag;
        }
        let bytes = text.as_bytes();
        if bytes.len() > 1 && bytes[0] == b'0' {
            let prefix = bytes[1].to_ascii_lowercase();
            if matches!(prefix, b'x' | b'o' | b'b') {
                let digits = &text[2..];
                if digits.chars().all(|c| c == '_') {
                    self.error(start, "malformed number literal");
                }
                if prefix == b'x'
                    && (digits.contains('.') || digits.to_ascii_lowercase().contains('p'))
                {
                    return Token::Float;
                }
                return Token::Int;
            }
        }
        if text.contains('.') || text.to_ascii_lowercase().contains('e') {
            Token::Float
        } else {
            Token::Int
        }
    }

    fn finish(&mut self) -> Option<(Pos, Token, String)> {
        let eof_pos = self.file.pos(self.file.size());
        if self.done {
            return Some((eof_pos, Token::Eof, String::new()));
        }
        self.done = true;
        if can_end_statement(self.prev) {
            self.pending.push_back((eof_pos, Token::Semicolon, "\n".into()));
            self.prev = Token::Semicolon;
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.pending.push_back((eof_pos, Token::Dedent, String::new()));
        }
        self.pending.push_back((eof_pos, Token::Eof, String::new()));
        None
    }

    fn error(&mut self, offset: usize, msg: &str) {
        self.error_count += 1;
        let pos = self.file.position(self.file.pos(offset as u32));
        (self.err)(pos, msg);
    }
}

const fn operator_token(tok: RawTok) -> Token {
    match tok {
        RawTok::Ellipsis => Token::Ellipsis,
        RawTok::ShlAssign => Token::ShlAssign,
        RawTok::ShrAssign => Token::ShrAssign,
        RawTok::AndNotAssign => Token::AndNotAssign,
        RawTok::AddAssign => Token::AddAssign,
        RawTok::SubAssign => Token::SubAssign,
        RawTok::MulAssign => Token::MulAssign,
        RawTok::QuoAssign => Token::QuoAssign,
        RawTok::RemAssign => Token::RemAssign,
        RawTok::AndAssign => Token::AndAssign,
        RawTok::OrAssign => Token::OrAssign,
        RawTok::XorAssign => Token::XorAssign,
        RawTok::Shl => Token::Shl,
        RawTok::Shr => Token::Shr,
        RawTok::AndNot => Token::AndNot,
        RawTok::LAnd => Token::LAnd,
        RawTok::LOr => Token::LOr,
        RawTok::Eql => Token::Eql,
        RawTok::Neq => Token::Neq,
        RawTok::Leq => Token::Leq,
        RawTok::Geq => Token::Geq,
        RawTok::Inc => Token::Inc,
        RawTok::Dec => Token::Dec,
        RawTok::Define => Token::Define,
        RawTok::Arrow => Token::Arrow,
        RawTok::Assign => Token::Assign,
        RawTok::Add => Token::Add,
        RawTok::Sub => Token::Sub,
        RawTok::Mul => Token::Mul,
        RawTok::Quo => Token::Quo,
        RawTok::Rem => Token::Rem,
        RawTok::And => Token::And,
        RawTok::Or => Token::Or,
        RawTok::Xor => Token::Xor,
        RawTok::Not => Token::Not,
        RawTok::Lss => Token::Lss,
        RawTok::Gtr => Token::Gtr,
        RawTok::Lparen => Token::Lparen,
        RawTok::Rparen => Token::Rparen,
        RawTok::Lbrack => Token::Lbrack,
        RawTok::Rbrack => Token::Rbrack,
        RawTok::Lbrace => Token::Lbrace,
        RawTok::Rbrace => Token::Rbrace,
        RawTok::Comma => Token::Comma,
        RawTok::Colon => Token::Colon,
        RawTok::Period => Token::Period,
        _ => Token::Illegal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::FileSet;

    fn scan_all(src: &str) -> Vec<(Token, String)> {
        let fset = FileSet::new();
        let file = fset.add_file("t.ing", None, src.len() as u32);
        let mut s = Scanner::new(file, src, Box::new(|_, _| {}), Mode::SCAN_COMMENTS);
        let mut out = Vec::new();
        loop {
            let (_, tok, lit) = s.scan();
            let done = tok == Token::Eof;
            out.push((tok, lit));
            if done {
                break;
            }
        }
        out
    }

    fn kinds(src: &str) -> Vec<Token> {
        scan_all(src).into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn semicolon_inserted_at_newline() {
        assert_eq!(
            kinds("x := 1\ny := 2\n"),
            vec![
                Token::Ident,
                Token::Define,
                Token::Int,
                Token::Semicolon,
                Token::Ident,
                Token::Define,
                Token::Int,
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn indent_and_dedent() {
        assert_eq!(
            kinds("if x\n\treturn\ny := 2\n"),
            vec![
                Token::If,
                Token::Ident,
                Token::Semicolon,
                Token::Indent,
                Token::Return,
                Token::Semicolon,
                Token::Dedent,
                Token::Ident,
                Token::Define,
                Token::Int,
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn dedents_closed_at_eof() {
        assert_eq!(
            kinds("if x\n\treturn 1"),
            vec![
                Token::If,
                Token::Ident,
                Token::Semicolon,
                Token::Indent,
                Token::Return,
                Token::Int,
                Token::Semicolon,
                Token::Dedent,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn parenthesized_continuation_suppresses_layout() {
        // Arguments spanning indented lines inside (...) produce no layout
        // tokens at all.
        let toks = kinds("f(1,\n\t2,\n\t3)\n");
        assert!(!toks.contains(&Token::Indent));
        assert!(!toks.contains(&Token::Dedent));
        let semis = toks.iter().filter(|&&t| t == Token::Semicolon).count();
        assert_eq!(semis, 1); // only the terminating newline
    }

    #[test]
    fn blank_and_comment_lines_keep_indent() {
        let toks = kinds("if x\n\ta := 1\n\n\t// note\n\tb := 2\n");
        let dedents = toks.iter().filter(|&&t| t == Token::Dedent).count();
        let indents = toks.iter().filter(|&&t| t == Token::Indent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn no_semi_after_operator_line() {
        // a line ending in an operator does not terminate the statement
        let toks = kinds("x := a &&\nb\n");
        let semis = toks.iter().filter(|&&t| t == Token::Semicolon).count();
        assert_eq!(semis, 1);
    }

    #[test]
    fn literal_classification() {
        let all = scan_all("3 3.14 0x1F 2i .5 0b101 'a' \"s\" `raw`\n");
        let toks: Vec<Token> = all.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            &toks[..9],
            &[
                Token::Int,
                Token::Float,
                Token::Int,
                Token::Imag,
                Token::Float,
                Token::Int,
                Token::Char,
                Token::String,
                Token::String,
            ]
        );
    }

    #[test]
    fn comment_tokens_and_modes() {
        let with = scan_all("x // trailing\n");
        assert!(with.iter().any(|(t, _)| *t == Token::Comment));

        let fset = FileSet::new();
        let src = "x // trailing\n";
        let file = fset.add_file("t.ing", None, src.len() as u32);
        let mut s = Scanner::new(file, src, Box::new(|_, _| {}), Mode::NONE);
        let mut saw_comment = false;
        loop {
            let (_, tok, _) = s.scan();
            if tok == Token::Comment {
                saw_comment = true;
            }
            if tok == Token::Eof {
                break;
            }
        }
        assert!(!saw_comment);
    }

    #[test]
    fn inconsistent_indentation_reported() {
        use std::cell::RefCell;
        use std::rc::Rc;
        let msgs = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&msgs);
        let fset = FileSet::new();
        let src = "if x\n\t\ta := 1\n    b := 2\nc := 3\n";
        let file = fset.add_file("t.ing", None, src.len() as u32);
        let mut s = Scanner::new(
            file,
            src,
            Box::new(move |_, msg| sink.borrow_mut().push(msg.to_string())),
            Mode::NONE,
        );
        loop {
            if s.scan().1 == Token::Eof {
                break;
            }
        }
        assert!(msgs.borrow().iter().any(|m| m.contains("indentation")));
    }

    #[test]
    fn line_directive_recorded() {
        let fset = FileSet::new();
        let src = "//line other.ing:10\nx := 1\n";
        let file = fset.add_file("t.ing", None, src.len() as u32);
        let mut s = Scanner::new(Arc::clone(&file), src, Box::new(|_, _| {}), Mode::NONE);
        let mut first_code_pos = Pos::NONE;
        loop {
            let (pos, tok, _) = s.scan();
            if tok == Token::Ident && !first_code_pos.is_valid() {
                first_code_pos = pos;
            }
            if tok == Token::Eof {
                break;
            }
        }
        let resolved = file.position(first_code_pos);
        assert_eq!(resolved.filename, "other.ing");
        assert_eq!(resolved.line, 10);
    }
}
