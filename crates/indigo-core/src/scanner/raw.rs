//! Raw lexeme recognition
//!
//! A logos-generated recognizer for individual lexemes. Layout handling,
//! keyword classification and semicolon insertion live in the wrapping
//! [`Scanner`](super::Scanner).

use logos::{Lexer as LogosLexer, Logos};
use thiserror::Error;

/// Lexeme-level scan failures surfaced through the scanner's error handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
pub enum RawError {
    #[default]
    #[error("illegal character")]
    IllegalChar,
    #[error("string literal not terminated")]
    UnterminatedString,
    #[error("rune literal not terminated")]
    UnterminatedRune,
    #[error("raw string literal not terminated")]
    UnterminatedRawString,
    #[error("comment not terminated")]
    UnterminatedComment,
}

#[inline]
const fn utf8_width(b: u8) -> usize {
    if b < 0x80 {
        1
    } else if b >= 0xF0 {
        4
    } else if b >= 0xE0 {
        3
    } else {
        2
    }
}

// Scans past the closing delimiter of a quoted literal, honoring backslash
// escapes. The opening delimiter has already been consumed by logos.
fn lex_quoted(lex: &mut LogosLexer<'_, RawTok>, quote: u8, err: RawError) -> Result<(), RawError> {
    let rem = lex.remainder().as_bytes();
    let mut i = 0;
    while i < rem.len() {
        let b = rem[i];
        if b == quote {
            lex.bump(i + 1);
            return Ok(());
        }
        match b {
            b'\\' => {
                i += 1;
                if i < rem.len() {
                    i += utf8_width(rem[i]);
                }
            }
            b'\n' | b'\r' => {
                lex.bump(i);
                return Err(err);
            }
            _ => i += utf8_width(b),
        }
    }
    lex.bump(rem.len());
    Err(err)
}

fn lex_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), RawError> {
    lex_quoted(lex, b'"', RawError::UnterminatedString)
}

fn lex_rune(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), RawError> {
    lex_quoted(lex, b'\'', RawError::UnterminatedRune)
}

// Raw strings may span lines; anything up to the closing backquote belongs
// to the literal.
fn lex_raw_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), RawError> {
    let rem = lex.remainder().as_bytes();
    match rem.iter().position(|&b| b == b'`') {
        Some(i) => {
            lex.bump(i + 1);
            Ok(())
        }
        None => {
            lex.bump(rem.len());
            Err(RawError::UnterminatedRawString)
        }
    }
}

fn lex_block_comment(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), RawError> {
    let rem = lex.remainder().as_bytes();
    match rem.windows(2).position(|w| w == b"*/") {
        Some(i) => {
            lex.bump(i + 2);
            Ok(())
        }
        None => {
            lex.bump(rem.len());
            Err(RawError::UnterminatedComment)
        }
    }
}

// Grows the initial digit (or ".digit") match to the maximal number token:
// prefixed integers, underscores, fraction, exponent and the imaginary
// suffix. Classification and validation happen in the wrapper.
#[allow(clippy::unnecessary_wraps)]
fn lex_number(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), RawError> {
    let src = lex.source().as_bytes();
    let start = lex.span().start;
    let n = src.len();
    let mut i = start;
    let mut base = 10u8;

    if src[i] != b'.' {
        if src[i] == b'0' {
            i += 1;
            base = 8;
            if i < n {
                match src[i].to_ascii_lowercase() {
                    b'x' => {
                        base = 16;
                        i += 1;
                    }
                    b'o' => {
                        base = 8;
                        i += 1;
                    }
                    b'b' => {
                        base = 2;
                        i += 1;
                    }
                    _ => {}
                }
            }
        } else {
            i += 1;
        }
        if base == 16 {
            while i < n && (src[i].is_ascii_hexdigit() || src[i] == b'_') {
                i += 1;
            }
        } else {
            while i < n && (src[i].is_ascii_digit() || src[i] == b'_') {
                i += 1;
            }
        }
    }

    // fraction; never steal the first '.' of an ellipsis
    if i < n && src[i] == b'.' && !(i + 1 < n && src[i + 1] == b'.') {
        i += 1;
        if base == 16 {
            while i < n && (src[i].is_ascii_hexdigit() || src[i] == b'_') {
                i += 1;
            }
        } else {
            while i < n && (src[i].is_ascii_digit() || src[i] == b'_') {
                i += 1;
            }
        }
    }

    // exponent
    if i < n {
        let e = src[i].to_ascii_lowercase();
        if e == b'e' || e == b'p' {
            i += 1;
            if i < n && (src[i] == b'+' || src[i] == b'-') {
                i += 1;
            }
            while i < n && (src[i].is_ascii_digit() || src[i] == b'_') {
                i += 1;
            }
        }
    }

    // imaginary suffix
    if i < n && src[i] == b'i' {
        i += 1;
    }

    let already = lex.span().end;
    if i > already {
        lex.bump(i - already);
    }
    Ok(())
}

/// Raw token kinds recognized by logos
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(error = RawError)]
#[logos(skip r"[ \t\x0B\x0C]+")]
pub enum RawTok {
    #[token("\u{FEFF}")]
    Bom,

    #[regex(r"\r\n|\n|\r")]
    Newline,

    #[regex(r"//[^\n\r]*")]
    LineComment,
    #[token("/*", lex_block_comment)]
    BlockComment,

    // Keywords are classified from identifier text by the wrapper.
    #[regex(r"[_\p{L}][_\p{L}\p{Nd}]*")]
    Ident,

    #[regex(r"[0-9]|\.[0-9]", lex_number)]
    Number,

    #[token("\"", lex_string)]
    String,
    #[token("'", lex_rune)]
    Rune,
    #[token("`", lex_raw_string)]
    RawString,

    // Operators, multi-character first
    #[token("...")]
    Ellipsis,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token("&^=")]
    AndNotAssign,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    QuoAssign,
    #[token("%=")]
    RemAssign,
    #[token("&=")]
    AndAssign,
    #[token("|=")]
    OrAssign,
    #[token("^=")]
    XorAssign,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AndNot,
    #[token("&&")]
    LAnd,
    #[token("||")]
    LOr,
    #[token("==")]
    Eql,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Leq,
    #[token(">=")]
    Geq,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token(":=")]
    Define,
    #[token("<-")]
    Arrow,
    #[token("=")]
    Assign,
    #[token("+")]
    Add,
    #[token("-")]
    Sub,
    #[token("*")]
    Mul,
    #[token("/")]
    Quo,
    #[token("%")]
    Rem,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("^")]
    Xor,
    #[token("!")]
    Not,
    #[token("<")]
    Lss,
    #[token(">")]
    Gtr,

    #[token("(")]
    Lparen,
    #[token(")")]
    Rparen,
    #[token("[")]
    Lbrack,
    #[token("]")]
    Rbrack,
    #[token("{")]
    Lbrace,
    #[token("}")]
    Rbrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Period,

    // Catch-all so every byte is accounted for
    #[regex(r".", priority = 0)]
    Unknown,
}
