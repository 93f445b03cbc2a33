//! Core library for the indigo translator.
//!
//! indigo is a source-to-source translator between two concrete syntaxes for
//! one Go-shaped language: the canonical form (braces delimit blocks,
//! semicolons terminate statements) and the indented form (indentation
//! delimits blocks, newlines terminate statements, and `:` introduces a
//! single-statement block on the header line).
//!
//! The pipeline is `bytes -> Scanner -> tokens -> Parser -> AST -> Printer
//! -> bytes`:
//!
//! ```
//! use indigo_core::parser::{self, Mode};
//! use indigo_core::printer::{Config, Form};
//! use indigo_core::token::FileSet;
//!
//! let fset = FileSet::new();
//! let src = "package main\n\nfunc main():\n";
//! let (file, errors) = parser::parse_file(&fset, "main.ing", src, Mode::PARSE_COMMENTS);
//! assert!(errors.is_empty());
//!
//! let mut out = Vec::new();
//! Config::default()
//!     .with_form(Form::Canonical)
//!     .fprint(&mut out, &fset, &file.unwrap())
//!     .unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("func main()"));
//! ```

/// Token vocabulary and the FileSet position service
pub mod token;

/// Layout-normalizing scanner for the indented form
pub mod scanner;

/// AST node types, scopes and objects
pub mod ast;

/// Recursive-descent parser for the indented form
pub mod parser;

/// Printer for both surface forms
pub mod printer;

pub use parser::parse_file;
pub use printer::print_file;
pub use token::FileSet;

/// Crate version, reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn version_exists() {
        assert!(!super::VERSION.is_empty());
    }
}
