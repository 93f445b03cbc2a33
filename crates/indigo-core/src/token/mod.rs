//! Token vocabulary and position service
//!
//! This module defines the closed set of token kinds shared by the scanner,
//! parser and printer, together with the [`FileSet`] registry that maps
//! opaque [`Pos`] offsets back to (file, line, column) locations.

mod kinds;
mod position;
mod serialize;

pub use kinds::{Token, HIGHEST_PREC, LOWEST_PREC, UNARY_PREC};
pub use position::{File, FileSet, LineInfo, Pos, Position};
pub use serialize::{SerializedFile, SerializedFileSet};
