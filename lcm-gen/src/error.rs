//! Diagnostics raised while compiling an IDL file.

use thiserror::Error;

/// Unrecognized character or malformed literal, with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct LexError {
    /// One-based source line.
    pub line: u32,
    /// One-based source column.
    pub column: u32,
    /// What the scanner choked on.
    pub message: String,
}

/// Unexpected token or grammar violation, with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    /// One-based source line.
    pub line: u32,
    /// One-based source column.
    pub column: u32,
    /// What the parser expected and what it found.
    pub message: String,
}

/// Any failure while generating code for one IDL file. Lex, parse, and
/// I/O failures abort that file; other files continue.
#[derive(Debug, Error)]
pub enum Error {
    /// The tokenizer rejected the source.
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    /// The parser rejected the token stream.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// A member references a type that no parsed file defines.
    #[error("unresolved type `{0}`")]
    UnresolvedType(String),
    /// Two types contain each other; their hashes cannot be computed.
    #[error("circular type dependency involving `{0}`")]
    CircularType(String),
    /// An array dimension cannot drive generated code.
    #[error("cannot generate array dimension: {0}")]
    BadDimension(String),
    /// Source read or output write failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
