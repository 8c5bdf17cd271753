//! This is the compiler as a library.  See `src/bin` directory for the
//! executable program using this library.

// Because this is a library, allow dead code to make in-class exercises easier
// to develop.
#![allow(dead_code)]

pub mod back;
pub mod common;
pub mod front;
pub mod middle;

use derive_more::Display;

/// Top-level error produced by the upstream (non-core) stages: lexing,
/// parsing, and name/shape resolution. The core stages never produce this —
/// per the error handling design, a failure past resolution is a compiler
/// bug and panics instead.
#[derive(Display, Debug)]
pub enum Error {
    #[display("{_0}")]
    Lex(front::lex::LexError),
    #[display("{_0}")]
    Parse(front::parse::ParseError),
    #[display("{_0}")]
    Resolve(front::resolve::ResolveError),
}

impl std::error::Error for Error {}

impl From<front::lex::LexError> for Error {
    fn from(e: front::lex::LexError) -> Self {
        Error::Lex(e)
    }
}

impl From<front::parse::ParseError> for Error {
    fn from(e: front::parse::ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<front::resolve::ResolveError> for Error {
    fn from(e: front::resolve::ResolveError) -> Self {
        Error::Resolve(e)
    }
}

/// Run the full pipeline from source text to assembly text.
pub fn compile(source: &str) -> Result<String, Error> {
    let ast = front::parse::parse(source)?;
    let resolved = front::resolve::resolve(ast)?;
    let tac = middle::tac::build(&resolved);
    Ok(back::asm::assemble(&tac))
}
