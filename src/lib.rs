/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The normalizer takes an AST, mapping it into A-normal form: a chain of
/// `let`-bindings in which every operation takes only atomic operands.
pub mod anf;

/// The code generator takes a normalized tree, emitting C source against
/// the boxed-value runtime header.
pub mod codegen;

pub mod ast;
pub mod token;

pub mod util {
    pub mod fmt;
}

use std::fmt;

use log::debug;

/// How far to run the pipeline and which serialization to return.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Tokens,
    Ast,
    Anf,
    CSource,
}

/// Compiles one unit up to `stage` and serializes the result. Each stage
/// runs to completion before the next begins and every intermediate tree
/// is consumed by its successor; the first failure aborts the unit.
pub fn compile(src: &str, stage: Stage) -> Result<String, Error> {
    let tokens = lexer::lex(src)?;
    debug!("lexed {} tokens", tokens.len());
    if stage == Stage::Tokens {
        return Ok(util::fmt::print_tokens(&tokens));
    }

    let program = parser::parse(tokens)?;
    debug!("parsed {} forms", program.forms.len());
    if stage == Stage::Ast {
        return Ok(util::fmt::print_program_string(&program));
    }

    let mut temps = anf::Counter::new();
    let forms = anf::normalize_program(program, &mut temps);
    if stage == Stage::Anf {
        return Ok(util::fmt::print_anf_string(&forms));
    }

    Ok(codegen::generate(&forms)?)
}

/// Any failure that aborts compilation of a unit.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Lex(lexer::Error),
    Syntax(parser::Error),
    Codegen(codegen::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex(e) => write!(f, "lex error: {e}"),
            Error::Syntax(e) => write!(f, "syntax error: {e}"),
            Error::Codegen(e) => write!(f, "codegen error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Lex(e) => Some(e),
            Error::Syntax(e) => Some(e),
            Error::Codegen(e) => Some(e),
        }
    }
}

impl From<lexer::Error> for Error {
    fn from(e: lexer::Error) -> Error {
        Error::Lex(e)
    }
}

impl From<parser::Error> for Error {
    fn from(e: parser::Error) -> Error {
        Error::Syntax(e)
    }
}

impl From<codegen::Error> for Error {
    fn from(e: codegen::Error) -> Error {
        Error::Codegen(e)
    }
}
