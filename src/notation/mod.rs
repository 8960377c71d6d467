//! Tree notation: a small S-expression syntax for syntax trees.
//!
//! This is the reader the rest of the crate uses in place of a language
//! specific parser. Subject trees are plain nested rules and terminals;
//! pattern trees may additionally use the `?` wildcard family.

pub mod lexer;
pub mod parser;

use thiserror::Error;

use crate::tree::{Location, Tree};

pub use lexer::{Lexer, Spanned, Token};
pub use parser::{Mode, Parser};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected '{token}' at {location}")]
    UnexpectedToken { token: String, location: Location },
    #[error("unexpected end of input at {0}")]
    UnexpectedEof(Location),
    #[error("unterminated string starting at {0}")]
    UnterminatedString(Location),
    #[error("invalid wildcard '{text}' at {location}")]
    InvalidWildcard { text: String, location: Location },
    #[error("wildcard '{token}' is not allowed in a subject tree at {location}")]
    WildcardInSubject { token: String, location: Location },
    #[error("expected a rule name after '(' at {location}, found '{token}'")]
    ExpectedRuleName { token: String, location: Location },
    #[error("'{token}' at {location} takes exactly one embedded pattern, found {found}")]
    SearchArity {
        token: String,
        found: usize,
        location: Location,
    },
    #[error("macro arguments must be named wildcards, found '{token}' at {location}")]
    MacroArgument { token: String, location: Location },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match self {
            ParseError::UnexpectedToken { location, .. }
            | ParseError::InvalidWildcard { location, .. }
            | ParseError::WildcardInSubject { location, .. }
            | ParseError::ExpectedRuleName { location, .. }
            | ParseError::SearchArity { location, .. }
            | ParseError::MacroArgument { location, .. } => *location,
            ParseError::UnexpectedEof(location) | ParseError::UnterminatedString(location) => {
                *location
            }
        }
    }
}

/// Parse exactly one tree from `source`.
pub fn parse(source: &str, mode: Mode) -> Result<Tree, ParseError> {
    let mut parser = Parser::from_source(source, mode)?;
    let tree = parser.parse_tree()?;
    parser.expect_end()?;
    Ok(tree)
}

pub fn parse_subject(source: &str) -> Result<Tree, ParseError> {
    parse(source, Mode::Subject)
}

pub fn parse_pattern(source: &str) -> Result<Tree, ParseError> {
    parse(source, Mode::Pattern)
}
