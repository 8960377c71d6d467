//! Macro source format.
//!
//! A transformation list is a sequence of `?#name <pattern>` sections. A
//! definition file groups such lists under headers:
//!
//! ```text
//! ?#DEFINE Incr | ?i ?v = (number 1)
//! ?#plus_eq (expr_stmt ?i += ?v)
//! ?#plus    (expr_stmt ?i = (arith_expr ?i + ?v))
//! ```
//!
//! `|` makes an any-of macro and `&` an all-of macro. A parameter may be
//! followed by `= <tree>`, its default.

use super::{MacroError, MacroParam, Mode};
use crate::notation::{Mode as ParseMode, Parser, Spanned, Token};
use crate::tree::Tree;

const DEFINE: &str = "DEFINE";

pub(crate) struct Definition {
    pub name: String,
    pub params: Vec<MacroParam>,
    pub mode: Mode,
    pub transformations: Vec<(String, Tree)>,
}

pub(crate) fn parse_transformations(source: &str) -> Result<Vec<(String, Tree)>, MacroError> {
    let mut parser = Parser::from_source(source, ParseMode::Pattern)?;
    let sections = sections(&mut parser)?;
    if let Some(spanned) = parser.peek() {
        return Err(malformed(
            format!("expected a '?#name' section, found '{}'", spanned.token),
            spanned,
        ));
    }
    Ok(sections)
}

pub(crate) fn parse_definitions(text: &str) -> Result<Vec<Definition>, MacroError> {
    let mut parser = Parser::from_source(text, ParseMode::Pattern)?;
    let mut definitions = Vec::new();
    while let Some(spanned) = parser.advance() {
        match &spanned.token {
            Token::Section(name) if name == DEFINE => {}
            other => {
                return Err(malformed(
                    format!("expected '?#{DEFINE}', found '{other}'"),
                    &spanned,
                ));
            }
        }
        definitions.push(definition(&mut parser)?);
    }
    Ok(definitions)
}

/// Everything after a `?#DEFINE` up to the next one.
fn definition(parser: &mut Parser) -> Result<Definition, MacroError> {
    let name = match parser.advance() {
        Some(Spanned {
            token: Token::Atom(name),
            ..
        }) => name,
        Some(spanned) => {
            return Err(malformed(
                format!("expected a macro name, found '{}'", spanned.token),
                &spanned,
            ));
        }
        None => return Err(eof(parser)),
    };

    let Some(spanned) = parser.advance() else {
        return Err(eof(parser));
    };
    let mode = match &spanned.token {
        Token::Atom(symbol) => Mode::from_symbol(symbol),
        _ => None,
    };
    let Some(mode) = mode else {
        return Err(malformed(
            format!("expected '&' or '|' after macro '{name}', found '{}'", spanned.token),
            &spanned,
        ));
    };

    let mut params = Vec::new();
    while let Some(Spanned {
        token: Token::Named(_),
        ..
    }) = parser.peek()
    {
        let Some(Spanned {
            token: Token::Named(param),
            ..
        }) = parser.advance()
        else {
            break;
        };
        let has_default = matches!(
            parser.peek(),
            Some(Spanned { token: Token::Atom(eq), .. }) if eq == "="
        );
        if has_default {
            parser.advance();
            params.push(MacroParam::with_default(param, parser.parse_tree()?));
        } else {
            params.push(MacroParam::new(param));
        }
    }

    let transformations = sections(parser)?;
    if let Some(spanned) = parser.peek() {
        if !matches!(&spanned.token, Token::Section(s) if s == DEFINE) {
            return Err(malformed(
                format!("unexpected '{}' in macro '{name}'", spanned.token),
                spanned,
            ));
        }
    }

    Ok(Definition {
        name,
        params,
        mode,
        transformations,
    })
}

/// `?#name <tree>` pairs, stopping before `?#DEFINE` or anything else.
fn sections(parser: &mut Parser) -> Result<Vec<(String, Tree)>, MacroError> {
    let mut out = Vec::new();
    loop {
        let name = match parser.peek() {
            Some(Spanned {
                token: Token::Section(name),
                ..
            }) if name != DEFINE => name.clone(),
            _ => return Ok(out),
        };
        parser.advance();
        out.push((name, parser.parse_tree()?));
    }
}

fn malformed(message: String, at: &Spanned) -> MacroError {
    MacroError::Malformed {
        message,
        location: at.location,
    }
}

fn eof(parser: &Parser) -> MacroError {
    MacroError::Malformed {
        message: "unexpected end of macro definition".to_string(),
        location: parser.location(),
    }
}
