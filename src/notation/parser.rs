//! Tree notation parser.
//!
//! Builds a [`Tree`] from the token stream. The same parser reads subject
//! trees and pattern trees; [`Mode`] decides whether wildcards are legal.

use super::ParseError;
use super::lexer::{Lexer, Spanned, Token};
use crate::tree::{Location, NodeId, NodeKind, Tree, Wildcard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain trees: any `?` construct is an error.
    Subject,
    /// Trees that may contain wildcards and macro calls.
    Pattern,
}

/// What a node head turned out to be.
struct Head {
    kind: NodeKind,
    location: Location,
    /// Children follow and end with `)`.
    open: bool,
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    mode: Mode,
    end: Location,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>, mode: Mode, end: Location) -> Self {
        Self {
            tokens,
            pos: 0,
            mode,
            end,
        }
    }

    pub fn from_source(source: &str, mode: Mode) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Ok(Self::new(tokens, mode, lexer.location()))
    }

    pub fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    pub fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some(tok)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Location of the next token, or of the end of input.
    pub fn location(&self) -> Location {
        self.peek().map_or(self.end, |s| s.location)
    }

    pub fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(spanned) => Err(unexpected(spanned)),
        }
    }

    /// Read one complete node, with its subtree, starting at the next token.
    pub fn parse_tree(&mut self) -> Result<Tree, ParseError> {
        let head = self.parse_head()?;
        let open = head.open;
        let mut tree = Tree::new(head.kind, head.location);
        if open {
            self.parse_children(&mut tree, NodeId::ROOT)?;
        }
        Ok(tree)
    }

    fn parse_children(&mut self, tree: &mut Tree, parent: NodeId) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof(self.end)),
                Some(Spanned {
                    token: Token::RParen,
                    ..
                }) => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    let head = self.parse_head()?;
                    let open = head.open;
                    let id = tree.add_child(parent, head.kind, head.location);
                    if open {
                        self.parse_children(tree, id)?;
                    }
                }
            }
        }

        let node = tree.node(parent);
        if let NodeKind::Wildcard(w @ Wildcard::Body { .. }) = node.kind() {
            if node.child_count() != 1 {
                return Err(ParseError::SearchArity {
                    token: w.to_string(),
                    found: node.child_count(),
                    location: node.location(),
                });
            }
        }
        Ok(())
    }

    fn parse_head(&mut self) -> Result<Head, ParseError> {
        let Some(spanned) = self.advance() else {
            return Err(ParseError::UnexpectedEof(self.end));
        };
        let location = spanned.location;
        self.check_mode(&spanned)?;

        let leaf = |kind: NodeKind| -> Result<Head, ParseError> {
            Ok(Head {
                kind,
                location,
                open: false,
            })
        };

        match spanned.token {
            Token::LParen => self.parse_open(location),
            Token::Text(text) | Token::Atom(text) => leaf(NodeKind::Terminal(text)),
            Token::Hole => leaf(NodeKind::Wildcard(Wildcard::Any)),
            Token::Named(name) => leaf(NodeKind::Wildcard(Wildcard::Named(name))),
            Token::Repeat { min, max } => leaf(NodeKind::Wildcard(Wildcard::Repeat { min, max })),
            Token::Rest => leaf(NodeKind::Wildcard(Wildcard::Rest)),
            Token::Call(name) => leaf(NodeKind::Wildcard(Wildcard::Call {
                name,
                args: Vec::new(),
            })),
            Token::RParen | Token::Body(_) | Token::Section(_) => Err(unexpected(&spanned)),
        }
    }

    /// Everything after a `(`.
    fn parse_open(&mut self, location: Location) -> Result<Head, ParseError> {
        let Some(spanned) = self.advance() else {
            return Err(ParseError::UnexpectedEof(self.end));
        };
        self.check_mode(&spanned)?;

        match spanned.token {
            Token::Atom(name) => Ok(Head {
                kind: NodeKind::Rule(name),
                location,
                open: true,
            }),
            Token::Body(max_depth) => Ok(Head {
                kind: NodeKind::Wildcard(Wildcard::Body { max_depth }),
                location,
                open: true,
            }),
            Token::Call(name) => {
                let args = self.parse_call_args()?;
                Ok(Head {
                    kind: NodeKind::Wildcard(Wildcard::Call { name, args }),
                    location,
                    open: false,
                })
            }
            _ => Err(ParseError::ExpectedRuleName {
                token: spanned.token.to_string(),
                location: spanned.location,
            }),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<String>, ParseError> {
        let mut args = Vec::new();
        loop {
            let Some(spanned) = self.advance() else {
                return Err(ParseError::UnexpectedEof(self.end));
            };
            match spanned.token {
                Token::RParen => return Ok(args),
                Token::Named(name) => args.push(name),
                other => {
                    return Err(ParseError::MacroArgument {
                        token: other.to_string(),
                        location: spanned.location,
                    });
                }
            }
        }
    }

    fn check_mode(&self, spanned: &Spanned) -> Result<(), ParseError> {
        if self.mode == Mode::Subject && spanned.token.is_wildcard() {
            return Err(ParseError::WildcardInSubject {
                token: spanned.token.to_string(),
                location: spanned.location,
            });
        }
        Ok(())
    }
}

fn unexpected(spanned: &Spanned) -> ParseError {
    ParseError::UnexpectedToken {
        token: spanned.token.to_string(),
        location: spanned.location,
    }
}
