//! Tree notation lexer.
//!
//! Tokenizes S-expression trees like `(call (name f) "(" ?args ")")`,
//! including the `?` wildcard family used by patterns and the `?#` section
//! headers of macro sources.

use std::fmt;

use super::ParseError;
use crate::tree::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    /// Quoted terminal: `"text"` or `'text'`.
    Text(String),
    /// Bare terminal or rule name.
    Atom(String),
    /// `?`
    Hole,
    /// `?name`
    Named(String),
    /// `?{m,n}`, `?{m,}`, `?{m}`
    Repeat { min: usize, max: Option<usize> },
    /// `?*`
    Rest,
    /// `?:` or `?:3`
    Body(Option<usize>),
    /// `?@Name`
    Call(String),
    /// `?#name`
    Section(String),
}

impl Token {
    pub fn is_wildcard(&self) -> bool {
        !matches!(
            self,
            Token::LParen | Token::RParen | Token::Text(_) | Token::Atom(_) | Token::Section(_)
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Text(text) => write!(f, "{text:?}"),
            Token::Atom(atom) => f.write_str(atom),
            Token::Hole => f.write_str("?"),
            Token::Named(name) => write!(f, "?{name}"),
            Token::Repeat { min, max: Some(max) } => write!(f, "?{{{min},{max}}}"),
            Token::Repeat { min, max: None } => write!(f, "?{{{min},}}"),
            Token::Rest => f.write_str("?*"),
            Token::Body(None) => f.write_str("?:"),
            Token::Body(Some(depth)) => write!(f, "?:{depth}"),
            Token::Call(name) => write!(f, "?@{name}"),
            Token::Section(name) => write!(f, "?#{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub location: Location,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    location: Location,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            location: Location::default(),
        }
    }

    /// Position just past the last byte consumed.
    pub fn location(&self) -> Location {
        self.location
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied()?;
        self.pos += 1;
        self.location.advance(ch);
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.advance();
                }
                b';' => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn is_atom_char(ch: u8) -> bool {
        !ch.is_ascii_whitespace() && !b"()\"';".contains(&ch)
    }

    fn is_ident_char(ch: u8) -> bool {
        ch.is_ascii_alphanumeric() || ch == b'_'
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();
            let location = self.location;
            let Some(ch) = self.peek() else { break };

            let token = match ch {
                b'(' => {
                    self.advance();
                    Token::LParen
                }
                b')' => {
                    self.advance();
                    Token::RParen
                }
                b'"' | b'\'' => self.read_string(ch, location)?,
                b'?' => {
                    self.advance();
                    self.read_wildcard(location)?
                }
                _ => Token::Atom(self.read_while(Self::is_atom_char)),
            };
            tokens.push(Spanned { token, location });
        }

        Ok(tokens)
    }

    fn read_string(&mut self, quote: u8, start: Location) -> Result<Token, ParseError> {
        self.advance();
        let mut bytes = Vec::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::UnterminatedString(start)),
                Some(c) if c == quote => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(other) => bytes.push(other),
                    None => return Err(ParseError::UnterminatedString(start)),
                },
                Some(c) => bytes.push(c),
            }
        }
        Ok(Token::Text(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Reads whatever follows a `?`.
    fn read_wildcard(&mut self, start: Location) -> Result<Token, ParseError> {
        let token = match self.peek() {
            Some(b'*') => {
                self.advance();
                Token::Rest
            }
            Some(b':') => {
                self.advance();
                let digits = self.read_while(|c| c.is_ascii_digit());
                Token::Body(self.number(&digits, start)?)
            }
            Some(b'{') => {
                self.advance();
                self.read_repeat(start)?
            }
            Some(b'@') => {
                self.advance();
                let name = self.read_while(Self::is_ident_char);
                if name.is_empty() {
                    return Err(self.invalid_wildcard("?@", start));
                }
                Token::Call(name)
            }
            Some(b'#') => {
                self.advance();
                let name = self.read_while(Self::is_ident_char);
                if name.is_empty() {
                    return Err(self.invalid_wildcard("?#", start));
                }
                Token::Section(name)
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                Token::Named(self.read_while(Self::is_ident_char))
            }
            _ => Token::Hole,
        };

        // `?x+y` or `?*foo` is a typo, not two tokens.
        if self.peek().is_some_and(Self::is_atom_char) {
            let rest = self.read_while(Self::is_atom_char);
            return Err(self.invalid_wildcard(&format!("{token}{rest}"), start));
        }
        Ok(token)
    }

    fn read_repeat(&mut self, start: Location) -> Result<Token, ParseError> {
        let min = self.read_while(|c| c.is_ascii_digit());
        let max = if self.peek() == Some(b',') {
            self.advance();
            let max = self.read_while(|c| c.is_ascii_digit());
            self.number(&max, start)?
        } else {
            Some(self.number(&min, start)?.unwrap_or(0))
        };
        if self.advance() != Some(b'}') || min.is_empty() {
            let rest = self.read_while(Self::is_atom_char);
            return Err(self.invalid_wildcard(&format!("?{{{min}{rest}"), start));
        }
        let min = self.number(&min, start)?.unwrap_or(0);
        Ok(Token::Repeat { min, max })
    }

    fn number(&self, digits: &str, start: Location) -> Result<Option<usize>, ParseError> {
        if digits.is_empty() {
            return Ok(None);
        }
        digits
            .parse()
            .map(Some)
            .map_err(|_| self.invalid_wildcard(digits, start))
    }

    fn invalid_wildcard(&self, text: &str, location: Location) -> ParseError {
        ParseError::InvalidWildcard {
            text: text.to_string(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_lexer_basic() {
        assert_eq!(
            tokens("(call f \"(\" x)"),
            vec![
                Token::LParen,
                Token::Atom("call".into()),
                Token::Atom("f".into()),
                Token::Text("(".into()),
                Token::Atom("x".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_lexer_wildcards() {
        assert_eq!(
            tokens("? ?x ?* ?{2,4} ?{1,} ?{3} ?: ?:2 ?@Incr ?#DEFINE"),
            vec![
                Token::Hole,
                Token::Named("x".into()),
                Token::Rest,
                Token::Repeat { min: 2, max: Some(4) },
                Token::Repeat { min: 1, max: None },
                Token::Repeat { min: 3, max: Some(3) },
                Token::Body(None),
                Token::Body(Some(2)),
                Token::Call("Incr".into()),
                Token::Section("DEFINE".into()),
            ]
        );
    }

    #[test]
    fn test_lexer_hole_before_paren() {
        assert_eq!(
            tokens("(args ?)"),
            vec![
                Token::LParen,
                Token::Atom("args".into()),
                Token::Hole,
                Token::RParen
            ]
        );
    }

    #[test]
    fn test_lexer_operators_are_atoms() {
        assert_eq!(
            tokens("+= = & |"),
            vec![
                Token::Atom("+=".into()),
                Token::Atom("=".into()),
                Token::Atom("&".into()),
                Token::Atom("|".into()),
            ]
        );
    }

    #[test]
    fn test_lexer_string_escapes() {
        assert_eq!(tokens(r#""a\"b\n""#), vec![Token::Text("a\"b\n".into())]);
        assert_eq!(tokens("'it'"), vec![Token::Text("it".into())]);
    }

    #[test]
    fn test_lexer_comments() {
        assert_eq!(
            tokens("; header\n(a ; trailing\n b)"),
            vec![
                Token::LParen,
                Token::Atom("a".into()),
                Token::Atom("b".into()),
                Token::RParen
            ]
        );
    }

    #[test]
    fn test_lexer_locations() {
        let spanned = Lexer::new("(a\n  b)").tokenize().unwrap();
        assert_eq!(spanned[0].location, Location::new(0, 0));
        assert_eq!(spanned[2].location, Location::new(1, 2));
        assert_eq!(spanned[3].location, Location::new(1, 3));
    }

    #[test]
    fn test_lexer_unterminated_string() {
        let err = Lexer::new("(a \"oops").tokenize().unwrap_err();
        assert_eq!(err, ParseError::UnterminatedString(Location::new(0, 3)));
    }

    #[test]
    fn test_lexer_bad_wildcards() {
        for input in ["?x+y", "?{2,4", "?{,3}", "?@", "?#", "?*x"] {
            let err = Lexer::new(input).tokenize().unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidWildcard { .. }),
                "Failed for input: {input}: {err:?}"
            );
        }
    }
}
