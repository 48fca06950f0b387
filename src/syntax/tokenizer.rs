//! The tokenizer splits source text into tokens with source locations.
//!
//! Strings are interpreted here (escape sequences included), so the parser
//! only ever sees complete tokens. Malformed input — an unterminated string
//! or comment, an unknown escape — is reported as a [`ParseError`] carrying
//! the location where the offending construct started.
use super::errors::ParseError;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Position in the source text, 1-based line and column.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Copy, Clone)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Default for Location {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    // Primitive
    Ident(String),
    Int(i32),
    Str(String),

    // Keywords
    Array,
    Break,
    Do,
    Else,
    End,
    For,
    Function,
    If,
    In,
    Let,
    Nil,
    Of,
    Then,
    To,
    Type,
    Var,
    While,

    // Operators
    Assign, // ":="
    Eq,     // "="
    Neq,    // "<>"
    Lt,     // "<"
    Le,     // "<="
    Gt,     // ">"
    Ge,     // ">="

    // Punctuation
    Char(char),

    // End of input source
    Eos,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "id<{}>", name),
            TokenKind::Int(i) => write!(f, "int<{}>", i),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::Array => write!(f, "array"),
            TokenKind::Break => write!(f, "break"),
            TokenKind::Do => write!(f, "do"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::End => write!(f, "end"),
            TokenKind::For => write!(f, "for"),
            TokenKind::Function => write!(f, "function"),
            TokenKind::If => write!(f, "if"),
            TokenKind::In => write!(f, "in"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::Nil => write!(f, "nil"),
            TokenKind::Of => write!(f, "of"),
            TokenKind::Then => write!(f, "then"),
            TokenKind::To => write!(f, "to"),
            TokenKind::Type => write!(f, "type"),
            TokenKind::Var => write!(f, "var"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Assign => write!(f, ":="),
            TokenKind::Eq => write!(f, "="),
            TokenKind::Neq => write!(f, "<>"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Le => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Ge => write!(f, ">="),
            TokenKind::Char(c) => write!(f, "{}", c),
            TokenKind::Eos => write!(f, "(EOF)"),
        }
    }
}

#[derive(Debug)]
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,

    /// Remember a peeked value.
    peeked: Option<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn from_string<S: AsRef<str> + ?Sized>(src: &'a S) -> Tokenizer<'a> {
        Tokenizer {
            chars: src.as_ref().chars().peekable(),
            line: 1,
            column: 1,
            peeked: None,
        }
    }

    pub fn current_location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    /// Returns a reference to the `next_token()` value without advancing.
    pub fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.peeked.is_none() {
            let token = self.advance_token()?;
            self.peeked = Some(token);
        }
        Ok(self.peeked.as_ref().expect("peeked token"))
    }

    pub fn peek_kind(&mut self) -> Result<&TokenKind, ParseError> {
        Ok(&self.peek()?.kind)
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.advance_token(),
        }
    }

    fn advance_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;

        let loc = self.current_location();
        let kind = match self.peek_char() {
            None => TokenKind::Eos,
            Some(nextc) => match nextc {
                '0'..='9' => self.read_integer(nextc, loc)?,
                'a'..='z' | 'A'..='Z' => self.read_name(nextc),
                '"' => self.read_string(loc)?,
                ':' | '<' | '>' => self.read_operator(nextc),
                '=' => {
                    self.next_char();
                    TokenKind::Eq
                }
                x => {
                    self.next_char();
                    TokenKind::Char(x)
                }
            },
        };

        Ok(Token { kind, loc })
    }

    fn read_operator(&mut self, nextc: char) -> TokenKind {
        let c = nextc;
        self.next_char();

        let nextc = match self.peek_char() {
            None => {
                return match c {
                    '<' => TokenKind::Lt,
                    '>' => TokenKind::Gt,
                    _ => TokenKind::Char(c),
                };
            }
            Some(c) => c,
        };

        let kind = match (c, nextc) {
            (':', '=') => TokenKind::Assign,
            ('<', '=') => TokenKind::Le,
            ('<', '>') => TokenKind::Neq,
            ('>', '=') => TokenKind::Ge,
            ('<', _) => return TokenKind::Lt,
            ('>', _) => return TokenKind::Gt,
            _ => return TokenKind::Char(c),
        };

        self.next_char();
        kind
    }

    fn read_name(&mut self, nextc: char) -> TokenKind {
        let mut value = nextc.to_string();
        self.next_char();

        while let Some(nextc) = self.peek_char() {
            match nextc {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => {
                    value.push(nextc);
                }
                _ => break,
            };
            self.next_char();
        }

        match value.as_str() {
            "array" => TokenKind::Array,
            "break" => TokenKind::Break,
            "do" => TokenKind::Do,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "for" => TokenKind::For,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "in" => TokenKind::In,
            "let" => TokenKind::Let,
            "nil" => TokenKind::Nil,
            "of" => TokenKind::Of,
            "then" => TokenKind::Then,
            "to" => TokenKind::To,
            "type" => TokenKind::Type,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            _ => TokenKind::Ident(value),
        }
    }

    fn read_integer(&mut self, nextc: char, loc: Location) -> Result<TokenKind, ParseError> {
        let mut value: i64 = i64::from(nextc as u32) - i64::from('0' as u32);
        self.next_char();

        while let Some(x @ '0'..='9') = self.peek_char() {
            let n = i64::from(x as u32) - i64::from('0' as u32);

            value = value * 10 + n;
            if value > i64::from(i32::MAX) {
                return Err(ParseError::syntax_error(loc, "Integer literal too large"));
            }
            self.next_char();
        }

        Ok(TokenKind::Int(value as i32))
    }

    fn read_string(&mut self, loc: Location) -> Result<TokenKind, ParseError> {
        self.next_char(); // opening '"'

        let mut value = String::new();
        loop {
            let c = match self.next_char() {
                None => return Err(ParseError::syntax_error(loc, "Unterminated string")),
                Some(c) => c,
            };

            match c {
                '"' => return Ok(TokenKind::Str(value)),
                '\n' => return Err(ParseError::syntax_error(loc, "Unterminated string")),
                '\\' => value.push(self.read_escape_sequence()?),
                c => value.push(c),
            }
        }
    }

    fn read_escape_sequence(&mut self) -> Result<char, ParseError> {
        let loc = self.current_location();
        let c = match self.next_char() {
            None => return Err(ParseError::syntax_error(loc, "Unterminated string")),
            Some(c) => c,
        };

        let c = match c {
            'n' => '\n',
            't' => '\t',
            '"' => '"',
            '\\' => '\\',
            '0'..='9' => return self.read_ascii_escape(c, loc),
            c => {
                return Err(ParseError::syntax_error(
                    loc,
                    format!("Unrecognized escape sequence '\\{}'", c),
                ));
            }
        };

        Ok(c)
    }

    /// `\ddd` — three decimal digits naming an ASCII code.
    fn read_ascii_escape(&mut self, first: char, loc: Location) -> Result<char, ParseError> {
        let mut code = first as u32 - '0' as u32;
        for _ in 0..2 {
            match self.next_char() {
                Some(d @ '0'..='9') => code = code * 10 + (d as u32 - '0' as u32),
                _ => {
                    return Err(ParseError::syntax_error(
                        loc,
                        "Expected three digits in an ASCII escape sequence",
                    ));
                }
            }
        }

        if code > 127 {
            return Err(ParseError::syntax_error(
                loc,
                format!("ASCII escape sequence \\{} is out of range", code),
            ));
        }

        Ok(code as u8 as char)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\n') | Some('\r') => {
                    self.next_char();
                }
                Some('/') if self.peek_second_char() == Some('*') => {
                    self.skip_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Comments nest: `/* outer /* inner */ still outer */`.
    fn skip_comment(&mut self) -> Result<(), ParseError> {
        let loc = self.current_location();
        self.next_char(); // '/'
        self.next_char(); // '*'

        let mut depth = 1;
        while depth > 0 {
            match self.next_char() {
                None => return Err(ParseError::syntax_error(loc, "Unterminated comment")),
                Some('/') if self.peek_char() == Some('*') => {
                    self.next_char();
                    depth += 1;
                }
                Some('*') if self.peek_char() == Some('/') => {
                    self.next_char();
                    depth -= 1;
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next()?;

        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(c)
    }
}
