use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Drop,
    And,
    Or,
    Not,
    Null,
    Is,
    In,
    Like,
    Between,
    Order,
    By,
    Asc,
    Desc,
    Group,
    Having,
    Join,
    Inner,
    Left,
    Outer,
    On,
    As,
    Distinct,
    Limit,
    Offset,
    True,
    False,
    Primary,
    Key,
    Unique,
    Foreign,
    References,
    If,
    Exists,

    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Concat,

    // Punctuation
    Comma,
    Dot,
    Semicolon,
    LParen,
    RParen,

    // Special
    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_uppercase().as_str() {
            "SELECT" => TokenKind::Select,
            "FROM" => TokenKind::From,
            "WHERE" => TokenKind::Where,
            "INSERT" => TokenKind::Insert,
            "INTO" => TokenKind::Into,
            "VALUES" => TokenKind::Values,
            "UPDATE" => TokenKind::Update,
            "SET" => TokenKind::Set,
            "DELETE" => TokenKind::Delete,
            "CREATE" => TokenKind::Create,
            "TABLE" => TokenKind::Table,
            "DROP" => TokenKind::Drop,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            "NULL" => TokenKind::Null,
            "IS" => TokenKind::Is,
            "IN" => TokenKind::In,
            "LIKE" => TokenKind::Like,
            "BETWEEN" => TokenKind::Between,
            "ORDER" => TokenKind::Order,
            "BY" => TokenKind::By,
            "ASC" => TokenKind::Asc,
            "DESC" => TokenKind::Desc,
            "GROUP" => TokenKind::Group,
            "HAVING" => TokenKind::Having,
            "JOIN" => TokenKind::Join,
            "INNER" => TokenKind::Inner,
            "LEFT" => TokenKind::Left,
            "OUTER" => TokenKind::Outer,
            "ON" => TokenKind::On,
            "AS" => TokenKind::As,
            "DISTINCT" => TokenKind::Distinct,
            "LIMIT" => TokenKind::Limit,
            "OFFSET" => TokenKind::Offset,
            "TRUE" => TokenKind::True,
            "FALSE" => TokenKind::False,
            "PRIMARY" => TokenKind::Primary,
            "KEY" => TokenKind::Key,
            "UNIQUE" => TokenKind::Unique,
            "FOREIGN" => TokenKind::Foreign,
            "REFERENCES" => TokenKind::References,
            "IF" => TokenKind::If,
            "EXISTS" => TokenKind::Exists,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(i) => write!(f, "integer {}", i),
            TokenKind::Float(v) => write!(f, "float {}", v),
            TokenKind::String(s) => write!(f, "string '{}'", s),
            TokenKind::Identifier(s) => write!(f, "identifier {}", s),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::NotEq => write!(f, "'<>'"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::Concat => write!(f, "'||'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Eof => write!(f, "end of input"),
            keyword => write!(f, "{}", format!("{:?}", keyword).to_uppercase()),
        }
    }
}

/// Location of a token in the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at {span}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Turns SQL text into tokens.
///
/// The lexer is an iterator: it yields tokens one at a time, finishing with
/// a single `Eof` token. After an error it yields nothing more.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Collects the whole token stream, `Eof` included. The first error
    /// aborts tokenization.
    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        self.collect()
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments()?;

        let span = self.span();

        let c = match self.peek() {
            None => return Ok(Token::new(TokenKind::Eof, span)),
            Some(c) => c,
        };

        let kind = match c {
            ',' => self.single(TokenKind::Comma),
            '.' => self.single(TokenKind::Dot),
            ';' => self.single(TokenKind::Semicolon),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '=' => self.single(TokenKind::Eq),
            '<' => {
                self.advance();
                match self.peek() {
                    Some('=') => self.single(TokenKind::LtEq),
                    Some('>') => self.single(TokenKind::NotEq),
                    _ => TokenKind::Lt,
                }
            }
            '>' => {
                self.advance();
                match self.peek() {
                    Some('=') => self.single(TokenKind::GtEq),
                    _ => TokenKind::Gt,
                }
            }
            '!' => {
                self.advance();
                match self.peek() {
                    Some('=') => self.single(TokenKind::NotEq),
                    _ => return Err(LexError::new("Unexpected character '!'", span)),
                }
            }
            '|' => {
                self.advance();
                match self.peek() {
                    Some('|') => self.single(TokenKind::Concat),
                    _ => return Err(LexError::new("Unexpected character '|'", span)),
                }
            }
            '\'' => TokenKind::String(self.read_quoted('\'', "string literal", span)?),
            '"' => TokenKind::Identifier(self.read_quoted('"', "quoted identifier", span)?),
            c if c.is_ascii_digit() => self.read_number(span)?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier_or_keyword(),
            c => {
                return Err(LexError::new(
                    format!("Unexpected character '{}'", c),
                    span,
                ))
            }
        };

        Ok(Token::new(kind, span))
    }

    fn span(&mut self) -> Span {
        Span {
            offset: self.offset(),
            line: self.line,
            column: self.column,
        }
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('-'), Some('-')) => {
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let span = self.span();
        self.advance(); // '/'
        self.advance(); // '*'
        loop {
            match self.advance() {
                None => return Err(LexError::new("Unterminated block comment", span)),
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    /// Reads text between `quote` characters; a doubled quote stands for one.
    fn read_quoted(&mut self, quote: char, what: &str, span: Span) -> Result<String, LexError> {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(LexError::new(format!("Unterminated {}", what), span)),
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        value.push(quote);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
        }

        Ok(value)
    }

    fn read_number(&mut self, span: Span) -> Result<TokenKind, LexError> {
        let start = span.offset;
        let mut has_dot = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let end = self.offset();
        let value = &self.input[start..end];
        if has_dot {
            match value.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(TokenKind::Float(f)),
                Ok(_) => Err(LexError::new(
                    format!("Float literal out of range: {}", value),
                    span,
                )),
                Err(_) => Err(LexError::new(format!("Invalid float literal: {}", value), span)),
            }
        } else {
            value
                .parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| LexError::new(format!("Integer literal out of range: {}", value), span))
        }
    }

    fn read_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.offset();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let end = self.offset();
        let value = &self.input[start..end];
        TokenKind::keyword(value).unwrap_or_else(|| TokenKind::Identifier(value.to_string()))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        match &token {
            Ok(t) if t.kind != TokenKind::Eof => {}
            _ => self.finished = true,
        }
        Some(token)
    }
}

/// Tokenizes a whole statement.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}

/// Splits a script into statement texts at top-level semicolons. Semicolons
/// inside quotes and comments do not split; blank statements are dropped.
///
/// Splitting never fails: a statement with a lexical error is returned whole
/// and reports the error when it is run.
pub fn split_statements(script: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut chars = script.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            // A doubled quote closes and reopens, which splits the same way
            '\'' | '"' => {
                for (_, d) in chars.by_ref() {
                    if d == c {
                        break;
                    }
                }
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                for (_, d) in chars.by_ref() {
                    if d == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = ' ';
                for (_, d) in chars.by_ref() {
                    if prev == '*' && d == '/' {
                        break;
                    }
                    prev = d;
                }
            }
            ';' => {
                push_statement(&mut statements, &script[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_statement(&mut statements, &script[start..]);

    statements
}

fn push_statement<'a>(statements: &mut Vec<&'a str>, text: &'a str) {
    let text = text.trim();
    // Whitespace and comments only
    let blank = matches!(tokenize(text).as_deref(), Ok([only]) if only.kind == TokenKind::Eof);
    if !blank {
        statements.push(text);
    }
}
