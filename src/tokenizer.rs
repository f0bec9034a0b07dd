use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};

/// Represents the smallest meaningful units (atoms) of the statement language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- Keywords ---
    Create,
    Database,
    Change,
    Table,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Update,
    Set,
    Delete,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Offset,
    Like,
    Unique,
    Not,

    // --- Identifiers & Literals ---
    /// A bare word: table or column name, type name, or an unquoted literal
    /// such as `NULL` or `true`.
    Ident(String),
    /// A run of digits and dots kept as written (e.g. `42`, `3.14`, `1.`).
    Number(String),
    /// A quoted string with its quotes removed. Both `'...'` and `"..."` are accepted.
    String(String),

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Semicolon `;`
    Semicolon,
    /// Wildcard symbol `*`
    Star,
    /// Minus sign, only meaningful in front of a number.
    Minus,
    /// `=`
    Equal,
    /// `==`
    DoubleEqual,
    /// `!=`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<`
    Lower,
    /// `<=`
    LowerEqual,
    /// A run of comparison characters that is not a known operator (e.g. `<>`).
    UnknownOperator(String),
    /// Any other printable character, e.g. `.`, `@` or `#`.
    Symbol(char),

    // --- Special ---
    /// Represents the End Of File/Input.
    Eof,
}

static EOF: Token = Token::Eof;

impl Token {
    /// Returns true for tokens that read as words, used to rebuild free text.
    pub fn is_word(&self) -> bool {
        !matches!(
            self,
            Token::LeftParen
                | Token::RightParen
                | Token::Comma
                | Token::Semicolon
                | Token::Star
                | Token::Minus
                | Token::Symbol(_)
                | Token::Eof
        )
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::Create
                | Token::Database
                | Token::Change
                | Token::Table
                | Token::Insert
                | Token::Into
                | Token::Values
                | Token::Select
                | Token::From
                | Token::Where
                | Token::Update
                | Token::Set
                | Token::Delete
                | Token::Order
                | Token::By
                | Token::Asc
                | Token::Desc
                | Token::Limit
                | Token::Offset
                | Token::Like
                | Token::Unique
                | Token::Not
        )
    }

    /// Identifiers and keywords: anything that may name a table, column or database.
    pub fn is_name(&self) -> bool {
        matches!(self, Token::Ident(_)) || self.is_keyword()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Create => "CREATE",
            Token::Database => "DATABASE",
            Token::Change => "CHANGE",
            Token::Table => "TABLE",
            Token::Insert => "INSERT",
            Token::Into => "INTO",
            Token::Values => "VALUES",
            Token::Select => "SELECT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::Update => "UPDATE",
            Token::Set => "SET",
            Token::Delete => "DELETE",
            Token::Order => "ORDER",
            Token::By => "BY",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::Like => "LIKE",
            Token::Unique => "UNIQUE",
            Token::Not => "NOT",
            Token::Ident(s) | Token::Number(s) | Token::UnknownOperator(s) => s,
            Token::String(s) => return write!(f, "'{s}'"),
            Token::Symbol(c) => return write!(f, "{c}"),
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Star => "*",
            Token::Minus => "-",
            Token::Equal => "=",
            Token::DoubleEqual => "==",
            Token::NotEqual => "!=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Lower => "<",
            Token::LowerEqual => "<=",
            Token::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// The tokens of one input together with the character range each was read from.
///
/// Keeps the source so callers can recover text exactly as written, such as a
/// keyword used as a column name or an unquoted literal spanning several tokens.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    spans: Vec<Range<usize>>,
    source: Vec<char>,
}

impl TokenStream {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The token at `index`, [Token::Eof] past the end.
    pub fn token(&self, index: usize) -> &Token {
        self.tokens.get(index).unwrap_or(&EOF)
    }

    /// Source text covered by the tokens in `range`, gaps included.
    ///
    /// ```
    /// # use coldb::tokenizer::Tokenizer;
    /// let stream = Tokenizer::new("VALUES(2024-01-05)").tokenize_stream().unwrap();
    /// assert_eq!(stream.text(2..7), "2024-01-05");
    /// ```
    pub fn text(&self, range: Range<usize>) -> String {
        let (Some(first), Some(last)) = (
            self.spans.get(range.start),
            range.end.checked_sub(1).and_then(|i| self.spans.get(i)),
        ) else {
            return String::new();
        };
        if first.start >= last.end {
            return String::new();
        }
        self.source[first.start..last.end].iter().collect()
    }

    /// True when the token at `index` starts right where the previous one ended.
    pub fn is_adjacent(&self, index: usize) -> bool {
        match (index.checked_sub(1), self.spans.get(index)) {
            (Some(previous), Some(span)) => self.spans[previous].end == span.start,
            _ => false,
        }
    }
}

/// A lexical scanner (lexer) that converts a raw statement into a sequence of [Token]s.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of tokens ending with [Token::Eof].
    ///
    /// # Errors
    /// Returns [Error::StatementSyntax] if a string literal is left unterminated.
    ///
    /// # Example
    /// ```
    /// # use coldb::tokenizer::{Tokenizer, Token};
    /// let mut t = Tokenizer::new("SELECT *");
    /// let tokens = t.tokenize().unwrap();
    /// assert_eq!(tokens[0], Token::Select);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        Ok(self.tokenize_stream()?.tokens)
    }

    /// Like [Tokenizer::tokenize] but keeps the span of every token.
    pub fn tokenize_stream(&mut self) -> Result<TokenStream> {
        let mut tokens = Vec::new();
        let mut spans = Vec::new();

        while !self.is_at_end() {
            self.skip_whitespace();

            if self.is_at_end() {
                break;
            }

            let start = self.position;
            let token = self.next_token()?;
            tokens.push(token);
            spans.push(start..self.position);
        }

        tokens.push(Token::Eof);
        spans.push(self.input.len()..self.input.len());
        Ok(TokenStream {
            tokens,
            spans,
            source: self.input.clone(),
        })
    }

    /// Identifies the next token based on the character at the current position.
    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            ';' => {
                self.advance();
                Ok(Token::Semicolon)
            }
            '*' => {
                self.advance();
                Ok(Token::Star)
            }
            '-' => {
                self.advance();
                Ok(Token::Minus)
            }
            '=' | '!' | '<' | '>' => Ok(self.read_operator()),
            '\'' | '"' => self.read_string(ch),
            c if c.is_ascii_digit() => Ok(self.read_number()),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c => {
                self.advance();
                Ok(Token::Symbol(c))
            }
        }
    }

    // --- Navigation Helpers ---

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Reads a word and determines if it's a reserved keyword or an identifier.
    /// Keywords are matched case-insensitively.
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric()
                || self.current_char() == '_'
                || self.current_char() == '$')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "DATABASE" => Token::Database,
            "CHANGE" => Token::Change,
            "TABLE" => Token::Table,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" => Token::Values,
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "LIMIT" => Token::Limit,
            "OFFSET" => Token::Offset,
            "LIKE" => Token::Like,
            "UNIQUE" => Token::Unique,
            "NOT" => Token::Not,
            _ => Token::Ident(ident),
        }
    }

    /// Reads a run of digits and dots. Malformed numerals such as `1.` or
    /// `1.2.3` are kept whole, literal classification turns them into text.
    fn read_number(&mut self) -> Token {
        let mut number = String::new();

        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || self.current_char() == '.')
        {
            number.push(self.current_char());
            self.advance();
        }

        Token::Number(number)
    }

    /// Reads a string literal enclosed in `quote`, no escape sequences.
    fn read_string(&mut self, quote: char) -> Result<Token> {
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        while !self.is_at_end() && self.current_char() != quote {
            string.push(self.current_char());
            self.advance();
        }

        if self.is_at_end() {
            return Err(Error::StatementSyntax("unterminated string".into()));
        }

        // Skip the closing quote
        self.advance();

        Ok(Token::String(string))
    }

    /// Reads the longest run of `=!<>` and maps it to an operator token.
    fn read_operator(&mut self) -> Token {
        let mut op = String::new();
        while !self.is_at_end() && matches!(self.current_char(), '=' | '!' | '<' | '>') {
            op.push(self.current_char());
            self.advance();
        }

        match op.as_str() {
            "=" => Token::Equal,
            "==" => Token::DoubleEqual,
            "!=" => Token::NotEqual,
            ">" => Token::Greater,
            ">=" => Token::GreaterEqual,
            "<" => Token::Lower,
            "<=" => Token::LowerEqual,
            _ => Token::UnknownOperator(op),
        }
    }
}
