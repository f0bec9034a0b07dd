use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::tokenizer::{Token, TokenStream, Tokenizer};
use crate::value::{Value, classify_literal};
use crate::{ColumnDef, ast::*};

/// Recursive descent parser turning a token stream into one [Statement].
pub struct Parser {
    stream: TokenStream,
    position: usize,
}

/// Tokenizes and parses a single statement.
///
/// ```
/// # use coldb::parser::parse_statement;
/// # use coldb::ast::Statement;
/// let statement = parse_statement("DELETE FROM users WHERE id = 3;").unwrap();
/// assert!(matches!(statement, Statement::Delete(_)));
/// ```
pub fn parse_statement(sql: &str) -> Result<Statement> {
    if sql.trim().is_empty() {
        return Err(Error::StatementSyntax("empty query".into()));
    }
    let stream = Tokenizer::new(sql).tokenize_stream()?;
    Parser::new(stream).parse()
}

impl Parser {
    pub fn new(stream: TokenStream) -> Self {
        Self {
            stream,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            Token::Create => match self.peek_token() {
                Token::Database => self.parse_create_database(),
                _ => self.parse_create_table(),
            },
            Token::Change => self.parse_change_database(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            other => Err(Error::StatementSyntax(format!(
                "unrecognized statement starting with {other}"
            ))),
        }?;

        // semicolon is optional so skip it
        if matches!(self.current_token(), Token::Semicolon) {
            self.advance();
        }

        // Check we are at the end of the statement
        if !self.is_at_end() {
            return Err(Error::StatementSyntax(format!(
                "unexpected {} after statement",
                self.current_token()
            )));
        }

        Ok(statement)
    }

    //helpers
    fn current_token(&self) -> &Token {
        self.stream.token(self.position)
    }

    fn peek_token(&self) -> &Token {
        self.stream.token(self.position + 1)
    }

    fn advance(&mut self) {
        if self.position + 1 < self.stream.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn is_clause_end(&self) -> bool {
        matches!(self.current_token(), Token::Semicolon | Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(Error::StatementSyntax(format!(
                "expected {expected}, found {}",
                self.current_token()
            )))
        }
    }

    /// A name as written. Keywords are accepted too, so `desc` or `order`
    /// can name a column.
    fn consume_ident(&mut self) -> Result<String> {
        let token = self.current_token();
        if !token.is_name() {
            return Err(Error::StatementSyntax(format!(
                "expected identifier, found {token}"
            )));
        }
        let name = self.stream.text(self.position..self.position + 1);
        self.advance();
        Ok(name)
    }

    fn consume_count(&mut self) -> Result<usize> {
        let count = match self.current_token() {
            Token::Number(n) => n.parse::<usize>().map_err(|_| {
                Error::StatementSyntax(format!("expected a non-negative integer, found {n}"))
            })?,
            other => {
                return Err(Error::StatementSyntax(format!(
                    "expected a non-negative integer, found {other}"
                )));
            }
        };
        self.advance();
        Ok(count)
    }

    /// Comma separated identifiers up to (not including) the closing token.
    fn parse_ident_list(&mut self) -> Result<Vec<String>> {
        let mut idents = vec![self.consume_ident()?];
        while matches!(self.current_token(), Token::Comma) {
            self.advance();
            idents.push(self.consume_ident()?);
        }
        Ok(idents)
    }

    /// A literal in an INSERT or SET clause: the raw text up to the next
    /// top-level `,` or `)`, a WHERE, or the end of the statement.
    fn parse_literal(&mut self) -> Result<Value> {
        let start = self.position;
        let mut depth = 0usize;
        loop {
            match self.current_token() {
                Token::Semicolon | Token::Eof => break,
                Token::Comma | Token::RightParen | Token::Where if depth == 0 => break,
                Token::LeftParen => depth += 1,
                Token::RightParen => depth -= 1,
                _ => {}
            }
            self.advance();
        }

        if self.position == start {
            return Err(Error::StatementSyntax(format!(
                "expected a value, found {}",
                self.current_token()
            )));
        }
        Ok(classify_literal(&self.stream.text(start..self.position)))
    }

    fn parse_condition(&mut self) -> Result<Condition> {
        let (condition, consumed) = Condition::parse_tokens(&self.stream, self.position)?;
        for _ in 0..consumed {
            self.advance();
        }
        Ok(condition)
    }

    /// After a WHERE condition only `allowed` clauses or the end may follow.
    fn expect_after_condition(&self, allowed: &[Token]) -> Result<()> {
        if self.is_clause_end() || allowed.contains(self.current_token()) {
            return Ok(());
        }
        Err(Error::ConditionSyntax(format!(
            "unexpected {} after condition, only a single comparison is supported",
            self.current_token()
        )))
    }

    fn parse_create_database(&mut self) -> Result<Statement> {
        self.consume(Token::Create)?;
        self.consume(Token::Database)?;
        Ok(Statement::CreateDatabase(self.consume_ident()?))
    }

    fn parse_change_database(&mut self) -> Result<Statement> {
        self.consume(Token::Change)?;
        self.consume(Token::Database)?;
        Ok(Statement::ChangeDatabase(self.consume_ident()?))
    }

    /// `<name> <type tokens...>` where `UNIQUE`, `NOT NULL` and `NULL` may
    /// appear anywhere among the type tokens.
    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.consume_ident()?;

        let mut type_tokens: Vec<Token> = vec![];
        let mut depth = 0usize;
        loop {
            match self.current_token() {
                Token::Comma | Token::RightParen if depth == 0 => break,
                Token::Eof | Token::Semicolon => {
                    return Err(Error::StatementSyntax(format!(
                        "unterminated definition of column {name:?}"
                    )));
                }
                Token::LeftParen => depth += 1,
                Token::RightParen => depth -= 1,
                _ => {}
            }
            type_tokens.push(self.current_token().clone());
            self.advance();
        }

        let mut is_unique = false;
        let mut not_null = false;
        let mut declared = String::new();
        let mut previous_was_word = false;
        let mut tokens = type_tokens.into_iter().peekable();
        while let Some(token) = tokens.next() {
            match &token {
                Token::Unique => {
                    is_unique = true;
                    continue;
                }
                Token::Not if tokens.peek().is_some_and(is_null_word) => {
                    tokens.next();
                    not_null = true;
                    continue;
                }
                token if is_null_word(token) => continue,
                _ => {}
            }
            if previous_was_word && token.is_word() {
                declared.push(' ');
            }
            previous_was_word = token.is_word();
            declared.push_str(&token.to_string());
        }
        if declared.is_empty() {
            declared.push_str("TEXT");
        }

        Ok(ColumnDef {
            name,
            declared_type: declared,
            is_unique,
            not_null,
        })
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.consume(Token::Create)?; // advance if CREATE
        self.consume(Token::Table)?; // advance if TABLE
        let name = self.consume_ident()?;
        self.consume(Token::LeftParen)?;
        let mut columns = vec![];
        loop {
            columns.push(self.parse_column_def()?);
            match self.current_token() {
                Token::RightParen => {
                    self.advance();
                    break;
                }
                Token::Comma => {
                    self.advance();
                    continue;
                }
                other => {
                    return Err(Error::StatementSyntax(format!(
                        "expected ',' or ')', found {other}"
                    )));
                }
            }
        }
        Ok(Statement::CreateTable(CreateTable { name, columns }))
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.consume_ident()?;

        let columns = if matches!(self.current_token(), Token::LeftParen) {
            self.advance();
            let columns = self.parse_ident_list()?;
            self.consume(Token::RightParen)?;
            Some(columns)
        } else {
            None
        };

        self.consume(Token::Values)?;
        self.consume(Token::LeftParen)?;
        let mut values = vec![self.parse_literal()?];
        while matches!(self.current_token(), Token::Comma) {
            self.advance();
            values.push(self.parse_literal()?);
        }
        self.consume(Token::RightParen)?;

        Ok(Statement::InsertInto(InsertInto {
            table,
            columns,
            values,
        }))
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(Token::Select)?;
        let columns = if matches!(self.current_token(), Token::Star) {
            self.advance();
            ColumnsSelect::Star
        } else {
            ColumnsSelect::ColumnsNames(self.parse_ident_list()?)
        };
        self.consume(Token::From)?;
        let table = self.consume_ident()?;

        let where_clause = if matches!(self.current_token(), Token::Where) {
            self.advance();
            let condition = self.parse_condition()?;
            self.expect_after_condition(&[Token::Order, Token::Limit])?;
            Some(condition)
        } else {
            None
        };

        let order_by = if matches!(self.current_token(), Token::Order) {
            self.advance();
            self.consume(Token::By)?;
            let column = self.consume_ident()?;
            let direction = match self.current_token() {
                Token::Asc => {
                    self.advance();
                    SortDirection::Asc
                }
                Token::Desc => {
                    self.advance();
                    SortDirection::Desc
                }
                _ => SortDirection::Asc,
            };
            Some(OrderByClause { column, direction })
        } else {
            None
        };

        let mut limit = None;
        let mut offset = 0;
        if matches!(self.current_token(), Token::Limit) {
            self.advance();
            limit = Some(self.consume_count()?);
            if matches!(self.current_token(), Token::Offset) {
                self.advance();
                offset = self.consume_count()?;
            }
        }

        Ok(Statement::Select(Select {
            columns,
            table,
            where_clause,
            order_by,
            limit,
            offset,
        }))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.consume(Token::Update)?;
        let table = self.consume_ident()?;
        self.consume(Token::Set)?;

        let mut assignments: Vec<(String, Value)> = vec![];
        loop {
            let column = self.consume_ident()?;
            self.consume(Token::Equal)?;
            let value = self.parse_literal()?;
            // a repeated column keeps the last value
            match assignments.iter_mut().find(|(name, _)| *name == column) {
                Some(existing) => existing.1 = value,
                None => assignments.push((column, value)),
            }
            if !matches!(self.current_token(), Token::Comma) {
                break;
            }
            self.advance();
        }

        let where_clause = if matches!(self.current_token(), Token::Where) {
            self.advance();
            let condition = self.parse_condition()?;
            self.expect_after_condition(&[])?;
            Some(condition)
        } else {
            None
        };

        Ok(Statement::Update(Update {
            table,
            assignments,
            where_clause,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;

        if self.is_clause_end() {
            return Err(Error::UnsafeDelete);
        }
        self.consume(Token::Where)?;
        let where_clause = self.parse_condition()?;
        self.expect_after_condition(&[])?;

        Ok(Statement::Delete(Delete {
            table,
            where_clause,
        }))
    }
}

fn is_null_word(token: &Token) -> bool {
    matches!(token, Token::Ident(word) if word.eq_ignore_ascii_case("null"))
}
