use super::ast::*;
use super::lexer::{tokenize, Span, Token, TokenKind};
use crate::storage::table::{ColumnDef, Constraints, DataType, ForeignKey, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found} at {span}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        span: Span,
    },
    #[error("expected {expected}, found end of input")]
    UnexpectedEof { expected: String },
    #[error("unknown column type '{name}' at {span}")]
    InvalidType { name: String, span: Span },
}

/// Recursive-descent parser for a single SQL statement.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, span));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parses exactly one statement, optionally terminated by `;`. Any
    /// trailing tokens are an error.
    pub fn parse(&mut self) -> Result<Statement, ParseError> {
        let stmt = match self.peek_kind() {
            TokenKind::Select => Statement::Select(self.parse_select()?),
            TokenKind::Insert => Statement::Insert(self.parse_insert()?),
            TokenKind::Update => Statement::Update(self.parse_update()?),
            TokenKind::Delete => Statement::Delete(self.parse_delete()?),
            TokenKind::Create => Statement::CreateTable(self.parse_create_table()?),
            TokenKind::Drop => Statement::DropTable(self.parse_drop_table()?),
            _ => return Err(self.unexpected_token("statement")),
        };

        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected_token("end of statement"));
        }

        Ok(stmt)
    }

    fn parse_select(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect(TokenKind::Select)?;

        let distinct = if self.check(&TokenKind::Distinct) {
            self.advance();
            true
        } else {
            false
        };

        let columns = self.parse_select_columns()?;

        self.expect(TokenKind::From)?;
        let mut stmt = SelectStatement::new(self.parse_table_ref()?);
        stmt.distinct = distinct;
        stmt.columns = columns;

        while self.is_join_keyword() {
            stmt.joins.push(self.parse_join_clause()?);
        }

        if self.check(&TokenKind::Where) {
            self.advance();
            stmt.where_clause = Some(self.parse_expr()?);
        }

        if self.check(&TokenKind::Group) {
            self.advance();
            self.expect(TokenKind::By)?;
            stmt.group_by = self.parse_expr_list()?;
        }

        if self.check(&TokenKind::Having) {
            self.advance();
            stmt.having = Some(self.parse_expr()?);
        }

        if self.check(&TokenKind::Order) {
            self.advance();
            self.expect(TokenKind::By)?;
            stmt.order_by = self.parse_order_by_list()?;
        }

        if self.check(&TokenKind::Limit) {
            self.advance();
            stmt.limit = Some(self.parse_integer()?);
        }

        if self.check(&TokenKind::Offset) {
            self.advance();
            stmt.offset = Some(self.parse_integer()?);
        }

        Ok(stmt)
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>, ParseError> {
        let mut columns = Vec::new();

        loop {
            columns.push(self.parse_select_column()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_select_column(&mut self) -> Result<SelectColumn, ParseError> {
        if self.check(&TokenKind::Star) {
            self.advance();
            return Ok(SelectColumn::AllColumns);
        }

        // table.*
        if let (TokenKind::Identifier(name), TokenKind::Dot, TokenKind::Star) =
            (self.peek_kind(), self.peek_kind_at(1), self.peek_kind_at(2))
        {
            let name = name.clone();
            self.position += 3;
            return Ok(SelectColumn::TableAllColumns(name));
        }

        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectColumn::Expr { expr, alias })
    }

    fn parse_optional_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.check(&TokenKind::As) {
            self.advance();
            Ok(Some(self.parse_identifier()?))
        } else if let TokenKind::Identifier(_) = self.peek_kind() {
            // Alias without AS keyword
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn parse_table_ref(&mut self) -> Result<TableRef, ParseError> {
        let name = self.parse_identifier()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableRef { name, alias })
    }

    fn is_join_keyword(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Join | TokenKind::Inner | TokenKind::Left
        )
    }

    fn parse_join_clause(&mut self) -> Result<JoinClause, ParseError> {
        let join_type = if self.check(&TokenKind::Left) {
            self.advance();
            if self.check(&TokenKind::Outer) {
                self.advance();
            }
            JoinType::Left
        } else {
            if self.check(&TokenKind::Inner) {
                self.advance();
            }
            JoinType::Inner
        };

        self.expect(TokenKind::Join)?;
        let table = self.parse_table_ref()?;
        self.expect(TokenKind::On)?;
        let condition = self.parse_expr()?;

        Ok(JoinClause {
            join_type,
            table,
            condition,
        })
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByItem>, ParseError> {
        let mut items = Vec::new();

        loop {
            let expr = self.parse_expr()?;
            let ascending = if self.check(&TokenKind::Desc) {
                self.advance();
                false
            } else {
                if self.check(&TokenKind::Asc) {
                    self.advance();
                }
                true
            };
            items.push(OrderByItem { expr, ascending });

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(items)
    }

    fn parse_insert(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect(TokenKind::Insert)?;
        self.expect(TokenKind::Into)?;
        let table = self.parse_identifier()?;

        let columns = if self.check(&TokenKind::LParen) {
            self.advance();
            let columns = self.parse_identifier_list()?;
            self.expect(TokenKind::RParen)?;
            Some(columns)
        } else {
            None
        };

        self.expect(TokenKind::Values)?;

        let mut rows = Vec::new();
        loop {
            self.expect(TokenKind::LParen)?;
            rows.push(self.parse_expr_list()?);
            self.expect(TokenKind::RParen)?;

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(InsertStatement {
            table,
            columns,
            rows,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect(TokenKind::Update)?;
        let table = self.parse_identifier()?;
        self.expect(TokenKind::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_identifier()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_expr()?;
            assignments.push(Assignment { column, value });

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        let where_clause = self.parse_optional_where()?;

        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect(TokenKind::Delete)?;
        self.expect(TokenKind::From)?;
        let table = self.parse_identifier()?;
        let where_clause = self.parse_optional_where()?;

        Ok(DeleteStatement {
            table,
            where_clause,
        })
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.check(&TokenKind::Where) {
            self.advance();
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStatement, ParseError> {
        self.expect(TokenKind::Create)?;
        self.expect(TokenKind::Table)?;

        let if_not_exists = if self.check(&TokenKind::If) {
            self.advance();
            self.expect(TokenKind::Not)?;
            self.expect(TokenKind::Exists)?;
            true
        } else {
            false
        };

        let name = self.parse_identifier()?;
        self.expect(TokenKind::LParen)?;

        let mut columns = Vec::new();
        let mut constraints = Constraints::default();

        loop {
            match self.peek_kind() {
                TokenKind::Primary => {
                    self.advance();
                    self.expect(TokenKind::Key)?;
                    let keys = self.parse_parenthesized_identifiers()?;
                    self.set_primary_key(&mut constraints, keys)?;
                }
                TokenKind::Unique => {
                    self.advance();
                    constraints
                        .unique
                        .push(self.parse_parenthesized_identifiers()?);
                }
                TokenKind::Foreign => {
                    self.advance();
                    self.expect(TokenKind::Key)?;
                    self.expect(TokenKind::LParen)?;
                    let column = self.parse_identifier()?;
                    self.expect(TokenKind::RParen)?;
                    let (ref_table, ref_column) = self.parse_references()?;
                    constraints.foreign_keys.push(ForeignKey {
                        column,
                        ref_table,
                        ref_column,
                    });
                }
                _ => columns.push(self.parse_column_def(&mut constraints)?),
            }

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(TokenKind::RParen)?;

        Ok(CreateTableStatement {
            name,
            if_not_exists,
            columns,
            constraints,
        })
    }

    fn parse_column_def(&mut self, constraints: &mut Constraints) -> Result<ColumnDef, ParseError> {
        let name = self.parse_identifier()?;

        let type_span = self.peek().span;
        let type_name = match self.peek_kind() {
            TokenKind::Identifier(t) => t.clone(),
            _ => return Err(self.unexpected_token("column type")),
        };
        self.advance();
        let data_type = DataType::from_name(&type_name).ok_or(ParseError::InvalidType {
            name: type_name,
            span: type_span,
        })?;

        // Length arguments such as VARCHAR(255) are accepted and ignored
        if self.check(&TokenKind::LParen) {
            self.advance();
            self.parse_integer()?;
            if self.check(&TokenKind::Comma) {
                self.advance();
                self.parse_integer()?;
            }
            self.expect(TokenKind::RParen)?;
        }

        let mut column = ColumnDef::new(name, data_type);

        loop {
            match self.peek_kind() {
                TokenKind::Not => {
                    self.advance();
                    self.expect(TokenKind::Null)?;
                    column.nullable = false;
                }
                TokenKind::Null => {
                    self.advance();
                    column.nullable = true;
                }
                TokenKind::Primary => {
                    self.advance();
                    self.expect(TokenKind::Key)?;
                    self.set_primary_key(constraints, vec![column.name.clone()])?;
                }
                TokenKind::Unique => {
                    self.advance();
                    constraints.unique.push(vec![column.name.clone()]);
                }
                TokenKind::References => {
                    let (ref_table, ref_column) = self.parse_references()?;
                    constraints.foreign_keys.push(ForeignKey {
                        column: column.name.clone(),
                        ref_table,
                        ref_column,
                    });
                }
                _ => break,
            }
        }

        Ok(column)
    }

    fn set_primary_key(
        &self,
        constraints: &mut Constraints,
        keys: Vec<String>,
    ) -> Result<(), ParseError> {
        if !constraints.primary_key.is_empty() {
            return Err(self.unexpected_token("a single PRIMARY KEY per table"));
        }
        constraints.primary_key = keys;
        Ok(())
    }

    fn parse_references(&mut self) -> Result<(String, String), ParseError> {
        self.expect(TokenKind::References)?;
        let table = self.parse_identifier()?;
        self.expect(TokenKind::LParen)?;
        let column = self.parse_identifier()?;
        self.expect(TokenKind::RParen)?;
        Ok((table, column))
    }

    fn parse_drop_table(&mut self) -> Result<DropTableStatement, ParseError> {
        self.expect(TokenKind::Drop)?;
        self.expect(TokenKind::Table)?;

        let if_exists = if self.check(&TokenKind::If) {
            self.advance();
            self.expect(TokenKind::Exists)?;
            true
        } else {
            false
        };

        let name = self.parse_identifier()?;
        Ok(DropTableStatement { name, if_exists })
    }

    fn parse_parenthesized_identifiers(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let list = self.parse_identifier_list()?;
        self.expect(TokenKind::RParen)?;
        Ok(list)
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut identifiers = Vec::new();

        loop {
            identifiers.push(self.parse_identifier()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(identifiers)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = Vec::new();

        loop {
            exprs.push(self.parse_expr()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(exprs)
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::binary(left, BinaryOperator::Or, right);
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expr()?;

        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::binary(left, BinaryOperator::And, right);
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let expr = self.parse_not_expr()?;
            Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            })
        } else {
            self.parse_comparison_expr()
        }
    }

    /// Consumes `NOT` when it introduces `kind` (as in `NOT IN`).
    fn check_negated(&mut self, kind: &TokenKind) -> Option<bool> {
        if self.check(kind) {
            self.advance();
            Some(false)
        } else if self.check(&TokenKind::Not) && self.peek_kind_at(1) == kind {
            self.advance();
            self.advance();
            Some(true)
        } else {
            None
        }
    }

    /// At most one predicate per level: `a = 1 = TRUE` needs parentheses.
    fn parse_comparison_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive_expr()?;

        let expr = if self.check(&TokenKind::Is) {
            self.advance();
            let negated = if self.check(&TokenKind::Not) {
                self.advance();
                true
            } else {
                false
            };
            self.expect(TokenKind::Null)?;
            Expr::IsNull {
                expr: Box::new(left),
                negated,
            }
        } else if let Some(negated) = self.check_negated(&TokenKind::In) {
            self.expect(TokenKind::LParen)?;
            let list = self.parse_expr_list()?;
            self.expect(TokenKind::RParen)?;
            Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            }
        } else if let Some(negated) = self.check_negated(&TokenKind::Like) {
            let pattern = self.parse_additive_expr()?;
            Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            }
        } else if let Some(negated) = self.check_negated(&TokenKind::Between) {
            let low = self.parse_additive_expr()?;
            self.expect(TokenKind::And)?;
            let high = self.parse_additive_expr()?;
            Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            }
        } else if let Some(op) = self.parse_comparison_op() {
            let right = self.parse_additive_expr()?;
            Expr::binary(left, op, right)
        } else {
            return Ok(left);
        };

        if self.starts_predicate() {
            return Err(self.unexpected_token("end of expression"));
        }
        Ok(expr)
    }

    /// True when the next tokens would continue a comparison.
    fn starts_predicate(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Is
            | TokenKind::In
            | TokenKind::Like
            | TokenKind::Between
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq => true,
            TokenKind::Not => matches!(
                self.peek_kind_at(1),
                TokenKind::In | TokenKind::Like | TokenKind::Between
            ),
            _ => false,
        }
    }

    fn parse_comparison_op(&mut self) -> Option<BinaryOperator> {
        let op = match self.peek_kind() {
            TokenKind::Eq => Some(BinaryOperator::Eq),
            TokenKind::NotEq => Some(BinaryOperator::NotEq),
            TokenKind::Lt => Some(BinaryOperator::Lt),
            TokenKind::LtEq => Some(BinaryOperator::LtEq),
            TokenKind::Gt => Some(BinaryOperator::Gt),
            TokenKind::GtEq => Some(BinaryOperator::GtEq),
            _ => None,
        };

        if op.is_some() {
            self.advance();
        }

        op
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative_expr()?;

        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                TokenKind::Concat => BinaryOperator::Concat,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative_expr()?;
            left = Expr::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;

        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary_expr()?;
            left = Expr::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Plus => UnaryOperator::Plus,
            _ => return self.parse_primary_expr(),
        };

        self.advance();
        let expr = self.parse_unary_expr()?;
        Ok(Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let literal = match self.peek_kind() {
            TokenKind::Integer(n) => Value::Integer(*n),
            TokenKind::Float(f) => Value::Float(*f),
            TokenKind::String(s) => Value::Text(s.clone()),
            TokenKind::True => Value::Boolean(true),
            TokenKind::False => Value::Boolean(false),
            TokenKind::Null => Value::Null,
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::Identifier(_) => return self.parse_column_or_function(),
            _ => return Err(self.unexpected_token("expression")),
        };

        self.advance();
        Ok(Expr::Literal(literal))
    }

    fn parse_column_or_function(&mut self) -> Result<Expr, ParseError> {
        let name = self.parse_identifier()?;

        if self.check(&TokenKind::LParen) {
            self.advance();

            let distinct = if self.check(&TokenKind::Distinct) {
                self.advance();
                true
            } else {
                false
            };

            let args = if self.check(&TokenKind::Star) {
                self.advance();
                FunctionArgs::Wildcard
            } else if self.check(&TokenKind::RParen) {
                FunctionArgs::List(Vec::new())
            } else {
                FunctionArgs::List(self.parse_expr_list()?)
            };

            self.expect(TokenKind::RParen)?;
            return Ok(Expr::Function {
                name,
                args,
                distinct,
            });
        }

        // table.column
        if self.check(&TokenKind::Dot) {
            self.advance();
            let column = self.parse_identifier()?;
            return Ok(Expr::Column(ColumnRef::with_table(name, column)));
        }

        Ok(Expr::Column(ColumnRef::new(name)))
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected_token("identifier")),
        }
    }

    fn parse_integer(&mut self) -> Result<u64, ParseError> {
        match self.peek_kind() {
            TokenKind::Integer(n) if *n >= 0 => {
                let n = *n as u64;
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected_token("non-negative integer")),
        }
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_kind_at(&self, ahead: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + ahead).min(last)].kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected_token(&expected.to_string()))
        }
    }

    fn unexpected_token(&self, expected: &str) -> ParseError {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
            _ => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.clone(),
                span: token.span,
            },
        }
    }
}

/// Tokenizes and parses one statement.
pub fn parse_statement(sql: &str) -> crate::Result<Statement> {
    let tokens = tokenize(sql)?;
    Ok(Parser::new(tokens).parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Statement {
        parse_statement(sql).unwrap()
    }

    fn parse_select(sql: &str) -> SelectStatement {
        match parse(sql) {
            Statement::Select(stmt) => stmt,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    fn parse_err(sql: &str) -> ParseError {
        let tokens = tokenize(sql).unwrap();
        Parser::new(tokens).parse().unwrap_err()
    }

    fn where_of(sql: &str) -> Expr {
        parse_select(sql).where_clause.unwrap()
    }

    #[test]
    fn test_simple_select() {
        let stmt = parse_select("SELECT * FROM users");

        assert!(!stmt.distinct);
        assert_eq!(stmt.columns, vec![SelectColumn::AllColumns]);
        assert_eq!(stmt.from, TableRef::new("users"));
    }

    #[test]
    fn test_select_columns_and_aliases() {
        let stmt = parse_select("SELECT id, name AS user_name, age years, u.* FROM users u");

        assert_eq!(stmt.columns.len(), 4);
        assert!(matches!(
            &stmt.columns[1],
            SelectColumn::Expr { alias: Some(a), .. } if a == "user_name"
        ));
        assert!(matches!(
            &stmt.columns[2],
            SelectColumn::Expr { alias: Some(a), .. } if a == "years"
        ));
        assert_eq!(stmt.columns[3], SelectColumn::TableAllColumns("u".to_string()));
        assert_eq!(stmt.from, TableRef::with_alias("users", "u"));
    }

    #[test]
    fn test_join() {
        let stmt = parse_select("SELECT * FROM users u JOIN orders o ON u.id = o.user_id");

        assert_eq!(stmt.joins.len(), 1);
        assert_eq!(stmt.joins[0].join_type, JoinType::Inner);
        assert_eq!(stmt.joins[0].table, TableRef::with_alias("orders", "o"));

        let stmt = parse_select("SELECT * FROM a LEFT OUTER JOIN b ON a.id = b.id");
        assert_eq!(stmt.joins[0].join_type, JoinType::Left);
    }

    #[test]
    fn test_join_requires_on() {
        assert!(matches!(
            parse_err("SELECT * FROM a JOIN b"),
            ParseError::UnexpectedEof { expected } if expected == "ON"
        ));
    }

    #[test]
    fn test_group_by_having() {
        let stmt = parse_select(
            "SELECT department, COUNT(*) FROM employees GROUP BY department HAVING COUNT(*) > 1",
        );

        assert_eq!(stmt.group_by, vec![Expr::column("department")]);
        assert!(stmt.having.is_some());
    }

    #[test]
    fn test_order_by() {
        let stmt = parse_select("SELECT * FROM users ORDER BY name ASC, age DESC");

        assert_eq!(stmt.order_by.len(), 2);
        assert!(stmt.order_by[0].ascending);
        assert!(!stmt.order_by[1].ascending);
    }

    #[test]
    fn test_limit_offset() {
        let stmt = parse_select("SELECT * FROM users LIMIT 10 OFFSET 20");

        assert_eq!(stmt.limit, Some(10));
        assert_eq!(stmt.offset, Some(20));
    }

    #[test]
    fn test_aggregate_functions() {
        let stmt = parse_select("SELECT COUNT(*), SUM(amount), COUNT(DISTINCT user_id) FROM orders");

        assert_eq!(stmt.columns.len(), 3);
        assert!(matches!(
            &stmt.columns[0],
            SelectColumn::Expr { expr: Expr::Function { args: FunctionArgs::Wildcard, .. }, .. }
        ));
        assert!(matches!(
            &stmt.columns[2],
            SelectColumn::Expr { expr: Expr::Function { distinct: true, .. }, .. }
        ));
    }

    #[test]
    fn test_precedence_and_over_or() {
        let expr = where_of("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3");
        let expected = Expr::binary(
            Expr::binary(Expr::column("a"), BinaryOperator::Eq, Expr::Literal(Value::Integer(1))),
            BinaryOperator::Or,
            Expr::binary(
                Expr::binary(Expr::column("b"), BinaryOperator::Eq, Expr::Literal(Value::Integer(2))),
                BinaryOperator::And,
                Expr::binary(Expr::column("c"), BinaryOperator::Eq, Expr::Literal(Value::Integer(3))),
            ),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_precedence_arithmetic() {
        let expr = where_of("SELECT * FROM t WHERE a + b * -c > 10");
        assert_eq!(expr.to_string(), "a + b * -c > 10");

        match expr {
            Expr::BinaryOp { left, op, .. } => {
                assert_eq!(op, BinaryOperator::Gt);
                assert!(matches!(*left, Expr::BinaryOp { op: BinaryOperator::Add, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_binds_looser_than_comparison() {
        let expr = where_of("SELECT * FROM t WHERE NOT a = 1");
        assert!(matches!(
            expr,
            Expr::UnaryOp { op: UnaryOperator::Not, expr } if matches!(*expr, Expr::BinaryOp { op: BinaryOperator::Eq, .. })
        ));
    }

    #[test]
    fn test_parenthesized_expression() {
        let expr = where_of("SELECT * FROM t WHERE (a = 1 OR b = 2) AND c = 3");
        assert!(matches!(expr, Expr::BinaryOp { op: BinaryOperator::And, .. }));
    }

    #[test]
    fn test_predicate_forms() {
        assert!(matches!(
            where_of("SELECT * FROM t WHERE email IS NOT NULL"),
            Expr::IsNull { negated: true, .. }
        ));
        assert!(matches!(
            where_of("SELECT * FROM t WHERE status NOT IN ('a', 'b')"),
            Expr::InList { negated: true, ref list, .. } if list.len() == 2
        ));
        assert!(matches!(
            where_of("SELECT * FROM t WHERE age BETWEEN 18 AND 65"),
            Expr::Between { negated: false, .. }
        ));
        assert!(matches!(
            where_of("SELECT * FROM t WHERE name LIKE 'J%'"),
            Expr::Like { negated: false, .. }
        ));
    }

    #[test]
    fn test_comparisons_do_not_chain() {
        for sql in [
            "SELECT * FROM t WHERE a = 1 = TRUE",
            "SELECT * FROM t WHERE a < b < c",
            "SELECT * FROM t WHERE a IS NULL IS NULL",
            "SELECT * FROM t WHERE a = 1 NOT IN (1)",
        ] {
            assert!(
                matches!(parse_err(sql), ParseError::UnexpectedToken { ref expected, .. } if expected == "end of expression"),
                "{} should not parse",
                sql
            );
        }

        let expr = where_of("SELECT * FROM t WHERE (a = 1) = TRUE");
        assert!(matches!(expr, Expr::BinaryOp { op: BinaryOperator::Eq, .. }));
        let reparsed = where_of(&format!("SELECT * FROM t WHERE {}", expr));
        assert_eq!(expr, reparsed);
    }

    #[test]
    fn test_insert() {
        let stmt = parse("INSERT INTO users (id, name) VALUES (1, 'Alice'), (2, 'Bob');");
        match stmt {
            Statement::Insert(insert) => {
                assert_eq!(insert.table, "users");
                assert_eq!(insert.columns, Some(vec!["id".to_string(), "name".to_string()]));
                assert_eq!(insert.rows.len(), 2);
                assert_eq!(insert.rows[1][1], Expr::Literal(Value::Text("Bob".to_string())));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_insert_requires_into() {
        assert!(matches!(
            parse_err("INSERT users VALUES (1)"),
            ParseError::UnexpectedToken { expected, .. } if expected == "INTO"
        ));
    }

    #[test]
    fn test_update() {
        match parse("UPDATE users SET age = age + 1, name = 'x' WHERE id = 3") {
            Statement::Update(update) => {
                assert_eq!(update.assignments.len(), 2);
                assert_eq!(update.assignments[0].column, "age");
                assert!(update.where_clause.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_delete() {
        match parse("DELETE FROM users") {
            Statement::Delete(delete) => {
                assert_eq!(delete.table, "users");
                assert!(delete.where_clause.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_table() {
        let stmt = parse(
            "CREATE TABLE IF NOT EXISTS orders (
                id INT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users (id),
                note VARCHAR(255),
                price FLOAT,
                UNIQUE (user_id, note)
            )",
        );
        match stmt {
            Statement::CreateTable(create) => {
                assert!(create.if_not_exists);
                assert_eq!(create.columns.len(), 4);
                assert_eq!(create.columns[1].data_type, DataType::Integer);
                assert!(!create.columns[1].nullable);
                assert_eq!(create.columns[2].data_type, DataType::Text);
                assert_eq!(create.constraints.primary_key, vec!["id".to_string()]);
                assert_eq!(create.constraints.unique.len(), 1);
                assert_eq!(create.constraints.foreign_keys[0].ref_table, "users");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_table_unknown_type() {
        assert!(matches!(
            parse_err("CREATE TABLE t (a blob)"),
            ParseError::InvalidType { name, .. } if name == "blob"
        ));
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(
            parse("DROP TABLE IF EXISTS users"),
            Statement::DropTable(DropTableStatement {
                name: "users".to_string(),
                if_exists: true,
            })
        );
    }

    #[test]
    fn test_select_requires_from() {
        assert!(matches!(
            parse_err("SELECT 1"),
            ParseError::UnexpectedEof { expected } if expected == "FROM"
        ));
    }

    #[test]
    fn test_clause_out_of_order() {
        let err = parse_err("SELECT * FROM t ORDER BY a WHERE a = 1");
        assert!(matches!(
            err,
            ParseError::UnexpectedToken { found: TokenKind::Where, ref expected, .. } if expected == "end of statement"
        ));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            parse_err("DELETE FROM t; DELETE FROM t"),
            ParseError::UnexpectedToken { found: TokenKind::Delete, .. }
        ));
    }

    #[test]
    fn test_error_reports_position() {
        match parse_err("SELECT name\nFROM users WHERE > 1") {
            ParseError::UnexpectedToken { expected, span, .. } => {
                assert_eq!(expected, "expression");
                assert_eq!(span.line, 2);
                assert_eq!(span.column, 18);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_statement() {
        assert!(matches!(
            parse_err("EXPLAIN SELECT"),
            ParseError::UnexpectedToken { ref expected, .. } if expected == "statement"
        ));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let sql = "SELECT a, SUM(b) FROM t JOIN u ON t.id = u.id WHERE a > 1 GROUP BY a ORDER BY a DESC";
        let tokens = tokenize(sql).unwrap();
        let first = Parser::new(tokens.clone()).parse().unwrap();
        let second = Parser::new(tokens).parse().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_display_round_trip() {
        let expr = where_of("SELECT * FROM t WHERE NOT (a + 1) * 2 >= b OR c IS NULL");
        let reparsed = where_of(&format!("SELECT * FROM t WHERE {}", expr));
        assert_eq!(expr, reparsed);
    }
}
