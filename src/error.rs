use crate::sql::lexer::LexError;
use crate::sql::parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Table not found: {0}")]
    UnknownTable(String),

    #[error("Column not found: {0}")]
    UnknownColumn(String),

    #[error("Ambiguous column reference: {0}")]
    AmbiguousColumn(String),

    #[error("Table already exists: {0}")]
    DuplicateTable(String),

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Column '{column}' of table '{table}' cannot be NULL")]
    NullConstraint { table: String, column: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Expected {expected} values, found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
