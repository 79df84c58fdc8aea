pub mod ast;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;

pub use ast::*;
pub use executor::{run_statement, Executor, QueryResult, ResultSet};
pub use lexer::{split_statements, tokenize, LexError, Lexer, Span, Token, TokenKind};
pub use parser::{parse_statement, ParseError, Parser};
pub use planner::{LogicalPlan, Planner};
