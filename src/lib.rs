pub mod cli;
pub mod engine;
pub mod error;
pub mod sql;
pub mod storage;

pub use engine::{Engine, SharedEngine};
pub use error::{EngineError, Result};
pub use sql::{parse_statement, run_statement, split_statements, tokenize, QueryResult, ResultSet};
pub use storage::{Catalog, DataType, Row, Value};
