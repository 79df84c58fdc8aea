pub mod catalog;
pub mod table;

pub use catalog::Catalog;
pub use table::{ColumnDef, Constraints, DataType, ForeignKey, Row, Schema, Table, Value};
