pub mod ast;
pub mod column;
pub mod condition;
pub mod data_type;
pub mod database;
pub mod error;
pub mod parser;
pub mod predicate;
pub mod staging;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use condition::Condition;
pub use data_type::DataType;
pub use database::{Database, Outcome, QueryResult};
pub use error::{Error, Result};
pub use table::{ColumnDef, Schema, Table};
pub use value::Value;
