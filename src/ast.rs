use crate::{ColumnDef, Value, condition::Condition};

#[derive(Debug, PartialEq)]
pub enum Statement {
    CreateDatabase(String),
    ChangeDatabase(String),
    CreateTable(CreateTable),
    InsertInto(InsertInto),
    Select(Select),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, PartialEq)]
pub struct InsertInto {
    pub table: String,
    /// `None` means the values follow the schema's column order.
    pub columns: Option<Vec<String>>,
    pub values: Vec<Value>,
}

#[derive(Debug, PartialEq)]
pub enum ColumnsSelect {
    Star,
    ColumnsNames(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq)]
pub struct OrderByClause {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, PartialEq)]
pub struct Select {
    pub columns: ColumnsSelect,
    pub table: String,
    pub where_clause: Option<Condition>,
    pub order_by: Option<OrderByClause>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, PartialEq)]
pub struct Update {
    pub table: String,
    /// Column assignments in the order written, one entry per column.
    pub assignments: Vec<(String, Value)>,
    pub where_clause: Option<Condition>,
}

/// A DELETE always carries a condition, an unconditional delete is rejected
/// by the parser.
#[derive(Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub where_clause: Condition,
}
