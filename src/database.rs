use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use bitvec::prelude::*;
use serde_json::{Map, Value as Json};

use crate::{
    ColumnDef, Value,
    ast::{ColumnsSelect, Delete, InsertInto, Select, SortDirection, Statement, Update},
    condition::Condition,
    error::{Error, Result},
    parser::parse_statement,
    predicate::Predicate,
    staging::StagedWriter,
    table::{Schema, Table},
    value::SortKey,
};

/// File under the root that remembers the current database between sessions.
pub const CURRENT_DATABASE_FILE: &str = "current-database";

/// The main entry point for the file-backed database engine.
///
/// It owns the root directory holding every database and the name of the
/// current one. Every statement reads its table from disk and every mutation
/// goes through a [StagedWriter], so a `Database` holds no table data itself.
#[derive(Debug)]
pub struct Database {
    root: PathBuf,
    current: Option<String>,
}

/// Represents the result of a successful `SELECT` query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The names of the columns included in the result set.
    pub columns: Vec<String>,
    /// The actual data, returned as a vector of rows, where each row is a vector of [Value].
    pub rows: Vec<Vec<Value>>,
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows returned by a `SELECT`.
    Rows(QueryResult),
    /// Number of rows inserted, matched by an `UPDATE` or deleted.
    Affected(usize),
    /// A catalog statement (database or table creation) succeeded.
    Done,
}

impl Database {
    /// Opens the database root, creating it if needed, and restores the current
    /// database recorded by a previous session.
    ///
    /// # Errors
    /// Returns [Error::Io] if the root cannot be created or the pointer file
    /// cannot be read.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;

        let pointer = root.join(CURRENT_DATABASE_FILE);
        let current = if pointer.is_file() {
            let name = fs::read_to_string(&pointer).map_err(|e| Error::io(&pointer, e))?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else if root.join(name).is_dir() {
                Some(name.to_string())
            } else {
                log::warn!("current database {name:?} no longer exists, ignoring it");
                None
            }
        } else {
            None
        };

        log::debug!("opened {root:?}, current database: {current:?}");
        Ok(Self { root, current })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the current database, if one has been selected.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Directory of the current database.
    ///
    /// # Errors
    /// Returns [Error::NoDatabaseSelected] if no database has been selected.
    pub fn current_dir(&self) -> Result<PathBuf> {
        self.current
            .as_ref()
            .map(|name| self.root.join(name))
            .ok_or(Error::NoDatabaseSelected)
    }

    /// Creates a database directory and makes it the current database.
    ///
    /// # Errors
    /// Returns [Error::DatabaseExists] if it already exists.
    pub fn create_database(&mut self, name: &str) -> Result<()> {
        let dir = self.root.join(name);
        if dir.exists() {
            return Err(Error::DatabaseExists(name.to_string()));
        }
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        log::info!("created database {name:?}");
        self.set_current(name)
    }

    /// Makes an existing database the current one.
    ///
    /// # Errors
    /// Returns [Error::DatabaseNotFound] if there is no such database.
    pub fn change_database(&mut self, name: &str) -> Result<()> {
        if !self.root.join(name).is_dir() {
            return Err(Error::DatabaseNotFound(name.to_string()));
        }
        self.set_current(name)
    }

    fn set_current(&mut self, name: &str) -> Result<()> {
        let mut writer = StagedWriter::new();
        writer.stage_bytes(&self.root.join(CURRENT_DATABASE_FILE), name.as_bytes())?;
        writer.commit()?;
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Creates a new table in the current database.
    ///
    /// # Errors
    /// Returns an error if no database is selected, if a table with the same
    /// name already exists or if the column list is empty or duplicated.
    pub fn create_table(&self, name: &str, columns: Vec<ColumnDef>) -> Result<Table> {
        Table::create(&self.current_dir()?, name, columns)
    }

    /// Opens a table of the current database.
    pub fn table(&self, name: &str) -> Result<Table> {
        Table::open(&self.current_dir()?, name)
    }

    /// Parses and executes one statement.
    ///
    /// # Example
    ///
    /// ```
    /// use coldb::{Database, Outcome, Value};
    ///
    /// let root = tempfile::tempdir().unwrap();
    /// let mut db = Database::open(root.path()).unwrap();
    /// db.execute("CREATE DATABASE shop").unwrap();
    /// db.execute("CREATE TABLE users (id INT UNIQUE, name TEXT)").unwrap();
    /// db.execute("INSERT INTO users (id, name) VALUES (1, 'Ann')").unwrap();
    ///
    /// let outcome = db.execute("DELETE FROM users WHERE id > 12").unwrap();
    /// assert_eq!(outcome, Outcome::Affected(0));
    ///
    /// let result = db.query("SELECT * FROM users").unwrap();
    /// assert_eq!(result.rows[0][0], Value::Int(1));
    /// ```
    pub fn execute(&mut self, sql: &str) -> Result<Outcome> {
        let statement = parse_statement(sql)?;
        log::debug!("executing {statement:?}");

        match statement {
            Statement::CreateDatabase(name) => {
                self.create_database(&name)?;
                Ok(Outcome::Done)
            }
            Statement::ChangeDatabase(name) => {
                self.change_database(&name)?;
                Ok(Outcome::Done)
            }
            Statement::CreateTable(create) => {
                self.create_table(&create.name, create.columns)?;
                Ok(Outcome::Done)
            }
            Statement::InsertInto(insert) => self.insert(insert).map(Outcome::Affected),
            Statement::Select(select) => self.select(select).map(Outcome::Rows),
            Statement::Update(update) => self.update(update).map(Outcome::Affected),
            Statement::Delete(delete) => self.delete(delete).map(Outcome::Affected),
        }
    }

    /// Executes a `SELECT` statement and returns its rows.
    ///
    /// # Errors
    /// Returns [Error::StatementSyntax] if `sql` is not a `SELECT`, and any error
    /// [Database::select] reports.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        match parse_statement(sql)? {
            Statement::Select(select) => self.select(select),
            other => Err(Error::StatementSyntax(format!(
                "{other:?} is not a queryable statement"
            ))),
        }
    }

    /// Appends one row.
    ///
    /// Without a column list the values follow the schema order. Columns that
    /// are not supplied receive `NULL`. Every column is staged and the batch is
    /// committed only once all of them are written, so any failure leaves every
    /// column file untouched.
    ///
    /// # Errors
    /// - [Error::SchemaViolation] for a column/value count mismatch, too many
    ///   columns, or an unknown or repeated column.
    /// - [Error::TypeMismatch] if a value does not fit its declared type.
    /// - [Error::NotNullViolation] if a `NOT NULL` column would receive `NULL`.
    /// - [Error::DuplicateValue] if a `UNIQUE` column already holds the value.
    pub fn insert(&self, insert: InsertInto) -> Result<usize> {
        let table = self.table(&insert.table)?;
        let schema = table.schema();
        let values = insert.values;

        let columns: Vec<String> = match insert.columns {
            Some(columns) => columns,
            None => {
                if values.len() > schema.len() {
                    return Err(Error::SchemaViolation(format!(
                        "too many values: table {:?} has {} columns",
                        table.name(),
                        schema.len()
                    )));
                }
                schema.names().take(values.len()).map(String::from).collect()
            }
        };

        if columns.len() != values.len() {
            return Err(Error::SchemaViolation(format!(
                "must initialize value for every column: {} columns, {} values",
                columns.len(),
                values.len()
            )));
        }
        if columns.len() > schema.len() {
            return Err(Error::SchemaViolation("too many columns".into()));
        }
        for (i, column) in columns.iter().enumerate() {
            if schema.get(column).is_none() {
                return Err(Error::SchemaViolation(format!(
                    "column doesn't exist: {column}"
                )));
            }
            if columns[..i].contains(column) {
                return Err(Error::SchemaViolation(format!(
                    "column {column:?} is given more than once"
                )));
            }
        }

        let _lock = table.lock_exclusive()?;
        let mut writer = StagedWriter::new();
        for column in &schema.columns {
            let supplied = columns
                .iter()
                .position(|name| *name == column.name)
                .map(|i| &values[i]);
            let value = check_insert_value(column, supplied)?;

            let mut data = table.read_column(&column.name)?;
            if column.is_unique && !value.is_null() && data.iter().any(|v| v.same_as(&value)) {
                return Err(Error::DuplicateValue {
                    column: column.name.clone(),
                    value: value.canonical(),
                });
            }
            data.push(value);
            writer.stage(&table.column_path(&column.name), &column.name, &data)?;
        }
        writer.commit()?;

        log::debug!("inserted 1 row into {:?}", table.name());
        Ok(1)
    }

    /// Executes a `SELECT`.
    ///
    /// Rows are ordered first (stable, so ties keep their stored order), then
    /// filtered, then `OFFSET` matches are skipped and at most `LIMIT` rows kept.
    /// The condition is evaluated on the full row even if its column is not
    /// projected.
    ///
    /// # Errors
    /// Returns [Error::ColumnNotFound] if a projected, ordering or condition
    /// column does not exist.
    pub fn select(&self, select: Select) -> Result<QueryResult> {
        let table = self.table(&select.table)?;
        let schema = table.schema();

        // Resolve which columns need to be projected
        let projection: Vec<usize> = match &select.columns {
            ColumnsSelect::Star => (0..schema.len()).collect(),
            ColumnsSelect::ColumnsNames(names) if names.is_empty() => (0..schema.len()).collect(),
            ColumnsSelect::ColumnsNames(names) => names
                .iter()
                .map(|name| {
                    schema
                        .resolve_position(name)
                        .ok_or_else(|| Error::ColumnNotFound(name.clone()))
                })
                .collect::<Result<_>>()?,
        };
        let order = select
            .order_by
            .as_ref()
            .map(|clause| {
                schema
                    .resolve_position(&clause.column)
                    .map(|idx| (idx, clause.direction))
                    .ok_or_else(|| Error::ColumnNotFound(clause.column.clone()))
            })
            .transpose()?;
        let filter = select
            .where_clause
            .map(|condition| bind_condition(schema, condition))
            .transpose()?;

        let _lock = table.lock_shared()?;
        let data = table.read_all()?;
        let row_count = data.first().map_or(0, Vec::len);

        let mut permutation: Vec<usize> = (0..row_count).collect();
        if let Some((idx, direction)) = order {
            let keys: Vec<SortKey> = (0..row_count)
                .map(|row| cell(&data[idx], row).sort_key())
                .collect();
            // sort_by is stable, equal keys keep their stored order
            permutation.sort_by(|a, b| {
                let ord = keys[*a].compare(&keys[*b]);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let limit = select.limit.unwrap_or(usize::MAX);
        let mut skipped = 0;
        let mut rows = Vec::new();
        for row in permutation {
            if rows.len() >= limit {
                break;
            }
            if let Some((idx, predicate)) = &filter {
                let Some(value) = data[*idx].get(row) else {
                    log::warn!(
                        "row {row} is missing from column {:?}, skipping it",
                        predicate.column()
                    );
                    continue;
                };
                if !predicate.matches(value) {
                    continue;
                }
            }
            if skipped < select.offset {
                skipped += 1;
                continue;
            }
            rows.push(
                projection
                    .iter()
                    .map(|&col| cell(&data[col], row).clone())
                    .collect(),
            );
        }

        Ok(QueryResult {
            columns: projection
                .iter()
                .map(|&col| schema.columns[col].name.clone())
                .collect(),
            rows,
        })
    }

    /// Executes an `UPDATE` and returns the number of rows matched by its
    /// condition (every row without one), whether or not their values changed.
    ///
    /// Only cells that actually differ are rewritten and only the columns
    /// containing such cells are staged; no file is written at all if nothing
    /// changes. No type or constraint check is applied to the new values.
    ///
    /// # Errors
    /// - [Error::SchemaViolation] if an assigned column does not exist.
    /// - [Error::ColumnNotFound] if the condition column does not exist.
    /// - [Error::UpdateFailed] wrapping the cause if rewriting a column fails,
    ///   in which case no column file is changed.
    pub fn update(&self, update: Update) -> Result<usize> {
        let table = self.table(&update.table)?;
        let schema = table.schema();

        for (column, _) in &update.assignments {
            if schema.get(column).is_none() {
                return Err(Error::SchemaViolation(format!(
                    "column {column:?} is not a column of table {:?}",
                    table.name()
                )));
            }
        }
        let filter = update
            .where_clause
            .map(|condition| bind_condition(schema, condition))
            .transpose()?;

        let _lock = table.lock_exclusive()?;
        let affected: BitVec = match &filter {
            Some((_, predicate)) => table
                .read_column(predicate.column())?
                .iter()
                .map(|value| predicate.matches(value))
                .collect(),
            None => {
                let first = schema
                    .columns
                    .first()
                    .ok_or_else(|| Error::SchemaNotFound(table.name().to_string()))?;
                bitvec![1; table.read_column(&first.name)?.len()]
            }
        };
        let matched = affected.count_ones();

        let writer = stage_assignments(&table, &update.assignments, &affected)
            .map_err(|e| Error::UpdateFailed(Box::new(e)))?;
        if writer.is_empty() {
            log::debug!("update matched {matched} rows, nothing to write");
            return Ok(matched);
        }
        writer
            .commit()
            .map_err(|e| Error::UpdateFailed(Box::new(e)))?;
        Ok(matched)
    }

    /// Executes a `DELETE` and returns the number of rows removed.
    ///
    /// The condition is evaluated on its own column; the matching positions are
    /// then removed from every column in one staged batch. If nothing matches,
    /// no file is touched.
    ///
    /// # Errors
    /// Returns [Error::ColumnNotFound] if the condition column does not exist.
    pub fn delete(&self, delete: Delete) -> Result<usize> {
        let table = self.table(&delete.table)?;
        let schema = table.schema();
        let (_, predicate) = bind_condition(schema, delete.where_clause)?;

        let _lock = table.lock_exclusive()?;
        let mut rows: Vec<usize> = table
            .read_column(predicate.column())?
            .iter()
            .enumerate()
            .filter(|(_, value)| predicate.matches(value))
            .map(|(i, _)| i)
            .collect();
        if rows.is_empty() {
            log::debug!("no row of {:?} matches {}", table.name(), predicate.condition());
            return Ok(0);
        }

        // highest index first so removing a row never shifts one still to be removed
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();

        let mut writer = StagedWriter::new();
        for column in &schema.columns {
            let mut data = table.read_column(&column.name)?;
            let before = data.len();
            for &row in &rows {
                if row < data.len() {
                    data.remove(row);
                } else {
                    log::warn!("row {row} is out of range for column {:?}, skipping", column.name);
                }
            }
            if data.len() != before {
                writer.stage(&table.column_path(&column.name), &column.name, &data)?;
            }
        }
        writer.commit()?;

        log::debug!("deleted {} rows from {:?}", rows.len(), table.name());
        Ok(rows.len())
    }
}

/// Rewrites the affected cells of every assigned column and stages the columns
/// that changed. Numbers compare by value, so `5` over a stored `5.0` is no change.
fn stage_assignments(
    table: &Table,
    assignments: &[(String, Value)],
    affected: &BitSlice,
) -> Result<StagedWriter> {
    let mut writer = StagedWriter::new();
    for (column, value) in assignments {
        let mut data = table.read_column(column)?;
        let mut changed = false;
        for row in affected.iter_ones() {
            match data.get_mut(row) {
                Some(cell) if !cell.same_as(value) => {
                    *cell = value.clone();
                    changed = true;
                }
                Some(_) => {}
                None => log::warn!("row {row} is missing from column {column:?}"),
            }
        }
        if changed {
            writer.stage(&table.column_path(column), column, &data)?;
        }
    }
    Ok(writer)
}

/// Resolves the condition column case-insensitively, rewrites it to the
/// schema's spelling and compiles the predicate.
fn bind_condition(schema: &Schema, mut condition: Condition) -> Result<(usize, Predicate)> {
    let idx = schema
        .resolve_position(&condition.column)
        .ok_or_else(|| Error::ColumnNotFound(condition.column.clone()))?;
    condition.column = schema.columns[idx].name.clone();
    Ok((idx, Predicate::new(condition)))
}

fn check_insert_value(column: &ColumnDef, supplied: Option<&Value>) -> Result<Value> {
    match supplied {
        None | Some(Value::Null) if column.not_null => {
            Err(Error::NotNullViolation(column.name.clone()))
        }
        None => Ok(Value::Null),
        Some(value) => {
            let data_type = column.data_type();
            if !data_type.accepts(value) {
                return Err(Error::TypeMismatch {
                    column: column.name.clone(),
                    expected: data_type.name().to_string(),
                    found: value.type_name().to_string(),
                });
            }
            Ok(value.clone())
        }
    }
}

/// Cell of a column, `NULL` past its end.
fn cell(column: &[Value], row: usize) -> &Value {
    static NULL: Value = Value::Null;
    column.get(row).unwrap_or(&NULL)
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows as a JSON array of objects keyed by column name.
    pub fn to_json(&self) -> Json {
        Json::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object: Map<String, Json> = self
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().map(Value::to_json))
                        .collect();
                    Json::Object(object)
                })
                .collect(),
        )
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return f.write_str("No rows returned");
        }

        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::canonical).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                rendered
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|text| text.chars().count())
                    .chain([name.chars().count()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line: String = widths.iter().fold(String::from("+"), |mut acc, w| {
            acc.push_str(&"-".repeat(w + 2));
            acc.push('+');
            acc
        });
        let write_row = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            for (cell, &width) in cells.iter().zip(&widths) {
                write!(f, "| {cell:<width$} ")?;
            }
            writeln!(f, "|")
        };

        writeln!(f, "{line}")?;
        write_row(f, &self.columns)?;
        writeln!(f, "{line}")?;
        for row in &rendered {
            write_row(f, row)?;
        }
        writeln!(f, "{line}")?;
        let count = self.rows.len();
        write!(f, "{count} row{} in set", if count == 1 { "" } else { "s" })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Rows(result) => fmt::Display::fmt(result, f),
            Outcome::Affected(1) => f.write_str("Query OK, 1 row affected"),
            Outcome::Affected(n) => write!(f, "Query OK, {n} rows affected"),
            Outcome::Done => f.write_str("Query OK"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::COLUMNS_DIR;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, Database) {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path()).unwrap();
        db.execute("CREATE DATABASE test").unwrap();
        (dir, db)
    }

    fn users(db: &mut Database) {
        db.execute("CREATE TABLE users (id INT UNIQUE NOT NULL, name TEXT, age INT)")
            .unwrap();
        for sql in [
            "INSERT INTO users (id, name, age) VALUES (1, 'John', 30)",
            "INSERT INTO users (id, name, age) VALUES (2, 'Alice', 10)",
            "INSERT INTO users (id, name, age) VALUES (3, 'Joanna', 30)",
            "INSERT INTO users (id, name, age) VALUES (4, 'Mike', 9)",
        ] {
            db.execute(sql).unwrap();
        }
    }

    fn rows(db: &Database, sql: &str) -> Vec<Vec<Value>> {
        db.query(sql).unwrap().rows
    }

    fn ids(db: &Database, sql: &str) -> Vec<i64> {
        rows(db, sql)
            .into_iter()
            .map(|row| row[0].as_int().unwrap())
            .collect()
    }

    /// Every file of the table's Columns directory with its bytes, sorted by name.
    /// Leftover temp files of a failed commit show up here too.
    fn snapshot(db: &Database, table: &str) -> Vec<(String, Vec<u8>)> {
        let dir = db.current_dir().unwrap().join(table).join(COLUMNS_DIR);
        let mut files: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_file())
            .map(|path| {
                (
                    path.file_name().unwrap().to_string_lossy().into_owned(),
                    fs::read(&path).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    }

    /// Swaps a column file for a non-empty directory so reading it fails.
    fn break_column(db: &Database, table: &str, column: &str) {
        let path = db.table(table).unwrap().column_path(column);
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("blocker"), b"x").unwrap();
    }

    fn column_lengths(db: &Database, table: &str) -> Vec<usize> {
        db.table(table)
            .unwrap()
            .read_all()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect()
    }

    #[test]
    fn test_create_and_change_database() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path()).unwrap();
        assert_eq!(db.current(), None);
        assert!(matches!(db.current_dir(), Err(Error::NoDatabaseSelected)));
        assert!(matches!(
            db.execute("CREATE TABLE t (a INT)"),
            Err(Error::NoDatabaseSelected)
        ));

        assert_eq!(db.execute("CREATE DATABASE one;").unwrap(), Outcome::Done);
        assert_eq!(db.current(), Some("one"));
        db.execute("CREATE DATABASE two").unwrap();
        assert_eq!(db.current(), Some("two"));

        assert!(matches!(
            db.execute("CREATE DATABASE one"),
            Err(Error::DatabaseExists(_))
        ));
        assert!(matches!(
            db.execute("CHANGE DATABASE three"),
            Err(Error::DatabaseNotFound(_))
        ));
        assert_eq!(db.current(), Some("two"));

        db.execute("CHANGE DATABASE one").unwrap();
        assert_eq!(db.current(), Some("one"));
    }

    #[test]
    fn test_current_database_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut db = Database::open(dir.path()).unwrap();
            db.execute("CREATE DATABASE shop").unwrap();
            db.execute("CREATE TABLE items (name TEXT)").unwrap();
        }
        let db = Database::open(dir.path()).unwrap();
        assert_eq!(db.current(), Some("shop"));
        assert!(db.table("items").is_ok());
    }

    #[test]
    fn test_create_table_errors() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE users (id INT)").unwrap();
        assert!(matches!(
            db.execute("CREATE TABLE users (id INT)"),
            Err(Error::TableExists(_))
        ));
        assert!(matches!(
            db.execute("CREATE TABLE other (id INT, id TEXT)"),
            Err(Error::SchemaViolation(_))
        ));
        assert!(matches!(
            db.execute("SELECT * FROM ghost"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_round_trip() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE t (a TEXT, b INT)").unwrap();

        let outcome = db.execute("INSERT INTO t(a, b) VALUES('x', 5);").unwrap();
        assert_eq!(outcome, Outcome::Affected(1));

        let result = db.query("SELECT * FROM t").unwrap();
        assert_eq!(result.columns, vec!["a", "b"]);
        assert_eq!(
            result.rows,
            vec![vec![Value::Text("x".into()), Value::Int(5)]]
        );
    }

    #[test]
    fn test_insert_with_column_reordering() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE users (id INT, name TEXT)").unwrap();

        db.execute("INSERT INTO users (name, id) VALUES ('Charlie', 3)")
            .unwrap();

        // the order must be the order of the schema
        assert_eq!(
            rows(&db, "SELECT id, name FROM users"),
            vec![vec![Value::Int(3), Value::Text("Charlie".into())]]
        );
    }

    #[test]
    fn test_insert_partial_and_positional() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE users (id INT, name TEXT, score FLOAT)")
            .unwrap();

        db.execute("INSERT INTO users (id) VALUES (4)").unwrap();
        db.execute("INSERT INTO users VALUES (5, 'Eve')").unwrap();
        // float columns accept integers
        db.execute("INSERT INTO users VALUES (6, 'Fay', 7)").unwrap();

        assert_eq!(
            rows(&db, "SELECT name, id, score FROM users"),
            vec![
                vec![Value::Null, Value::Int(4), Value::Null],
                vec![Value::Text("Eve".into()), Value::Int(5), Value::Null],
                vec![Value::Text("Fay".into()), Value::Int(6), Value::Int(7)],
            ]
        );
    }

    #[test]
    fn test_insert_shape_errors() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE t (a INT, b INT)").unwrap();

        for sql in [
            "INSERT INTO t (a, b) VALUES (1)",
            "INSERT INTO t (a, c) VALUES (1, 2)",
            "INSERT INTO t (a, a) VALUES (1, 2)",
            "INSERT INTO t (a, b, a) VALUES (1, 2, 3)",
            "INSERT INTO t VALUES (1, 2, 3)",
        ] {
            assert!(
                matches!(db.execute(sql), Err(Error::SchemaViolation(_))),
                "{sql}"
            );
        }
        assert_eq!(column_lengths(&db, "t"), vec![0, 0]);
    }

    #[test]
    fn test_failed_insert_leaves_files_identical() {
        let (_dir, mut db) = setup();
        users(&mut db);
        let before = snapshot(&db, "users");

        // id is NOT NULL
        assert!(matches!(
            db.execute("INSERT INTO users (name) VALUES ('Nobody')"),
            Err(Error::NotNullViolation(column)) if column == "id"
        ));
        assert!(matches!(
            db.execute("INSERT INTO users (id, name) VALUES (NULL, 'Nobody')"),
            Err(Error::NotNullViolation(_))
        ));
        // the failing column comes last in schema order
        assert!(matches!(
            db.execute("INSERT INTO users (id, name, age) VALUES (9, 'Old', 'very')"),
            Err(Error::TypeMismatch { column, .. }) if column == "age"
        ));

        assert_eq!(snapshot(&db, "users"), before);
    }

    #[test]
    fn test_unique_violation_keeps_one_row() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE t (code INT UNIQUE, note TEXT)").unwrap();
        db.execute("INSERT INTO t VALUES (7, 'first')").unwrap();

        assert!(matches!(
            db.execute("INSERT INTO t VALUES (7, 'second')"),
            Err(Error::DuplicateValue { column, value }) if column == "code" && value == "7"
        ));
        assert_eq!(
            rows(&db, "SELECT * FROM t"),
            vec![vec![Value::Int(7), Value::Text("first".into())]]
        );

        // NULL is never a duplicate
        db.execute("INSERT INTO t (note) VALUES ('a')").unwrap();
        db.execute("INSERT INTO t (note) VALUES ('b')").unwrap();
        assert_eq!(column_lengths(&db, "t"), vec![3, 3]);
    }

    #[test]
    fn test_columns_stay_aligned() {
        let (_dir, mut db) = setup();
        users(&mut db);
        assert_eq!(column_lengths(&db, "users"), vec![4, 4, 4]);

        db.execute("DELETE FROM users WHERE age = 30").unwrap();
        assert_eq!(column_lengths(&db, "users"), vec![2, 2, 2]);

        db.execute("INSERT INTO users (id) VALUES (5)").unwrap();
        assert_eq!(column_lengths(&db, "users"), vec![3, 3, 3]);
    }

    #[test]
    fn test_numeric_comparison() {
        let (_dir, mut db) = setup();
        users(&mut db);

        // 10 > 9 numerically even though "10" < "9" as text
        assert_eq!(ids(&db, "SELECT id FROM users WHERE age > 9"), vec![1, 2, 3]);
        assert_eq!(ids(&db, "SELECT id FROM users WHERE age <= 10"), vec![2, 4]);
        assert_eq!(ids(&db, "SELECT id FROM users WHERE age != 30"), vec![2, 4]);
    }

    #[test]
    fn test_where_column_resolution() {
        let (_dir, mut db) = setup();
        users(&mut db);

        assert_eq!(ids(&db, "SELECT id FROM users WHERE NAME = 'Mike'"), vec![4]);
        assert!(matches!(
            db.execute("SELECT * FROM users WHERE height > 3"),
            Err(Error::ColumnNotFound(column)) if column == "height"
        ));
        assert!(matches!(
            db.execute("SELECT height FROM users"),
            Err(Error::ColumnNotFound(_))
        ));
        assert!(matches!(
            db.execute("SELECT * FROM users ORDER BY height"),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_predicate_sees_hidden_column() {
        let (_dir, mut db) = setup();
        users(&mut db);

        let result = db.query("SELECT name FROM users WHERE id = 2").unwrap();
        assert_eq!(result.columns, vec!["name"]);
        assert_eq!(result.rows, vec![vec![Value::Text("Alice".into())]]);
    }

    #[test]
    fn test_order_by_is_stable() {
        let (_dir, mut db) = setup();
        users(&mut db);

        assert_eq!(
            ids(&db, "SELECT id FROM users ORDER BY age"),
            vec![4, 2, 1, 3]
        );
        // ties (1 and 3) keep their stored order in both directions
        assert_eq!(
            ids(&db, "SELECT id FROM users ORDER BY age DESC"),
            vec![1, 3, 2, 4]
        );
        assert_eq!(
            ids(&db, "SELECT id FROM users ORDER BY name ASC"),
            vec![2, 3, 1, 4]
        );
    }

    #[test]
    fn test_limit_and_offset_count_matches() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE n (v INT)").unwrap();
        for v in 1..=10 {
            db.execute(&format!("INSERT INTO n VALUES ({v})")).unwrap();
        }

        let values = |sql: &str| -> Vec<i64> { ids(&db, sql) };
        assert_eq!(values("SELECT v FROM n WHERE v > 4 LIMIT 3"), vec![5, 6, 7]);
        assert_eq!(
            values("SELECT v FROM n WHERE v > 4 LIMIT 3 OFFSET 2"),
            vec![7, 8, 9]
        );
        assert_eq!(
            values("SELECT v FROM n ORDER BY v DESC LIMIT 2 OFFSET 1"),
            vec![9, 8]
        );
        assert!(values("SELECT v FROM n LIMIT 0").is_empty());
        assert!(values("SELECT v FROM n LIMIT 5 OFFSET 20").is_empty());
    }

    #[test]
    fn test_like() {
        let (_dir, mut db) = setup();
        users(&mut db);

        assert_eq!(
            ids(&db, "SELECT id FROM users WHERE name LIKE 'Jo%'"),
            vec![1, 3]
        );
        assert_eq!(
            ids(&db, "SELECT id FROM users WHERE name like 'm_ke'"),
            vec![4]
        );
    }

    #[test]
    fn test_delete_rows() {
        let (_dir, mut db) = setup();
        users(&mut db);

        let outcome = db.execute("DELETE FROM users WHERE age = 30").unwrap();
        assert_eq!(outcome, Outcome::Affected(2));
        assert_eq!(
            rows(&db, "SELECT name FROM users"),
            vec![
                vec![Value::Text("Alice".into())],
                vec![Value::Text("Mike".into())]
            ]
        );
    }

    #[test]
    fn test_delete_without_match_touches_nothing() {
        let (_dir, mut db) = setup();
        users(&mut db);
        let before = snapshot(&db, "users");

        assert_eq!(
            db.execute("DELETE FROM users WHERE id > 12").unwrap(),
            Outcome::Affected(0)
        );
        assert_eq!(snapshot(&db, "users"), before);
    }

    #[test]
    fn test_unsafe_delete_mutates_nothing() {
        let (_dir, mut db) = setup();
        users(&mut db);
        let before = snapshot(&db, "users");

        assert!(matches!(
            db.execute("DELETE FROM users;"),
            Err(Error::UnsafeDelete)
        ));
        assert_eq!(snapshot(&db, "users"), before);
        assert_eq!(column_lengths(&db, "users"), vec![4, 4, 4]);
    }

    #[test]
    fn test_update_with_condition() {
        let (_dir, mut db) = setup();
        users(&mut db);

        let outcome = db
            .execute("UPDATE users SET name = 'Old', age = 31 WHERE age >= 30")
            .unwrap();
        assert_eq!(outcome, Outcome::Affected(2));
        assert_eq!(
            rows(&db, "SELECT name, age FROM users WHERE id = 3"),
            vec![vec![Value::Text("Old".into()), Value::Int(31)]]
        );
        assert_eq!(
            rows(&db, "SELECT name FROM users WHERE id = 2"),
            vec![vec![Value::Text("Alice".into())]]
        );
    }

    #[test]
    fn test_update_without_condition_hits_every_row() {
        let (_dir, mut db) = setup();
        users(&mut db);

        assert_eq!(
            db.execute("UPDATE users SET age = 1").unwrap(),
            Outcome::Affected(4)
        );
        assert_eq!(ids(&db, "SELECT id FROM users WHERE age = 1"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_update_counts_matches_not_changes() {
        let (_dir, mut db) = setup();
        users(&mut db);
        let before = snapshot(&db, "users");

        // matched rows already hold the value: counted, but nothing is written
        assert_eq!(
            db.execute("UPDATE users SET age = 30 WHERE name LIKE 'Jo%'")
                .unwrap(),
            Outcome::Affected(2)
        );
        assert_eq!(snapshot(&db, "users"), before);

        assert_eq!(
            db.execute("UPDATE users SET age = 50 WHERE id = 99").unwrap(),
            Outcome::Affected(0)
        );
        assert_eq!(snapshot(&db, "users"), before);
    }

    #[test]
    fn test_keyword_named_columns() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE notes (id INT, desc TEXT, order INT)")
            .unwrap();
        db.execute("INSERT INTO notes (id, desc, order) VALUES (1, 'b', 2)")
            .unwrap();
        db.execute("INSERT INTO notes VALUES (2, 'a', 1)").unwrap();
        db.execute("UPDATE notes SET desc = 'c' WHERE order = 2").unwrap();

        let result = db
            .query("SELECT desc FROM notes WHERE id > 0 ORDER BY order DESC")
            .unwrap();
        assert_eq!(result.columns, ["desc"]);
        assert_eq!(
            result.rows,
            vec![vec![Value::Text("c".into())], vec![Value::Text("a".into())]]
        );

        db.execute("DELETE FROM notes WHERE desc = 'a'").unwrap();
        assert_eq!(ids(&db, "SELECT id FROM notes"), vec![1]);
    }

    #[test]
    fn test_unquoted_values_round_trip() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE events (id INT, day TEXT)").unwrap();
        db.execute("INSERT INTO events VALUES (1, 2024-01-05)").unwrap();
        db.execute("INSERT INTO events VALUES (2, 12abc)").unwrap();

        assert_eq!(
            rows(&db, "SELECT day FROM events"),
            vec![
                vec![Value::Text("2024-01-05".into())],
                vec![Value::Text("12abc".into())]
            ]
        );
        assert_eq!(ids(&db, "SELECT id FROM events WHERE day = 12abc"), vec![2]);
        assert_eq!(
            ids(&db, "SELECT id FROM events WHERE day = 2024-01-05"),
            vec![1]
        );
    }

    #[test]
    fn test_update_same_number_keeps_float() {
        let (_dir, mut db) = setup();
        db.execute("CREATE TABLE prices (id INT, amount FLOAT)").unwrap();
        db.execute("INSERT INTO prices VALUES (1, 5.0)").unwrap();
        db.execute("INSERT INTO prices VALUES (2, 7.5)").unwrap();
        let before = snapshot(&db, "prices");

        assert_eq!(
            db.execute("UPDATE prices SET amount = 5 WHERE id = 1").unwrap(),
            Outcome::Affected(1)
        );
        assert_eq!(snapshot(&db, "prices"), before);
        assert_eq!(
            rows(&db, "SELECT amount FROM prices WHERE id = 1"),
            vec![vec![Value::Float(5.0)]]
        );

        // a different number is still written
        db.execute("UPDATE prices SET amount = 6 WHERE id = 1").unwrap();
        assert_eq!(
            rows(&db, "SELECT amount FROM prices WHERE id = 1"),
            vec![vec![Value::Int(6)]]
        );
    }

    #[test]
    fn test_failed_update_is_wrapped_and_rolled_back() {
        let (_dir, mut db) = setup();
        users(&mut db);
        break_column(&db, "users", "age");
        let before = snapshot(&db, "users");

        // name is staged first, then reading age fails
        let err = db
            .execute("UPDATE users SET name = 'X', age = 1 WHERE id = 1")
            .unwrap_err();
        assert!(
            matches!(&err, Error::UpdateFailed(cause) if matches!(**cause, Error::Io { .. })),
            "{err:?}"
        );
        assert_eq!(snapshot(&db, "users"), before);
        let names = db.table("users").unwrap().read_column("name").unwrap();
        assert_eq!(names[0], Value::Text("John".into()));
    }

    #[test]
    fn test_failed_delete_rolls_back_staged_columns() {
        let (_dir, mut db) = setup();
        users(&mut db);
        break_column(&db, "users", "age");
        let before = snapshot(&db, "users");

        // id and name are staged before age, the last column, fails to read
        assert!(matches!(
            db.execute("DELETE FROM users WHERE id = 1"),
            Err(Error::Io { .. })
        ));
        assert_eq!(snapshot(&db, "users"), before);
        let table = db.table("users").unwrap();
        assert_eq!(table.read_column("id").unwrap().len(), 4);
        assert_eq!(table.read_column("name").unwrap().len(), 4);
    }

    #[test]
    fn test_insert_waits_for_exclusive_lock() {
        use std::thread;
        use std::time::Duration;

        let (_dir, mut db) = setup();
        users(&mut db);
        let table = db.table("users").unwrap();
        let lock = table.lock_exclusive().unwrap();

        let writer = thread::spawn(move || {
            db.execute("INSERT INTO users (id, name, age) VALUES (5, 'Eve', 41)")
                .map(|outcome| (db, outcome))
        });
        thread::sleep(Duration::from_millis(300));
        assert!(!writer.is_finished(), "insert ran while the table was locked");
        assert_eq!(table.read_column("id").unwrap().len(), 4);

        drop(lock);
        let (db, outcome) = writer.join().unwrap().unwrap();
        assert_eq!(outcome, Outcome::Affected(1));
        assert_eq!(ids(&db, "SELECT id FROM users WHERE id = 5"), vec![5]);
    }

    #[test]
    fn test_update_unknown_column() {
        let (_dir, mut db) = setup();
        users(&mut db);

        assert!(matches!(
            db.execute("UPDATE users SET height = 3 WHERE id = 1"),
            Err(Error::SchemaViolation(_))
        ));
        assert!(matches!(
            db.execute("UPDATE users SET age = 3 WHERE height = 1"),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_query_rejects_other_statements() {
        let (_dir, mut db) = setup();
        users(&mut db);
        assert!(matches!(
            db.query("DELETE FROM users WHERE id = 1"),
            Err(Error::StatementSyntax(_))
        ));
        assert_eq!(column_lengths(&db, "users"), vec![4, 4, 4]);
    }

    #[test]
    fn test_result_rendering() {
        let result = QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows: vec![
                vec![Value::Int(1), Value::Text("Alice".into())],
                vec![Value::Int(22), Value::Null],
            ],
        };
        let expected = "\
+----+-------+
| id | name  |
+----+-------+
| 1  | Alice |
| 22 | NULL  |
+----+-------+
2 rows in set";
        assert_eq!(result.to_string(), expected);

        let empty = QueryResult {
            columns: vec!["id".into()],
            rows: vec![],
        };
        assert!(empty.is_empty());
        assert_eq!(empty.to_string(), "No rows returned");
    }

    #[test]
    fn test_result_json() {
        let result = QueryResult {
            columns: vec!["id".into(), "ok".into()],
            rows: vec![vec![Value::Int(1), Value::Bool(true)]],
        };
        assert_eq!(result.to_json().to_string(), r#"[{"id":1,"ok":true}]"#);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Affected(1).to_string(), "Query OK, 1 row affected");
        assert_eq!(Outcome::Affected(3).to_string(), "Query OK, 3 rows affected");
        assert_eq!(Outcome::Done.to_string(), "Query OK");
    }
}
