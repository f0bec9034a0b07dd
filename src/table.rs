use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::column::{read_column, to_pretty_json};
use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::staging::StagedWriter;
use crate::value::Value;

/// Schema sidecar stored next to the `Columns` directory.
pub const SCHEMA_FILE: &str = "Table-info.json";
/// Directory holding one `<column>.json` file per column.
pub const COLUMNS_DIR: &str = "Columns";
const LOCK_FILE: &str = ".lock";

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    /// The type as written in CREATE TABLE, e.g. `VARCHAR(20)`.
    pub declared_type: String,
    pub is_unique: bool,
    pub not_null: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            is_unique: false,
            not_null: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// The type family values of this column are checked against.
    pub fn data_type(&self) -> DataType {
        DataType::from_declared(&self.declared_type)
    }
}

/// On-disk shape of one schema entry.
#[derive(Debug, Serialize, Deserialize)]
struct ColumnInfo {
    #[serde(rename = "type")]
    declared_type: String,
    #[serde(rename = "isUnique", default)]
    is_unique: bool,
    #[serde(rename = "notNull", default)]
    not_null: bool,
}

/// Ordered column definitions; the order is the canonical column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Index of the column with exactly this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Case-insensitive lookup, an exact match wins over a folded one.
    ///
    /// ```
    /// # use coldb::{ColumnDef, Schema};
    /// let schema = Schema::new(vec![ColumnDef::new("Age", "int")]);
    /// assert_eq!(schema.resolve("age").unwrap().name, "Age");
    /// assert!(schema.resolve("name").is_none());
    /// ```
    pub fn resolve(&self, name: &str) -> Option<&ColumnDef> {
        self.resolve_position(name).map(|i| &self.columns[i])
    }

    /// Index counterpart of [Schema::resolve].
    pub fn resolve_position(&self, name: &str) -> Option<usize> {
        self.position(name).or_else(|| {
            self.columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
        })
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut object = Map::new();
        for column in &self.columns {
            let info = ColumnInfo {
                declared_type: column.declared_type.clone(),
                is_unique: column.is_unique,
                not_null: column.not_null,
            };
            let info = serde_json::to_value(info).map_err(|e| Error::corrupt(SCHEMA_FILE, e))?;
            object.insert(column.name.clone(), info);
        }
        to_pretty_json(&Json::Object(object))
    }

    fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let object: Map<String, Json> =
            serde_json::from_slice(bytes).map_err(|e| Error::corrupt(path, e))?;
        let columns = object
            .into_iter()
            .map(|(name, info)| {
                let info: ColumnInfo =
                    serde_json::from_value(info).map_err(|e| Error::corrupt(path, e))?;
                Ok(ColumnDef {
                    name,
                    declared_type: info.declared_type,
                    is_unique: info.is_unique,
                    not_null: info.not_null,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }
}

/// A table directory: its schema sidecar plus one file per column.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    dir: PathBuf,
    schema: Schema,
}

impl Table {
    /// Opens `<database_dir>/<name>` and loads its schema.
    ///
    /// # Errors
    /// [Error::TableNotFound] if the directory is missing, [Error::SchemaNotFound]
    /// if the schema sidecar is missing, [Error::Corrupt] if it cannot be parsed.
    pub fn open(database_dir: &Path, name: &str) -> Result<Self> {
        let dir = database_dir.join(name);
        if !dir.is_dir() {
            return Err(Error::TableNotFound(name.to_string()));
        }
        let schema_path = dir.join(SCHEMA_FILE);
        if !schema_path.is_file() {
            return Err(Error::SchemaNotFound(name.to_string()));
        }
        let bytes = fs::read(&schema_path).map_err(|e| Error::io(&schema_path, e))?;
        let schema = Schema::from_bytes(&schema_path, &bytes)?;

        Ok(Self {
            name: name.to_string(),
            dir,
            schema,
        })
    }

    /// Creates the table directory, an empty file per column and the schema sidecar.
    ///
    /// # Errors
    /// [Error::TableExists] if the directory already exists, [Error::SchemaViolation]
    /// for an empty or duplicated column list.
    pub fn create(database_dir: &Path, name: &str, columns: Vec<ColumnDef>) -> Result<Self> {
        let dir = database_dir.join(name);
        if dir.exists() {
            return Err(Error::TableExists(name.to_string()));
        }
        if columns.is_empty() {
            return Err(Error::SchemaViolation(format!(
                "table {name:?} must have at least one column"
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(Error::SchemaViolation(format!(
                    "duplicate column {:?}",
                    column.name
                )));
            }
        }

        let table = Self {
            name: name.to_string(),
            dir,
            schema: Schema::new(columns),
        };
        let columns_dir = table.dir.join(COLUMNS_DIR);
        fs::create_dir_all(&columns_dir).map_err(|e| Error::io(&columns_dir, e))?;

        if let Err(e) = table.write_initial_files() {
            if let Err(cleanup) = fs::remove_dir_all(&table.dir) {
                log::warn!("failed to remove partial table {:?}: {cleanup}", table.dir);
            }
            return Err(e);
        }
        log::info!(
            "created table {name:?} with {} columns",
            table.schema.len()
        );
        Ok(table)
    }

    fn write_initial_files(&self) -> Result<()> {
        let mut writer = StagedWriter::new();
        for column in &self.schema.columns {
            writer.stage(&self.column_path(&column.name), &column.name, &[])?;
        }
        writer.stage_bytes(&self.dir.join(SCHEMA_FILE), &self.schema.to_bytes()?)?;
        writer.commit()?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_path(&self, column: &str) -> PathBuf {
        self.dir.join(COLUMNS_DIR).join(format!("{column}.json"))
    }

    pub fn read_column(&self, column: &str) -> Result<Vec<Value>> {
        read_column(&self.column_path(column), column)
    }

    /// Every column in schema order.
    pub fn read_all(&self) -> Result<Vec<Vec<Value>>> {
        self.schema
            .names()
            .map(|name| self.read_column(name))
            .collect()
    }

    /// Blocks until no other handle holds any lock on this table.
    pub fn lock_exclusive(&self) -> Result<TableLock> {
        let file = self.lock_file()?;
        file.lock_exclusive()
            .map_err(|e| Error::io(self.dir.join(LOCK_FILE), e))?;
        Ok(TableLock { file })
    }

    /// Blocks until no other handle holds an exclusive lock on this table.
    pub fn lock_shared(&self) -> Result<TableLock> {
        let file = self.lock_file()?;
        file.lock_shared()
            .map_err(|e| Error::io(self.dir.join(LOCK_FILE), e))?;
        Ok(TableLock { file })
    }

    fn lock_file(&self) -> Result<File> {
        let path = self.dir.join(LOCK_FILE);
        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))
    }
}

/// Advisory lock on a table directory, released on drop.
#[derive(Debug)]
pub struct TableLock {
    file: File,
}

impl Drop for TableLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("failed to release table lock: {e}");
        }
    }
}
