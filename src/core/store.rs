//! Purpose: Own the SQLite connection used by `dump` and `ingest`.
//! Exports: `Database`, `HitsQuery`, `quote_identifier`.
//! Role: Only module that speaks SQL; everything above it sees rows and errors.
//! Invariants: The connection lives exactly as long as `Database`; drop releases it.
//! Invariants: Identifiers are always quoted; values are always bound parameters.
//! Invariants: Ingest runs in one transaction; an error before commit rolls it back.

use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, params};

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_TARGET: &str = "./pre-sqlite-olt.db";
pub const DEFAULT_TABLE: &str = "search_results";
pub const DEFAULT_COLUMN: &str = "data";
pub const DEFAULT_JSON_PATH: &str = "$.hits";

fn db_error(err: rusqlite::Error, message: &str) -> Error {
    Error::new(ErrorKind::Database)
        .with_message(message)
        .with_source(err)
}

/// Quotes `name` as an SQL identifier.
pub fn quote_identifier(name: &str) -> Result<String, Error> {
    if name.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("identifier must not be empty")
            .with_hint("Pass a table or column name, e.g. `--table search_results`."));
    }
    if name.contains('\0') {
        return Err(Error::new(ErrorKind::Usage).with_message("identifier contains a NUL byte"));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// `file:` URIs and `:memory:` are handed to SQLite untouched.
fn is_plain_path(target: &str) -> bool {
    !(target.starts_with("file:") || target == ":memory:")
}

/// Where the JSON arrays live: `json_extract(column, json_path)` over `table`.
#[derive(Clone, Debug)]
pub struct HitsQuery {
    pub table: String,
    pub column: String,
    pub json_path: String,
}

impl Default for HitsQuery {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            column: DEFAULT_COLUMN.to_string(),
            json_path: DEFAULT_JSON_PATH.to_string(),
        }
    }
}

impl HitsQuery {
    fn sql(&self) -> Result<String, Error> {
        let table = quote_identifier(&self.table)?;
        let column = quote_identifier(&self.column)?;
        Ok(format!(
            "SELECT json_extract({column}, ?1) FROM {table} WHERE json_valid({column}) = 1"
        ))
    }
}

#[derive(Debug)]
pub struct Database {
    conn: Connection,
    target: String,
}

impl Database {
    /// Opens `target` for reading and writing, creating the file if needed.
    pub fn open(target: &str) -> Result<Self, Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::open_with_flags(target, flags)
    }

    /// Opens an existing database without write access.
    pub fn open_read_only(target: &str) -> Result<Self, Error> {
        if is_plain_path(target) && !Path::new(target).exists() {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("database not found")
                .with_path(target)
                .with_hint("Set --db or DB_URI to an existing SQLite file."));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::open_with_flags(target, flags)
    }

    fn open_with_flags(target: &str, flags: OpenFlags) -> Result<Self, Error> {
        let conn = Connection::open_with_flags(target, flags)
            .map_err(|err| db_error(err, "failed to open database").with_path(target))?;
        tracing::debug!(db = target, "opened database");
        Ok(Self {
            conn,
            target: target.to_string(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Runs the hits query and hands its lazy row stream to `consume`.
    ///
    /// Each item is the extracted JSON text of one row. SQL NULL (path absent)
    /// and non-text values surface as `Type` errors carrying the row index.
    pub fn with_hits<T, F>(&self, query: &HitsQuery, consume: F) -> Result<T, Error>
    where
        F: FnOnce(&mut dyn Iterator<Item = Result<String, Error>>) -> Result<T, Error>,
    {
        let sql = query.sql()?;
        let mut stmt = self.conn.prepare(&sql).map_err(|err| {
            db_error(err, "failed to prepare hits query")
                .with_path(&self.target)
                .with_hint(format!(
                    "Check that table `{}` with column `{}` exists.",
                    query.table, query.column
                ))
        })?;
        let rows = stmt
            .query_map(params![query.json_path], |row| row.get::<_, SqlValue>(0))
            .map_err(|err| db_error(err, "failed to run hits query").with_path(&self.target))?;
        let mut stream = rows.enumerate().map(|(index, cell)| {
            let cell = cell.map_err(|err| {
                db_error(err, "failed to read row").with_row(index as u64)
            })?;
            cell_text(cell, &query.json_path).map_err(|err| err.with_row(index as u64))
        });
        consume(&mut stream)
    }

    pub fn create_table(&self, table: &str) -> Result<(), Error> {
        let sql = format!("CREATE TABLE IF NOT EXISTS {} (data TEXT)", quote_identifier(table)?);
        self.conn
            .execute(&sql, [])
            .map_err(|err| db_error(err, "failed to create table").with_path(&self.target))?;
        Ok(())
    }

    /// Inserts each line as a one-column row, all inside one transaction.
    pub fn insert_lines<I>(&mut self, table: &str, lines: I) -> Result<u64, Error>
    where
        I: IntoIterator<Item = Result<String, Error>>,
    {
        let sql = format!("INSERT INTO {} VALUES (?1)", quote_identifier(table)?);
        let target = self.target.clone();
        let tx = self
            .conn
            .transaction()
            .map_err(|err| db_error(err, "failed to begin transaction").with_path(&target))?;
        let mut count = 0u64;
        {
            let mut stmt = tx.prepare(&sql).map_err(|err| {
                db_error(err, "failed to prepare insert")
                    .with_path(&target)
                    .with_hint(format!(
                        "Create the table first or pass --create (table: `{table}`)."
                    ))
            })?;
            for line in lines {
                let line = line?;
                stmt.execute(params![line]).map_err(|err| {
                    db_error(err, "failed to insert line")
                        .with_path(&target)
                        .with_line(count + 1)
                })?;
                count += 1;
            }
        }
        tx.commit()
            .map_err(|err| db_error(err, "failed to commit").with_path(&target))?;
        Ok(count)
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn cell_text(cell: SqlValue, json_path: &str) -> Result<String, Error> {
    match cell {
        SqlValue::Text(text) => Ok(text),
        SqlValue::Null => Err(Error::new(ErrorKind::Type)
            .with_message(format!("json path `{json_path}` matched nothing, expected an array"))),
        SqlValue::Integer(_) | SqlValue::Real(_) => Err(Error::new(ErrorKind::Type)
            .with_message(format!("json path `{json_path}` matched a number, expected an array"))),
        SqlValue::Blob(_) => Err(Error::new(ErrorKind::Type)
            .with_message(format!("json path `{json_path}` matched a blob, expected an array"))),
    }
}
