//! Purpose: Extract the JSON arrays stored in a table and flatten them, bounded by a cap.
//! Exports: `DumpConfig`, `dump`, `dump_to_writer`.
//! Role: Glue between the scoped connection and the bounded collector.
//! Invariants: Nothing is written until every needed row has decoded successfully.
//! Invariants: The connection is released before output is written.

use std::io::Write;

use serde_json::Value;

use super::ApiResult;
use crate::core::collect::{DEFAULT_CAP, collect_bounded};
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{Database, DEFAULT_TARGET, HitsQuery};

#[derive(Clone, Debug)]
pub struct DumpConfig {
    pub connection_target: String,
    pub query: HitsQuery,
    pub cap: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            connection_target: DEFAULT_TARGET.to_string(),
            query: HitsQuery::default(),
            cap: DEFAULT_CAP,
        }
    }
}

impl DumpConfig {
    pub fn new(connection_target: impl Into<String>) -> Self {
        Self {
            connection_target: connection_target.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.query.table = table.into();
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.query.column = column.into();
        self
    }

    pub fn with_json_path(mut self, json_path: impl Into<String>) -> Self {
        self.query.json_path = json_path.into();
        self
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }
}

/// Collects the flattened items without writing anything.
pub fn dump(config: &DumpConfig) -> ApiResult<Vec<Value>> {
    let db = Database::open_read_only(&config.connection_target)?;
    let items = db.with_hits(&config.query, |rows| collect_bounded(rows, config.cap))?;
    tracing::info!(
        db = db.target(),
        table = %config.query.table,
        items = items.len(),
        cap = config.cap,
        "collected items"
    );
    Ok(items)
}

/// Runs `dump` and writes the items as one JSON array followed by a newline.
pub fn dump_to_writer<W: Write>(config: &DumpConfig, pretty: bool, mut out: W) -> ApiResult<()> {
    let items = Value::Array(dump(config)?);
    let encoded = if pretty {
        serde_json::to_string_pretty(&items)
    } else {
        serde_json::to_string(&items)
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output")
            .with_source(err)
    })?;
    writeln!(out, "{encoded}")
        .and_then(|()| out.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}
