//! Purpose: Insert a line stream into a single-column table.
//! Exports: `IngestConfig`, `IngestOutcome`, `ingest`.
//! Role: Library half of the `ingest` command; line splitting lives with the CLI.
//! Invariants: Lines are stored verbatim; no validation or batching.
//! Invariants: All lines commit together or not at all.

use super::ApiResult;
use crate::core::store::{DEFAULT_TARGET, Database};

#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub connection_target: String,
    pub table_name: String,
    pub create_table: bool,
}

impl IngestConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            connection_target: DEFAULT_TARGET.to_string(),
            table_name: table_name.into(),
            create_table: false,
        }
    }

    pub fn with_connection_target(mut self, target: impl Into<String>) -> Self {
        self.connection_target = target.into();
        self
    }

    pub fn with_create_table(mut self, create_table: bool) -> Self {
        self.create_table = create_table;
        self
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IngestOutcome {
    pub lines: u64,
}

pub fn ingest<I>(config: &IngestConfig, lines: I) -> ApiResult<IngestOutcome>
where
    I: IntoIterator<Item = ApiResult<String>>,
{
    let mut db = Database::open(&config.connection_target)?;
    if config.create_table {
        db.create_table(&config.table_name)?;
    }
    let lines = db.insert_lines(&config.table_name, lines)?;
    tracing::info!(
        db = db.target(),
        table = %config.table_name,
        lines,
        "ingest committed"
    );
    Ok(IngestOutcome { lines })
}
