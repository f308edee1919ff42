//! Purpose: Define the public Rust API boundary for jsonpipe.
//! Exports: `dump`, `ingest`, their config types, and the error model.
//! Role: Stable surface used by the CLI and tests; hides storage modules.
//! Invariants: Configuration is passed in explicitly; nothing here reads the environment.
//! Invariants: Internal modules remain private and are not directly exposed.

mod dump;
mod ingest;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::collect::{BoundedCollector, DEFAULT_CAP, collect_bounded};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::store::{
    DEFAULT_COLUMN, DEFAULT_JSON_PATH, DEFAULT_TABLE, DEFAULT_TARGET, HitsQuery,
};
pub use dump::{DumpConfig, dump, dump_to_writer};
pub use ingest::{IngestConfig, IngestOutcome, ingest};

pub type ApiResult<T> = Result<T, Error>;
