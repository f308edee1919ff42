//! Purpose: Library crate behind the `jsonpipe` CLI and its tests.
//! Exports: `api` (dump, ingest, configuration, errors).
//! Role: Keeps SQL and JSON handling out of the binary so both can be tested directly.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
mod core;
mod json;
