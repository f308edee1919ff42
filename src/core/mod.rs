// Core modules implementing collection, storage, and error modeling.
pub mod collect;
pub mod error;
pub mod store;
