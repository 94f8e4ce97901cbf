//! The log store and the operations built on it.
//!
//! `lifecycle` owns the on-disk contract (header, stack pointer, open/create);
//! `mutation` appends, pops, imports, and patches; `query` produces
//! metadata-only views; `maintenance` rewrites whole stores; `verify` walks
//! the stack read-only and reports on it.

pub mod lifecycle;
pub mod maintenance;
pub mod mutation;
pub mod query;
pub mod verify;

pub use lifecycle::Oats;
pub use query::{binary_search_by_id, MetadataScanner};
pub use verify::VerifyReport;
