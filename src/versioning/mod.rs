//! Document shape and the lineage writer.
//!
//! Every stored document carries a `__rerum` block recording its
//! place in a version chain. The writer in [`writer`] is the only
//! code allowed to mutate that block.

mod document;
mod errors;
mod writer;

pub use document::{Deleted, History, RerumMeta};
pub use errors::VersioningError;
pub use writer::VersioningWriter;
