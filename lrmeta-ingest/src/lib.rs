//! lrmeta-ingest library - metadata normalizer
//!
//! Reads the YAML metadata store and writes the normalized JSON documents the
//! API serves: one aggregate per resource type, one document per resource,
//! the description map, the global ID list and the published schema.

pub mod blacklist;
pub mod collections;
pub mod descriptions;
pub mod documents;
pub mod downloads;
pub mod error;
pub mod layout;
pub mod localizations;
pub mod normalizer;
pub mod record;
pub mod report;
pub mod scanner;
pub mod schema;
pub mod writer;

pub use error::{NormalizeError, NormalizeResult};
pub use layout::OutputLayout;
pub use normalizer::{NormalizeOptions, Normalizer};
pub use report::NormalizeReport;
