//! Hierarchical file storage over flat object stores.
//!
//! [`fs::ObjectFS`] implements [`storage::FileStorage`] on top of any
//! [`adapters::ObjectClient`]: S3, GCS, or the in-memory mock. Directories are
//! never stored; they are derived from key prefixes at call time.

pub mod adapters;
pub mod fs;
pub mod model;
pub mod storage;
pub mod util;
