//! Durable annotation store read by the web frontend.
//!
//! The store is a single JSON file mapping segment filenames to detection
//! outcomes. The processor is the sole writer; the web collaborator reads
//! the file over HTTP without coordination.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::AnnotationStore;
