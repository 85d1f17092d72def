//! # fiscus-extract
//!
//! Token providers for report pages. The local path wraps a pluggable
//! positioned-word extractor over vector PDFs; the remote path drives an
//! OCR backend with bounded polling and an on-disk per-page cache. Both
//! honor the same output contract, so report pipelines stay provider
//! agnostic.

pub mod blocks;
pub mod cache;
pub mod local;
pub mod remote;

pub use blocks::*;
pub use cache::*;
pub use local::*;
pub use remote::*;
