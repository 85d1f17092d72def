//! # fiscus-config
//!
//! Configuration schema, validation, and data-root resolution. Settings are
//! loaded explicitly (YAML file or environment) and handed to the runtime's
//! `Context`; nothing in the workspace reads configuration through hidden
//! globals.

pub mod schema;
pub mod validation;

pub use schema::*;
pub use validation::*;
