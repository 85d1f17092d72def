//! # fiscus-output
//!
//! Output sinks for normalized record sets. CSV is the only load format;
//! the sink overwrites atomically so failed invocations never leave partial
//! files under the processed root.

pub mod csv_sink;

pub use csv_sink::*;
