//! # fiscus-runtime
//!
//! The pipeline framework: the extract-transform-validate-load state
//! machine, the explicit runtime context, the typed report registry with
//! naming-convention parameter parsing, and the sequential batch runner.
//!
//! Report families live in `fiscus-reports` and register themselves into a
//! [`Registry`] at startup; this crate only knows the [`EtlPipeline`]
//! interface.

pub mod context;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod runner;

pub use context::*;
pub use params::*;
pub use pipeline::*;
pub use registry::*;
pub use runner::*;
