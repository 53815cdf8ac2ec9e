pub mod config;
pub mod domain;
pub mod pipeline;
pub mod sources;
pub mod sinks;
pub mod transform;
pub mod observability;

pub use pipeline::{run, ExportError};
