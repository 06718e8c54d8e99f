pub mod entities;
pub mod status;

// Re-export tracing for use in this crate
pub use tracing;
