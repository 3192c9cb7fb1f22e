pub mod config;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod rendering;
pub mod tracking;
pub mod video;

// Re-export the error type so callers only need `tracker_core::Error`
pub use anyhow::Error;
pub use anyhow::Result;
