//! Stutterpad Core - sample playback and real-time stutter engine

pub mod audio;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod sample_file;
pub mod types;

pub use types::*;

// Re-exported so downstream crates can construct `Shared` sample handles
// without depending on basedrop directly
pub use basedrop::Shared;
