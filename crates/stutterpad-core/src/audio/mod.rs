//! Cross-platform audio backend
//!
//! Lock-free design for real-time safety:
//!
//! - **Control thread**: sends commands via lock-free ring buffer
//! - **Audio thread**: owns the AudioEngine exclusively, drains commands
//!   at block start
//! - **Atomics**: control thread reads playback state via relaxed atomics
//!
//! # Example
//!
//! ```ignore
//! use stutterpad_core::audio::{start_audio_system, AudioConfig};
//! use stutterpad_core::engine::EngineCommand;
//!
//! let result = start_audio_system(&AudioConfig::default())?;
//! result.command_sender.send(EngineCommand::Play { pad: 0 })?;
//! let position = result.pad_atomics[0].position();
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};
pub use cpal_backend::{start_audio_system, AudioSystemResult, CpalAudioHandle};
pub use device::{find_device_by_id, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
