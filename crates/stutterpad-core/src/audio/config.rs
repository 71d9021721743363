//! Audio backend configuration
//!
//! Defines configuration for the audio system including device selection
//! and buffer settings.

use serde::{Deserialize, Serialize};

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Default sample rate for the audio system (44.1kHz)
/// Samples are resampled to the negotiated device rate at load time, so
/// a fallback rate only costs one resample pass per load.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the system choose the default buffer size
    #[default]
    Default,
    /// Request a specific buffer size in frames (may be adjusted by the system)
    Fixed(u32),
    /// Use a small buffer for responsive pad triggering
    LowLatency,
}

impl BufferSize {
    /// Get the buffer size in frames, or None for system default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some(*frames),
            BufferSize::LowLatency => Some(256),
        }
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (JACK, ALSA, etc.)
/// This allows selecting devices from different hosts on systems with
/// multiple audio backends available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "Jack", "Alsa", "CoreAudio")
    /// If None, uses the default/preferred host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device (None = use system default)
    pub device: Option<DeviceId>,

    /// Preferred buffer size
    #[serde(default)]
    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = 44100)
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    /// Set the output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Set the preferred sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Enable low-latency mode
    pub fn with_low_latency(mut self) -> Self {
        self.buffer_size = BufferSize::LowLatency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.as_frames(), None);
        assert_eq!(BufferSize::Fixed(1024).as_frames(), Some(1024));
        assert_eq!(BufferSize::LowLatency.as_frames(), Some(256));
    }

    #[test]
    fn test_device_id_labels() {
        assert_eq!(DeviceId::new("hw:0,0").display_label(), "hw:0,0");
        assert_eq!(
            DeviceId::with_host("hw:0,0", "ALSA").display_label(),
            "[ALSA] hw:0,0"
        );
    }

    #[test]
    fn test_config_yaml_roundtrip() {
        let config = AudioConfig::default()
            .with_device(DeviceId::with_host("hw:1,0", "ALSA"))
            .with_buffer_frames(256)
            .with_sample_rate(48000);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AudioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.device, config.device);
        assert_eq!(parsed.buffer_size, config.buffer_size);
        assert_eq!(parsed.sample_rate, Some(48000));
    }
}
