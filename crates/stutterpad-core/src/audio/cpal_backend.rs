//! CPAL audio backend
//!
//! Owns the output stream and the audio-thread side of the engine.
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │
//! │                  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │
//!         │ Relaxed atomics                           │ pop()
//!         ▼                                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ Pad/Stutter      │◄────────────────────│  CPAL Audio Thread  │
//! │ Atomics          │     state writes    │  (owns AudioEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};
use super::device::{find_device_by_id, get_cpal_default_device};
use super::error::{AudioError, AudioResult};
use crate::engine::player::PadAtomics;
use crate::engine::stutter::StutterAtomics;
use crate::engine::{command_channel, AudioEngine, CommandSender, EngineCommand, MAX_BLOCK_SIZE};
use crate::types::{StereoBuffer, NUM_PADS};

/// CPAL-specific audio handle
///
/// Keeps the audio stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    /// Master output stream
    _master_stream: Stream,
    /// Sample rate of the audio system
    sample_rate: u32,
    /// Actual buffer size in frames (as negotiated with the device)
    buffer_size: u32,
}

impl CpalAudioHandle {
    /// Get the sample rate of the audio system
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the actual buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Get the audio latency in milliseconds (one-way, output only)
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Everything the control thread needs after the audio system starts
pub struct AudioSystemResult {
    /// Keeps the stream alive; drop to stop audio
    pub handle: CpalAudioHandle,
    /// Command side of the lock-free queue
    pub command_sender: CommandSender,
    /// Per-pad playback state, readable without locks
    pub pad_atomics: [Arc<PadAtomics>; NUM_PADS],
    /// Stutter effect state, readable without locks
    pub stutter_atomics: Arc<StutterAtomics>,
    pub sample_rate: u32,
    pub buffer_size: u32,
    pub latency_ms: f32,
}

/// Start the audio system with the given configuration
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => get_cpal_default_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported_config, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        latency_ms
    );

    // Create engine and extract atomics before it moves to the callback
    let engine = AudioEngine::new_with_sample_rate(sample_rate);
    let pad_atomics = engine.pad_atomics();
    let stutter_atomics = engine.stutter_atomics();

    let (command_tx, command_rx) = command_channel();

    let callback_state = AudioCallbackState::new(engine, command_rx);
    let callback_state = Arc::new(Mutex::new(callback_state));

    let stream = build_output_stream(&device, &stream_config, callback_state)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    let handle = CpalAudioHandle {
        _master_stream: stream,
        sample_rate,
        buffer_size,
    };

    Ok(AudioSystemResult {
        handle,
        command_sender: CommandSender::new(command_tx),
        pad_atomics,
        stutter_atomics,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

/// State owned by the audio callback
///
/// The mutex is uncontended: only the stream callback ever locks it.
struct AudioCallbackState {
    /// The audio engine (owned exclusively by the audio thread)
    engine: AudioEngine,
    /// Command receiver from the control thread
    command_rx: rtrb::Consumer<EngineCommand>,
    /// Pre-allocated master buffer
    master_buffer: StereoBuffer,
}

impl AudioCallbackState {
    fn new(engine: AudioEngine, command_rx: rtrb::Consumer<EngineCommand>) -> Self {
        Self {
            engine,
            command_rx,
            master_buffer: StereoBuffer::silence(MAX_BLOCK_SIZE),
        }
    }

    /// Drain commands and render one block
    fn process(&mut self, n_frames: usize) {
        // Set working buffer length (RT-safe: no allocation)
        self.master_buffer.set_len_from_capacity(n_frames.min(MAX_BLOCK_SIZE));

        self.engine.process_commands(&mut self.command_rx);
        self.engine.process(&mut self.master_buffer);
    }
}

/// Get the best output configuration for a device
///
/// Returns (SupportedStreamConfig, actual_buffer_size_in_frames)
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let target_sample_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);

    // Prefer f32 format, stereo, and the requested sample rate
    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| {
            target_sample_rate >= c.min_sample_rate().0
                && target_sample_rate <= c.max_sample_rate().0
        })
        .or_else(|| {
            // Fallback: any config with at least 2 channels
            supported_configs.iter().find(|c| c.channels() >= 2)
        })
        .or_else(|| supported_configs.first())
        .ok_or_else(|| {
            AudioError::ConfigError("No suitable output configuration found".to_string())
        })?;

    let sample_rate = if target_sample_rate >= best_config.min_sample_rate().0
        && target_sample_rate <= best_config.max_sample_rate().0
    {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (samples will be resampled)",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    let stream_config = best_config.clone().with_sample_rate(sample_rate);

    let buffer_size = match config.buffer_size {
        BufferSize::Default => DEFAULT_BUFFER_SIZE,
        BufferSize::Fixed(frames) => frames.clamp(64, MAX_BLOCK_SIZE as u32),
        BufferSize::LowLatency => 256,
    };

    log::debug!(
        "Selected buffer size: {} frames for {:?} mode",
        buffer_size,
        config.buffer_size
    );

    Ok((stream_config, buffer_size))
}

/// Build the master output stream
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    state: Arc<Mutex<AudioCallbackState>>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut state = state.lock().unwrap();
                let n_frames = data.len() / channels;

                state.process(n_frames);

                // Copy master output to the device buffer
                let samples = state.master_buffer.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    if i < samples.len() {
                        let sample = samples[i];
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        // Fill additional channels with silence
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    } else {
                        for ch in frame.iter_mut() {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None, // No timeout (blocking)
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}
