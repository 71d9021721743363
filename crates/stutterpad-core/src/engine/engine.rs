//! The audio engine: eight sample pads summed into a master bus with a
//! tempo-synced stutter effect.
//!
//! The engine lives on the audio thread. Per block it drains the command
//! queue, renders every pad into a pre-allocated scratch buffer, sums the
//! pads into the master buffer, runs the stutter processor over the sum,
//! and applies master volume. Nothing here allocates after construction.

use std::sync::Arc;

use crate::engine::command::EngineCommand;
use crate::engine::player::{PadAtomics, SamplePlayer};
use crate::engine::stutter::{StutterAtomics, StutterProcessor};
use crate::types::{StereoBuffer, NUM_PADS, SAMPLE_RATE};

pub const DEFAULT_TEMPO: f64 = 120.0;
pub const MIN_TEMPO: f64 = 30.0;
pub const MAX_TEMPO: f64 = 200.0;

/// Upper bound on the audio callback block size (frames).
/// Scratch buffers are pre-allocated to this size.
pub const MAX_BLOCK_SIZE: usize = 8192;

pub struct AudioEngine {
    pads: [SamplePlayer; NUM_PADS],
    stutter: StutterProcessor,
    /// Scratch buffer one pad renders into before summing
    pad_buffer: StereoBuffer,
    master_volume: f32,
    tempo: f64,
    sample_rate: u32,
}

impl AudioEngine {
    pub fn new() -> Self {
        Self::new_with_sample_rate(SAMPLE_RATE)
    }

    pub fn new_with_sample_rate(sample_rate: u32) -> Self {
        Self {
            pads: std::array::from_fn(|_| SamplePlayer::new(sample_rate)),
            stutter: StutterProcessor::new(sample_rate),
            pad_buffer: StereoBuffer::silence(MAX_BLOCK_SIZE),
            master_volume: 1.0,
            tempo: DEFAULT_TEMPO,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn pad(&self, pad: usize) -> Option<&SamplePlayer> {
        self.pads.get(pad)
    }

    pub fn pad_mut(&mut self, pad: usize) -> Option<&mut SamplePlayer> {
        self.pads.get_mut(pad)
    }

    /// Atomics handles for all pads, for the control thread
    pub fn pad_atomics(&self) -> [Arc<PadAtomics>; NUM_PADS] {
        std::array::from_fn(|i| self.pads[i].atomics())
    }

    /// Atomics handle for the stutter state
    pub fn stutter_atomics(&self) -> Arc<StutterAtomics> {
        self.stutter.atomics()
    }

    /// Drain and apply all pending commands. Called at block start.
    pub fn process_commands(&mut self, commands: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(command) = commands.pop() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::LoadSample { pad, sample } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.load(sample);
                }
            }
            EngineCommand::UnloadSample { pad } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.unload();
                }
            }
            EngineCommand::Play { pad } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.play();
                }
            }
            EngineCommand::Stop { pad } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.stop();
                }
            }
            EngineCommand::Reset { pad } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.reset();
                }
            }
            EngineCommand::SetStart { pad, frame } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.set_start(frame);
                }
            }
            EngineCommand::SetEnd { pad, frame } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.set_end(frame);
                }
            }
            EngineCommand::SetLoop { pad, enabled } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.set_loop(enabled);
                }
            }
            EngineCommand::SetVolume { pad, gain } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.set_volume(gain);
                }
            }
            EngineCommand::SetPitch { pad, ratio } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.set_pitch(ratio);
                }
            }
            EngineCommand::SetInterpolation { pad, method } => {
                if let Some(player) = self.pads.get_mut(pad) {
                    player.set_interpolation(method);
                }
            }
            EngineCommand::SetMasterVolume { volume } => {
                self.master_volume = volume.clamp(0.0, 1.0);
            }
            EngineCommand::SetTempo { bpm } => {
                self.tempo = bpm.clamp(MIN_TEMPO, MAX_TEMPO);
            }
            EngineCommand::StutterStart { mode, subdivision } => {
                self.stutter.start(mode, subdivision, self.tempo);
            }
            EngineCommand::StutterStop => {
                self.stutter.stop();
            }
        }
    }

    /// Render one block into `out`, overwriting its contents.
    ///
    /// Order: sum pads, stutter the master sum, apply master volume.
    pub fn process(&mut self, out: &mut StereoBuffer) {
        out.fill_silence();
        let block_len = out.len();
        debug_assert!(block_len <= MAX_BLOCK_SIZE, "block exceeds pre-allocated scratch");
        self.pad_buffer.set_len_from_capacity(block_len);

        for pad in &mut self.pads {
            pad.process(&mut self.pad_buffer);
            out.add_buffer(&self.pad_buffer);
        }

        self.stutter.process(out);
        out.scale(self.master_volume);
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::command_channel;
    use crate::engine::gc::gc_handle;
    use crate::engine::stutter::{StutterMode, Subdivision};
    use crate::sample_file::LoadedSample;
    use crate::types::{Sample, StereoSample};
    use basedrop::Shared;

    fn test_sample(len: usize, value: Sample) -> Shared<LoadedSample> {
        Shared::new(
            &gc_handle(),
            LoadedSample {
                frames: vec![StereoSample::mono(value); len],
                sample_rate: SAMPLE_RATE,
                source_sample_rate: SAMPLE_RATE,
                source_channels: 1,
                path: std::path::PathBuf::from("test.wav"),
            },
        )
    }

    #[test]
    fn test_silent_with_no_pads_playing() {
        let mut engine = AudioEngine::new();
        let mut out = StereoBuffer::silence(256);
        engine.process(&mut out);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_commands_drive_playback() {
        let mut engine = AudioEngine::new();
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::LoadSample {
            pad: 0,
            sample: test_sample(44100, 0.5),
        })
        .unwrap();
        tx.push(EngineCommand::Play { pad: 0 }).unwrap();

        engine.process_commands(&mut rx);
        assert!(engine.pad(0).unwrap().is_playing());

        let mut out = StereoBuffer::silence(512);
        engine.process(&mut out);
        assert!(out.peak() > 0.0);
    }

    #[test]
    fn test_pads_sum_into_master() {
        let mut engine = AudioEngine::new();
        engine.pad_mut(0).unwrap().load(test_sample(44100, 0.25));
        engine.pad_mut(1).unwrap().load(test_sample(44100, 0.25));
        engine.pad_mut(0).unwrap().play();
        engine.pad_mut(1).unwrap().play();

        // Run past the attack ramp so both pads are at full level
        let mut out = StereoBuffer::silence(512);
        engine.process(&mut out);
        engine.process(&mut out);

        let last = out[out.len() - 1];
        assert!((last.left - 0.5).abs() < 1e-3, "expected summed 0.5, got {}", last.left);
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mut engine = AudioEngine::new();
        engine.pad_mut(0).unwrap().load(test_sample(44100, 0.5));
        engine.pad_mut(0).unwrap().play();

        let mut out = StereoBuffer::silence(512);
        engine.process(&mut out);
        engine.process(&mut out);
        let full = out[out.len() - 1].left;

        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::SetMasterVolume { volume: 0.5 }).unwrap();
        engine.process_commands(&mut rx);

        engine.process(&mut out);
        let halved = out[out.len() - 1].left;
        assert!((halved - full * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_tempo_clamping() {
        let mut engine = AudioEngine::new();
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::SetTempo { bpm: 500.0 }).unwrap();
        engine.process_commands(&mut rx);
        assert_eq!(engine.tempo(), MAX_TEMPO);

        tx.push(EngineCommand::SetTempo { bpm: 5.0 }).unwrap();
        engine.process_commands(&mut rx);
        assert_eq!(engine.tempo(), MIN_TEMPO);
    }

    #[test]
    fn test_out_of_range_pad_commands_ignored() {
        let mut engine = AudioEngine::new();
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::Play { pad: 99 }).unwrap();
        engine.process_commands(&mut rx);
        // Must not panic; no pad state changes
        for i in 0..NUM_PADS {
            assert!(!engine.pad(i).unwrap().is_playing());
        }
    }

    #[test]
    fn test_retrim_to_disjoint_region() {
        let mut engine = AudioEngine::new();
        engine.pad_mut(0).unwrap().load(test_sample(1000, 0.5));

        let (mut tx, mut rx) = command_channel();
        // The player binary widens the region before applying new bounds,
        // so neither bound clamps against a stale one.
        let trim = |tx: &mut rtrb::Producer<EngineCommand>, start, end| {
            tx.push(EngineCommand::SetStart { pad: 0, frame: 0 }).unwrap();
            tx.push(EngineCommand::SetEnd { pad: 0, frame: end }).unwrap();
            tx.push(EngineCommand::SetStart { pad: 0, frame: start }).unwrap();
        };

        trim(&mut tx, 700, 900);
        engine.process_commands(&mut rx);
        assert_eq!(engine.pad(0).unwrap().start_position(), 700);
        assert_eq!(engine.pad(0).unwrap().end_position(), 900);

        // Re-trim to a region entirely before the current start
        trim(&mut tx, 100, 200);
        engine.process_commands(&mut rx);
        assert_eq!(engine.pad(0).unwrap().start_position(), 100);
        assert_eq!(engine.pad(0).unwrap().end_position(), 200);

        // And to a region entirely after the current end
        trim(&mut tx, 750, 800);
        engine.process_commands(&mut rx);
        assert_eq!(engine.pad(0).unwrap().start_position(), 750);
        assert_eq!(engine.pad(0).unwrap().end_position(), 800);
    }

    #[test]
    fn test_stutter_applies_to_master_bus() {
        let mut engine = AudioEngine::new();
        engine.pad_mut(0).unwrap().load(test_sample(SAMPLE_RATE as usize * 2, 0.5));
        engine.pad_mut(0).unwrap().set_loop(true);
        engine.pad_mut(0).unwrap().play();

        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::StutterStart {
            mode: StutterMode::Gate,
            subdivision: Subdivision::Sixteenth,
        })
        .unwrap();
        engine.process_commands(&mut rx);
        assert!(engine.stutter_atomics().is_active());

        // Capture one subdivision, then verify gating mutes half the cycle
        let n = Subdivision::Sixteenth.frames(SAMPLE_RATE, DEFAULT_TEMPO);
        let mut out = StereoBuffer::silence(n);
        engine.process(&mut out);
        engine.process(&mut out);

        let silent = out.iter().filter(|s| s.peak() == 0.0).count();
        assert!(silent >= n / 2, "expected half the cycle muted, got {}/{}", silent, n);
    }
}
