//! Real-time stutter effect
//!
//! Captures one tempo-synced subdivision of the live master signal into a
//! pre-allocated scratch buffer, then replaces the incoming audio with a
//! transformed replay of the capture (looped, gated, reversed, or
//! pitch-wobbled) until stopped. Capture and playback both run inside the
//! audio callback with no allocation.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{StereoBuffer, StereoSample};

/// Musical subdivision the stutter loop is synced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subdivision {
    #[default]
    Sixteenth,
    Eighth,
    Quarter,
    Half,
}

impl Subdivision {
    /// Subdivisions per beat
    pub fn per_beat(&self) -> f64 {
        match self {
            Subdivision::Sixteenth => 4.0,
            Subdivision::Eighth => 2.0,
            Subdivision::Quarter => 1.0,
            Subdivision::Half => 0.5,
        }
    }

    /// Length of one subdivision in frames at the given tempo and rate
    pub fn frames(&self, sample_rate: u32, tempo_bpm: f64) -> usize {
        let beats_per_second = tempo_bpm / 60.0;
        (sample_rate as f64 / (beats_per_second * self.per_beat())) as usize
    }
}

/// Replay transformation applied after capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StutterMode {
    /// Loop the captured segment verbatim
    #[default]
    Classic,
    /// Mute the live signal on a 50% duty cycle synced to the subdivision
    Gate,
    /// Loop the captured segment backwards
    Reverse,
    /// Loop with a cyclic sinusoidal pitch-bend on the read position
    PitchWobble,
}

const MODE_CLASSIC: u8 = 0;
const MODE_GATE: u8 = 1;
const MODE_REVERSE: u8 = 2;
const MODE_PITCH_WOBBLE: u8 = 3;

impl StutterMode {
    fn code(&self) -> u8 {
        match self {
            StutterMode::Classic => MODE_CLASSIC,
            StutterMode::Gate => MODE_GATE,
            StutterMode::Reverse => MODE_REVERSE,
            StutterMode::PitchWobble => MODE_PITCH_WOBBLE,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            MODE_GATE => StutterMode::Gate,
            MODE_REVERSE => StutterMode::Reverse,
            MODE_PITCH_WOBBLE => StutterMode::PitchWobble,
            _ => StutterMode::Classic,
        }
    }
}

/// Lock-free view of the stutter state for the control thread
#[derive(Debug, Default)]
pub struct StutterAtomics {
    active: AtomicBool,
    capturing: AtomicBool,
    mode: AtomicU8,
}

impl StutterAtomics {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Relaxed)
    }

    pub fn mode(&self) -> StutterMode {
        StutterMode::from_code(self.mode.load(Ordering::Relaxed))
    }

    fn publish(&self, active: bool, capturing: bool, mode: StutterMode) {
        self.active.store(active, Ordering::Relaxed);
        self.capturing.store(capturing, Ordering::Relaxed);
        self.mode.store(mode.code(), Ordering::Relaxed);
    }
}

/// Tempo-synced stutter on the master bus
pub struct StutterProcessor {
    scratch: Vec<StereoSample>,
    sample_rate: u32,
    active: bool,
    mode: StutterMode,
    /// Loop length in frames for the current trigger
    subdivision_frames: usize,
    /// Frames captured so far (capture phase while < subdivision_frames)
    captured: usize,
    /// Playback read cursor, monotonically increasing
    cursor: usize,
    atomics: Arc<StutterAtomics>,
}

impl StutterProcessor {
    pub fn new(sample_rate: u32) -> Self {
        let mut processor = Self {
            scratch: Vec::new(),
            sample_rate,
            active: false,
            mode: StutterMode::Classic,
            subdivision_frames: 0,
            captured: 0,
            cursor: 0,
            atomics: Arc::new(StutterAtomics::default()),
        };
        processor.prepare(sample_rate, 0);
        processor
    }

    /// Shared atomics handle for the control thread
    pub fn atomics(&self) -> Arc<StutterAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mode(&self) -> StutterMode {
        self.mode
    }

    /// Allocate the scratch buffer for a stream configuration.
    ///
    /// Sizes the capture buffer to one second at `sample_rate` (covers the
    /// longest subdivision at the minimum tempo) and force-deactivates any
    /// in-flight stutter so playback never reads a stale or resized
    /// buffer. Call from the control thread before streaming starts.
    pub fn prepare(&mut self, sample_rate: u32, _block_size: usize) {
        self.sample_rate = sample_rate;
        self.scratch = vec![StereoSample::silence(); sample_rate as usize];
        self.active = false;
        self.captured = 0;
        self.cursor = 0;
        self.publish_state();
    }

    /// Trigger a stutter: begin capturing one subdivision at `tempo_bpm`
    pub fn start(&mut self, mode: StutterMode, subdivision: Subdivision, tempo_bpm: f64) {
        let frames = subdivision.frames(self.sample_rate, tempo_bpm);
        // Clamp to the scratch capacity; slow tempos with long
        // subdivisions can exceed one second
        self.subdivision_frames = frames.clamp(1, self.scratch.len().max(1));
        self.mode = mode;
        self.captured = 0;
        self.cursor = 0;
        self.active = true;
        self.publish_state();
    }

    /// Release the stutter, passing live audio through again
    pub fn stop(&mut self) {
        self.active = false;
        self.publish_state();
    }

    /// Process one block in place.
    ///
    /// Inactive: leaves the buffer untouched. Active: captures frames
    /// until one subdivision is buffered (passing them through), then
    /// overwrites the block with the transformed replay.
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.active {
            return;
        }

        let n = self.subdivision_frames;
        for frame in buffer.iter_mut() {
            if self.captured < n {
                self.scratch[self.captured] = *frame;
                self.captured += 1;
                if self.captured == n {
                    self.cursor = 0;
                    self.publish_state();
                }
                // Capture phase passes the live signal through unchanged
                continue;
            }

            let loop_pos = self.cursor % n;
            *frame = match self.mode {
                StutterMode::Classic => self.read_scratch(loop_pos),
                StutterMode::Gate => {
                    if loop_pos >= n / 2 {
                        StereoSample::silence()
                    } else {
                        *frame
                    }
                }
                StutterMode::Reverse => self.read_scratch(n - 1 - loop_pos),
                StutterMode::PitchWobble => {
                    let factor = 1.0
                        + 0.3 * (std::f64::consts::TAU * loop_pos as f64 / n as f64).sin();
                    let read = (loop_pos as f64 * factor) as usize % n;
                    self.read_scratch(read)
                }
            };
            self.cursor += 1;
        }
    }

    /// Bounds-checked scratch read; out of range is silence
    fn read_scratch(&self, index: usize) -> StereoSample {
        self.scratch.get(index).copied().unwrap_or_default()
    }

    fn publish_state(&self) {
        let capturing = self.active && self.captured < self.subdivision_frames;
        self.atomics.publish(self.active, capturing, self.mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44100;
    const TEMPO: f64 = 120.0;

    fn distinct_block(len: usize, offset: usize) -> StereoBuffer {
        let samples = (0..len)
            .map(|i| StereoSample::new((offset + i) as f32, -((offset + i) as f32)))
            .collect();
        StereoBuffer::from_vec(samples)
    }

    #[test]
    fn test_subdivision_frame_counts_at_120_bpm() {
        assert_eq!(Subdivision::Sixteenth.frames(RATE, TEMPO), 5512);
        assert_eq!(Subdivision::Eighth.frames(RATE, TEMPO), 11025);
        assert_eq!(Subdivision::Quarter.frames(RATE, TEMPO), 22050);
        assert_eq!(Subdivision::Half.frames(RATE, TEMPO), 44100);
    }

    #[test]
    fn test_inactive_passes_through() {
        let mut stutter = StutterProcessor::new(RATE);
        let mut buffer = distinct_block(64, 0);
        let original = buffer.clone();

        stutter.process(&mut buffer);
        assert_eq!(buffer.as_slice(), original.as_slice());
    }

    #[test]
    fn test_classic_replays_captured_block() {
        let mut stutter = StutterProcessor::new(RATE);
        stutter.start(StutterMode::Classic, Subdivision::Sixteenth, TEMPO);

        let n = Subdivision::Sixteenth.frames(RATE, TEMPO);
        let mut first = distinct_block(n, 0);
        stutter.process(&mut first);

        // Capture phase passes through unchanged
        assert_eq!(first[0].left, 0.0);
        assert_eq!(first[n - 1].left, (n - 1) as f32);

        let mut second = distinct_block(n, n);
        stutter.process(&mut second);

        // Replay of the captured segment, sample for sample
        for i in 0..n {
            assert_eq!(second[i], first[i], "frame {} differs", i);
        }
    }

    #[test]
    fn test_classic_loops_beyond_one_cycle() {
        let mut stutter = StutterProcessor::new(RATE);
        stutter.start(StutterMode::Classic, Subdivision::Sixteenth, TEMPO);

        let n = Subdivision::Sixteenth.frames(RATE, TEMPO);
        let mut capture = distinct_block(n, 0);
        stutter.process(&mut capture);

        let mut replay = distinct_block(2 * n, n);
        stutter.process(&mut replay);
        for i in 0..n {
            assert_eq!(replay[i], capture[i]);
            assert_eq!(replay[n + i], capture[i]);
        }
    }

    #[test]
    fn test_reverse_plays_backwards() {
        let mut stutter = StutterProcessor::new(RATE);
        stutter.start(StutterMode::Reverse, Subdivision::Sixteenth, TEMPO);

        let n = Subdivision::Sixteenth.frames(RATE, TEMPO);
        let mut capture = distinct_block(n, 0);
        stutter.process(&mut capture);

        let mut replay = distinct_block(n, n);
        stutter.process(&mut replay);

        // First playback frame is the last captured; last frame of the
        // cycle is the first captured
        assert_eq!(replay[0], capture[n - 1]);
        assert_eq!(replay[n - 1], capture[0]);
    }

    #[test]
    fn test_gate_mutes_second_half_of_cycle() {
        let mut stutter = StutterProcessor::new(RATE);
        stutter.start(StutterMode::Gate, Subdivision::Sixteenth, TEMPO);

        let n = Subdivision::Sixteenth.frames(RATE, TEMPO);
        let mut capture = distinct_block(n, 0);
        stutter.process(&mut capture);

        let mut replay = distinct_block(n, n);
        let live = replay.clone();
        stutter.process(&mut replay);

        for i in 0..n / 2 {
            assert_eq!(replay[i], live[i], "first half must pass live audio");
        }
        for i in n / 2..n {
            assert_eq!(replay[i], StereoSample::silence(), "second half must be muted");
        }
    }

    #[test]
    fn test_pitch_wobble_stays_in_bounds() {
        let mut stutter = StutterProcessor::new(RATE);
        stutter.start(StutterMode::PitchWobble, Subdivision::Sixteenth, TEMPO);

        let n = Subdivision::Sixteenth.frames(RATE, TEMPO);
        let mut capture = distinct_block(n, 0);
        stutter.process(&mut capture);

        // Replay frames must all come from the captured range
        let mut replay = distinct_block(n, n);
        stutter.process(&mut replay);
        for i in 0..n {
            let v = replay[i].left;
            assert!(v >= 0.0 && v < n as f32, "frame {} read {} out of capture", i, v);
        }
    }

    #[test]
    fn test_prepare_deactivates_in_flight_stutter() {
        let mut stutter = StutterProcessor::new(RATE);
        stutter.start(StutterMode::Classic, Subdivision::Sixteenth, TEMPO);
        assert!(stutter.is_active());

        stutter.prepare(48000, 256);
        assert!(!stutter.is_active());

        let mut buffer = distinct_block(64, 0);
        let original = buffer.clone();
        stutter.process(&mut buffer);
        assert_eq!(buffer.as_slice(), original.as_slice());
    }

    #[test]
    fn test_stop_restores_passthrough() {
        let mut stutter = StutterProcessor::new(RATE);
        stutter.start(StutterMode::Classic, Subdivision::Sixteenth, TEMPO);

        let n = Subdivision::Sixteenth.frames(RATE, TEMPO);
        let mut capture = distinct_block(n, 0);
        stutter.process(&mut capture);

        stutter.stop();
        let mut buffer = distinct_block(64, 0);
        let original = buffer.clone();
        stutter.process(&mut buffer);
        assert_eq!(buffer.as_slice(), original.as_slice());
    }

    #[test]
    fn test_subdivision_clamped_to_scratch() {
        let mut stutter = StutterProcessor::new(RATE);
        // Half note at 30 BPM would be 2 seconds; scratch is 1 second
        stutter.start(StutterMode::Classic, Subdivision::Half, 30.0);
        assert!(stutter.is_active());

        let mut buffer = distinct_block(RATE as usize + 64, 0);
        stutter.process(&mut buffer);
        // Must not panic: capture clamped to scratch capacity
        assert!(stutter.atomics().is_active());
    }
}
