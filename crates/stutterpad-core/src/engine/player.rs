//! Per-pad sample playback
//!
//! A `SamplePlayer` owns one loaded sample plus its playback state: trim
//! region, loop flag, volume, pitch ratio, and an amplitude envelope. All
//! mutation happens on the audio thread (driven by commands drained at
//! block start); observable state is published to the control thread
//! through lock-free atomics.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::dsp::envelope::{AdsrEnvelope, Envelope};
use crate::dsp::interp::{self, InterpolationMethod};
use crate::sample_file::LoadedSample;
use crate::types::{PlayState, Sample, StereoBuffer, StereoSample};

/// Pitch deviation below which direct indexed reads are used
const PITCH_EPSILON: f64 = 1e-6;

pub const MIN_PITCH: f64 = 0.25;
pub const MAX_PITCH: f64 = 4.0;

const STATE_STOPPED: u8 = 0;
const STATE_PLAYING: u8 = 1;
const STATE_DONE: u8 = 2;

/// Lock-free view of a pad's state for the control thread
///
/// Written by the audio thread with relaxed ordering; values are
/// monitoring data, so a block of staleness is acceptable.
#[derive(Debug, Default)]
pub struct PadAtomics {
    state: AtomicU8,
    position: AtomicUsize,
    length: AtomicUsize,
    loaded: AtomicBool,
    /// Set when the pad's sample changes; cleared by `take_dirty`
    dirty: AtomicBool,
}

impl PadAtomics {
    pub fn play_state(&self) -> PlayState {
        match self.state.load(Ordering::Relaxed) {
            STATE_PLAYING => PlayState::Playing,
            STATE_DONE => PlayState::Done,
            _ => PlayState::Stopped,
        }
    }

    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    pub fn length(&self) -> usize {
        self.length.load(Ordering::Relaxed)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    /// Check and clear the sample-changed flag.
    ///
    /// Returns true once after each load/unload, so a poller knows to
    /// refresh anything derived from the sample (waveforms, lengths).
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::Relaxed)
    }

    fn publish(&self, state: PlayState, position: usize, length: usize, loaded: bool) {
        let code = match state {
            PlayState::Stopped => STATE_STOPPED,
            PlayState::Playing => STATE_PLAYING,
            PlayState::Done => STATE_DONE,
        };
        self.state.store(code, Ordering::Relaxed);
        self.position.store(position, Ordering::Relaxed);
        self.length.store(length, Ordering::Relaxed);
        self.loaded.store(loaded, Ordering::Relaxed);
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }
}

/// A single sample pad
pub struct SamplePlayer {
    sample: Option<Shared<LoadedSample>>,
    state: PlayState,
    position: usize,
    start: usize,
    end: usize,
    looping: bool,
    volume: f32,
    pitch: f64,
    interpolation: InterpolationMethod,
    envelope: Box<dyn Envelope + Send>,
    atomics: Arc<PadAtomics>,
}

impl SamplePlayer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample: None,
            state: PlayState::Stopped,
            position: 0,
            start: 0,
            end: 0,
            looping: false,
            volume: 1.0,
            pitch: 1.0,
            interpolation: InterpolationMethod::default(),
            envelope: Box::new(AdsrEnvelope::declick(sample_rate)),
            atomics: Arc::new(PadAtomics::default()),
        }
    }

    /// Shared atomics handle for the control thread
    pub fn atomics(&self) -> Arc<PadAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn is_done(&self) -> bool {
        self.state == PlayState::Done
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn start_position(&self) -> usize {
        self.start
    }

    pub fn end_position(&self) -> usize {
        self.end
    }

    pub fn sample_length(&self) -> usize {
        self.sample.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn interpolation(&self) -> InterpolationMethod {
        self.interpolation
    }

    /// Install a new sample, replacing any previous one.
    ///
    /// Trim resets to the full range, position rewinds, playback stops.
    /// The previous `Shared` drops here; deallocation is deferred to the
    /// collector thread, so this is safe on the audio thread.
    pub fn load(&mut self, sample: Shared<LoadedSample>) {
        let len = sample.len();
        self.sample = Some(sample);
        self.start = 0;
        self.end = len;
        self.position = 0;
        self.state = PlayState::Stopped;
        self.envelope.reset();
        self.atomics.mark_dirty();
        self.publish_state();
    }

    /// Remove the current sample and return the pad to idle
    pub fn unload(&mut self) {
        self.sample = None;
        self.start = 0;
        self.end = 0;
        self.position = 0;
        self.state = PlayState::Stopped;
        self.envelope.reset();
        self.atomics.mark_dirty();
        self.publish_state();
    }

    /// Begin or resume playback. No-op with no sample loaded.
    ///
    /// A pad that finished a non-looping pass rewinds before restarting;
    /// a stopped pad resumes from where it was.
    pub fn play(&mut self) {
        if self.sample.is_none() {
            return;
        }
        if self.state == PlayState::Done || self.position >= self.end {
            self.position = self.start;
            self.envelope.reset();
        }
        self.envelope.gate(1.0);
        self.state = PlayState::Playing;
        self.publish_state();
    }

    /// Stop playback, retaining the current position so play() resumes
    pub fn stop(&mut self) {
        self.envelope.gate(0.0);
        self.state = PlayState::Stopped;
        self.publish_state();
    }

    /// Rewind to the trim start and reset the envelope
    pub fn reset(&mut self) {
        self.position = self.start;
        self.envelope.reset();
        self.publish_state();
    }

    /// Advance the position by one frame according to loop policy.
    ///
    /// This is the single point of truth for end-of-sample handling and
    /// must be called exactly once per output frame.
    pub fn next_frame(&mut self) {
        if self.state != PlayState::Playing || self.sample.is_none() {
            return;
        }
        let last = self.end.saturating_sub(1);
        if self.position < last {
            self.position += 1;
        } else if self.looping {
            self.position = self.start;
        } else {
            self.state = PlayState::Done;
            self.position = self.start;
            self.envelope.gate(0.0);
            self.publish_state();
        }
    }

    /// Per-channel output for the current frame.
    ///
    /// Returns 0 when not playing. Advances the envelope by one step per
    /// call; callers invoking this once per channel should prefer
    /// `render_frame` / `process` for block rendering.
    pub fn get_output(&mut self, channel: usize) -> Sample {
        if self.state != PlayState::Playing {
            return 0.0;
        }
        let value = self.current_sample(channel);
        value * self.envelope.process() * self.volume
    }

    /// Bounds-checked read of the current frame
    pub fn current_sample(&self, channel: usize) -> Sample {
        self.sample_at(channel, self.position)
    }

    /// Bounds-checked read at an arbitrary position.
    ///
    /// Out-of-range channel or position reads as 0. With a non-unity
    /// pitch ratio the read position is `position / pitch`, linearly
    /// interpolated between neighbouring frames.
    pub fn sample_at(&self, channel: usize, position: usize) -> Sample {
        if channel > 1 {
            return 0.0;
        }
        self.frame_at(position).channel(channel)
    }

    fn frame_at(&self, position: usize) -> StereoSample {
        let Some(sample) = &self.sample else {
            return StereoSample::silence();
        };
        let data = &sample.frames;
        if (self.pitch - 1.0).abs() > PITCH_EPSILON {
            interp::read_interpolated(data, position as f64 / self.pitch, self.interpolation)
        } else if position < data.len() {
            data[position]
        } else {
            StereoSample::silence()
        }
    }

    /// Render one enveloped stereo frame and advance position.
    ///
    /// Advances the envelope exactly once per frame, applying the same
    /// level to both channels.
    pub fn render_frame(&mut self) -> StereoSample {
        if self.state != PlayState::Playing {
            return StereoSample::silence();
        }
        let level = self.envelope.process() * self.volume;
        let frame = self.frame_at(self.position).scale(level);
        self.next_frame();
        frame
    }

    /// Render a full block into `out`, overwriting its contents
    pub fn process(&mut self, out: &mut StereoBuffer) {
        for frame in out.iter_mut() {
            *frame = self.render_frame();
        }
        self.publish_state();
    }

    /// Set the trim start, clamped so the region stays non-empty.
    ///
    /// The position is clamped back inside [start, end) if needed.
    pub fn set_start(&mut self, frame: usize) {
        if self.end == 0 {
            return;
        }
        self.start = frame.min(self.end - 1);
        self.clamp_position();
    }

    /// Set the trim end, clamped to (start, length]
    pub fn set_end(&mut self, frame: usize) {
        let len = self.sample_length();
        if len == 0 {
            return;
        }
        self.end = frame.clamp(self.start + 1, len);
        self.clamp_position();
    }

    fn clamp_position(&mut self) {
        self.position = self.position.clamp(self.start, self.end - 1);
        self.publish_state();
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.looping = enabled;
    }

    /// Set playback volume, clamped to [0, 1]
    pub fn set_volume(&mut self, gain: f32) {
        self.volume = gain.clamp(0.0, 1.0);
    }

    /// Set the pitch ratio, clamped to [0.25, 4.0]
    pub fn set_pitch(&mut self, ratio: f64) {
        self.pitch = ratio.clamp(MIN_PITCH, MAX_PITCH);
    }

    pub fn set_interpolation(&mut self, method: InterpolationMethod) {
        self.interpolation = method;
    }

    fn publish_state(&self) {
        self.atomics.publish(
            self.state,
            self.position,
            self.sample_length(),
            self.sample.is_some(),
        );
    }
}
