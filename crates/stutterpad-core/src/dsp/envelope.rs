//! Amplitude envelopes for pad playback
//!
//! Every pad runs its output through an envelope so that starting and
//! stopping playback never produces a hard discontinuity. The engine only
//! depends on the `Envelope` trait; the stock implementation is a linear
//! ADSR tuned for short attack/release ramps.

use crate::types::Sample;

/// Envelope lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeState {
    /// Envelope is inactive, output is zero
    #[default]
    Idle,
    /// Ramping from current level toward the gate intensity
    Attack,
    /// Falling from peak toward the sustain level
    Decay,
    /// Holding at the sustain level while the gate is open
    Sustain,
    /// Ramping from current level down to zero
    Release,
}

/// A gate-driven amplitude envelope
///
/// `gate` with a positive intensity opens the envelope (attack scaled to
/// the intensity), `gate(0.0)` closes it (release). `process` returns the
/// current level and advances one frame.
pub trait Envelope {
    /// Open or close the gate. Intensity > 0 triggers the attack stage
    /// with the peak scaled by intensity; 0.0 begins the release.
    fn gate(&mut self, intensity: f32);

    /// Produce the level for the current frame and advance
    fn process(&mut self) -> Sample;

    /// Immediately return to idle with zero output
    fn reset(&mut self);

    /// Current lifecycle stage
    fn state(&self) -> EnvelopeState;

    /// True once the release has completed (or the envelope never started)
    fn is_idle(&self) -> bool {
        self.state() == EnvelopeState::Idle
    }
}

/// Linear-segment ADSR envelope
///
/// Times are expressed in frames at the engine sample rate. Defaults are
/// short ramps (a few milliseconds) that declick playback without being
/// audible as a fade.
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    state: EnvelopeState,
    level: Sample,
    peak: Sample,
    attack_frames: u32,
    decay_frames: u32,
    sustain_level: Sample,
    release_frames: u32,
}

impl AdsrEnvelope {
    /// Create an envelope with explicit segment lengths (in frames)
    pub fn new(attack_frames: u32, decay_frames: u32, sustain_level: Sample, release_frames: u32) -> Self {
        Self {
            state: EnvelopeState::Idle,
            level: 0.0,
            peak: 1.0,
            attack_frames: attack_frames.max(1),
            decay_frames: decay_frames.max(1),
            sustain_level: sustain_level.clamp(0.0, 1.0),
            release_frames: release_frames.max(1),
        }
    }

    /// Default declick envelope for a given sample rate:
    /// 2ms attack, no decay (sustain at peak), 5ms release.
    pub fn declick(sample_rate: u32) -> Self {
        let ms = |n: u32| (sample_rate * n / 1000).max(1);
        Self::new(ms(2), 1, 1.0, ms(5))
    }

    /// Current output level without advancing
    pub fn level(&self) -> Sample {
        self.level
    }
}

impl Envelope for AdsrEnvelope {
    fn gate(&mut self, intensity: f32) {
        if intensity > 0.0 {
            self.peak = intensity.clamp(0.0, 1.0);
            self.state = EnvelopeState::Attack;
        } else if self.state != EnvelopeState::Idle {
            self.state = EnvelopeState::Release;
        }
    }

    fn process(&mut self) -> Sample {
        let out = self.level;
        match self.state {
            EnvelopeState::Idle => {}
            EnvelopeState::Attack => {
                self.level += self.peak / self.attack_frames as Sample;
                if self.level >= self.peak {
                    self.level = self.peak;
                    self.state = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                let target = self.sustain_level * self.peak;
                self.level -= (self.peak - target) / self.decay_frames as Sample;
                if self.level <= target {
                    self.level = target;
                    self.state = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => {
                self.level = self.sustain_level * self.peak;
            }
            EnvelopeState::Release => {
                self.level -= self.peak / self.release_frames as Sample;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.state = EnvelopeState::Idle;
                }
            }
        }
        out
    }

    fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.level = 0.0;
    }

    fn state(&self) -> EnvelopeState {
        self.state
    }
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self::declick(crate::types::SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_idle_outputs_zero() {
        let mut env = AdsrEnvelope::new(10, 1, 1.0, 10);
        for _ in 0..16 {
            assert_eq!(env.process(), 0.0);
        }
        assert!(env.is_idle());
    }

    #[test]
    fn test_attack_reaches_peak() {
        let mut env = AdsrEnvelope::new(10, 1, 1.0, 10);
        env.gate(1.0);
        let mut last = 0.0;
        for _ in 0..12 {
            let v = env.process();
            assert!(v >= last - 1e-6, "attack must be non-decreasing");
            last = v;
        }
        assert_relative_eq!(env.level(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_intensity_scales_peak() {
        let mut env = AdsrEnvelope::new(4, 1, 1.0, 4);
        env.gate(0.5);
        for _ in 0..8 {
            env.process();
        }
        assert_relative_eq!(env.level(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_release_returns_to_idle() {
        let mut env = AdsrEnvelope::new(4, 1, 1.0, 4);
        env.gate(1.0);
        for _ in 0..8 {
            env.process();
        }
        env.gate(0.0);
        assert_eq!(env.state(), EnvelopeState::Release);
        for _ in 0..8 {
            env.process();
        }
        assert!(env.is_idle());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_gate_zero_when_idle_stays_idle() {
        let mut env = AdsrEnvelope::new(4, 1, 1.0, 4);
        env.gate(0.0);
        assert!(env.is_idle());
    }

    #[test]
    fn test_reset_zeroes_immediately() {
        let mut env = AdsrEnvelope::new(4, 1, 1.0, 4);
        env.gate(1.0);
        for _ in 0..6 {
            env.process();
        }
        env.reset();
        assert!(env.is_idle());
        assert_eq!(env.process(), 0.0);
    }
}
