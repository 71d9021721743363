//! Persistent engine settings

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::dsp::interp::InterpolationMethod;
use crate::engine::{DEFAULT_TEMPO, MAX_TEMPO, MIN_TEMPO};

/// Settings persisted between sessions
///
/// Out-of-range values from a hand-edited file are clamped on load via
/// `sanitized`, matching the engine's own clamping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Audio device and stream configuration
    pub audio: AudioConfig,
    /// Tempo driving stutter subdivision lengths (BPM)
    pub tempo: f64,
    /// Master output gain [0, 1]
    pub master_volume: f32,
    /// Interpolation quality for pitched playback
    pub interpolation: InterpolationMethod,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            tempo: DEFAULT_TEMPO,
            master_volume: 1.0,
            interpolation: InterpolationMethod::default(),
        }
    }
}

impl EngineSettings {
    /// Clamp all values into their valid ranges
    pub fn sanitized(mut self) -> Self {
        self.tempo = self.tempo.clamp(MIN_TEMPO, MAX_TEMPO);
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::io::{load_config, save_config};

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.tempo, DEFAULT_TEMPO);
        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.interpolation, InterpolationMethod::Linear);
    }

    #[test]
    fn test_sanitize_clamps_ranges() {
        let settings = EngineSettings {
            tempo: 999.0,
            master_volume: 2.0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(settings.tempo, MAX_TEMPO);
        assert_eq!(settings.master_volume, 1.0);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let settings = EngineSettings {
            tempo: 140.0,
            master_volume: 0.8,
            interpolation: InterpolationMethod::Cubic,
            ..Default::default()
        };

        save_config(&settings, &path).unwrap();
        let loaded: EngineSettings = load_config(&path);

        assert_eq!(loaded.tempo, 140.0);
        assert_eq!(loaded.master_volume, 0.8);
        assert_eq!(loaded.interpolation, InterpolationMethod::Cubic);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        // serde(default) lets older or hand-written files omit fields
        let loaded: EngineSettings = serde_yaml::from_str("tempo: 90.0\n").unwrap();
        assert_eq!(loaded.tempo, 90.0);
        assert_eq!(loaded.master_volume, 1.0);
    }
}
