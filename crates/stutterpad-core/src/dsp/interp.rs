//! Sample interpolation for pitched playback
//!
//! When a pad plays at a non-unity pitch ratio the read position falls
//! between stored frames, so the output is interpolated from neighbours.
//! Linear is the default (cheap, fine for percussive material); cubic
//! Catmull-Rom is available for smoother sustained content.

use serde::{Deserialize, Serialize};

use crate::types::{Sample, StereoSample};

/// Interpolation quality for fractional sample reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Linear interpolation between adjacent samples
    #[default]
    Linear,
    /// 4-point cubic (Catmull-Rom) interpolation
    Cubic,
}

/// Linear interpolation between two stereo samples
#[inline]
pub fn lerp_sample(a: StereoSample, b: StereoSample, t: Sample) -> StereoSample {
    StereoSample {
        left: a.left + (b.left - a.left) * t,
        right: a.right + (b.right - a.right) * t,
    }
}

/// Fetch a sample with bounds checking, returning silence outside the buffer
///
/// Signed index so callers can ask for position - 1 near the start without
/// wrapping; anything out of range reads as silence.
#[inline]
pub fn get_sample(data: &[StereoSample], index: i64) -> StereoSample {
    if index < 0 || index as usize >= data.len() {
        StereoSample::silence()
    } else {
        data[index as usize]
    }
}

/// 4-point Catmull-Rom interpolation per channel
///
/// `t` is the fractional position between p1 and p2.
#[inline]
fn catmull_rom(p0: Sample, p1: Sample, p2: Sample, p3: Sample, t: Sample) -> Sample {
    let t2 = t * t;
    let t3 = t2 * t;

    let c0 = -0.5 * t3 + t2 - 0.5 * t;
    let c1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let c2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let c3 = 0.5 * t3 - 0.5 * t2;

    p0 * c0 + p1 * c1 + p2 * c2 + p3 * c3
}

/// Cubic interpolation of a stereo frame around `index` with fraction `t`
#[inline]
pub fn cubic_interpolate(data: &[StereoSample], index: i64, t: Sample) -> StereoSample {
    let p0 = get_sample(data, index - 1);
    let p1 = get_sample(data, index);
    let p2 = get_sample(data, index + 1);
    let p3 = get_sample(data, index + 2);

    StereoSample {
        left: catmull_rom(p0.left, p1.left, p2.left, p3.left, t),
        right: catmull_rom(p0.right, p1.right, p2.right, p3.right, t),
    }
}

/// Read a stereo frame at a fractional position
///
/// Positions outside the buffer interpolate against silence, so reads
/// fade out naturally at the edges instead of clicking.
pub fn read_interpolated(
    data: &[StereoSample],
    position: f64,
    method: InterpolationMethod,
) -> StereoSample {
    let index = position.floor() as i64;
    let t = (position - position.floor()) as Sample;

    match method {
        InterpolationMethod::Linear => {
            let a = get_sample(data, index);
            let b = get_sample(data, index + 1);
            lerp_sample(a, b, t)
        }
        InterpolationMethod::Cubic => cubic_interpolate(data, index, t),
    }
}
