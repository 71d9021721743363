//! Sample file loading
//!
//! Decodes audio files (WAV, FLAC, MP3, OGG, AIFF) into stereo f32 frames
//! at the engine sample rate. Decoding happens on the control thread; the
//! result is handed to the audio thread behind a `basedrop::Shared` so the
//! buffer is never dropped from the real-time callback.

use std::fs::File;
use std::path::{Path, PathBuf};

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{Sample, StereoSample};

/// Resampler input chunk size (frames)
const RESAMPLE_CHUNK: usize = 1024;

#[derive(Debug, Error)]
pub enum SampleLoadError {
    #[error("Failed to open file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to probe audio format: {0}")]
    Probe(SymphoniaError),

    #[error("No decodable audio track found")]
    NoTrack,

    #[error("Failed to create decoder: {0}")]
    Decoder(SymphoniaError),

    #[error("Failed to decode audio: {0}")]
    Decode(SymphoniaError),

    #[error("File contains no audio frames")]
    Empty,

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(usize),

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// A fully decoded sample, resampled to the engine rate
///
/// Frames are stereo regardless of the source channel layout: mono input
/// is duplicated to both channels, multichannel input keeps its first two.
#[derive(Debug, Clone)]
pub struct LoadedSample {
    pub frames: Vec<StereoSample>,
    /// Engine sample rate the frames were converted to
    pub sample_rate: u32,
    /// Sample rate of the source file before conversion
    pub source_sample_rate: u32,
    /// Channel count of the source file
    pub source_channels: usize,
    /// Source path; empty for samples decoded from a reader
    pub path: PathBuf,
}

impl LoadedSample {
    /// Number of stereo frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Duration in seconds at the engine rate
    pub fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file and convert it to stereo frames at `target_rate`
pub fn load_sample(path: &Path, target_rate: u32) -> Result<LoadedSample, SampleLoadError> {
    let file = File::open(path)?;
    let extension = path.extension().and_then(|e| e.to_str());
    let (interleaved, source_rate, source_channels) =
        decode_source(Box::new(file), extension)?;
    build_sample(
        interleaved,
        source_rate,
        source_channels,
        target_rate,
        path.to_path_buf(),
    )
}

/// Decode an already-opened input stream and convert it to stereo
/// frames at `target_rate`.
///
/// Accepts anything symphonia can treat as a media source, e.g. an
/// in-memory `std::io::Cursor<Vec<u8>>`. Pass the file extension as a
/// format hint when it is known.
pub fn load_sample_from_reader<R>(
    reader: R,
    extension: Option<&str>,
    target_rate: u32,
) -> Result<LoadedSample, SampleLoadError>
where
    R: MediaSource + 'static,
{
    let (interleaved, source_rate, source_channels) =
        decode_source(Box::new(reader), extension)?;
    build_sample(
        interleaved,
        source_rate,
        source_channels,
        target_rate,
        PathBuf::new(),
    )
}

/// Normalize decoded interleaved samples into a stereo engine-rate buffer
fn build_sample(
    interleaved: Vec<Sample>,
    source_rate: u32,
    source_channels: usize,
    target_rate: u32,
    path: PathBuf,
) -> Result<LoadedSample, SampleLoadError> {
    if interleaved.is_empty() {
        return Err(SampleLoadError::Empty);
    }

    let (left, right) = deinterleave_stereo(&interleaved, source_channels)?;

    let (left, right) = if source_rate != target_rate {
        resample_stereo(&left, &right, source_rate, target_rate)?
    } else {
        (left, right)
    };

    let frames = left
        .iter()
        .zip(right.iter())
        .map(|(&l, &r)| StereoSample::new(l, r))
        .collect();

    log::info!(
        "Loaded {} ({} ch @ {} Hz -> stereo @ {} Hz)",
        if path.as_os_str().is_empty() {
            "stream".to_string()
        } else {
            path.display().to_string()
        },
        source_channels,
        source_rate,
        target_rate
    );

    Ok(LoadedSample {
        frames,
        sample_rate: target_rate,
        source_sample_rate: source_rate,
        source_channels,
        path,
    })
}

/// Decode a media source into interleaved f32 samples at its native rate
fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
) -> Result<(Vec<Sample>, u32, usize), SampleLoadError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(SampleLoadError::Probe)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SampleLoadError::NoTrack)?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(SampleLoadError::Decoder)?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut rate = 0u32;
    let mut channels = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(SampleLoadError::Decode(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip over recoverable decode errors (corrupt packets)
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(SampleLoadError::Decode(e)),
        };

        let spec = *decoded.spec();
        rate = spec.rate;
        channels = spec.channels.count();

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
        });
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if rate == 0 || channels == 0 {
        return Err(SampleLoadError::Empty);
    }

    Ok((samples, rate, channels))
}

/// Split interleaved samples into left/right channel vectors
///
/// Mono is duplicated into both channels; sources with more than two
/// channels keep their first two and drop the rest.
fn deinterleave_stereo(
    interleaved: &[Sample],
    channels: usize,
) -> Result<(Vec<Sample>, Vec<Sample>), SampleLoadError> {
    match channels {
        0 => Err(SampleLoadError::UnsupportedChannels(0)),
        1 => Ok((interleaved.to_vec(), interleaved.to_vec())),
        n => {
            let frames = interleaved.len() / n;
            let mut left = Vec::with_capacity(frames);
            let mut right = Vec::with_capacity(frames);
            for frame in interleaved.chunks_exact(n) {
                left.push(frame[0]);
                right.push(frame[1]);
            }
            Ok((left, right))
        }
    }
}

/// Resample both channels from `from_rate` to `to_rate`
///
/// Linear polynomial resampling in fixed-size chunks. Quality is adequate
/// for one-shot samples and avoids the latency of windowed-sinc kernels.
fn resample_stereo(
    left: &[Sample],
    right: &[Sample],
    from_rate: u32,
    to_rate: u32,
) -> Result<(Vec<Sample>, Vec<Sample>), SampleLoadError> {
    let ratio = to_rate as f64 / from_rate as f64;

    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0,
        PolynomialDegree::Linear,
        RESAMPLE_CHUNK,
        2,
    )
    .map_err(|e| SampleLoadError::Resample(e.to_string()))?;

    let expected = (left.len() as f64 * ratio).ceil() as usize;
    let mut out_left = Vec::with_capacity(expected);
    let mut out_right = Vec::with_capacity(expected);

    let mut pos = 0;
    while pos < left.len() {
        let needed = resampler.input_frames_next();
        let remaining = left.len() - pos;

        let chunks = if remaining >= needed {
            let input = [&left[pos..pos + needed], &right[pos..pos + needed]];
            pos += needed;
            resampler
                .process(&input, None)
                .map_err(|e| SampleLoadError::Resample(e.to_string()))?
        } else {
            let input = [&left[pos..], &right[pos..]];
            pos = left.len();
            resampler
                .process_partial(Some(&input), None)
                .map_err(|e| SampleLoadError::Resample(e.to_string()))?
        };

        out_left.extend_from_slice(&chunks[0]);
        out_right.extend_from_slice(&chunks[1]);
    }

    // Flush remaining frames buffered inside the resampler
    let tail = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| SampleLoadError::Resample(e.to_string()))?;
    out_left.extend_from_slice(&tail[0]);
    out_right.extend_from_slice(&tail[1]);

    Ok((out_left, out_right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn write_wav(path: &Path, channels: u16, rate: u32, frames: &[f32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_mono_wav_duplicates_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");

        let signal: Vec<f32> = (0..1000)
            .map(|i| (TAU * 440.0 * i as f32 / 44100.0).sin() * 0.5)
            .collect();
        write_wav(&path, 1, 44100, &signal);

        let sample = load_sample(&path, 44100).unwrap();
        assert_eq!(sample.len(), 1000);
        assert_eq!(sample.source_channels, 1);
        assert_eq!(sample.sample_rate, 44100);
        for frame in &sample.frames {
            assert_eq!(frame.left, frame.right);
        }
    }

    #[test]
    fn test_stereo_wav_preserves_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let mut interleaved = Vec::with_capacity(512 * 2);
        for i in 0..512 {
            interleaved.push(i as f32 / 512.0);
            interleaved.push(-(i as f32) / 512.0);
        }
        write_wav(&path, 2, 44100, &interleaved);

        let sample = load_sample(&path, 44100).unwrap();
        assert_eq!(sample.len(), 512);
        assert!(sample.frames[100].left > 0.0);
        assert!(sample.frames[100].right < 0.0);
    }

    #[test]
    fn test_resampling_scales_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lowrate.wav");

        let signal: Vec<f32> = (0..2205)
            .map(|i| (TAU * 220.0 * i as f32 / 22050.0).sin())
            .collect();
        write_wav(&path, 1, 22050, &signal);

        let sample = load_sample(&path, 44100).unwrap();
        // 0.1s at 22050 should become ~0.1s at 44100
        let expected = 4410;
        let tolerance = 64;
        assert!(
            (sample.len() as i64 - expected).unsigned_abs() < tolerance,
            "expected ~{} frames, got {}",
            expected,
            sample.len()
        );
        assert_eq!(sample.source_sample_rate, 22050);
    }

    #[test]
    fn test_load_from_in_memory_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.wav");

        let signal: Vec<f32> = (0..800)
            .map(|i| (TAU * 330.0 * i as f32 / 44100.0).sin() * 0.4)
            .collect();
        write_wav(&path, 1, 44100, &signal);

        let bytes = std::fs::read(&path).unwrap();
        let from_reader =
            load_sample_from_reader(std::io::Cursor::new(bytes), Some("wav"), 44100).unwrap();
        let from_path = load_sample(&path, 44100).unwrap();

        assert_eq!(from_reader.len(), 800);
        assert_eq!(from_reader.frames, from_path.frames);
        assert!(from_reader.path.as_os_str().is_empty());
    }

    #[test]
    fn test_missing_file_errors() {
        let result = load_sample(Path::new("/nonexistent/file.wav"), 44100);
        assert!(matches!(result, Err(SampleLoadError::Io(_))));
    }
}
