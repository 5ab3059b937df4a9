//! In-process [`AudioTool`] for 16-bit PCM WAV files.
//!
//! Every clip is read as mono (stereo is down-mixed) and resampled to the
//! tool's rate. Useful where no ffmpeg is available and in tests, where
//! sample-exact results are needed.

use crate::error::{DubError, Result};
use crate::media::AudioTool;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Sample-level audio tool backed by `hound`.
#[derive(Debug, Clone, Copy)]
pub struct PcmAudioTool {
    sample_rate: u32,
}

impl PcmAudioTool {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Mono samples plus the rate they are stored at.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Reads a WAV file as mono 16-bit samples at its native rate.
pub fn read_clip(path: &Path) -> Result<PcmClip> {
    let mut reader = hound::WavReader::open(path).map_err(|e| wav_error(path, "parse", e))?;
    let spec = reader.spec();

    let raw: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| wav_error(path, "read samples of", e))?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| wav_error(path, "read samples of", e))?,
        (format, bits) => {
            return Err(DubError::Other(format!(
                "Unsupported WAV format in {}: {:?} {}-bit",
                path.display(),
                format,
                bits
            )));
        }
    };

    Ok(PcmClip {
        samples: downmix(raw, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

/// Reads a WAV file as mono samples at `rate`.
pub fn read_clip_at(path: &Path, rate: u32) -> Result<Vec<i16>> {
    let clip = read_clip(path)?;
    Ok(resample(&clip.samples, clip.sample_rate, rate))
}

/// Writes mono 16-bit samples.
pub fn write_clip(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| wav_error(path, "create", e))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| wav_error(path, "write", e))?;
    }
    writer.finalize().map_err(|e| wav_error(path, "finalize", e))
}

fn wav_error(path: &Path, action: &str, e: hound::Error) -> DubError {
    match e {
        hound::Error::IoError(io) => DubError::Io(io),
        other => DubError::Other(format!(
            "Failed to {} WAV file {}: {}",
            action,
            path.display(),
            other
        )),
    }
}

/// Averages interleaved channels into one.
fn downmix(samples: Vec<i16>, channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }
    let channels = usize::from(channels);
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    resample_by(samples, f64::from(from_rate) / f64::from(to_rate))
}

/// Reads the input `step` samples per output sample, interpolating between
/// neighbours. `step > 1` shortens the signal.
fn resample_by(samples: &[i16], step: f64) -> Vec<i16> {
    if samples.is_empty() || step <= 0.0 {
        return Vec::new();
    }

    let output_len = (samples.len() as f64 / step).round() as usize;
    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * step;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = f64::from(samples[source_idx]);
                let right = f64::from(samples[source_idx + 1]);
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

fn seconds_to_samples(seconds: f64, rate: u32) -> usize {
    (seconds.max(0.0) * f64::from(rate)).round() as usize
}

fn scale(sample: i16, gain: f32) -> f32 {
    f32::from(sample) * gain
}

fn saturate(value: f32) -> i16 {
    value.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DubError::Other(format!("audio worker failed: {e}")))?
}

#[async_trait]
impl AudioTool for PcmAudioTool {
    async fn probe_duration(&self, clip: &Path) -> Result<f64> {
        let clip = clip.to_path_buf();
        blocking(move || {
            let reader =
                hound::WavReader::open(&clip).map_err(|e| wav_error(&clip, "parse", e))?;
            Ok(f64::from(reader.duration()) / f64::from(reader.spec().sample_rate))
        })
        .await
    }

    /// Varispeed: the clip is resampled, so pitch moves with tempo.
    async fn stretch(&self, clip: &Path, factor: f64, output: &Path) -> Result<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(DubError::Other(format!("invalid tempo factor {factor}")));
        }
        let (clip, output, rate) = (clip.to_path_buf(), output.to_path_buf(), self.sample_rate);
        blocking(move || {
            let samples = read_clip_at(&clip, rate)?;
            write_clip(&output, rate, &resample_by(&samples, factor))
        })
        .await
    }

    async fn generate_silence(
        &self,
        duration: f64,
        sample_rate: u32,
        output: &Path,
    ) -> Result<()> {
        if !duration.is_finite() || duration < 0.0 || sample_rate == 0 {
            return Err(DubError::Other(format!(
                "invalid silence request: {duration}s at {sample_rate}Hz"
            )));
        }
        let output = output.to_path_buf();
        blocking(move || {
            let samples = vec![0i16; seconds_to_samples(duration, sample_rate)];
            write_clip(&output, sample_rate, &samples)
        })
        .await
    }

    async fn overlay_at(
        &self,
        canvas: &Path,
        clip: &Path,
        offset: f64,
        output: &Path,
    ) -> Result<()> {
        let (canvas, clip, output): (PathBuf, PathBuf, PathBuf) =
            (canvas.to_path_buf(), clip.to_path_buf(), output.to_path_buf());
        blocking(move || {
            let mut base = read_clip(&canvas)?;
            let addition = read_clip_at(&clip, base.sample_rate)?;
            let start = seconds_to_samples(offset, base.sample_rate);

            if let Some(target) = base.samples.get_mut(start..) {
                for (dst, &src) in target.iter_mut().zip(addition.iter()) {
                    *dst = dst.saturating_add(src);
                }
            }

            write_clip(&output, base.sample_rate, &base.samples)
        })
        .await
    }

    async fn mix_volumes(
        &self,
        track_a: &Path,
        gain_a: f32,
        track_b: &Path,
        gain_b: f32,
        duration: f64,
        output: &Path,
    ) -> Result<()> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(DubError::Other(format!("invalid mix duration {duration}s")));
        }
        let (track_a, track_b, output) =
            (track_a.to_path_buf(), track_b.to_path_buf(), output.to_path_buf());
        blocking(move || {
            let a = read_clip(&track_a)?;
            let b = read_clip_at(&track_b, a.sample_rate)?;
            let len = seconds_to_samples(duration, a.sample_rate);

            let mixed: Vec<i16> = (0..len)
                .map(|i| {
                    let first = a.samples.get(i).copied().unwrap_or(0);
                    let second = b.get(i).copied().unwrap_or(0);
                    saturate(scale(first, gain_a) + scale(second, gain_b))
                })
                .collect();

            write_clip(&output, a.sample_rate, &mixed)
        })
        .await
    }
}
