//! In-memory mono audio and WAV I/O helpers

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::path::Path;

/// Mono PCM audio, samples normalized to [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Silent clip of exactly `duration_ms` at `sample_rate`
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; samples_for_ms(duration_ms, sample_rate)],
            sample_rate,
        }
    }

    /// Decode a WAV file, down-mixing to mono
    pub fn from_wav(path: &Path) -> Result<Self, hound::Error> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        Ok(Self::new(samples, spec.sample_rate))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to `target_rate`.
    ///
    /// The output length is always `round(len * target / source)`.
    pub fn resample(self, target_rate: u32) -> Result<Self, String> {
        if self.sample_rate == target_rate {
            return Ok(self);
        }
        if self.sample_rate == 0 || target_rate == 0 {
            return Err(format!(
                "Cannot resample {} Hz -> {} Hz",
                self.sample_rate, target_rate
            ));
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        let expected = (self.samples.len() as f64 * ratio).round() as usize;
        if self.samples.is_empty() {
            return Ok(Self::new(Vec::new(), target_rate));
        }

        let mut resampler =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, self.samples.len(), 1)
                .map_err(|e| format!("Resampler init failed: {}", e))?;
        let delay = resampler.output_delay();

        let output = resampler
            .process(&[&self.samples], None)
            .map_err(|e| format!("Resampling failed: {}", e))?;
        // Flush the filter so the last `delay` frames are not lost
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| format!("Resampling failed: {}", e))?;

        let mut samples: Vec<f32> = output
            .into_iter()
            .chain(tail)
            .flatten()
            .skip(delay)
            .collect();
        samples.resize(expected, 0.0);

        Ok(Self::new(samples, target_rate))
    }
}

/// Number of samples covering `duration_ms` at `sample_rate`
pub fn samples_for_ms(duration_ms: u32, sample_rate: u32) -> usize {
    (duration_ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Save mono samples as 16-bit PCM WAV
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(scaled)?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_length() {
        let clip = AudioClip::silence(500, 44100);
        assert_eq!(clip.len(), 22050);
        assert!((clip.duration_secs() - 0.5).abs() < 1e-9);
        assert!(clip.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_wav_roundtrip_keeps_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let samples: Vec<f32> = (0..1000).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        write_wav(&path, &samples, 22050).unwrap();

        let clip = AudioClip::from_wav(&path).unwrap();
        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.len(), 1000);
        assert!((clip.samples()[100] - samples[100]).abs() < 1e-3);
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384_i16).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();

        let clip = AudioClip::from_wav(&path).unwrap();
        assert_eq!(clip.len(), 100);
        assert!((clip.samples()[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_resample_length() {
        let clip = AudioClip::new(vec![0.1; 22050], 22050);
        let resampled = clip.resample(44100).unwrap();
        assert_eq!(resampled.sample_rate(), 44100);
        assert_eq!(resampled.len(), 44100);
    }

    #[test]
    fn test_resample_keeps_tail() {
        let clip = AudioClip::new(vec![0.1; 16000], 16000);
        let resampled = clip.resample(44100).unwrap();
        let len = resampled.len();

        assert_eq!(len, 44100);
        assert!(resampled.samples()[len - 200..len - 100]
            .iter()
            .all(|s| (s - 0.1).abs() < 0.01));
        // the filter delay used to be padded with silence here
        assert!(resampled.samples()[len - 8] > 0.05);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let clip = AudioClip::new(vec![0.5, -0.5], 44100);
        assert_eq!(clip.clone().resample(44100).unwrap(), clip);
    }
}
