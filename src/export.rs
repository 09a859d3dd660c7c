//! Offline WAV export and basic render statistics.

use crate::channel::StereoBuffer;
use std::path::Path;

/// Basic statistics over one rendered buffer.
#[derive(Debug, Clone)]
pub struct RenderStats {
    pub sample_count: usize,
    pub duration: f32,
    pub rms: f32,
    pub peak: f32,
}

impl RenderStats {
    pub fn from_buffer(buffer: &StereoBuffer, sample_rate: u32) -> Self {
        let sample_count = buffer.len();
        let lanes = buffer.left.iter().chain(buffer.right.iter());

        let mut sum_squares = 0.0f32;
        let mut peak = 0.0f32;
        for &sample in lanes {
            sum_squares += sample * sample;
            peak = peak.max(sample.abs());
        }
        let rms = if sample_count == 0 {
            0.0
        } else {
            (sum_squares / (sample_count * 2) as f32).sqrt()
        };

        Self {
            sample_count,
            duration: sample_count as f32 / sample_rate as f32,
            rms,
            peak,
        }
    }

    pub fn print_summary(&self) {
        println!("  Duration: {:.3} seconds", self.duration);
        println!("  Samples:  {}", self.sample_count);
        println!("  RMS:      {:.3}", self.rms);
        println!("  Peak:     {:.3}", self.peak);
    }
}

/// Write a channel buffer as a 32-bit float stereo WAV file.
pub fn write_wav(path: &Path, buffer: &StereoBuffer, sample_rate: u32) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("failed to create {}: {}", path.display(), e))?;
    for i in 0..buffer.len() {
        writer
            .write_sample(buffer.left[i])
            .map_err(|e| format!("failed to write sample: {}", e))?;
        writer
            .write_sample(buffer.right[i])
            .map_err(|e| format!("failed to write sample: {}", e))?;
    }
    writer
        .finalize()
        .map_err(|e| format!("failed to finalize WAV: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_buffer() {
        let buffer = StereoBuffer {
            left: vec![0.5; 480],
            right: vec![0.5; 480],
        };
        let stats = RenderStats::from_buffer(&buffer, 48_000);
        assert_eq!(stats.sample_count, 480);
        assert!((stats.duration - 0.01).abs() < 1e-6);
        assert!((stats.rms - 0.5).abs() < 1e-6);
        assert_eq!(stats.peak, 0.5);
    }

    #[test]
    fn wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        let buffer = StereoBuffer {
            left: vec![0.0, 0.25, -0.5],
            right: vec![1.0, -1.0, 0.125],
        };
        write_wav(&path, &buffer, 48_000).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48_000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.0, 1.0, 0.25, -1.0, -0.5, 0.125]);
    }
}
