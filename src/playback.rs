//! Playback device: loops a point-in-time copy of a channel buffer.
//!
//! The snapshot is explicit: the device never observes later resynthesis.
//! Hearing an updated buffer requires stopping and starting again with a
//! fresh snapshot.

use crate::channel::StereoBuffer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::warn;

/// Point-in-time copy of a channel buffer handed to the playback device.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl PlaybackSnapshot {
    pub fn copy_of(buffer: &StereoBuffer, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            left: buffer.left.clone(),
            right: buffer.right.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Loops a snapshot until stopped.
pub trait PlaybackDevice {
    /// Start looping the snapshot, replacing whatever was playing.
    fn start(&mut self, snapshot: PlaybackSnapshot) -> Result<(), String>;
    fn stop(&mut self);
}

/// cpal-backed looping playback on the default output device.
#[derive(Default)]
pub struct CpalPlayback {
    stream: Option<cpal::Stream>,
}

impl CpalPlayback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackDevice for CpalPlayback {
    fn start(&mut self, snapshot: PlaybackSnapshot) -> Result<(), String> {
        self.stop();
        if snapshot.is_empty() {
            return Err("refusing to loop an empty buffer".to_string());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "no output device available".to_string())?;
        let default_config = device
            .default_output_config()
            .map_err(|e| format!("no default output config: {}", e))?;
        let channels = default_config.channels() as usize;
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(snapshot.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                let mut position = 0usize;
                device
                    .build_output_stream(
                        &config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            for frame in data.chunks_mut(channels) {
                                frame[0] = snapshot.left[position];
                                if let Some(slot) = frame.get_mut(1) {
                                    *slot = snapshot.right[position];
                                }
                                for slot in frame.iter_mut().skip(2) {
                                    *slot = 0.0;
                                }
                                // Wrap around to loop.
                                position = (position + 1) % snapshot.len();
                            }
                        },
                        |err| {
                            warn!("playback stream error: {}", err);
                        },
                        None,
                    )
                    .map_err(|e| format!("failed to build output stream: {}", e))?
            }
            other => return Err(format!("unsupported sample format {:?}", other)),
        };

        stream
            .play()
            .map_err(|e| format!("failed to start playback: {}", e))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the stream stops it.
        self.stream = None;
    }
}
