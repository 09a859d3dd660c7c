//! Re-synthesis scheduler: the single entry point for every edit.
//!
//! One triggering action (script commit, tempo or bar-length change, channel
//! append) performs its entire compile-and-synthesize pass to completion
//! before returning; execution is single-threaded and strictly sequential.
//! Compile errors and runtime faults are caught here, logged, and never
//! propagate further - the control surface observes a failure only as
//! "output did not change".

use crate::channel::{
    channel_letter, Channel, ChannelTable, StereoBuffer, DEFAULT_SCRIPT, MAX_CHANNELS,
    MIN_BAR_LENGTH,
};
use crate::engine::{render_channel, EngineConfig};
use crate::script;
use crate::store::SessionStore;
use crate::timing;
use crate::trace::{TraceRenderer, DEFAULT_TRACE_HEIGHT, DEFAULT_TRACE_WIDTH};
use tracing::{error, info, warn};

pub struct Scheduler {
    table: ChannelTable,
    bpm: f64,
    config: EngineConfig,
    store: Box<dyn SessionStore>,
    renderer: Box<dyn TraceRenderer>,
    trace_width: usize,
    trace_height: usize,
}

impl Scheduler {
    /// Build the channel table from the store and synthesize every channel
    /// once, in ordinal order.
    ///
    /// Missing store keys fall back to one channel, script `sin(1)`, bar
    /// length 1. A stored script that no longer compiles is kept as text
    /// (its channel stays silent) rather than replaced.
    pub fn new(
        store: Box<dyn SessionStore>,
        renderer: Box<dyn TraceRenderer>,
        config: EngineConfig,
    ) -> Self {
        let mut scheduler = Self {
            table: ChannelTable::new(),
            bpm: timing::DEFAULT_BPM,
            config,
            store,
            renderer,
            trace_width: DEFAULT_TRACE_WIDTH,
            trace_height: DEFAULT_TRACE_HEIGHT,
        };

        let count = scheduler.store.load_count().unwrap_or(1).clamp(1, MAX_CHANNELS);
        for ordinal in 0..count {
            let script_text = scheduler
                .store
                .load_script(ordinal)
                .unwrap_or_else(|| DEFAULT_SCRIPT.to_string());
            let bar_length = scheduler
                .store
                .load_bar_length(ordinal)
                .unwrap_or(1.0)
                .max(MIN_BAR_LENGTH);
            scheduler.install_channel(script_text, bar_length);
        }
        for ordinal in 0..scheduler.table.len() {
            scheduler.resynthesize(ordinal);
        }
        scheduler
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn channel_count(&self) -> usize {
        self.table.len()
    }

    pub fn channel(&self, ordinal: usize) -> Option<&Channel> {
        self.table.get(ordinal)
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Append a channel with the default script, persist the new count, and
    /// synthesize it. Returns the new ordinal, or `None` when the letter
    /// space is exhausted.
    pub fn add_channel(&mut self) -> Option<usize> {
        let ordinal = self.install_channel(DEFAULT_SCRIPT.to_string(), 1.0)?;
        self.store.save_count(self.table.len());
        self.resynthesize(ordinal);
        Some(ordinal)
    }

    /// Change the global tempo: every channel's buffer is resized and
    /// resynthesized. One channel's fault never blocks the rest.
    pub fn set_tempo(&mut self, bpm: f64) {
        if !bpm.is_finite() || bpm <= 0.0 {
            warn!("ignoring invalid tempo {} bpm", bpm);
            return;
        }
        self.bpm = bpm;
        info!("tempo {} bpm", bpm);
        for ordinal in 0..self.table.len() {
            self.resize(ordinal);
            self.resynthesize(ordinal);
        }
    }

    /// Change one channel's bar length: resize and resynthesize that channel
    /// only.
    pub fn set_bar_length(&mut self, ordinal: usize, bar_length: f64) {
        let bar_length = bar_length.max(MIN_BAR_LENGTH);
        match self.table.get_mut(ordinal) {
            Some(channel) => channel.bar_length = bar_length,
            None => return,
        }
        self.resize(ordinal);
        self.resynthesize(ordinal);
    }

    /// Commit a new script to a channel.
    ///
    /// A script the compiler rejects is discarded outright. A script that
    /// compiles but faults at run time is rolled back: the channel keeps its
    /// previous script, program, and buffer, and nothing is persisted. On
    /// success, every other channel whose script text contains this
    /// channel's register identifiers is resynthesized - one hop only;
    /// channels reachable only through an intermediate are left stale.
    pub fn commit_script(&mut self, ordinal: usize, text: &str) {
        let program = match script::compile(text) {
            Ok(program) => program,
            Err(err) => {
                warn!("rejected script for channel {}: {}", channel_letter(ordinal), err);
                return;
            }
        };

        let (previous_script, previous_program) = match self.table.get_mut(ordinal) {
            Some(channel) => (
                std::mem::replace(&mut channel.script, text.to_string()),
                std::mem::replace(&mut channel.program, Some(program)),
            ),
            None => return,
        };

        if !self.resynthesize(ordinal) {
            if let Some(channel) = self.table.get_mut(ordinal) {
                channel.script = previous_script;
                channel.program = previous_program;
            }
            return;
        }

        let letter = channel_letter(ordinal);
        let left_ref = format!("{}.L", letter);
        let right_ref = format!("{}.R", letter);
        let dependents: Vec<usize> = (0..self.table.len())
            .filter(|&other| other != ordinal)
            .filter(|&other| match self.table.get(other) {
                Some(channel) => {
                    channel.script.contains(&left_ref) || channel.script.contains(&right_ref)
                }
                None => false,
            })
            .collect();
        for other in dependents {
            self.resynthesize(other);
        }
    }

    /// Compile and append a channel without synthesizing it.
    fn install_channel(&mut self, script_text: String, bar_length: f64) -> Option<usize> {
        let program = match script::compile(&script_text) {
            Ok(program) => Some(program),
            Err(err) => {
                warn!(
                    "stored script for channel {} does not compile: {}",
                    channel_letter(self.table.len()),
                    err
                );
                None
            }
        };
        let len = timing::buffer_len(self.config.sample_rate, self.bpm, bar_length);
        let channel = Channel {
            script: script_text,
            bar_length,
            program,
            buffer: StereoBuffer::zeroed(len),
        };
        match self.table.append(channel) {
            Some(ordinal) => Some(ordinal),
            None => {
                warn!("channel table is full ({} channels)", MAX_CHANNELS);
                None
            }
        }
    }

    /// Reallocate a channel's buffer at its current target size, discarding
    /// prior content.
    fn resize(&mut self, ordinal: usize) {
        let bar_length = match self.table.get(ordinal) {
            Some(channel) => channel.bar_length,
            None => return,
        };
        let len = timing::buffer_len(self.config.sample_rate, self.bpm, bar_length);
        if let Some(channel) = self.table.get_mut(ordinal) {
            channel.buffer = StereoBuffer::zeroed(len);
        }
    }

    /// Run one channel's program across its buffer. On success the new
    /// buffer is swapped in, script and bar length are persisted, and the
    /// renderer is notified. On a fault the channel keeps its current
    /// buffer.
    fn resynthesize(&mut self, ordinal: usize) -> bool {
        let coefficient = timing::tempo_coefficient(self.bpm);
        let outputs = self.table.outputs();
        let channel = match self.table.get(ordinal) {
            Some(channel) => channel,
            None => return false,
        };
        let program = match channel.program.as_ref() {
            Some(program) => program,
            None => return false,
        };

        let rendered = render_channel(
            ordinal,
            program,
            channel.buffer.len(),
            coefficient,
            &self.config,
            &outputs,
        );

        match rendered {
            Ok(buffer) => {
                let (script_text, bar_length) = match self.table.get_mut(ordinal) {
                    Some(channel) => {
                        channel.buffer = buffer;
                        (channel.script.clone(), channel.bar_length)
                    }
                    None => return false,
                };
                self.store.save_channel(ordinal, &script_text, bar_length);
                if let Some(channel) = self.table.get(ordinal) {
                    self.renderer.render(
                        ordinal,
                        &channel.buffer.left,
                        self.trace_width,
                        self.trace_height,
                    );
                }
                true
            }
            Err(fault) => {
                error!(
                    "synthesis fault on channel {}: {}",
                    channel_letter(ordinal),
                    fault
                );
                false
            }
        }
    }
}
