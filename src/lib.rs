//! # Loopdeck - Live-Coding Channel Sequencer
//!
//! Loopdeck compiles small per-channel scripts and runs them once per audio
//! sample (or per fixed block of samples) to synthesize looping stereo
//! waveforms. Channels read each other's just-computed output through
//! register references (`A.L`, `B.R`), fold elapsed time against the global
//! tempo, and are partially re-synthesized when a neighbor they reference is
//! edited.
//!
//! ## Quick Start
//!
//! ```rust
//! use loopdeck::engine::EngineConfig;
//! use loopdeck::scheduler::Scheduler;
//! use loopdeck::store::MemoryStore;
//! use loopdeck::trace::NullTrace;
//!
//! // An empty store starts one channel: script `sin(1)`, bar length 1.
//! let mut deck = Scheduler::new(
//!     Box::new(MemoryStore::new()),
//!     Box::new(NullTrace),
//!     EngineConfig::default(),
//! );
//!
//! // Commit an edit: compile, resynthesize, propagate to dependents.
//! deck.commit_script(0, "mod(1/4); set(1); exp(12); mul(.8)");
//!
//! // 48 kHz x 2 seconds per bar at 120 bpm x bar length 1.
//! let channel = deck.channel(0).unwrap();
//! assert_eq!(channel.buffer.len(), 96_000);
//! assert_eq!(channel.buffer.left[0], 0.8);
//! ```
//!
//! ## Script language
//!
//! A script is a semicolon-separated list of opcode calls evaluated once per
//! step: `mod` (fold period), `sin`, `set`, `mul`, `exp` (bar-keyed decay),
//! `pow`. Arguments are arithmetic expressions over numbers and other
//! channels' registers. See [`script`] for the grammar and [`generator`]
//! for opcode semantics.

pub mod channel;
pub mod engine;
pub mod export;
pub mod generator;
pub mod playback;
pub mod scheduler;
pub mod script;
pub mod store;
pub mod timing;
pub mod trace;
