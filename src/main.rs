//! Loopdeck CLI - the control surface for the sequencer core.
//!
//! Every invocation loads the session file, replays it into a scheduler
//! (synthesizing all channels), applies one control action, and persists the
//! result. The session file is seeded with the demo session on first use.

use clap::{Parser, Subcommand};
use loopdeck::channel::{channel_letter, channel_ordinal};
use loopdeck::engine::EngineConfig;
use loopdeck::export::{write_wav, RenderStats};
use loopdeck::playback::{CpalPlayback, PlaybackDevice, PlaybackSnapshot};
use loopdeck::scheduler::Scheduler;
use loopdeck::store::JsonFileStore;
use loopdeck::trace::AsciiTrace;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "loopdeck")]
#[command(about = "Live-coding channel sequencer", long_about = None)]
struct Cli {
    /// Session file (seeded with the demo session if missing)
    #[arg(short, long, default_value = "session.json", global = true)]
    session: PathBuf,

    /// Sample rate in Hz
    #[arg(long, default_value = "48000", global = true)]
    sample_rate: u32,

    /// Synthesis block size in samples (1 = sample-accurate)
    #[arg(long, default_value = "1", global = true)]
    block_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every channel to WAV files
    Render {
        /// Output directory
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },

    /// Loop one channel through the default audio device
    Play {
        /// Channel letter (A-Z)
        #[arg(default_value = "A")]
        channel: String,

        /// Playback duration in seconds
        #[arg(short, long, default_value = "8.0")]
        duration: f32,
    },

    /// Commit a new script to a channel and propagate to dependents
    Commit {
        /// Channel letter (A-Z)
        channel: String,

        /// Script text, e.g. "mod(1/4);set(1);exp(12);mul(.8)"
        script: String,
    },

    /// Change the global tempo (resizes and resynthesizes every channel)
    Tempo {
        /// Beats per minute
        bpm: f64,
    },

    /// Change one channel's bar length
    Bars {
        /// Channel letter (A-Z)
        channel: String,

        /// Bar length (minimum 0.25)
        bars: f64,
    },

    /// Append a new channel with the default script
    Add,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store = JsonFileStore::open_or_seed(&cli.session)?;
    let config = EngineConfig {
        sample_rate: cli.sample_rate,
        block_size: cli.block_size,
    };
    let mut deck = Scheduler::new(Box::new(store), Box::new(AsciiTrace), config);

    match cli.command {
        Commands::Render { output } => {
            std::fs::create_dir_all(&output)?;
            for ordinal in 0..deck.channel_count() {
                let channel = match deck.channel(ordinal) {
                    Some(channel) => channel,
                    None => continue,
                };
                let path = output.join(format!("{}.wav", channel_letter(ordinal)));
                write_wav(&path, &channel.buffer, cli.sample_rate)?;
                println!("{} -> {}", channel_letter(ordinal), path.display());
                RenderStats::from_buffer(&channel.buffer, cli.sample_rate).print_summary();
            }
        }
        Commands::Play { channel, duration } => {
            let ordinal = parse_channel(&channel)?;
            let snapshot = match deck.channel(ordinal) {
                Some(channel) => PlaybackSnapshot::copy_of(&channel.buffer, cli.sample_rate),
                None => return Err(format!("no channel {}", channel).into()),
            };
            let mut device = CpalPlayback::new();
            device.start(snapshot)?;
            println!(
                "looping channel {} for {:.1} s",
                channel_letter(ordinal),
                duration
            );
            std::thread::sleep(Duration::from_secs_f32(duration));
            device.stop();
        }
        Commands::Commit { channel, script } => {
            let ordinal = parse_channel(&channel)?;
            deck.commit_script(ordinal, &script);
        }
        Commands::Tempo { bpm } => {
            deck.set_tempo(bpm);
        }
        Commands::Bars { channel, bars } => {
            let ordinal = parse_channel(&channel)?;
            deck.set_bar_length(ordinal, bars);
        }
        Commands::Add => match deck.add_channel() {
            Some(ordinal) => println!("added channel {}", channel_letter(ordinal)),
            None => println!("channel table is full"),
        },
    }

    Ok(())
}

fn parse_channel(name: &str) -> Result<usize, String> {
    let mut chars = name.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) => {
            channel_ordinal(letter).ok_or_else(|| format!("invalid channel name `{}`", name))
        }
        _ => Err(format!("invalid channel name `{}`", name)),
    }
}
