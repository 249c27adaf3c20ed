mod commands;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::simulate::Channel;

#[derive(Parser)]
#[command(name = "qdpi")]
#[command(about = "QDPI - 256-glyph symbolic codec with two-tier error correction", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into protected QDPI block records
    Encode {
        /// Input file (raw bytes or JSON)
        #[arg(short, long)]
        input: String,

        /// Output file for block records
        #[arg(short, long)]
        output: String,

        /// Parse the input as JSON and store its canonical form
        #[arg(long)]
        json: bool,

        /// Starting block ID
        #[arg(long, default_value = "0")]
        start_id: u64,
    },

    /// Scan a (possibly damaged) record file and recover the data
    Decode {
        /// Input file with block records
        #[arg(short, long)]
        input: String,

        /// Output file for recovered data
        #[arg(short, long)]
        output: String,

        /// Write a JSON decode report here
        #[arg(long)]
        stats: Option<String>,

        /// Apply heuristic orientation corrections to the output
        #[arg(long)]
        apply_orientation: bool,

        /// Write whatever could be recovered even if blocks were lost
        #[arg(long)]
        partial: bool,
    },

    /// Generate or validate a glyph manifest
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Run encode/corrupt/decode trials over a simulated channel
    Simulate {
        /// Exact number of byte errors per codeword
        #[arg(long, conflicts_with = "ber")]
        errors: Option<usize>,

        /// Bit-error rate of the channel
        #[arg(long)]
        ber: Option<f64>,

        /// Number of trials
        #[arg(long, default_value = "100")]
        trials: usize,

        /// RNG seed
        #[arg(long, default_value = "1")]
        seed: u64,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Write the canonical 256-entry manifest
    Generate {
        /// Output JSON file
        #[arg(short, long)]
        output: String,
    },

    /// Check a manifest covers every glyph id exactly once
    Validate {
        /// Manifest JSON file
        #[arg(short, long)]
        input: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Encode {
            input,
            output,
            json,
            start_id,
        } => commands::encode::execute(&input, &output, json, start_id),

        Commands::Decode {
            input,
            output,
            stats,
            apply_orientation,
            partial,
        } => commands::decode::execute(
            &input,
            &output,
            stats.as_deref(),
            apply_orientation,
            partial,
        )
        .map(|_| ()),

        Commands::Manifest { action } => match action {
            ManifestAction::Generate { output } => commands::manifest::generate(&output),
            ManifestAction::Validate { input } => commands::manifest::validate(&input),
        },

        Commands::Simulate {
            errors,
            ber,
            trials,
            seed,
        } => {
            let channel = match (errors, ber) {
                (Some(n), None) => Channel::ByteErrors(n),
                (None, Some(p)) => Channel::BitErrorRate(p),
                (None, None) => Channel::ByteErrors(8),
                (Some(_), Some(_)) => bail!("--errors and --ber are mutually exclusive"),
            };
            commands::simulate::execute(channel, trials, seed).map(|_| ())
        }
    }
}
