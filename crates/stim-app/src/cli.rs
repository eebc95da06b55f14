use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "stim", author, version, about = "Checkerboard noise stimulus presenter")]
pub struct Cli {
    /// Settings file layered over the bundled defaults (instead of the user settings file).
    #[arg(long, global = true, value_name = "FILE", env = "STIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is unset (e.g. `info`, `debug`, `stim=trace`).
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the presentation window.
    Run(RunArgs),
    /// Generate a random checkerboard noise stimulus.
    Generate(GenerateArgs),
    /// Render one stimulus frame to a PNG file.
    Snapshot(SnapshotArgs),
    /// Inspect or create the settings file.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Stimulus directory, or the name of one in the data directory.
    #[arg(value_name = "STIMULUS")]
    pub stimulus: Option<PathBuf>,

    /// Start playback as soon as the window is up.
    #[arg(long)]
    pub autoplay: bool,
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    #[arg(long, default_value_t = 100)]
    pub frames: u32,

    /// Cell edge length in pixels.
    #[arg(long, value_name = "PIXELS", default_value_t = 20)]
    pub checker_size: u32,

    #[arg(long, default_value_t = 800)]
    pub width: u32,

    #[arg(long, default_value_t = 600)]
    pub height: u32,

    #[arg(long, default_value_t = 10.0)]
    pub fps: f32,

    /// Roll each frame by a random fraction of a cell.
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for a reproducible stimulus.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output directory (defaults to the label inside the data directory).
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// Stimulus directory, or the name of one in the data directory.
    #[arg(value_name = "STIMULUS")]
    pub stimulus: PathBuf,

    /// PNG file to write.
    #[arg(long, short, value_name = "FILE")]
    pub output: PathBuf,

    /// Zero-based frame index.
    #[arg(long, default_value_t = 0)]
    pub frame: usize,

    /// Target width (defaults to the configured window width).
    #[arg(long)]
    pub width: Option<u32>,

    /// Target height (defaults to the configured window height).
    #[arg(long)]
    pub height: Option<u32>,

    /// Use the CPU reference rasteriser instead of the GPU.
    #[arg(long)]
    pub cpu: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings and where they came from.
    Show,
    /// Write the bundled defaults to the user settings file.
    Init {
        /// Overwrite an existing settings file.
        #[arg(long)]
        force: bool,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
