use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "RS-HIST",
    about = "Lap-by-lap race history reconstruction written in Rust"
)]
pub struct HistOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the race parameter file
    #[clap(short, long)]
    pub parfile_path: PathBuf,

    /// Set path to the raw lap CSV file (driver,lap,lap_time,in_lap,retired)
    #[clap(short, long, required_unless_present = "snapshot-path")]
    pub laps_path: Option<PathBuf>,

    /// Set path to a snapshot file to continue from instead of the raw laps
    #[clap(short, long, conflicts_with = "laps-path")]
    pub snapshot_path: Option<PathBuf>,

    /// Set path to a JSON edit script that is applied after loading
    #[clap(short, long)]
    pub edits_path: Option<PathBuf>,

    /// Set path to write the resulting snapshot to
    #[clap(short, long)]
    pub output_path: Option<PathBuf>,

    /// Set path to write the JSON export for presentation layers to
    #[clap(short, long)]
    pub json_path: Option<PathBuf>,

    /// Set path to write the result tables to instead of printing them
    #[clap(short, long)]
    pub tables_path: Option<PathBuf>,
}
