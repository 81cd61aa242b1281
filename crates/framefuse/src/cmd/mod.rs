use clap::{Args, Subcommand};
use std::path::PathBuf;

use framefuse_frame::ElementType;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod monitor;
pub mod ports;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports available for automatic selection.
    Ports(PortsArgs),
    /// Run every channel of a channel file and print each combined snapshot.
    Monitor(MonitorArgs),
    /// Feed a recorded byte file through one channel and print each snapshot.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// JSON channel file.
    pub config: PathBuf,
    /// Exit after printing N snapshots.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Raw capture: concatenated frames, no header.
    pub file: PathBuf,
    /// Channel name used in snapshots.
    #[arg(long)]
    pub name: String,
    /// Element type (e.g. i16, uint32, f32).
    #[arg(long)]
    pub dtype: ElementType,
    /// Frame shape, comma-separated (e.g. 2,3).
    #[arg(long, value_delimiter = ',', required = true)]
    pub shape: Vec<usize>,
    /// Elements are stored most significant byte first.
    #[arg(long)]
    pub big_endian: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
