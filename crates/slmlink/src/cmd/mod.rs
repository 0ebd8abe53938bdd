use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use slmlink_codec::CompressionChoice;
use slmlink_transport::DEFAULT_PORT;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one image to a listening display.
    Send(SendArgs),
    /// Receive images and display them headlessly.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Synthetic test images.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// Horizontal ramp from 0 to 255.
    Gradient,
    /// 8x8-pixel checkerboard.
    Checker,
    /// All zeros.
    Blank,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Host name or address of the display server.
    pub host: String,
    /// Server port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Image width in pixels.
    #[arg(long)]
    pub width: u32,
    /// Image height in pixels.
    #[arg(long)]
    pub height: u32,
    /// Samples per pixel (1, 3 or 4).
    #[arg(long, default_value_t = 1)]
    pub channels: u8,
    /// Read raw row-major u8 samples from a file.
    #[arg(long, conflicts_with = "pattern", required_unless_present = "pattern")]
    pub file: Option<PathBuf>,
    /// Generate a test pattern instead of reading a file.
    #[arg(long, value_enum)]
    pub pattern: Option<Pattern>,
    /// Payload compression: none, zlib, gzip or bz2.
    #[arg(long, default_value = "zlib")]
    pub compression: CompressionChoice,
    /// Compression level (default depends on the algorithm).
    #[arg(long)]
    pub level: Option<u32>,
    /// Do not wait for the server's confirmation.
    #[arg(long)]
    pub no_wait: bool,
    /// Confirmation timeout per attempt (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    /// Total send attempts.
    #[arg(long, default_value_t = 2)]
    pub retries: u32,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Expected image width in pixels.
    #[arg(long)]
    pub width: u32,
    /// Expected image height in pixels.
    #[arg(long)]
    pub height: u32,
    /// Expected samples per pixel (1, 3 or 4).
    #[arg(long, default_value_t = 1)]
    pub channels: u8,
    /// Payload compression used by senders.
    #[arg(long, default_value = "zlib")]
    pub compression: CompressionChoice,
    /// Do not answer done/err after each image.
    #[arg(long)]
    pub no_confirm: bool,
    /// Mirror the displayed image to this file (raw bytes).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Exit after receiving N images.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
