mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "slmlink", version, about = "Stream images to SLM displays")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "slmlink",
            "send",
            "10.0.0.5",
            "--width",
            "800",
            "--height",
            "600",
            "--pattern",
            "checker",
            "--compression",
            "bz2",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.port, 9999);
                assert_eq!(args.retries, 2);
                assert_eq!(args.compression.as_str(), "bz2");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_file_and_pattern_together() {
        let err = Cli::try_parse_from([
            "slmlink",
            "send",
            "localhost",
            "--width",
            "4",
            "--height",
            "4",
            "--file",
            "image.raw",
            "--pattern",
            "blank",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_unknown_compression() {
        let err = Cli::try_parse_from([
            "slmlink",
            "listen",
            "--width",
            "4",
            "--height",
            "4",
            "--compression",
            "lz4",
        ])
        .expect_err("unknown codec should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_listen_with_globals() {
        let cli = Cli::try_parse_from([
            "slmlink",
            "listen",
            "--width",
            "1920",
            "--height",
            "1080",
            "--count",
            "3",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("listen args should parse");
        assert!(matches!(cli.command, Command::Listen(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
