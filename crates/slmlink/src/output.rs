use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use slmlink_display::{Frame, MailboxStats};
use slmlink_peer::{SendReport, ServeSummary};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SendOutput<'a> {
    event: &'static str,
    peer: &'a str,
    shape: String,
    compression: &'a str,
    attempts: u32,
    confirmed: bool,
    raw_bytes: usize,
    payload_bytes: usize,
    ratio: f64,
    timestamp: String,
}

pub fn print_send(report: &SendReport, peer: &str, shape: &str, compression: &str, format: OutputFormat) {
    let ratio = compression_ratio(report.raw_bytes, report.payload_bytes);
    match format {
        OutputFormat::Json => {
            let out = SendOutput {
                event: "frame-sent",
                peer,
                shape: shape.to_string(),
                compression,
                attempts: report.attempts,
                confirmed: report.confirmed,
                raw_bytes: report.raw_bytes,
                payload_bytes: report.payload_bytes,
                ratio,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "PEER", "SHAPE", "CODEC", "ATTEMPTS", "CONFIRMED", "RAW", "SENT",
                ])
                .add_row(vec![
                    peer.to_string(),
                    shape.to_string(),
                    compression.to_string(),
                    report.attempts.to_string(),
                    report.confirmed.to_string(),
                    report.raw_bytes.to_string(),
                    report.payload_bytes.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {shape} to {peer} codec={compression} attempts={} confirmed={} raw={} sent={} ratio={ratio:.2}",
                report.attempts, report.confirmed, report.raw_bytes, report.payload_bytes
            );
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    event: &'static str,
    sequence: u64,
    peer: &'a str,
    shape: String,
    bytes: usize,
    timestamp: String,
}

/// One line per received frame. Tables are not used here: a bordered
/// table per frame would flood the terminal.
pub fn print_frame(frame: &Frame, sequence: u64, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                event: "frame-received",
                sequence,
                peer,
                shape: frame.shape().to_string(),
                bytes: frame.len(),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "#{sequence} {} bytes={} peer={peer}",
                frame.shape(),
                frame.len()
            );
        }
    }
}

#[derive(Serialize)]
struct SummaryOutput {
    event: &'static str,
    sessions: u64,
    frames: u64,
    rejected: u64,
    displayed: u64,
    coalesced: u64,
}

pub fn print_summary(summary: &ServeSummary, stats: &MailboxStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SummaryOutput {
            event: "listen-summary",
            sessions: summary.sessions,
            frames: summary.frames,
            rejected: summary.rejected,
            displayed: stats.takes,
            coalesced: stats.dropped,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SESSIONS", "FRAMES", "REJECTED", "DISPLAYED", "COALESCED"])
                .add_row(vec![
                    summary.sessions.to_string(),
                    summary.frames.to_string(),
                    summary.rejected.to_string(),
                    stats.takes.to_string(),
                    stats.dropped.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "sessions={} frames={} rejected={} displayed={} coalesced={}",
            summary.sessions, summary.frames, summary.rejected, stats.takes, stats.dropped
        ),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn compression_ratio(raw: usize, sent: usize) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    raw as f64 / sent as f64
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
