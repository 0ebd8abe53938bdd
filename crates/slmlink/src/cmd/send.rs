use std::fs;
use std::time::Duration;

use slmlink_display::{Frame, FrameShape};
use slmlink_peer::{ClientConfig, StreamClient};
use tracing::debug;

use crate::cmd::{Pattern, SendArgs};
use crate::exit::{display_error, io_error, peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_send, OutputFormat};

/// Side of one checkerboard square, in pixels.
const CHECKER_CELL: u32 = 8;

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let shape = FrameShape::new(args.width, args.height, args.channels)
        .map_err(|err| display_error("invalid image shape", err))?;
    let frame = resolve_frame(&args, shape)?;

    let config = ClientConfig::new(&args.host, args.port)
        .with_compression(args.compression, args.level)
        .with_wait_for_reply(!args.no_wait)
        .with_timeout(timeout)
        .with_retries(args.retries)
        .with_connect_timeout(timeout);
    let mut client = StreamClient::connect(config).map_err(|err| peer_error("connect failed", err))?;
    let peer = client.peer_addr().to_string();

    let report = client
        .send(&frame)
        .map_err(|err| peer_error("send failed", err))?;
    print_send(
        &report,
        &peer,
        &shape.to_string(),
        client.codec().choice().as_str(),
        format,
    );

    client
        .close()
        .map_err(|err| peer_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_frame(args: &SendArgs, shape: FrameShape) -> CliResult<Frame> {
    if let Some(path) = &args.file {
        let data = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        debug!(path = %path.display(), bytes = data.len(), "read image file");
        return Frame::new(shape, data).map_err(|err| display_error("image file rejected", err));
    }
    let pattern = args
        .pattern
        .ok_or_else(|| CliError::new(USAGE, "either --file or --pattern is required"))?;
    render_pattern(pattern, shape)
}

fn render_pattern(pattern: Pattern, shape: FrameShape) -> CliResult<Frame> {
    let channels = shape.channels as usize;
    let mut data = Vec::with_capacity(shape.byte_len());
    for y in 0..shape.height {
        for x in 0..shape.width {
            let value = match pattern {
                Pattern::Blank => 0,
                Pattern::Gradient => {
                    let span = shape.width.saturating_sub(1).max(1) as u64;
                    (x as u64 * 255 / span) as u8
                }
                Pattern::Checker => {
                    if ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0 {
                        255
                    } else {
                        0
                    }
                }
            };
            data.extend(std::iter::repeat(value).take(channels));
        }
    }
    Frame::new(shape, data).map_err(|err| display_error("pattern rendering failed", err))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(width: u32, height: u32, channels: u8) -> FrameShape {
        FrameShape::new(width, height, channels).unwrap()
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn gradient_spans_full_range() {
        let frame = render_pattern(Pattern::Gradient, shape(256, 2, 1)).unwrap();
        let row = frame.row(1).unwrap();
        assert_eq!(row[0], 0);
        assert_eq!(row[255], 255);
        assert!(row.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn checker_alternates_cells_and_repeats_channels() {
        let frame = render_pattern(Pattern::Checker, shape(16, 16, 3)).unwrap();
        assert_eq!(frame.len(), 16 * 16 * 3);
        let row = frame.row(0).unwrap();
        assert_eq!(&row[..3], &[255, 255, 255]);
        assert_eq!(&row[8 * 3..8 * 3 + 3], &[0, 0, 0]);
        assert_eq!(frame.row(8).unwrap()[0], 0);
    }

    #[test]
    fn single_column_gradient_does_not_divide_by_zero() {
        let frame = render_pattern(Pattern::Gradient, shape(1, 4, 1)).unwrap();
        assert!(frame.as_bytes().iter().all(|b| *b == 0));
    }
}
