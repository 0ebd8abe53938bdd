use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use slmlink_display::{
    DisplayError, DisplayRegistry, DisplaySink, FrameShape, HeadlessBackend, RawFileSink,
    SurfaceOptions,
};
use slmlink_peer::{Ack, ServerConfig, StreamServer};
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{display_error, peer_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frame, print_summary, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let shape = FrameShape::new(args.width, args.height, args.channels)
        .map_err(|err| display_error("invalid image shape", err))?;

    let config = ServerConfig::new(shape)
        .with_address(&args.host, args.port)
        .with_compression(args.compression)
        .with_confirm(!args.no_confirm);
    let server = StreamServer::bind(config).map_err(|err| peer_error("bind failed", err))?;

    let mut backend = HeadlessBackend::single(args.width, args.height);
    if let Some(path) = args.output.clone() {
        backend = backend.with_factory(move |_, _| {
            Ok(Box::new(RawFileSink::new(&path)) as Box<dyn DisplaySink>)
        });
    }
    let registry = DisplayRegistry::new(backend);
    // With a mirror file, wait for each frame to be written before
    // accepting the next one so the file always holds the last frame.
    let options = SurfaceOptions::on_monitor(0).with_image_lock(args.output.is_some());
    let id = registry
        .open(options)
        .map_err(|err| display_error("display setup failed", err))?;
    let display = registry
        .get(id)
        .map_err(|err| display_error("display setup failed", err))?;

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;
    info!(addr = %server.local_addr(), expected = %shape, "waiting for images");

    let mut received = 0u64;
    let mut display_failure: Option<DisplayError> = None;
    let summary = server
        .serve_with(&stop, |frame, peer| {
            received += 1;
            print_frame(&frame, received, &peer.to_string(), format);

            if let Err(err) = display.update_frame(frame) {
                warn!(error = %err, "display rejected frame");
                display_failure = Some(err);
                return ControlFlow::Break(Ack::Err);
            }
            match args.count {
                Some(count) if received >= count => ControlFlow::Break(Ack::Done),
                _ => ControlFlow::Continue(Ack::Done),
            }
        })
        .map_err(|err| peer_error("serve failed", err))?;

    registry
        .close(id)
        .map_err(|err| display_error("display shutdown failed", err))?;
    print_summary(&summary, &display.stats(), format);

    match display_failure {
        Some(err) => Err(display_error("display failed", err)),
        None => Ok(SUCCESS),
    }
}

fn install_ctrlc_handler(stop: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
