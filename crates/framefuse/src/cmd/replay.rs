use std::time::Duration;

use framefuse_frame::{ByteOrder, FrameDescriptor};
use framefuse_pipeline::{ChannelReader, Combiner, CombinerConfig, StopHandle};
use framefuse_source::MemorySource;
use tracing::{info, warn};

use crate::cmd::ReplayArgs;
use crate::exit::{frame_error, io_error, pipeline_error, CliResult, SUCCESS};
use crate::output::{OutputFormat, SnapshotPrinter};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let order = if args.big_endian {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };
    let descriptor = FrameDescriptor::with_byte_order(args.dtype, args.shape, order)
        .map_err(|err| frame_error("invalid frame shape", err))?;
    let bytes = std::fs::read(&args.file)
        .map_err(|err| io_error(&format!("cannot read {}", args.file.display()), err))?;

    let frame_size = descriptor.frame_size();
    let frames = (bytes.len() / frame_size) as u64;
    let trailing = bytes.len() % frame_size;
    if trailing != 0 {
        warn!(trailing, frame_size, "ignoring incomplete trailing frame");
    }
    info!(frames, frame_size, channel = %args.name, "replaying capture");
    if frames == 0 {
        return Ok(SUCCESS);
    }

    let (source, _link) = MemorySource::with_bytes(&bytes);
    let stop = StopHandle::new();
    let printer = SnapshotPrinter::new(format, Some(frames), stop.clone());
    let config = CombinerConfig {
        poll_timeout: Duration::from_millis(100),
        ..CombinerConfig::default()
    };
    let combiner = Combiner::with_config(printer, config).with_stop_handle(stop);

    let reader = ChannelReader::new(args.name.as_str(), descriptor, Box::new(source))
        .with_poll_interval(Duration::from_millis(1));
    combiner
        .attach(reader)
        .map_err(|err| pipeline_error("attach failed", err))?;

    let result = combiner.run();
    let shutdown = combiner.shutdown();
    result.map_err(|err| pipeline_error("replay failed", err))?;
    shutdown.map_err(|err| pipeline_error("shutdown failed", err))?;
    Ok(SUCCESS)
}
