use framefuse_pipeline::{ChannelReader, Combiner, StopHandle};
use tracing::info;

use crate::cmd::MonitorArgs;
use crate::config;
use crate::exit::{pipeline_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{OutputFormat, SnapshotPrinter};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let config = config::load(&args.config)?;

    let stop = StopHandle::new();
    install_ctrlc_handler(stop.clone())?;

    let printer = SnapshotPrinter::new(format, args.count, stop.clone());
    let combiner = Combiner::with_config(printer, config.combiner).with_stop_handle(stop);

    for reader_config in &config.readers {
        let context = format!("channel {}", reader_config.name);
        let reader =
            ChannelReader::from_config(reader_config).map_err(|err| pipeline_error(&context, err))?;
        combiner
            .attach(reader)
            .map_err(|err| pipeline_error(&context, err))?;
    }
    info!(channels = config.readers.len(), "monitoring");

    let result = combiner.run();
    let shutdown = combiner.shutdown();
    result.map_err(|err| pipeline_error("combiner failed", err))?;
    shutdown.map_err(|err| pipeline_error("shutdown failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(stop: StopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || stop.stop())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
