use tracing::debug;

use crate::cmd::PortsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    #[cfg(unix)]
    let ports = framefuse_source::available_ports();
    #[cfg(not(unix))]
    let ports = Vec::<std::path::PathBuf>::new();

    debug!(count = ports.len(), "enumerated serial ports");
    print_ports(&ports, format);
    Ok(SUCCESS)
}
