use framefuse_frame::ElementType;
use framefuse_source::TransportKind;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("framefuse {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let dtypes: Vec<&str> = ElementType::ALL.iter().map(|t| t.as_str()).collect();
    let transports = [
        (TransportKind::Serial, cfg!(unix)),
        (TransportKind::Bluetooth, false),
        (TransportKind::Wifi, false),
    ];

    println!("name: framefuse");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FRAMEFUSE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("dtypes: {}", dtypes.join(", "));
    for (kind, available) in transports {
        println!(
            "transport.{kind}: {}",
            if available { "available" } else { "not implemented" }
        );
    }

    Ok(SUCCESS)
}
