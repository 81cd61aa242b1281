use std::path::PathBuf;

use crate::error::Result;
use crate::stub::{BluetoothSource, WifiSource};
use crate::traits::{FrameSource, TransportKind};

/// Serial link parameters. The bit rate has no default; the device decides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path. `None` selects the first available port at connect time.
    pub port: Option<PathBuf>,
    /// Bit rate, e.g. 115200.
    pub baud_rate: u32,
}

impl SerialConfig {
    /// Serial link on an explicit device path.
    pub fn new(port: impl Into<PathBuf>, baud_rate: u32) -> Self {
        Self {
            port: Some(port.into()),
            baud_rate,
        }
    }

    /// Serial link on whichever port is found first.
    pub fn auto(baud_rate: u32) -> Self {
        Self {
            port: None,
            baud_rate,
        }
    }
}

/// Short-range wireless parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BluetoothConfig {
    /// Remote device address.
    pub address: Option<String>,
}

/// Local-network wireless parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiConfig {
    /// Remote host, `host:port`.
    pub address: Option<String>,
}

/// Transport selection plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Serial(SerialConfig),
    Bluetooth(BluetoothConfig),
    Wifi(WifiConfig),
}

impl TransportConfig {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Serial(_) => TransportKind::Serial,
            TransportConfig::Bluetooth(_) => TransportKind::Bluetooth,
            TransportConfig::Wifi(_) => TransportKind::Wifi,
        }
    }

    /// Build the (unconnected) source for this configuration.
    pub fn build(&self) -> Result<Box<dyn FrameSource>> {
        match self {
            #[cfg(unix)]
            TransportConfig::Serial(cfg) => Ok(Box::new(crate::serial::SerialSource::new(
                cfg.clone(),
            ))),
            #[cfg(not(unix))]
            TransportConfig::Serial(_) => Err(crate::error::SourceError::NotImplemented {
                kind: TransportKind::Serial,
            }),
            TransportConfig::Bluetooth(cfg) => Ok(Box::new(BluetoothSource::new(cfg.clone()))),
            TransportConfig::Wifi(cfg) => Ok(Box::new(WifiSource::new(cfg.clone()))),
        }
    }
}
