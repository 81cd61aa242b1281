//! Wireless transports that are not available yet.
//!
//! Every operation reports `NotImplemented` so a misconfigured channel fails
//! loudly instead of silently producing nothing.

use bytes::Bytes;

use crate::config::{BluetoothConfig, WifiConfig};
use crate::error::{Result, SourceError};
use crate::traits::{FrameSource, TransportKind};

/// Short-range wireless link (placeholder).
#[derive(Debug, Clone, Default)]
pub struct BluetoothSource {
    config: BluetoothConfig,
}

impl BluetoothSource {
    pub fn new(config: BluetoothConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BluetoothConfig {
        &self.config
    }
}

/// Local-network wireless link (placeholder).
#[derive(Debug, Clone, Default)]
pub struct WifiSource {
    config: WifiConfig,
}

impl WifiSource {
    pub fn new(config: WifiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WifiConfig {
        &self.config
    }
}

macro_rules! unimplemented_source {
    ($ty:ty, $kind:expr) => {
        impl FrameSource for $ty {
            fn connect(&mut self) -> Result<()> {
                Err(SourceError::NotImplemented { kind: $kind })
            }

            fn read(&mut self, _n: usize) -> Result<Option<Bytes>> {
                Err(SourceError::NotImplemented { kind: $kind })
            }

            fn close(&mut self) -> Result<()> {
                Err(SourceError::NotImplemented { kind: $kind })
            }

            fn is_connected(&self) -> bool {
                false
            }

            fn kind(&self) -> TransportKind {
                $kind
            }
        }
    };
}

unimplemented_source!(BluetoothSource, TransportKind::Bluetooth);
unimplemented_source!(WifiSource, TransportKind::Wifi);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bluetooth_fails_every_operation() {
        let mut source = BluetoothSource::default();
        assert!(matches!(
            source.connect(),
            Err(SourceError::NotImplemented { .. })
        ));
        assert!(matches!(
            source.read(4),
            Err(SourceError::NotImplemented { .. })
        ));
        assert!(matches!(
            source.close(),
            Err(SourceError::NotImplemented { .. })
        ));
        assert!(!source.is_connected());
    }

    #[test]
    fn wifi_reports_its_kind() {
        let source = WifiSource::new(WifiConfig {
            address: Some("10.0.0.2:9000".into()),
        });
        assert_eq!(source.kind(), TransportKind::Wifi);
        assert_eq!(source.config().address.as_deref(), Some("10.0.0.2:9000"));
        let err = WifiSource::default().read(1).unwrap_err();
        assert_eq!(err.to_string(), "wifi transport is not implemented");
    }
}
