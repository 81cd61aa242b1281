//! JSON channel file read by `monitor`.
//!
//! ```json
//! {
//!   "poll_timeout_ms": 1000,
//!   "stale_policy": "remove",
//!   "error_policy": "continue",
//!   "channels": [
//!     {
//!       "name": "imu",
//!       "dtype": "i16",
//!       "shape": [2, 3],
//!       "byte_order": "little",
//!       "transport": { "kind": "serial", "port": "/dev/ttyUSB0", "baud_rate": 115200 }
//!     }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use framefuse_frame::{ByteOrder, ElementType};
use framefuse_pipeline::{
    CombinerConfig, ErrorPolicy, ReaderConfig, StalePolicy, DEFAULT_POLL_INTERVAL,
};
use framefuse_source::{BluetoothConfig, SerialConfig, TransportConfig, WifiConfig};
use serde::Deserialize;

use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelFile {
    poll_timeout_ms: Option<u64>,
    #[serde(default)]
    stale_policy: StaleSetting,
    #[serde(default)]
    error_policy: ErrorSetting,
    channels: Vec<ChannelEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StaleSetting {
    #[default]
    Remove,
    Retain,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ErrorSetting {
    #[default]
    Continue,
    Stop,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OrderSetting {
    #[default]
    Little,
    Big,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelEntry {
    name: String,
    dtype: String,
    shape: Vec<usize>,
    #[serde(default)]
    byte_order: OrderSetting,
    transport: TransportEntry,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum TransportEntry {
    Serial {
        port: Option<PathBuf>,
        baud_rate: u32,
    },
    Bluetooth {
        address: Option<String>,
    },
    Wifi {
        address: Option<String>,
    },
}

impl From<TransportEntry> for TransportConfig {
    fn from(entry: TransportEntry) -> Self {
        match entry {
            TransportEntry::Serial { port, baud_rate } => {
                TransportConfig::Serial(SerialConfig { port, baud_rate })
            }
            TransportEntry::Bluetooth { address } => {
                TransportConfig::Bluetooth(BluetoothConfig { address })
            }
            TransportEntry::Wifi { address } => TransportConfig::Wifi(WifiConfig { address }),
        }
    }
}

/// Everything `monitor` needs to build its pipeline.
#[derive(Debug)]
pub struct MonitorConfig {
    pub combiner: CombinerConfig,
    pub readers: Vec<ReaderConfig>,
}

pub fn load(path: &Path) -> CliResult<MonitorConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
    parse(&text)
}

pub fn parse(text: &str) -> CliResult<MonitorConfig> {
    let file: ChannelFile = serde_json::from_str(text)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid channel file: {err}")))?;
    if file.channels.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            "invalid channel file: no channels configured",
        ));
    }

    let mut combiner = CombinerConfig {
        stale_policy: match file.stale_policy {
            StaleSetting::Remove => StalePolicy::Remove,
            StaleSetting::Retain => StalePolicy::Retain,
        },
        error_policy: match file.error_policy {
            ErrorSetting::Continue => ErrorPolicy::LogAndContinue,
            ErrorSetting::Stop => ErrorPolicy::Stop,
        },
        ..CombinerConfig::default()
    };
    if let Some(ms) = file.poll_timeout_ms {
        combiner.poll_timeout = Duration::from_millis(ms);
    }

    let readers = file
        .channels
        .into_iter()
        .map(reader_config)
        .collect::<CliResult<Vec<_>>>()?;
    Ok(MonitorConfig { combiner, readers })
}

fn reader_config(entry: ChannelEntry) -> CliResult<ReaderConfig> {
    let element_type: ElementType = entry
        .dtype
        .parse()
        .map_err(|err| frame_error(&format!("channel {}", entry.name), err))?;

    let mut config = ReaderConfig::new(
        entry.name,
        element_type,
        entry.shape,
        TransportConfig::from(entry.transport),
    );
    config.byte_order = match entry.byte_order {
        OrderSetting::Little => ByteOrder::Little,
        OrderSetting::Big => ByteOrder::Big,
    };
    config.poll_interval = entry
        .poll_interval_ms
        .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::NOT_FOUND;

    #[test]
    fn parses_full_channel_file() {
        let config = parse(
            r#"{
                "poll_timeout_ms": 250,
                "stale_policy": "retain",
                "error_policy": "stop",
                "channels": [
                    {
                        "name": "imu",
                        "dtype": "int16",
                        "shape": [2, 3],
                        "byte_order": "big",
                        "poll_interval_ms": 5,
                        "transport": { "kind": "serial", "port": "/dev/ttyUSB0", "baud_rate": 9600 }
                    },
                    {
                        "name": "radio",
                        "dtype": "f32",
                        "shape": [4],
                        "transport": { "kind": "bluetooth", "address": "00:11:22:33:44:55" }
                    }
                ]
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.combiner.poll_timeout, Duration::from_millis(250));
        assert_eq!(config.combiner.stale_policy, StalePolicy::Retain);
        assert_eq!(config.combiner.error_policy, ErrorPolicy::Stop);

        let imu = &config.readers[0];
        assert_eq!(imu.name, "imu");
        assert_eq!(imu.element_type, ElementType::I16);
        assert_eq!(imu.shape, vec![2, 3]);
        assert_eq!(imu.byte_order, ByteOrder::Big);
        assert_eq!(imu.poll_interval, Duration::from_millis(5));
        assert_eq!(
            imu.transport,
            TransportConfig::Serial(SerialConfig::new("/dev/ttyUSB0", 9600))
        );

        let radio = &config.readers[1];
        assert_eq!(radio.byte_order, ByteOrder::Little);
        assert_eq!(radio.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(matches!(radio.transport, TransportConfig::Bluetooth(_)));
    }

    #[test]
    fn serial_without_port_is_auto_selected() {
        let config = parse(
            r#"{"channels": [{"name": "a", "dtype": "u8", "shape": [1],
                "transport": {"kind": "serial", "baud_rate": 57600}}]}"#,
        )
        .unwrap();
        assert_eq!(
            config.readers[0].transport,
            TransportConfig::Serial(SerialConfig::auto(57_600))
        );
        assert_eq!(config.combiner, CombinerConfig::default());
    }

    #[test]
    fn serial_requires_baud_rate() {
        let err = parse(
            r#"{"channels": [{"name": "a", "dtype": "u8", "shape": [1],
                "transport": {"kind": "serial", "port": "/dev/ttyUSB0"}}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("baud_rate"), "{}", err.message);
    }

    #[test]
    fn rejects_bad_files() {
        let empty = parse(r#"{"channels": []}"#).unwrap_err();
        assert_eq!(empty.code, DATA_INVALID);

        let dtype = parse(
            r#"{"channels": [{"name": "a", "dtype": "i24", "shape": [1],
                "transport": {"kind": "wifi"}}]}"#,
        )
        .unwrap_err();
        assert_eq!(dtype.code, DATA_INVALID);
        assert!(dtype.message.contains("channel a"));

        let unknown = parse(r#"{"channels": [], "extra": 1}"#).unwrap_err();
        assert_eq!(unknown.code, DATA_INVALID);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load(Path::new("/nonexistent/framefuse/channels.json")).unwrap_err();
        assert_eq!(err.code, NOT_FOUND);
    }
}
