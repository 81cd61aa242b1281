use std::io::IsTerminal;
use std::path::PathBuf;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framefuse_frame::{Frame, FrameData};
use framefuse_pipeline::{CombineError, CombineStep, LatestFrames, StopHandle};
use serde::Serialize;

/// Values shown per channel in table and pretty output.
const PREVIEW_LEN: usize = 8;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Samples<'a> {
    I8(&'a [i8]),
    U8(&'a [u8]),
    I16(&'a [i16]),
    U16(&'a [u16]),
    I32(&'a [i32]),
    U32(&'a [u32]),
    I64(&'a [i64]),
    U64(&'a [u64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl<'a> From<&'a FrameData> for Samples<'a> {
    fn from(data: &'a FrameData) -> Self {
        match data {
            FrameData::I8(v) => Samples::I8(v),
            FrameData::U8(v) => Samples::U8(v),
            FrameData::I16(v) => Samples::I16(v),
            FrameData::U16(v) => Samples::U16(v),
            FrameData::I32(v) => Samples::I32(v),
            FrameData::U32(v) => Samples::U32(v),
            FrameData::I64(v) => Samples::I64(v),
            FrameData::U64(v) => Samples::U64(v),
            FrameData::F32(v) => Samples::F32(v),
            FrameData::F64(v) => Samples::F64(v),
        }
    }
}

#[derive(Serialize)]
struct ChannelOutput<'a> {
    channel: &'a str,
    dtype: &'static str,
    shape: &'a [usize],
    data: Samples<'a>,
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    seq: u64,
    updated: Option<&'a str>,
    channels: Vec<ChannelOutput<'a>>,
}

fn snapshot(seq: u64, latest: &LatestFrames) -> SnapshotOutput<'_> {
    SnapshotOutput {
        seq,
        updated: latest.last_updated().map(|id| id.as_str()),
        channels: latest
            .iter()
            .map(|(id, frame)| ChannelOutput {
                channel: id.as_str(),
                dtype: frame.element_type().as_str(),
                shape: frame.shape(),
                data: Samples::from(frame.data()),
            })
            .collect(),
    }
}

pub fn snapshot_json(seq: u64, latest: &LatestFrames) -> String {
    serde_json::to_string(&snapshot(seq, latest)).unwrap_or_else(|_| "{}".to_string())
}

pub fn print_snapshot(seq: u64, latest: &LatestFrames, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", snapshot_json(seq, latest)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "DTYPE", "SHAPE", "VALUES"]);
            for (id, frame) in latest {
                let marker = if latest.last_updated() == Some(id) { "*" } else { "" };
                table.add_row(vec![
                    format!("{id}{marker}"),
                    frame.element_type().to_string(),
                    shape_label(frame.shape()),
                    preview(frame),
                ]);
            }
            println!("#{seq}\n{table}");
        }
        OutputFormat::Pretty => {
            let updated = latest.last_updated().map_or("-", |id| id.as_str());
            let channels: Vec<String> = latest
                .iter()
                .map(|(id, frame)| format!("{id}={}", preview(frame)))
                .collect();
            println!("#{seq} updated={updated} {}", channels.join(" "));
        }
    }
}

pub fn print_ports(ports: &[PathBuf], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let ports: Vec<String> = ports.iter().map(|p| p.display().to_string()).collect();
            println!(
                "{}",
                serde_json::to_string(&serde_json::json!({ "ports": ports }))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "PORT"]);
            for (index, port) in ports.iter().enumerate() {
                table.add_row(vec![index.to_string(), port.display().to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in ports {
                println!("{}", port.display());
            }
        }
    }
}

fn shape_label(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
    format!("({})", dims.join(", "))
}

fn preview(frame: &Frame) -> String {
    macro_rules! join {
        ($values:expr) => {{
            let shown: Vec<String> = $values
                .iter()
                .take(PREVIEW_LEN)
                .map(|v| v.to_string())
                .collect();
            let more = if $values.len() > PREVIEW_LEN { ", ..." } else { "" };
            format!("[{}{more}]", shown.join(", "))
        }};
    }

    match frame.data() {
        FrameData::I8(v) => join!(v),
        FrameData::U8(v) => join!(v),
        FrameData::I16(v) => join!(v),
        FrameData::U16(v) => join!(v),
        FrameData::I32(v) => join!(v),
        FrameData::U32(v) => join!(v),
        FrameData::I64(v) => join!(v),
        FrameData::U64(v) => join!(v),
        FrameData::F32(v) => join!(v),
        FrameData::F64(v) => join!(v),
    }
}

/// Combination step that prints every snapshot it is handed.
///
/// Stops the loop through `stop` once `limit` snapshots have been printed.
pub struct SnapshotPrinter {
    format: OutputFormat,
    printed: u64,
    limit: Option<u64>,
    stop: StopHandle,
}

impl SnapshotPrinter {
    pub fn new(format: OutputFormat, limit: Option<u64>, stop: StopHandle) -> Self {
        Self {
            format,
            printed: 0,
            limit,
            stop,
        }
    }
}

impl CombineStep for SnapshotPrinter {
    fn combine(&mut self, latest: &LatestFrames) -> Result<(), CombineError> {
        self.printed += 1;
        print_snapshot(self.printed, latest, self.format);
        if self.limit.is_some_and(|limit| self.printed >= limit) {
            self.stop.stop();
        }
        Ok(())
    }
}
