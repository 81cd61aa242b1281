//! Two-channel example: an accelerometer and a thermometer fed through
//! in-memory links, combined into a single tilt-compensated reading.
//!
//! Run with:
//!   cargo run --example two-channel

use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use framefuse::frame::{encode_frame, ElementType, Frame, FrameDescriptor};
use framefuse::pipeline::{ChannelReader, CombineError, Combiner, LatestFrames, StopHandle};
use framefuse::source::MemorySource;

const SAMPLES: usize = 5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let accel_desc = FrameDescriptor::new(ElementType::I16, [3])?;
    let temp_desc = FrameDescriptor::new(ElementType::F32, [1])?;

    let (accel_source, accel_link) = MemorySource::pair();
    let (temp_source, temp_link) = MemorySource::pair();

    let stop = StopHandle::new();
    let stop_after = stop.clone();
    let mut combined = 0;
    let step = move |latest: &LatestFrames| -> Result<(), CombineError> {
        let Some(accel) = latest.get("accel").and_then(Frame::as_i16) else {
            eprintln!("[step] waiting for accel");
            return Ok(());
        };
        let temp = latest
            .get("temp")
            .and_then(Frame::as_f32)
            .map_or(f32::NAN, |t| t[0]);
        let magnitude = accel
            .iter()
            .map(|&a| f64::from(a).powi(2))
            .sum::<f64>()
            .sqrt();
        eprintln!("[step] |a|={magnitude:.1} temp={temp:.1}");

        combined += 1;
        if combined == SAMPLES {
            stop_after.stop();
        }
        Ok(())
    };

    let combiner = Combiner::new(step).with_stop_handle(stop);
    combiner.attach(ChannelReader::new("accel", accel_desc.clone(), Box::new(accel_source)))?;
    combiner.attach(ChannelReader::new("temp", temp_desc.clone(), Box::new(temp_source)))?;

    let producer = thread::spawn(move || -> Result<(), framefuse::frame::FrameError> {
        let mut buf = BytesMut::new();
        let reading = Frame::new([1], vec![21.5f32])?;
        encode_frame(&reading, &temp_desc, &mut buf)?;
        temp_link.write(&buf.split());

        for i in 0..SAMPLES as i16 {
            let sample = Frame::new([3], vec![i, -i, 100])?;
            encode_frame(&sample, &accel_desc, &mut buf)?;
            accel_link.write(&buf.split());
            thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    });

    combiner.run()?;
    combiner.shutdown()?;
    producer
        .join()
        .expect("producer thread should not panic")?;
    Ok(())
}
