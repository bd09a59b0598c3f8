//! Payload encoders and fixture-bag builders shared by the unit and
//! integration test suites.

#![doc(hidden)]

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::error::Result;
use crate::writer::{BagWriter, ConnectionSpec};

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn push_header(out: &mut Vec<u8>, stamp_sec: u32, stamp_nsec: u32) {
    out.extend_from_slice(&0u32.to_le_bytes()); // seq
    out.extend_from_slice(&stamp_sec.to_le_bytes());
    out.extend_from_slice(&stamp_nsec.to_le_bytes());
    push_string(out, "cam"); // frame_id
}

/// ROS1-serialized `sensor_msgs/CompressedImage` payload.
pub fn encode_compressed_image(
    stamp_sec: u32,
    stamp_nsec: u32,
    format: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    push_header(&mut out, stamp_sec, stamp_nsec);
    push_string(&mut out, format);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// ROS1-serialized `sensor_msgs/Image` payload.
pub fn encode_raw_image(
    stamp_sec: u32,
    stamp_nsec: u32,
    width: u32,
    height: u32,
    encoding: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    push_header(&mut out, stamp_sec, stamp_nsec);
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    push_string(&mut out, encoding);
    out.push(0); // is_bigendian
    out.extend_from_slice(&(width * 3).to_le_bytes()); // step, nominal
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// A small solid-color PNG, encoded.
pub fn tiny_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([120, 40, 200]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Message cadence of the fixture bags: 25 ms.
pub const FIXTURE_STEP_NS: u64 = 25_000_000;
/// First message timestamp of the fixture bags.
pub const FIXTURE_START_NS: u64 = 1_649_764_528_071_146_477;

pub const CAM0: &str = "/alphasense/cam0/image_raw";
pub const CAM1: &str = "/alphasense/cam1/image_raw";

/// Write a two-camera fixture bag: `messages_per_topic` CompressedImage
/// messages on each of cam0/cam1, interleaved, 25 ms apart, starting at
/// `FIXTURE_START_NS`. Header stamps trail the recording stamps by 1 ms.
pub fn write_fixture_bag(path: &Path, messages_per_topic: u64) -> Result<()> {
    let mut writer = BagWriter::create(path)?;
    let png = tiny_png_bytes(4, 4);

    let conns = [CAM0, CAM1].map(|topic| {
        writer.add_connection(ConnectionSpec {
            topic: topic.to_string(),
            tp: "sensor_msgs/CompressedImage".to_string(),
            md5sum: "8f7a12909da2c9d3332d540a0977563f".to_string(),
            message_definition: "std_msgs/Header header\nstring format\nuint8[] data\n"
                .to_string(),
        })
    });

    for i in 0..messages_per_topic {
        let t = FIXTURE_START_NS + i * FIXTURE_STEP_NS;
        for conn in conns {
            let stamp = t - 1_000_000;
            let payload = encode_compressed_image(
                (stamp / 1_000_000_000) as u32,
                (stamp % 1_000_000_000) as u32,
                "png",
                &png,
            );
            writer.write_message(conn, t, &payload)?;
        }
    }
    writer.finish()?;
    Ok(())
}
