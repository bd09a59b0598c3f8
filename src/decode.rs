//! Decoding of image-typed ROS1 message payloads.
//!
//! Supported schemas form a closed set: `sensor_msgs/CompressedImage`
//! (including the `compressedDepth` variant carrying a 12-byte depth header
//! in front of 16-bit PNG data) and raw `sensor_msgs/Image` buffers.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

/// Byte count of the depth-codec parameter block that precedes the PNG data
/// in `compressedDepth` payloads.
const COMPRESSED_DEPTH_HEADER_SIZE: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported message type: {0}")]
    UnsupportedType(String),

    #[error("payload too short for {0}")]
    Truncated(&'static str),

    #[error("unsupported image encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid image dimensions: {width}x{height}")]
    BadDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// A decoded image message, reduced to what the materializer needs.
#[derive(Debug)]
pub struct DecodedImage {
    /// Header stamp in nanoseconds (`sec * 1e9 + nsec`).
    pub stamp_ns: u64,
    /// The `format` string of a compressed message, or the `encoding` of a
    /// raw one.
    pub encoding: String,
    pub image: DynamicImage,
}

/// Decode a raw message payload of the given type into an image.
pub fn decode_image(payload: &[u8], type_name: &str) -> Result<DecodedImage, DecodeError> {
    match type_name {
        "sensor_msgs/CompressedImage" => decode_compressed(payload),
        "sensor_msgs/Image" => decode_raw(payload),
        other => Err(DecodeError::UnsupportedType(other.to_string())),
    }
}

fn decode_compressed(payload: &[u8]) -> Result<DecodedImage, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let stamp_ns = r.header_stamp_ns()?;
    let format = r.string("format")?;
    let data = r.byte_array("image data")?;

    let image = if format.contains("compressedDepth") {
        decode_compressed_depth(data)?
    } else {
        let fmt = format.to_ascii_lowercase();
        if fmt.contains("png") {
            image::load_from_memory_with_format(data, ImageFormat::Png)?
        } else if fmt.contains("jpg") || fmt.contains("jpeg") {
            image::load_from_memory_with_format(data, ImageFormat::Jpeg)?
        } else {
            // codec not named in the format string, let the decoder sniff it
            image::load_from_memory(data)?
        }
    };

    Ok(DecodedImage {
        stamp_ns,
        encoding: format,
        image,
    })
}

/// Strip the depth parameter block, decode the 16-bit PNG behind it,
/// min-max normalize to 0-255 and apply a jet color map so the depth image
/// is directly viewable.
fn decode_compressed_depth(data: &[u8]) -> Result<DynamicImage, DecodeError> {
    let png = data
        .get(COMPRESSED_DEPTH_HEADER_SIZE..)
        .ok_or(DecodeError::Truncated("compressedDepth payload"))?;
    let depth = image::load_from_memory_with_format(png, ImageFormat::Png)?.into_luma16();

    let (lo, hi) = depth
        .pixels()
        .fold((u16::MAX, u16::MIN), |(lo, hi), p| {
            (lo.min(p.0[0]), hi.max(p.0[0]))
        });
    let span = (hi.saturating_sub(lo)).max(1) as u32;

    let mut rgb = RgbImage::new(depth.width(), depth.height());
    for (x, y, p) in depth.enumerate_pixels() {
        let v = ((p.0[0].saturating_sub(lo)) as u32 * 255 / span) as u8;
        rgb.put_pixel(x, y, image::Rgb(jet_color(v)));
    }
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// OpenCV-style jet color map over a normalized 0-255 value.
fn jet_color(v: u8) -> [u8; 3] {
    let x = v as f32 / 255.0;
    let ch = |c: f32| ((1.5 - (4.0 * x - c).abs()).clamp(0.0, 1.0) * 255.0) as u8;
    [ch(3.0), ch(2.0), ch(1.0)]
}

fn decode_raw(payload: &[u8]) -> Result<DecodedImage, DecodeError> {
    let mut r = PayloadReader::new(payload);
    let stamp_ns = r.header_stamp_ns()?;
    let height = r.u32("height")?;
    let width = r.u32("width")?;
    let encoding = r.string("encoding")?;
    let is_bigendian = r.u8("is_bigendian")? != 0;
    let _step = r.u32("step")?;
    let data = r.byte_array("pixel data")?;

    if width == 0 || height == 0 {
        return Err(DecodeError::BadDimensions { width, height });
    }

    let pixels = (width as usize) * (height as usize);
    let image = match encoding.as_str() {
        "rgb8" => DynamicImage::ImageRgb8(
            RgbImage::from_raw(width, height, take(data, pixels * 3)?.to_vec())
                .ok_or(DecodeError::Truncated("rgb8 pixel data"))?,
        ),
        "bgr8" => {
            let mut buf = take(data, pixels * 3)?.to_vec();
            for px in buf.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            DynamicImage::ImageRgb8(
                RgbImage::from_raw(width, height, buf)
                    .ok_or(DecodeError::Truncated("bgr8 pixel data"))?,
            )
        }
        "rgba8" => DynamicImage::ImageRgba8(
            RgbaImage::from_raw(width, height, take(data, pixels * 4)?.to_vec())
                .ok_or(DecodeError::Truncated("rgba8 pixel data"))?,
        ),
        "mono8" => DynamicImage::ImageLuma8(
            GrayImage::from_raw(width, height, take(data, pixels)?.to_vec())
                .ok_or(DecodeError::Truncated("mono8 pixel data"))?,
        ),
        "mono16" | "16UC1" => {
            let raw = take(data, pixels * 2)?;
            let buf: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| {
                    if is_bigendian {
                        u16::from_be_bytes([c[0], c[1]])
                    } else {
                        u16::from_le_bytes([c[0], c[1]])
                    }
                })
                .collect();
            DynamicImage::ImageLuma16(
                image::ImageBuffer::from_raw(width, height, buf)
                    .ok_or(DecodeError::Truncated("mono16 pixel data"))?,
            )
        }
        other => return Err(DecodeError::UnsupportedEncoding(other.to_string())),
    };

    Ok(DecodedImage {
        stamp_ns,
        encoding,
        image,
    })
}

fn take(data: &[u8], len: usize) -> Result<&[u8], DecodeError> {
    data.get(..len).ok_or(DecodeError::Truncated("pixel data"))
}

/// Little-endian cursor over a ROS1-serialized payload.
struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        PayloadReader { buf, pos: 0 }
    }

    fn bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.buf.len());
        let end = end.ok_or(DecodeError::Truncated(what))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.bytes(1, what)?[0])
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        let b = self.bytes(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, what: &'static str) -> Result<String, DecodeError> {
        let len = self.u32(what)? as usize;
        Ok(String::from_utf8_lossy(self.bytes(len, what)?).into_owned())
    }

    fn byte_array(&mut self, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.u32(what)? as usize;
        self.bytes(len, what)
    }

    /// std_msgs/Header: seq, stamp (sec, nsec), frame_id. Returns the stamp
    /// as nanoseconds.
    fn header_stamp_ns(&mut self) -> Result<u64, DecodeError> {
        let _seq = self.u32("header seq")?;
        let sec = self.u32("header stamp sec")?;
        let nsec = self.u32("header stamp nsec")?;
        let _frame_id = self.string("header frame_id")?;
        Ok(sec as u64 * 1_000_000_000 + nsec as u64)
    }
}
