//! Image extraction: decode image-typed messages from a bag into per-topic
//! folders of image files, with optional resize, sampling, time window and a
//! JSON manifest.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::DynamicImage;
use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::bag::{BagFile, discover_bags};
use crate::decode;
use crate::error::{Error, Result};
use crate::pipeline::{self, FilterSpec};
use crate::select::{
    IMAGE_TOPIC_TYPES, image_name_from_index, image_name_from_timestamp, resolve_topics,
    sanitize_topic_name,
};
use crate::timefilter::{TimeWindow, filter_fraction};

pub const MANIFEST_FILE_NAME: &str = "img_manifest.json";
const SEQUENTIAL_ZERO_PADDING: usize = 6;

/// How extracted image files are named (before the topic prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Naming {
    /// Zero-padded emitted index per topic.
    #[default]
    Sequential,
    /// Recording timestamp of the record, raw nanoseconds.
    RosbagTimestamp,
    /// Message header stamp, raw nanoseconds.
    MsgTimestamp,
}

impl FromStr for Naming {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sequential" => Ok(Naming::Sequential),
            "rosbag_timestamp" => Ok(Naming::RosbagTimestamp),
            "msg_timestamp" => Ok(Naming::MsgTimestamp),
            other => Err(Error::InvalidArgument(format!(
                "invalid naming '{other}', valid values are [sequential, rosbag_timestamp, msg_timestamp]"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Output image format / file extension ("jpg", "png", ...).
    pub file_format: String,
    /// Topics to extract; image-typed channels when absent.
    pub topics: Option<Vec<String>>,
    pub create_manifest: bool,
    pub naming: Naming,
    /// Target (width, height); images are written as decoded when absent.
    pub resize: Option<(u32, u32)>,
    /// Keep only every Nth seen message per topic.
    pub sample: Option<u64>,
    /// Window start in absolute epoch seconds.
    pub start_time: Option<f64>,
    /// Window end in absolute epoch seconds.
    pub end_time: Option<f64>,
    pub show_progress: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            file_format: "jpg".to_string(),
            topics: None,
            create_manifest: false,
            naming: Naming::Sequential,
            resize: None,
            sample: None,
            start_time: None,
            end_time: None,
            show_progress: false,
        }
    }
}

/// One manifest row, keyed in the manifest JSON by the image file name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub msg_timestamp: u64,
    pub rosbag_timestamp: u64,
    pub path: String,
    pub msg_index: u64,
    pub img_name: String,
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub images_written: u64,
    pub decode_failures: u64,
    /// Per-topic output directories, for topics that produced images.
    pub output_dirs: Vec<PathBuf>,
}

/// Extract images from one bag into per-topic subdirectories of
/// `output_dir`. Directories are created lazily on first write, so topics
/// with no surviving decodable message leave nothing behind. Decode failures
/// are logged and skipped; they never abort the pass.
pub fn extract_images(
    bag_path: &Path,
    output_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractStats> {
    let bag = BagFile::open(bag_path)?;

    let topics = resolve_topics(
        options.topics.as_deref(),
        bag.channels(),
        Some(&IMAGE_TOPIC_TYPES),
    );
    if topics.is_empty() {
        tracing::warn!(bag = %bag_path.display(), "no image topics to extract");
        return Ok(ExtractStats::default());
    }

    let topic_types: HashMap<&str, &str> = topics
        .iter()
        .filter_map(|t| bag.channel(t).map(|c| (t.as_str(), c.tp.as_str())))
        .collect();

    let window = TimeWindow::from_epoch_seconds(options.start_time, options.end_time);
    let spec = FilterSpec {
        window,
        sample: options.sample,
    };

    let pb = options.show_progress.then(|| {
        let selected: u64 = topics
            .iter()
            .filter_map(|t| bag.channel(t).map(|c| c.count))
            .sum();
        let fraction = filter_fraction(
            options.start_time,
            options.end_time,
            bag.start_ns().unwrap_or(0) as f64 * 1e-9,
            bag.end_ns().unwrap_or(0) as f64 * 1e-9,
        )
        .unwrap_or(1.0);
        let estimate = (selected as f64 * fraction) as u64 / options.sample.unwrap_or(1).max(1);
        let pb = ProgressBar::new(estimate.max(1));
        pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} imgs").unwrap());
        pb
    });

    let mut stats = ExtractStats::default();
    let mut created_dirs: HashMap<String, PathBuf> = HashMap::new();
    let mut manifests: BTreeMap<String, BTreeMap<String, ManifestEntry>> = BTreeMap::new();

    pipeline::run(&bag, &topics, &spec, |rec| {
        let tp = topic_types
            .get(rec.topic)
            .copied()
            .unwrap_or("sensor_msgs/Image");
        let decoded = match decode::decode_image(rec.data, tp) {
            Ok(decoded) => decoded,
            Err(source) => {
                let e = Error::MalformedPayload {
                    topic: rec.topic.to_string(),
                    time_ns: rec.time_ns,
                    source,
                };
                tracing::warn!(error = %e, "skipping undecodable message");
                stats.decode_failures += 1;
                return Ok(());
            }
        };

        let prefix = sanitize_topic_name(rec.topic);
        let topic_dir = match created_dirs.get(rec.topic) {
            Some(dir) => dir.clone(),
            None => {
                let dir = output_dir.join(&prefix);
                std::fs::create_dir_all(&dir)?;
                created_dirs.insert(rec.topic.to_string(), dir.clone());
                dir
            }
        };

        let base_name = match options.naming {
            Naming::Sequential => image_name_from_index(
                rec.emitted_index,
                &options.file_format,
                SEQUENTIAL_ZERO_PADDING,
            ),
            Naming::RosbagTimestamp => {
                image_name_from_timestamp(rec.time_ns, &options.file_format)
            }
            Naming::MsgTimestamp => {
                image_name_from_timestamp(decoded.stamp_ns, &options.file_format)
            }
        };
        let img_name = format!("{prefix}_{base_name}");
        let img_path = topic_dir.join(&img_name);

        let image = match options.resize {
            Some((w, h)) => decoded.image.resize_exact(w, h, FilterType::Triangle),
            None => decoded.image,
        };
        save_image(&image, &img_path)?;
        stats.images_written += 1;

        if options.create_manifest {
            manifests.entry(rec.topic.to_string()).or_default().insert(
                img_name.clone(),
                ManifestEntry {
                    msg_timestamp: decoded.stamp_ns,
                    rosbag_timestamp: rec.time_ns,
                    path: img_path.display().to_string(),
                    msg_index: rec.emitted_index,
                    img_name,
                },
            );
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        Ok(())
    })?;

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    if options.create_manifest {
        for (topic, entries) in &manifests {
            if let Some(dir) = created_dirs.get(topic) {
                let file = std::fs::File::create(dir.join(MANIFEST_FILE_NAME))?;
                serde_json::to_writer_pretty(file, entries)?;
            }
        }
    }

    stats.output_dirs = created_dirs.into_values().collect();
    stats.output_dirs.sort();
    tracing::info!(
        bag = %bag_path.display(),
        images = stats.images_written,
        failures = stats.decode_failures,
        "image extraction done"
    );
    Ok(stats)
}

/// Extract from a single bag or from every bag in a folder. Per-bag failures
/// in a folder are logged and the batch continues.
pub fn run_extract(input: &Path, output_dir: &Path, options: &ExtractOptions) -> Result<()> {
    if input.is_dir() {
        let bags = discover_bags(input)?;
        if bags.is_empty() {
            tracing::warn!(input = %input.display(), "no rosbags found");
            return Ok(());
        }
        for bag_path in bags {
            if let Err(e) = extract_images(&bag_path, output_dir, options) {
                tracing::error!(bag = %bag_path.display(), error = %e, "skipping bag");
            }
        }
        Ok(())
    } else if input.is_file() {
        extract_images(input, output_dir, options)?;
        Ok(())
    } else {
        Err(Error::NotFound(input.to_path_buf()))
    }
}

/// Save through an 8-bit RGB conversion when the target format cannot carry
/// the decoded color type (JPEG has no alpha and no 16-bit support).
fn save_image(image: &DynamicImage, path: &Path) -> Result<()> {
    let jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    if jpeg && !matches!(image, DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_)) {
        DynamicImage::ImageRgb8(image.to_rgb8()).save(path)?;
    } else {
        image.save(path)?;
    }
    Ok(())
}
