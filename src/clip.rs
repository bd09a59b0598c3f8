//! Bag clipping: re-serialize a time/topic-filtered subset of a bag into a
//! new, independently valid bag.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use crate::bag::{BagFile, discover_bags};
use crate::error::{Error, Result};
use crate::pipeline::{self, FilterSpec};
use crate::select::resolve_topics;
use crate::timefilter::TimestampMode;
use crate::writer::{BagWriter, ConnectionSpec};

#[derive(Debug, Clone)]
pub struct ClipOptions {
    /// Topics to keep; all topics when absent.
    pub topics: Option<Vec<String>>,
    /// Window start, interpreted per `timestamp_mode`.
    pub start_time: Option<f64>,
    /// Window end, interpreted per `timestamp_mode`.
    pub end_time: Option<f64>,
    pub timestamp_mode: TimestampMode,
    pub show_progress: bool,
}

impl Default for ClipOptions {
    fn default() -> Self {
        ClipOptions {
            topics: None,
            start_time: None,
            end_time: None,
            timestamp_mode: TimestampMode::RosbagNs,
            show_progress: false,
        }
    }
}

#[derive(Debug)]
pub struct ClipStats {
    pub messages: u64,
    pub per_topic: Vec<(String, u64)>,
}

/// Clip `input` into a new bag at `output`.
///
/// The subset keeps original timestamps and per-topic order; start/end of
/// the output are whatever was actually written. Writes go to a temporary
/// sibling path first and are renamed into place on success, so an
/// interrupted run never leaves a half-written bag at `output`. Zero
/// surviving records fail with `EmptyResult` and leave `output` untouched.
pub fn clip_bag(input: &Path, output: &Path, options: &ClipOptions) -> Result<ClipStats> {
    let bag = BagFile::open(input)?;

    let topics = resolve_topics(options.topics.as_deref(), bag.channels(), None);
    if topics.is_empty() {
        tracing::warn!(bag = %input.display(), "no channels to process");
        return Err(Error::EmptyResult);
    }

    let window = options.timestamp_mode.resolve_window(
        options.start_time,
        options.end_time,
        bag.start_ns().unwrap_or(0),
    );

    let tmp_path = temp_sibling(output);
    let mut writer = BagWriter::create(&tmp_path)?;
    let mut conn_ids: HashMap<String, u32> = HashMap::new();

    let pb = options.show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template("{spinner} {pos} msgs").unwrap());
        pb
    });

    let spec = FilterSpec {
        window,
        sample: None,
    };
    let run_result = pipeline::run(&bag, &topics, &spec, |rec| {
        let conn_id = match conn_ids.get(rec.topic) {
            Some(&id) => id,
            None => {
                // connections are created on first surviving record so the
                // output carries exactly the channels it references
                let ch = bag
                    .channel(rec.topic)
                    .expect("pipeline only emits resolved topics");
                let id = writer.add_connection(ConnectionSpec {
                    topic: ch.topic.clone(),
                    tp: ch.tp.clone(),
                    md5sum: ch.md5sum.clone(),
                    message_definition: ch.message_definition.clone(),
                });
                conn_ids.insert(rec.topic.to_string(), id);
                id
            }
        };
        writer.write_message(conn_id, rec.time_ns, rec.data)?;
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        Ok(())
    });
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let stats = match run_result {
        Ok(stats) => stats,
        Err(e) => {
            drop(writer);
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }
    };

    if stats.emitted == 0 {
        drop(writer);
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::EmptyResult);
    }

    writer.finish()?;
    std::fs::rename(&tmp_path, output)?;
    tracing::info!(
        messages = stats.emitted,
        scanned = stats.seen,
        output = %output.display(),
        "wrote clipped bag"
    );

    Ok(ClipStats {
        messages: stats.emitted,
        per_topic: stats.emitted_per_topic,
    })
}

/// Clip a single bag or every bag in a folder into `output_dir`.
///
/// Folder inputs derive each output name as `<stem>_cropped.bag`; a single
/// input may override the name with `name`. Per-bag failures in a folder are
/// logged and the batch continues.
pub fn run_clip(
    input: &Path,
    output_dir: &Path,
    name: Option<&str>,
    options: &ClipOptions,
) -> Result<()> {
    if input.is_dir() {
        std::fs::create_dir_all(output_dir)?;
        let bags = discover_bags(input)?;
        if bags.is_empty() {
            tracing::warn!(input = %input.display(), "no rosbags found");
            return Ok(());
        }
        for bag_path in bags {
            let output = output_dir.join(cropped_name(&bag_path));
            if let Err(e) = clip_bag(&bag_path, &output, options) {
                tracing::error!(bag = %bag_path.display(), error = %e, "skipping bag");
            }
        }
        Ok(())
    } else if input.is_file() {
        std::fs::create_dir_all(output_dir)?;
        let file_name = name
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| cropped_name(input));
        clip_bag(input, &output_dir.join(file_name), options)?;
        Ok(())
    } else {
        Err(Error::NotFound(input.to_path_buf()))
    }
}

fn cropped_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    format!("{stem}_cropped.bag")
}

fn temp_sibling(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output.bag".into());
    name.push(".tmp");
    output.with_file_name(name)
}
