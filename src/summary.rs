//! Bag metadata summaries: stdout table and JSON export, for a single bag or
//! a folder of bags keyed by absolute path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::bag::{BagFile, BagSummary, discover_bags};
use crate::error::{Error, Result};

pub const DEFAULT_SUMMARY_FILE_NAME: &str = "rosbag_metadata.json";

/// Summaries keyed by absolute bag path. A single-file input yields one
/// entry; a folder yields one entry per discovered bag.
pub fn summarize(input: &Path) -> Result<BTreeMap<String, BagSummary>> {
    let mut out = BTreeMap::new();
    if input.is_dir() {
        for bag_path in discover_bags(input)? {
            let abs = std::path::absolute(&bag_path)?;
            out.insert(
                abs.display().to_string(),
                BagFile::open(&bag_path)?.summary(),
            );
        }
        Ok(out)
    } else if input.is_file() {
        let abs = std::path::absolute(input)?;
        out.insert(abs.display().to_string(), BagFile::open(input)?.summary());
        Ok(out)
    } else {
        Err(Error::NotFound(input.to_path_buf()))
    }
}

/// Write the summary JSON. When `output` is a directory the file lands
/// inside it under `file_name`; otherwise `output` is used as the file path.
pub fn export_summary(input: &Path, output: &Path, file_name: &str) -> Result<PathBuf> {
    let summaries = summarize(input)?;
    let path = if output.is_dir() {
        output.join(file_name)
    } else {
        output.to_path_buf()
    };
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, &summaries)?;
    tracing::info!(output = %path.display(), bags = summaries.len(), "wrote summary");
    Ok(path)
}

/// Print a human-readable per-topic table for one bag, with first/last
/// offsets relative to the bag start.
pub fn inspect(path: &Path) -> Result<()> {
    let bag = BagFile::open(path)?;
    let start_ns = bag.start_ns().unwrap_or(0);
    let end_ns = bag.end_ns().unwrap_or(start_ns);
    let duration_s = (end_ns - start_ns) as f64 * 1e-9;

    println!("Bag: {}", path.display());
    println!(
        "Start (ns): {}, Duration (s): {:.6}, Messages: {}, Size (MB): {:.2}",
        start_ns,
        duration_s,
        bag.total_messages(),
        bag.file_size_bytes() as f64 / (1024.0 * 1024.0)
    );
    println!();
    println!(
        "{:<35} {:<35} {:>8} {:>11} {:>11}",
        "Topic", "Type", "Count", "First(s)", "Last(s)"
    );
    println!("{}", "-".repeat(103));
    for ch in bag.channels() {
        let rel = |t: Option<u64>| t.map_or(0.0, |t| (t - start_ns) as f64 * 1e-9);
        println!(
            "{:<35} {:<35} {:>8} {:>11.6} {:>11.6}",
            ch.topic,
            ch.tp,
            ch.count,
            rel(ch.first_ns),
            rel(ch.last_ns)
        );
    }
    Ok(())
}
