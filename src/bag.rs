//! ROS1 bag reading: open/validate, channel table, summary, and a
//! single-pass scan over message records in on-disk chunk order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rosbag::{ChunkRecord, MessageRecord, RosBag};
use serde::Serialize;

use crate::error::{Error, Result};

pub const BAG_EXTENSION: &str = "bag";

/// One connection (topic) in a bag, with the metadata gathered during the
/// opening pre-scan.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: u32,
    pub topic: String,
    pub tp: String,
    pub md5sum: String,
    pub message_definition: String,
    pub count: u64,
    pub first_ns: Option<u64>,
    pub last_ns: Option<u64>,
}

/// Whether a scan keeps going after the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// An opened bag. Opening performs one full pass to collect connections,
/// per-channel counts and the global time span; `scan` then replays the
/// message log record by record without buffering it.
pub struct BagFile {
    path: PathBuf,
    bag: RosBag,
    channels: Vec<ChannelInfo>,
    start_ns: Option<u64>,
    end_ns: Option<u64>,
    total_messages: u64,
    file_size: u64,
}

impl std::fmt::Debug for BagFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagFile")
            .field("path", &self.path)
            .field("channels", &self.channels)
            .field("start_ns", &self.start_ns)
            .field("end_ns", &self.end_ns)
            .field("total_messages", &self.total_messages)
            .field("file_size", &self.file_size)
            .finish_non_exhaustive()
    }
}

impl BagFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        if path.extension().and_then(|e| e.to_str()) != Some(BAG_EXTENSION) {
            return Err(Error::NotABag(path.to_path_buf()));
        }
        let file_size = std::fs::metadata(path)?.len();
        let bag = RosBag::new(path).map_err(|e| Error::corrupt(path, e))?;

        let mut channels: Vec<ChannelInfo> = Vec::new();
        let mut by_id: HashMap<u32, usize> = HashMap::new();
        let mut start_ns = None;
        let mut end_ns = None;
        let mut total_messages = 0u64;

        for record in bag.chunk_records() {
            let record = record.map_err(|e| Error::corrupt(path, e))?;
            let ChunkRecord::Chunk(chunk) = record else {
                continue;
            };
            for msg in chunk.messages() {
                match msg.map_err(|e| Error::corrupt(path, e))? {
                    MessageRecord::Connection(conn) => {
                        if !by_id.contains_key(&conn.id) {
                            by_id.insert(conn.id, channels.len());
                            channels.push(ChannelInfo {
                                id: conn.id,
                                topic: conn.topic.to_string(),
                                tp: conn.tp.to_string(),
                                md5sum: conn
                                    .md5sum
                                    .iter()
                                    .map(|b| format!("{b:02x}"))
                                    .collect(),
                                message_definition: conn.message_definition.to_string(),
                                count: 0,
                                first_ns: None,
                                last_ns: None,
                            });
                        }
                    }
                    MessageRecord::MessageData(data) => {
                        total_messages += 1;
                        let t = data.time;
                        start_ns = Some(start_ns.map_or(t, |s: u64| s.min(t)));
                        end_ns = Some(end_ns.map_or(t, |e: u64| e.max(t)));
                        if let Some(&i) = by_id.get(&data.conn_id) {
                            let ch = &mut channels[i];
                            ch.count += 1;
                            ch.first_ns = Some(ch.first_ns.map_or(t, |f| f.min(t)));
                            ch.last_ns = Some(ch.last_ns.map_or(t, |l| l.max(t)));
                        }
                    }
                }
            }
        }

        Ok(BagFile {
            path: path.to_path_buf(),
            bag,
            channels,
            start_ns,
            end_ns,
            total_messages,
            file_size,
        })
    }

    /// Channels in bag enumeration order (order of first appearance).
    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn channel(&self, topic: &str) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.topic == topic)
    }

    /// Timestamp of the first message, absolute nanoseconds.
    pub fn start_ns(&self) -> Option<u64> {
        self.start_ns
    }

    /// Timestamp of the last message, absolute nanoseconds.
    pub fn end_ns(&self) -> Option<u64> {
        self.end_ns
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.file_size
    }

    pub fn summary(&self) -> BagSummary {
        let start_time = self.start_ns.unwrap_or(0) as f64 * 1e-9;
        let end_time = self.end_ns.unwrap_or(0) as f64 * 1e-9;
        BagSummary {
            start_time,
            end_time,
            duration: end_time - start_time,
            file_size_mb: self.file_size as f64 / (1024.0 * 1024.0),
            topics: self
                .channels
                .iter()
                .map(|c| TopicSummary {
                    topic: c.topic.clone(),
                    tp: c.tp.clone(),
                    message_count: c.count,
                    frequency: c.frequency(),
                })
                .collect(),
        }
    }

    /// Visit every message record in on-disk chunk order, single pass.
    /// The visitor receives `(conn_id, time_ns, payload)` and can stop the
    /// scan early. Restarting requires another call (the pass is forward-only).
    pub fn scan<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(u32, u64, &[u8]) -> Result<ScanControl>,
    {
        'chunks: for record in self.bag.chunk_records() {
            let record = record.map_err(|e| Error::corrupt(&self.path, e))?;
            let ChunkRecord::Chunk(chunk) = record else {
                continue;
            };
            for msg in chunk.messages() {
                let msg = msg.map_err(|e| Error::corrupt(&self.path, e))?;
                if let MessageRecord::MessageData(data) = msg
                    && visit(data.conn_id, data.time, data.data)? == ScanControl::Stop
                {
                    break 'chunks;
                }
            }
        }
        Ok(())
    }
}

impl ChannelInfo {
    /// Mean message rate over the channel's own time span, if computable.
    pub fn frequency(&self) -> Option<f64> {
        let (first, last) = (self.first_ns?, self.last_ns?);
        if self.count < 2 || last <= first {
            return None;
        }
        Some((self.count - 1) as f64 / ((last - first) as f64 * 1e-9))
    }
}

/// Metadata summary of one bag, shaped like the original robologs JSON
/// (`start_time`/`end_time` in epoch seconds, topic table with capitalized
/// column names).
#[derive(Debug, Clone, Serialize)]
pub struct BagSummary {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub file_size_mb: f64,
    pub topics: Vec<TopicSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    #[serde(rename = "Topics")]
    pub topic: String,
    #[serde(rename = "Types")]
    pub tp: String,
    #[serde(rename = "Message Count")]
    pub message_count: u64,
    #[serde(rename = "Frequency")]
    pub frequency: Option<f64>,
}

/// Non-recursive, lexicographically sorted list of `*.bag` files in a folder.
pub fn discover_bags(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut bags: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(BAG_EXTENSION))
        .collect();
    bags.sort();
    Ok(bags)
}
