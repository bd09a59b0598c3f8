//! ROS1 bag format 2.0 writing.
//!
//! The `rosbag` crate only reads, so clipping re-serializes through this
//! writer. Output layout follows the on-disk format: magic line, a 4096-byte
//! file header record, uncompressed chunks with their connection and message
//! data records, an index data record per (chunk, connection), and after the
//! index position one connection record per channel plus one chunk info
//! record per chunk. Bags written here reopen with `rosbag::RosBag`.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

const BAG_MAGIC: &[u8] = b"#ROSBAG V2.0\n";
/// Total on-disk size of the file header record, space-padded per the format.
const FILE_HEADER_RECORD_LEN: usize = 4096;
/// Flush the open chunk once its uncompressed payload reaches this size.
const CHUNK_TARGET_BYTES: usize = 768 * 1024;

const OP_MESSAGE_DATA: u8 = 0x02;
const OP_FILE_HEADER: u8 = 0x03;
const OP_INDEX_DATA: u8 = 0x04;
const OP_CHUNK: u8 = 0x05;
const OP_CHUNK_INFO: u8 = 0x06;
const OP_CONNECTION: u8 = 0x07;

/// Connection metadata carried into the output bag. When clipping, these
/// fields come straight from the source bag's connection records.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub topic: String,
    pub tp: String,
    pub md5sum: String,
    pub message_definition: String,
}

struct ChunkInfoRecord {
    chunk_pos: u64,
    start_ns: u64,
    end_ns: u64,
    counts: BTreeMap<u32, u32>,
}

pub struct BagWriter {
    out: BufWriter<File>,
    pos: u64,
    connections: Vec<ConnectionSpec>,
    chunk: Vec<u8>,
    chunk_conns: HashSet<u32>,
    chunk_index: BTreeMap<u32, Vec<(u64, u32)>>,
    chunk_start_ns: u64,
    chunk_end_ns: u64,
    chunk_infos: Vec<ChunkInfoRecord>,
    message_count: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct BagWriteStats {
    pub messages: u64,
    pub connections: usize,
    pub chunks: usize,
}

impl BagWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        out.write_all(BAG_MAGIC)?;
        // placeholder, rewritten with real offsets on finish
        out.write_all(&file_header_record(0, 0, 0))?;
        Ok(BagWriter {
            out,
            pos: BAG_MAGIC.len() as u64 + FILE_HEADER_RECORD_LEN as u64,
            connections: Vec::new(),
            chunk: Vec::new(),
            chunk_conns: HashSet::new(),
            chunk_index: BTreeMap::new(),
            chunk_start_ns: u64::MAX,
            chunk_end_ns: 0,
            chunk_infos: Vec::new(),
            message_count: 0,
        })
    }

    /// Register a connection; returns the id to pass to `write_message`.
    pub fn add_connection(&mut self, spec: ConnectionSpec) -> u32 {
        self.connections.push(spec);
        (self.connections.len() - 1) as u32
    }

    /// Append one message. Messages are laid out in call order; timestamps
    /// are written back unchanged.
    pub fn write_message(&mut self, conn_id: u32, time_ns: u64, data: &[u8]) -> Result<()> {
        debug_assert!((conn_id as usize) < self.connections.len());

        // a chunk must carry the connection records it references
        if self.chunk_conns.insert(conn_id) {
            let conn = &self.connections[conn_id as usize];
            let record = connection_record(conn_id, conn);
            self.chunk.extend_from_slice(&record);
        }

        let offset = self.chunk.len() as u32;
        let mut header = Vec::new();
        push_field_u8(&mut header, "op", OP_MESSAGE_DATA);
        push_field_u32(&mut header, "conn", conn_id);
        push_field_time(&mut header, "time", time_ns);
        push_record(&mut self.chunk, &header, data);

        self.chunk_index.entry(conn_id).or_default().push((time_ns, offset));
        self.chunk_start_ns = self.chunk_start_ns.min(time_ns);
        self.chunk_end_ns = self.chunk_end_ns.max(time_ns);
        self.message_count += 1;

        if self.chunk.len() >= CHUNK_TARGET_BYTES {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Flush the open chunk, write the index section, and rewrite the file
    /// header with the final offsets. Must be called for the bag to be valid.
    pub fn finish(mut self) -> Result<BagWriteStats> {
        self.flush_chunk()?;

        let index_pos = self.pos;
        let connections = std::mem::take(&mut self.connections);
        for (id, conn) in connections.iter().enumerate() {
            let record = connection_record(id as u32, conn);
            self.write_raw(&record)?;
        }
        let chunk_infos = std::mem::take(&mut self.chunk_infos);
        for info in &chunk_infos {
            let mut header = Vec::new();
            push_field_u8(&mut header, "op", OP_CHUNK_INFO);
            push_field_u32(&mut header, "ver", 1);
            push_field_u64(&mut header, "chunk_pos", info.chunk_pos);
            push_field_time(&mut header, "start_time", info.start_ns);
            push_field_time(&mut header, "end_time", info.end_ns);
            push_field_u32(&mut header, "count", info.counts.len() as u32);

            let mut data = Vec::with_capacity(info.counts.len() * 8);
            for (&conn, &count) in &info.counts {
                data.extend_from_slice(&conn.to_le_bytes());
                data.extend_from_slice(&count.to_le_bytes());
            }
            let mut record = Vec::new();
            push_record(&mut record, &header, &data);
            self.write_raw(&record)?;
        }

        self.out.flush()?;
        let file = self.out.get_mut();
        file.seek(SeekFrom::Start(BAG_MAGIC.len() as u64))?;
        file.write_all(&file_header_record(
            index_pos,
            connections.len() as u32,
            chunk_infos.len() as u32,
        ))?;
        file.flush()?;

        Ok(BagWriteStats {
            messages: self.message_count,
            connections: connections.len(),
            chunks: chunk_infos.len(),
        })
    }

    fn flush_chunk(&mut self) -> Result<()> {
        if self.chunk.is_empty() {
            return Ok(());
        }
        let chunk_pos = self.pos;

        let mut header = Vec::new();
        push_field_u8(&mut header, "op", OP_CHUNK);
        push_field_str(&mut header, "compression", "none");
        push_field_u32(&mut header, "size", self.chunk.len() as u32);
        let mut record = Vec::new();
        push_record(&mut record, &header, &self.chunk);
        self.write_raw(&record)?;

        let index = std::mem::take(&mut self.chunk_index);
        for (conn, entries) in &index {
            let mut header = Vec::new();
            push_field_u8(&mut header, "op", OP_INDEX_DATA);
            push_field_u32(&mut header, "ver", 1);
            push_field_u32(&mut header, "conn", *conn);
            push_field_u32(&mut header, "count", entries.len() as u32);

            let mut data = Vec::with_capacity(entries.len() * 12);
            for &(time_ns, offset) in entries {
                data.extend_from_slice(&ros_time_bytes(time_ns));
                data.extend_from_slice(&offset.to_le_bytes());
            }
            let mut record = Vec::new();
            push_record(&mut record, &header, &data);
            self.write_raw(&record)?;
        }

        self.chunk_infos.push(ChunkInfoRecord {
            chunk_pos,
            start_ns: self.chunk_start_ns,
            end_ns: self.chunk_end_ns,
            counts: index
                .iter()
                .map(|(&conn, entries)| (conn, entries.len() as u32))
                .collect(),
        });

        self.chunk.clear();
        self.chunk_conns.clear();
        self.chunk_start_ns = u64::MAX;
        self.chunk_end_ns = 0;
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}

fn connection_record(id: u32, conn: &ConnectionSpec) -> Vec<u8> {
    let mut header = Vec::new();
    push_field_u8(&mut header, "op", OP_CONNECTION);
    push_field_u32(&mut header, "conn", id);
    push_field_str(&mut header, "topic", &conn.topic);

    let mut data = Vec::new();
    push_field_str(&mut data, "topic", &conn.topic);
    push_field_str(&mut data, "type", &conn.tp);
    push_field_str(&mut data, "md5sum", &conn.md5sum);
    push_field_str(&mut data, "message_definition", &conn.message_definition);

    let mut record = Vec::new();
    push_record(&mut record, &header, &data);
    record
}

fn file_header_record(index_pos: u64, conn_count: u32, chunk_count: u32) -> Vec<u8> {
    let mut header = Vec::new();
    push_field_u8(&mut header, "op", OP_FILE_HEADER);
    push_field_u64(&mut header, "index_pos", index_pos);
    push_field_u32(&mut header, "conn_count", conn_count);
    push_field_u32(&mut header, "chunk_count", chunk_count);

    // the file header record is space-padded out to a fixed total size so it
    // can be rewritten in place once the offsets are known
    let pad_len = FILE_HEADER_RECORD_LEN - 8 - header.len();
    let mut record = Vec::with_capacity(FILE_HEADER_RECORD_LEN);
    push_record(&mut record, &header, &vec![b' '; pad_len]);
    record
}

/// `<header_len><header><data_len><data>` record framing.
fn push_record(out: &mut Vec<u8>, header: &[u8], data: &[u8]) {
    out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
}

/// `<len><name=value>` header field framing.
fn push_field(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    let len = name.len() + 1 + value.len();
    out.extend_from_slice(&(len as u32).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value);
}

fn push_field_u8(out: &mut Vec<u8>, name: &str, value: u8) {
    push_field(out, name, &[value]);
}

fn push_field_u32(out: &mut Vec<u8>, name: &str, value: u32) {
    push_field(out, name, &value.to_le_bytes());
}

fn push_field_u64(out: &mut Vec<u8>, name: &str, value: u64) {
    push_field(out, name, &value.to_le_bytes());
}

fn push_field_str(out: &mut Vec<u8>, name: &str, value: &str) {
    push_field(out, name, value.as_bytes());
}

fn push_field_time(out: &mut Vec<u8>, name: &str, time_ns: u64) {
    push_field(out, name, &ros_time_bytes(time_ns));
}

/// ROS time on disk is `(sec: u32, nsec: u32)`, little endian.
fn ros_time_bytes(time_ns: u64) -> [u8; 8] {
    let sec = (time_ns / 1_000_000_000) as u32;
    let nsec = (time_ns % 1_000_000_000) as u32;
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&sec.to_le_bytes());
    out[4..].copy_from_slice(&nsec.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::BagFile;

    #[test]
    fn written_bag_reopens_with_counts_and_span() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("written.bag");

        let mut writer = BagWriter::create(&path).unwrap();
        let cam = writer.add_connection(ConnectionSpec {
            topic: "/cam0/image_raw".into(),
            tp: "sensor_msgs/CompressedImage".into(),
            md5sum: "8f7a12909da2c9d3332d540a0977563f".into(),
            message_definition: "string format\nuint8[] data\n".into(),
        });
        let imu = writer.add_connection(ConnectionSpec {
            topic: "/imu".into(),
            tp: "sensor_msgs/Imu".into(),
            md5sum: "6a62c6daae103f4ff57a132d6f95cec2".into(),
            message_definition: String::new(),
        });

        let t0 = 1_649_764_528_071_146_477u64;
        for i in 0..5 {
            writer
                .write_message(cam, t0 + i * 25_000_000, &[1, 2, 3, i as u8])
                .unwrap();
        }
        writer.write_message(imu, t0 + 1, &[9]).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.messages, 6);
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.chunks, 1);

        let bag = BagFile::open(&path).unwrap();
        assert_eq!(bag.total_messages(), 6);
        assert_eq!(bag.start_ns(), Some(t0));
        assert_eq!(bag.end_ns(), Some(t0 + 4 * 25_000_000));

        let cam_ch = bag.channel("/cam0/image_raw").unwrap();
        assert_eq!(cam_ch.tp, "sensor_msgs/CompressedImage");
        assert_eq!(cam_ch.count, 5);
        assert_eq!(bag.channel("/imu").unwrap().count, 1);
    }

    #[test]
    fn payload_bytes_round_trip_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bag");

        let mut writer = BagWriter::create(&path).unwrap();
        let conn = writer.add_connection(ConnectionSpec {
            topic: "/t".into(),
            tp: "x/Y".into(),
            md5sum: "0".repeat(32),
            message_definition: String::new(),
        });
        let payload: Vec<u8> = (0..=255).collect();
        writer.write_message(conn, 42, &payload).unwrap();
        writer.finish().unwrap();

        let bag = BagFile::open(&path).unwrap();
        let mut seen = Vec::new();
        bag.scan(|_, t, data| {
            seen.push((t, data.to_vec()));
            Ok(crate::bag::ScanControl::Continue)
        })
        .unwrap();
        assert_eq!(seen, vec![(42u64, payload)]);
    }

    #[test]
    fn large_streams_rotate_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunked.bag");

        let mut writer = BagWriter::create(&path).unwrap();
        let conn = writer.add_connection(ConnectionSpec {
            topic: "/big".into(),
            tp: "x/Y".into(),
            md5sum: "0".repeat(32),
            message_definition: String::new(),
        });
        let blob = vec![0xABu8; 64 * 1024];
        for i in 0..40 {
            writer.write_message(conn, 1_000 + i, &blob).unwrap();
        }
        let stats = writer.finish().unwrap();
        assert!(stats.chunks > 1, "expected chunk rotation, got {}", stats.chunks);

        let bag = BagFile::open(&path).unwrap();
        assert_eq!(bag.total_messages(), 40);
        assert_eq!(bag.channel("/big").unwrap().count, 40);
    }
}
