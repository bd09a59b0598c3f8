//! bagkit - Offline extraction, filtering and clipping for ROS1 .bag files
//!
//! This library reads ROS1 bag recordings and performs offline processing:
//!
//! - **Summary**: topic table, message counts, time span, file size
//! - **Image extraction**: `sensor_msgs/Image`, `sensor_msgs/CompressedImage`
//!   (including `compressedDepth`) into per-topic folders with an optional
//!   JSON manifest
//! - **Clipping**: re-serialize a time/topic-filtered subset into a new,
//!   independently valid bag
//!
//! Processing is single-threaded and single-pass: records stream out of the
//! container in on-disk order through a selection/time-window/sampling
//! pipeline into either the bag writer or the image materializer.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use bagkit::clip::{ClipOptions, clip_bag};
//! use bagkit::timefilter::TimestampMode;
//!
//! let options = ClipOptions {
//!     topics: Some(vec!["/alphasense/cam0/image_raw".to_string()]),
//!     start_time: Some(0.0),
//!     end_time: Some(0.1),
//!     timestamp_mode: TimestampMode::OffsetS,
//!     show_progress: false,
//! };
//! clip_bag(Path::new("input.bag"), Path::new("clipped.bag"), &options)?;
//! # Ok::<(), bagkit::Error>(())
//! ```

pub mod bag;
pub mod cli;
pub mod clip;
pub mod decode;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod select;
pub mod summary;
pub mod timefilter;
pub mod writer;

pub mod testing;

// Re-export main types for convenience
pub use bag::{BagFile, BagSummary, ChannelInfo};
pub use clip::{ClipOptions, clip_bag};
pub use error::{Error, Result};
pub use extract::{ExtractOptions, Naming, extract_images};
pub use timefilter::{TimeWindow, TimestampMode};
pub use writer::{BagWriter, ConnectionSpec};
