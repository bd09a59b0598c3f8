use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bagkit",
    about = "Extract, filter and clip ROS1 bag recordings",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract image topics into per-topic folders of image files
    Images {
        /// A single rosbag, or a folder with rosbags
        #[arg(short, long)]
        input: String,
        /// Output folder
        #[arg(short, long)]
        output: String,
        /// Output image format
        #[arg(short = 'f', long, default_value = "jpg")]
        format: String,
        /// Save img_manifest.json with timestamps and metadata per topic
        #[arg(short, long)]
        manifest: bool,
        /// Topics to extract, comma-separated; defaults to all image topics
        #[arg(short, long)]
        topics: Option<String>,
        /// Naming convention: sequential, rosbag_timestamp or msg_timestamp
        #[arg(short, long, default_value = "sequential")]
        naming: String,
        /// Resize images to width,height (e.g. 800,600)
        #[arg(short, long)]
        resize: Option<String>,
        /// Only extract every n-th message per topic
        #[arg(long)]
        sample: Option<u64>,
        /// Only extract from this time, absolute epoch seconds
        #[arg(long)]
        start_time: Option<f64>,
        /// Only extract until this time, absolute epoch seconds
        #[arg(long)]
        end_time: Option<f64>,
        /// Show a progress bar
        #[arg(long, default_value_t = true)]
        progress: bool,
    },

    /// Write a time/topic-filtered copy of a bag as a new bag
    Clip {
        /// A single rosbag, or a folder with rosbags
        #[arg(short, long)]
        input: String,
        /// Output directory
        #[arg(short, long)]
        output: String,
        /// Topics to keep, comma-separated; defaults to all topics
        #[arg(short, long)]
        topics: Option<String>,
        /// Only keep messages from this time
        #[arg(long)]
        start_time: Option<f64>,
        /// Only keep messages until this time
        #[arg(long)]
        end_time: Option<f64>,
        /// Output bag name, only used for a single input bag
        #[arg(long)]
        name: Option<String>,
        /// How start/end are interpreted: rosbag_ns or offset_s
        #[arg(long, default_value = "rosbag_ns")]
        timestamp_type: String,
        /// Show a progress bar
        #[arg(long, default_value_t = true)]
        progress: bool,
    },

    /// Export bag metadata (topics, counts, time span) as JSON
    Summary {
        /// A single rosbag, or a folder with rosbags
        #[arg(short, long)]
        input: String,
        /// Output folder, or JSON file path
        #[arg(short, long)]
        output: String,
        /// Output file name when --output is a folder
        #[arg(short = 'f', long, default_value = crate::summary::DEFAULT_SUMMARY_FILE_NAME)]
        file_name: String,
    },

    /// List topics, types, message counts and time span of a bag
    Inspect {
        /// Path to the .bag file
        bag: String,
    },
}
