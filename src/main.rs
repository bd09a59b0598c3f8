use std::path::Path;

use anyhow::{Result, anyhow};
use bagkit::cli::{Cli, Commands};
use bagkit::{clip, extract, summary};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

fn parse_resize(resize_str: &str) -> Result<(u32, u32)> {
    let parts: Vec<&str> = resize_str.split(',').collect();
    if parts.len() != 2 {
        return Err(anyhow!(
            "'{resize_str}' is not a valid resize format. Use width,height: e.g. 800,600"
        ));
    }
    let width = parts[0]
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow!("failed to parse width: '{}'", parts[0]))?;
    let height = parts[1]
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow!("failed to parse height: '{}'", parts[1]))?;
    Ok((width, height))
}

fn parse_topics(topics: Option<String>) -> Option<Vec<String>> {
    topics.map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Images {
            input,
            output,
            format,
            manifest,
            topics,
            naming,
            resize,
            sample,
            start_time,
            end_time,
            progress,
        } => {
            let options = extract::ExtractOptions {
                file_format: format,
                topics: parse_topics(topics),
                create_manifest: manifest,
                naming: naming.parse()?,
                resize: match resize {
                    Some(r) => Some(parse_resize(&r)?),
                    None => None,
                },
                sample,
                start_time,
                end_time,
                show_progress: progress,
            };
            extract::run_extract(Path::new(&input), Path::new(&output), &options)?;
            Ok(())
        }
        Commands::Clip {
            input,
            output,
            topics,
            start_time,
            end_time,
            name,
            timestamp_type,
            progress,
        } => {
            let options = clip::ClipOptions {
                topics: parse_topics(topics),
                start_time,
                end_time,
                timestamp_mode: timestamp_type.parse()?,
                show_progress: progress,
            };
            clip::run_clip(
                Path::new(&input),
                Path::new(&output),
                name.as_deref(),
                &options,
            )?;
            Ok(())
        }
        Commands::Summary {
            input,
            output,
            file_name,
        } => {
            summary::export_summary(Path::new(&input), Path::new(&output), &file_name)?;
            Ok(())
        }
        Commands::Inspect { bag } => {
            summary::inspect(Path::new(&bag))?;
            Ok(())
        }
    }
}
