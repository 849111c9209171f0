use std::path::PathBuf;

use bandwidth_hero_proxy::compression::{
    ChainSettings, CompressionPolicy, CompressionRequest, FallbackChain, Outcome,
};
use bandwidth_hero_proxy::config::{load_config, CompressionConfig};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(name = "squeeze-cli")]
#[command(about = "Run the bandwidth-hero compressor on local files", long_about = None)]
struct Cli {
    /// Proxy config file; compression settings are taken from it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file through the fallback chain
    Compress {
        input: PathBuf,

        /// Where to write the result; omitted means report only
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quality 1-100
        #[arg(short = 'l', long)]
        quality: Option<u8>,

        /// Produce WebP instead of JPEG
        #[arg(long)]
        webp: bool,

        /// Keep color
        #[arg(long)]
        color: bool,
    },
    /// Show whether the proxy would attempt to compress a payload
    Policy {
        content_type: String,
        size: usize,

        #[arg(long)]
        bypass: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let compression = match &cli.config {
        Some(path) => load_config(path)?.compression,
        None => CompressionConfig::default(),
    };

    match cli.command {
        Commands::Compress {
            input,
            output,
            quality,
            webp,
            color,
        } => {
            let source = Bytes::from(std::fs::read(&input)?);
            let original_size = source.len();
            let mut settings = ChainSettings::from(&compression);
            settings.webp_enabled = webp;

            let request = CompressionRequest::new(
                source,
                webp,
                !color,
                quality.unwrap_or(compression.default_quality),
                original_size,
            );
            let result = FallbackChain::new(settings).compress(&request);

            if let Some(path) = &output {
                std::fs::write(path, &result.output)?;
            }

            let (strategy, quality) = match &result.outcome {
                Outcome::Transformed { strategy, quality } => {
                    (Some(strategy.as_str()), Some(*quality))
                }
                Outcome::Degraded(_) => (None, None),
            };
            let report = json!({
                "input": input.display().to_string(),
                "output": output.map(|p| p.display().to_string()),
                "outcome": result.outcome.label(),
                "strategy": strategy,
                "quality": quality,
                "content_type": result.headers.content_type,
                "original_size": result.headers.original_size,
                "output_size": result.headers.content_length,
                "bytes_saved": result.headers.bytes_saved,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Policy {
            content_type,
            size,
            bypass,
        } => {
            let policy = CompressionPolicy::from(&compression);
            let report = json!({
                "content_type": content_type,
                "size": size,
                "bypass": bypass,
                "compress": policy.should_compress(Some(&content_type), size, bypass),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
