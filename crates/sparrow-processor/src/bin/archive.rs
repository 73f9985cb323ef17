//! Manual stream archiving binary.
//!
//! Snapshots the current HLS window into the archive, like the automatic
//! detection-triggered archive but on demand:
//!
//! ```text
//! sparrow-archive [--limit N]
//! ```
//!
//! Omitting `--limit` keeps the trailing 15 segments; `--limit none` keeps
//! the whole window.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sparrow_processor::{ArchivePrefix, ProcessorConfig, StreamArchiver};

const DEFAULT_LIMIT: usize = 15;

fn parse_args() -> Result<Option<usize>> {
    let mut args = std::env::args().skip(1);
    let mut limit = Some(DEFAULT_LIMIT);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--limit" => {
                let value = args.next().context("--limit requires a value")?;
                limit = match value.to_lowercase().as_str() {
                    "none" | "" => None,
                    v => {
                        let n: usize = v
                            .parse()
                            .with_context(|| format!("Invalid limit '{}'", v))?;
                        if n == 0 {
                            bail!("Segment limit must be positive");
                        }
                        Some(n)
                    }
                };
            }
            other => bail!("Unknown argument '{}'", other),
        }
    }

    Ok(limit)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sparrow=info".parse().unwrap()))
        .init();

    let limit = parse_args()?;
    let config = ProcessorConfig::from_env();

    let archiver = StreamArchiver::new(config.stream_dir(), &config.archive_dir);
    let destination = archiver
        .archive(ArchivePrefix::Manual, limit, None)
        .await
        .context("Archiving failed")?;

    info!(destination = %destination.display(), "Archive complete");
    Ok(())
}
