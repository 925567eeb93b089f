use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sluice::blob::{remove_partial, BoundedExtractor};
use sluice::common::{ExtractPolicy, RequestContext, Settings, Strategy};
use sluice::compiler::{analyze_connectors, Project};
use sluice::drivers::DriverRegistry;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file; defaults to `SLUICE_CONFIG_PATH` or `config/default.toml`.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the connectors a compiled project depends on, as JSON.
    Analyze {
        /// Compiled project in JSON form.
        project: PathBuf,
    },
    /// Download a bounded sample of a parquet object, or of every parquet
    /// object under a prefix.
    Extract {
        /// Object URL or local path. A location not ending in `.parquet` is
        /// treated as a prefix.
        location: String,
        /// Output file, or output directory for a prefix.
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = StrategyArg::Head)]
        strategy: StrategyArg,
        /// Byte budget per file; 0 copies files whole.
        #[arg(long, default_value_t = 0)]
        limit_bytes: u64,
        #[arg(long, value_enum)]
        files_strategy: Option<StrategyArg>,
        #[arg(long, default_value_t = 0)]
        files_limit: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Head,
    Tail,
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Head => Strategy::Head,
            StrategyArg::Tail => Strategy::Tail,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::from_path(path)?,
        None => Settings::new()?,
    };

    let ctx = RequestContext::new();
    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match args.command {
        Command::Analyze { project } => {
            let data = std::fs::read_to_string(&project)?;
            let project = Project::from_json(&data)?;
            let registry = DriverRegistry::with_builtin();
            let connectors = analyze_connectors(&ctx, &project, &registry, &settings.analyze).await?;
            println!("{}", serde_json::to_string_pretty(&connectors)?);
        }
        Command::Extract { location, out, strategy, limit_bytes, files_strategy, files_limit } => {
            let (store, path) = sluice::open_location(&location)?;
            let policy = ExtractPolicy {
                rows_strategy: if limit_bytes > 0 { strategy.into() } else { Strategy::Unspecified },
                rows_limit_bytes: limit_bytes,
                files_strategy: files_strategy.map(Strategy::from).unwrap_or_default(),
                files_limit,
            };
            let extractor = BoundedExtractor::new(store, settings.extract.clone());

            if path.extension() == Some("parquet") {
                let file = File::create(&out)?;
                let res = extractor.download(&ctx, &path, &policy, file).await;
                if let Err(err) = res {
                    remove_partial(&out);
                    return Err(err.into());
                }
                info!(out = %out.display(), "extracted");
            } else {
                std::fs::create_dir_all(&out)?;
                let written = extractor.download_prefix(&ctx, &path, &policy, &out).await?;
                info!(files = written.len(), out = %out.display(), "extracted");
            }
        }
    }
    Ok(())
}
