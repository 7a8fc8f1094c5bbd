use clap::Parser;
use parley::cli;
use parley::core::config::{self, ResolvedConfig};
use parley::core::normalize::normalize;
use parley::core::transcript;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parley", about = "Streaming chat client for UI message stream endpoints")]
struct Args {
    /// Chat endpoint URL (overrides PARLEY_ENDPOINT and the config file)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Resume a saved conversation (canonical or legacy JSON)
    #[arg(long, value_name = "PATH")]
    history: Option<PathBuf>,

    /// Start with no messages at all, not even the system prompt
    #[arg(long, conflicts_with = "history")]
    empty: bool,

    /// Write the conversation here on exit
    #[arg(long, value_name = "PATH")]
    save: Option<PathBuf>,
}

fn load_config(args: &Args) -> std::io::Result<ResolvedConfig> {
    let file_config = config::load_config().map_err(std::io::Error::other)?;
    Ok(config::resolve(&file_config, args.endpoint.as_deref()))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to parley.log in current directory
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create("parley.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let config = load_config(&args)?;
    log::info!("Parley starting up against {}", config.endpoint);

    let history = match &args.history {
        Some(path) => {
            let initial = transcript::load(path).map_err(std::io::Error::other)?;
            normalize(Some(initial))
        }
        None if args.empty => Some(Vec::new()),
        None => None,
    };

    cli::run(&config, history, args.save)
}
