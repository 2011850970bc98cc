mod report;

use clap::Parser;
use framex::{reduce_history_with, Action, ReduceConfig};
use report::render_summary;
use std::error::Error;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Command line options.
#[derive(Parser, Debug)]
#[command(name = "framex")]
#[command(about = "Reduce a frame edit log into resolved positions")]
struct Options {
    /// Action log in JSON, `-` for standard input
    history: String,

    /// Print the reduced entity set as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// JSON file overriding tolerances and thresholds
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Read the action log from a file, or from stdin when `path` is `-`.
fn read_source(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let options = Options::parse();

    // Logs go to stderr so `--json` output stays machine readable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if options.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config: ReduceConfig = match &options.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ReduceConfig::default(),
    };
    let history: Vec<Action> = serde_json::from_str(&read_source(&options.history)?)?;
    info!(actions = history.len(), source = %options.history, "loaded action log");

    let set = reduce_history_with(&history, &config)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&set)?);
    } else {
        print!("{}", render_summary(&set, config.side_mount_offset));
    }

    Ok(())
}
