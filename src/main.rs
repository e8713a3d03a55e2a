mod cli;
mod engine;
mod message;
mod model;
#[cfg(feature = "tui")]
mod orchestrator;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.json || args.text;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success for headless modes
            if is_headless {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
