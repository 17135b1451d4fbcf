mod app;
mod cli;
mod config;
mod db;
mod http;
mod logging;
mod migrate;
mod paths;
mod source;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose);
    app::run(cli).await
}
