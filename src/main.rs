mod app;
mod cli;
mod config;
mod git;
mod logging;
mod workflow;

use anyhow::Result;
use clap::Parser;
use std::io::Write;

use crate::app::App;
use crate::cli::Cli;

fn main() -> Result<()> {
    color_eyre::install().ok();
    logging::setup_logger();

    let cli = Cli::parse();
    let config = config::load_config();

    let result = App::new(&cli, &config).and_then(|app| app.run(cli.command));

    match result {
        Ok(output) => {
            std::io::stdout().write_all(output.as_bytes())?;
            Ok(())
        }
        Err(e) => {
            eprintln!("mdreview: {e:#}");
            std::process::exit(1);
        }
    }
}
