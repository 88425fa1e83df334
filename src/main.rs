//! CLI entry point for representativity analysis of segmented images

use clap::Parser;
use representativity::io::cli::{Cli, FileProcessor};

fn main() -> representativity::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();
    let mut processor = FileProcessor::new(cli)?;
    processor.process()?;
    Ok(())
}
