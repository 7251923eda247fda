//! Main entry point for the gencontainer CLI tool

use clap::Parser;
use colored::Colorize;
use gencontainer::cli::{Args, init_logging, run_cli};

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run_cli(args) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
