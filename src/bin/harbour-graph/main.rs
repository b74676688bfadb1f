//! harbour-graph CLI - inspect Harbour package graphs

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use harbour_graph::ModulesGraphError;

mod cli;
mod commands;
mod fixture;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli, color) {
        match e.downcast_ref::<ModulesGraphError>() {
            Some(err) => eprint!("{}", err.to_diagnostic().format(color)),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, color: bool) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("harbour_graph=debug")
    } else {
        EnvFilter::new("harbour_graph=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Check(args) => commands::check::execute(args, color),
        Commands::Tree(args) => commands::tree::execute(args, color),
        Commands::Tests(args) => commands::tests::execute(args, color),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
