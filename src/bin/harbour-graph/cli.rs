//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// harbour-graph - Build and inspect Harbour package graphs
#[derive(Parser)]
#[command(name = "harbour-graph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a graph file and report the result
    Check(CheckArgs),

    /// Display the package dependency tree
    Tree(TreeArgs),

    /// Show the test modules associated with each executable
    Tests(TestsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Inputs shared by every command that loads a graph.
#[derive(Args)]
pub struct GraphArgs {
    /// Graph file (TOML) listing the loaded manifests
    pub file: PathBuf,

    /// Traits to enable on the root packages (comma separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "all_traits")]
    pub traits: Vec<String>,

    /// Enable every trait of the root packages
    #[arg(long)]
    pub all_traits: bool,

    /// Only build what these root products need
    #[arg(long)]
    pub product: Vec<String>,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Emit the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Maximum depth to display
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Show the modules of each package
    #[arg(long)]
    pub modules: bool,
}

#[derive(Args)]
pub struct TestsArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Emit the mapping as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
