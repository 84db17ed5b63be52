//! CLI interface for the parser generator.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "generator")]
#[command(about = "Build an LL(1) parse-table artifact from a BNF grammar")]
#[command(version)]
pub struct Cli {
    /// Grammar source file.
    pub grammar: PathBuf,

    /// Output artifact path.
    #[arg(short, long, default_value = "a.bin")]
    pub output: PathBuf,

    /// Also write a listing of nonterminal-id constants.
    #[arg(long)]
    pub header: Option<PathBuf>,

    /// Start nonterminal of the grammar.
    #[arg(long, default_value = "Start")]
    pub start: String,

    /// Iteration cap for the grammar transformation pipeline.
    #[arg(long, default_value_t = 256)]
    pub max_iterations: usize,
}
