//! The `generator` binary: grammar file in, binary artifact out.

mod cli;

use clap::Parser;
use cli::Cli;
use lltab::BuildOptions;
use std::fs;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let source = fs::read_to_string(&cli.grammar)
        .map_err(|e| format!("cannot read {}: {e}", cli.grammar.display()))?;

    let options = BuildOptions {
        max_iterations: cli.max_iterations,
    };
    let artifact = lltab::compile_with_options(&source, &cli.start, &options)
        .map_err(|e| e.to_string())?;

    let bytes = artifact.encode().map_err(|e| e.to_string())?;
    fs::write(&cli.output, bytes)
        .map_err(|e| format!("cannot write {}: {e}", cli.output.display()))?;

    if let Some(header) = &cli.header {
        let mut listing = String::new();
        for (id, name) in artifact.non_terminal_names.iter().enumerate() {
            listing.push_str(&format!("pub const {name}: usize = {id};\n"));
        }
        fs::write(header, listing)
            .map_err(|e| format!("cannot write {}: {e}", header.display()))?;
    }
    Ok(())
}
