use std::process::ExitCode;

use clap::Parser;

use aarch64_lite::assembler;

/// Assemble an AArch64-lite source file into a binary image.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the assembly source file
    source: String,

    /// Path to write the assembled binary image to
    output: String,
}

fn run(args: &Args) -> Result<(), String> {
    let source = std::fs::read_to_string(&args.source).map_err(|e| format!("{}: {e}", args.source))?;
    let image = assembler::assemble(&source).map_err(|e| e.to_string())?;
    std::fs::write(&args.output, image).map_err(|e| format!("{}: {e}", args.output))
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("assemble: {message}");
            ExitCode::FAILURE
        }
    }
}
