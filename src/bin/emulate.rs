use std::fs::File;
use std::io::{self, BufWriter};
use std::process::ExitCode;

use clap::Parser;
use clap_num::maybe_hex;

use aarch64_lite::cpu::Cpu;
use aarch64_lite::executor::{Executor, HALT_WORD};

/// Run a binary AArch64-lite image to completion.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the binary image to load at address 0
    input: String,

    /// Path to write the final register/memory dump to (defaults to stdout)
    #[arg(short, long)]
    dump: Option<String>,

    /// Trace every fetched instruction to stderr from the start
    #[arg(short, long)]
    trace: bool,

    /// Enable instruction tracing once this program counter is reached
    /// (use 0x prefix for hexadecimal)
    #[arg(short = 'b', long, value_parser=maybe_hex::<u64>)]
    pc_breakpoint: Option<u64>,

    /// After halting, print the 8-word memory region starting from this
    /// address (use 0x prefix for hexadecimal)
    #[arg(short, long, value_parser=maybe_hex::<u64>)]
    memory: Option<u64>,
}

fn print_memory(cpu: &Cpu, base: u64) -> Result<(), String> {
    println!("Memory:");
    for n in 0..8u64 {
        let addr = base + 4 * n;
        let word = cpu.read_mem(addr, false).map_err(|e| e.to_string())?;
        println!("0x{addr:x}: 0x{word:08x}");
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), String> {
    let bytes = std::fs::read(&args.input).map_err(|e| format!("{}: {e}", args.input))?;

    let mut cpu = Cpu::new();
    cpu.load_image(&bytes).map_err(|e| e.to_string())?;

    loop {
        let pc = cpu.pc();
        let word = cpu.fetch_word(pc).map_err(|e| e.to_string())?;
        if word == HALT_WORD {
            break;
        }
        if args.pc_breakpoint == Some(pc) {
            log::set_max_level(log::LevelFilter::Trace);
        }
        Executor::new(&mut cpu).step().map_err(|e| e.to_string())?;
    }

    if let Some(base) = args.memory {
        print_memory(&cpu, base)?;
    }

    match &args.dump {
        Some(path) => {
            let file = File::create(path).map_err(|e| format!("{path}: {e}"))?;
            cpu.dump(BufWriter::new(file)).map_err(|e| e.to_string())
        }
        None => cpu.dump(io::stdout().lock()).map_err(|e| e.to_string()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.trace && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "trace");
    }
    env_logger::init();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("emulate: {message}");
            ExitCode::FAILURE
        }
    }
}
