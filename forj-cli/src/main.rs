//! Forj CLI - script runner and REPL
//!
//! A thin wrapper around forj-core. With a file argument the program is run
//! to completion (detached threads included) and the final stack printed;
//! without one an interactive session starts.

mod repl;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use forj_core::{Config, Interpreter, StdoutOutput};

#[derive(Parser, Debug)]
#[command(name = "forj", version)]
#[command(about = "Run Forj programs or start an interactive session")]
struct Args {
    /// Program file to run; starts the REPL when omitted
    file: Option<PathBuf>,

    /// Arena size in bytes
    #[arg(long = "heap-size")]
    heap_size: Option<usize>,

    /// Byte written over freed arena blocks
    #[arg(long = "poison")]
    poison: Option<u8>,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(size) = self.heap_size {
            config = config.with_heap_size(size);
        }
        if let Some(poison) = self.poison {
            config = config.with_poison(poison);
        }
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let config = args.config();
    log::debug!("arena of {} bytes", config.arena.heap_size);

    match &args.file {
        Some(path) => {
            if !run_file(path, config)? {
                process::exit(1);
            }
            Ok(())
        }
        None => repl::run_repl(config),
    }
}

// Returns false when the program stopped on an error
fn run_file(path: &Path, config: Config) -> Result<bool, Box<dyn std::error::Error>> {
    let source = fs::read_to_string(path)?;
    let mut interp = Interpreter::with_config(config)?;
    interp.set_output(Box::new(StdoutOutput::new()));

    let outcome = interp
        .execute_string(&source)
        .and_then(|diagnostics| {
            for d in &diagnostics {
                eprintln!("{}: {}", path.display(), d);
            }
            interp.run_until_idle()
        });

    match outcome {
        Ok(0) => {}
        Ok(stuck) => eprintln!("{}: {} threads blocked forever", path.display(), stuck),
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            return Ok(false);
        }
    }

    let stack = interp.stack_text();
    if !stack.is_empty() {
        println!("{}", stack.join(" "));
    }
    Ok(true)
}
