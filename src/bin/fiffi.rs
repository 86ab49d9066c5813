use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fiffiscript::{FiffiError, Repl, run_source};

#[derive(Parser)]
#[command(author, version, about = "FiffiScript interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script file, or standard input when no file (or `-`) is given
    Run { script: Option<PathBuf> },
    /// Start an interactive REPL session
    Repl,
    /// Run a program given on the command line
    Eval { source: String },
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let outcome = match args.command.unwrap_or(Command::Run { script: None }) {
        Command::Run { script } => run_script(script),
        Command::Repl => Repl::new().run().map_err(|err| err.render("<repl>", "")),
        Command::Eval { source } => {
            run_source(&source).map_err(|err| err.render("<eval>", &source))
        }
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(path: Option<PathBuf>) -> Result<(), String> {
    let (origin, source) = match path {
        Some(path) if path.as_os_str() != "-" => {
            let origin = path.display().to_string();
            let source = fs::read_to_string(&path)
                .map_err(|err| FiffiError::from(err).render(&origin, ""))?;
            (origin, source)
        }
        _ => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map_err(|err| FiffiError::from(err).render("<stdin>", ""))?;
            ("<stdin>".to_string(), source)
        }
    };
    run_source(&source).map_err(|err| err.render(&origin, &source))
}

/// Installs a stderr subscriber when `FIFFI_LOG` holds filter directives.
fn init_tracing() {
    if let Ok(directives) = std::env::var("FIFFI_LOG") {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::new(directives))
            .init();
    }
}
