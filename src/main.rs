use argh::FromArgs;
use pipeshell::Interpreter;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(FromArgs)]
/// Interactive shell with pipelines, redirections and $NAME expansion.
/// Reads commands from standard input until end of input or `exit`.
struct Args {
    #[argh(switch, short = 'V')]
    /// print version information and exit
    version: bool,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    if args.version {
        println!("pipeshell {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    // Respects RUST_LOG; stays quiet below warnings otherwise.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pipeshell: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let mut reader = pipeshell::reader::stdio_reader()?;
    Interpreter::default().repl(reader.as_mut())
}
