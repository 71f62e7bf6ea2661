/// Litmus CLI
///
/// Runs the fenced code examples of markdown documents, reports block and
/// assertion results, and with `--update` writes the results back as comments.
use clap::Parser;
use litmus_core::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

/// Interpreter recursion runs on worker threads; give them room
const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose() { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(WORKER_STACK_SIZE)
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    match runtime.block_on(cli::run_cli_with_args(cli)) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
