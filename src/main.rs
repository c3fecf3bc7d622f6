mod cli;
mod config;
mod environment;
mod error;
mod model;
mod orchestrator;
mod process;
mod report;
#[cfg(test)]
mod testing;

use clap::Parser;

/// Diagnostics go to stderr, filtered by `RUST_LOG`; stage messages are not logs.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = cli::Cli::parse();
    init_tracing();

    match cli::run(args).await {
        // The application's exit code becomes ours.
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(cli::FATAL_EXIT_CODE);
        }
    }
}
