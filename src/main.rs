mod denoiser;

use clap::Parser;
use denoiser::Args;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = denoiser::run(&args) {
        eprintln!("\x1b[1;31mError:\x1b[0m {e}");
        std::process::exit(1);
    }
}
