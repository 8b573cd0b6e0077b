use clap::Parser;

use kaleido::cli::{self, CliArgs};
use kaleido::logger;

fn main() -> std::process::ExitCode {
    // Session log (overwrites previous session log)
    logger::init();
    cli::run(CliArgs::parse())
}
