/// Resumable CLI
///
/// Checks template files, starts computations from them and drives them one
/// control operation at a time, saving and restoring snapshots in between.

use resumable_core::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
