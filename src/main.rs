//! Main entry point for passview.

use clap::Parser;
use passview::cli::Cli;
use passview::utils::error_exit;

fn main() {
    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    // Clean up any scratch files left behind by previous sessions
    let _ = passview::secure_temp::cleanup_old_scratch_files();

    let cli = Cli::parse();
    if let Err(e) = cli.execute() {
        error_exit(&e.to_string(), 1);
    }
}
