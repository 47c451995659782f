//! CLI command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name string for log fields (e.g. "commit", "backends").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Commit(_) => "commit",
        Commands::Review(_) => "review",
        Commands::Backends { .. } => "backends",
    }
}
