//! CLI parse: clap types for Chorus. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Chorus CLI - ask several models at once for commit messages and review summaries
#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(about = "Generate commit messages and review summaries from several backends at once")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (layered over the global and workspace files)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stderr, stdout, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate commit message candidates for the staged diff and commit the chosen one
    Commit(GenerateArgs),
    /// Generate review summaries for the staged diff
    Review(GenerateArgs),
    /// List configured backends
    Backends {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Options shared by `commit` and `review`.
#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Backend to use (repeatable; default: every enabled backend)
    #[arg(long = "backend", short = 'b')]
    pub backends: Vec<String>,

    /// Message style (plain, conventional, gitmoji)
    #[arg(long)]
    pub style: Option<String>,

    /// Output language
    #[arg(long)]
    pub locale: Option<String>,

    /// Candidates requested per backend
    #[arg(long)]
    pub count: Option<usize>,

    /// Maximum subject length
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Ask for a message body as well as a subject
    #[arg(long)]
    pub body: bool,

    /// Extra pathspec to leave out of the diff (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Print the chosen message instead of committing
    #[arg(long)]
    pub dry_run: bool,

    /// Take the first usable candidate without prompting
    #[arg(long, short = 'y')]
    pub yes: bool,
}
