//! CLI domain: parse, route, help, output, and presentation only.
//! No orchestration logic; a single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands, GenerateArgs};
pub use presentation::{
    format_backend_list_json, format_backend_list_text, format_dispatch_banner,
    format_live_choice, format_run_summary, selection_items,
};
pub use route::RunContext;
