//! CLI presentation: live choice rendering, run summaries and backend listings.

mod backends;
mod choices;

pub use backends::{format_backend_list_json, format_backend_list_text};
pub use choices::{
    format_dispatch_banner, format_live_choice, format_run_summary, selection_items,
};
