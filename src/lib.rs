//! Chorus: Concurrent Multi-Backend Generation
//!
//! Sends one diff to several text-generation backends at once, turns each reply into
//! validated commit-message or review candidates, and streams them into a live choice
//! list while the slower backends are still working.

pub mod backend;
pub mod choice;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod sink;
pub mod transport;
pub mod types;
