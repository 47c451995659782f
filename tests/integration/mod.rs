//! Integration test modules

pub mod test_utils;

mod cli_routes;
mod config_integration;
mod orchestrator_scenarios;
