//! Scenario-based tests for frontend-boost

mod helpers;

mod build_outputs;
mod config_to_build;
mod failure_isolation;
mod watch_mode;
