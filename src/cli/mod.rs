// VehicleDetect 🚀 AGPL-3.0 License

//! CLI module for the train and predict commands.
//!
//! This module contains the command-line interface logic, including argument
//! parsing and the subcommand implementations.

/// CLI arguments.
pub mod args;

/// Logging macros and verbosity state.
pub mod logging;

/// Prediction command.
pub mod predict;

/// Training command.
pub mod train;
