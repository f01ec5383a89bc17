//! CLI module - Command-line interface for the application.
//!
//! Provides commands for:
//! - `serve` - Start the HTTP server
//! - `migrate` - Database migrations
//! - `user` - Account management without the HTTP layer

pub mod args;

pub use args::{Cli, Commands};
