//! Command-line entrypoint.

mod args;
mod errors;

pub use args::{Args, Command};
pub use errors::CliError;
