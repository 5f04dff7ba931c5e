use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rerum-core", about = "Versioned annotation store: cache, invalidation, and lineage core")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}
