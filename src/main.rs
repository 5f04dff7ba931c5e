use std::sync::Arc;

use clap::Parser;

use rerum_core::cli::{Args, Command, CliError};
use rerum_core::http_server::{serve, HttpConfig};
use rerum_core::observability::{Logger, Severity};
use rerum_core::store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    match args.command {
        Command::Serve { port } => {
            let mut config = HttpConfig::from_env().map_err(|e| CliError::Config(e.to_string()))?;
            if let Some(port) = port {
                config.port = port;
            }
            Logger::log(Severity::Info, "starting", &[("workers", &config.worker_count.to_string())]);
            let store = Arc::new(InMemoryStore::new());
            serve(config, store).await?;
        }
    }
    Ok(())
}
