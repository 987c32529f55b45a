use std::fmt;

use clap::ValueEnum;
use console::style;
#[cfg(feature = "sqlite")]
use relay_core::SqliteStore;
use relay_core::{MemoryStore, ServerOptions, StoreError, server::start_server};

use crate::Context;

/// Default request body limit (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum RunCommandError {
    #[error("Failed to open store at {0}: {1}")]
    OpenStore(String, StoreError),
    #[error("Failed to start relay server: {0}")]
    Serve(std::io::Error),
    #[error("Store backend '{0}' is not compiled into this binary")]
    Unsupported(StoreBackend),
}

/// Which ordered store backs the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Process-local, lost on restart
    Memory,
    /// SQLite database file
    Sqlite,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct RunCommand {
    /// Host to bind the server to
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to run the server on
    #[arg(long, env = "RELAY_PORT", default_value = "8082")]
    pub port: u16,

    /// Ordered store backend
    #[arg(long, env = "RELAY_STORE", value_enum, default_value_t = StoreBackend::Sqlite)]
    pub store: StoreBackend,

    /// SQLite database file (ignored by the memory store)
    #[arg(long, env = "RELAY_DATABASE_URL", default_value = "relay.db")]
    pub database_url: String,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "RELAY_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl RunCommand {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            host: self.host.clone(),
            port: self.port,
            max_body_bytes: self.max_body_bytes,
        }
    }

    pub async fn execute(&self, ctx: &Context) -> Result<(), RunCommandError> {
        println!();
        println!("{}", style("Relay").green());
        println!("{}", style("Starting relay server").dim());
        println!();

        if let Some(env_file) = &ctx.env_file {
            println!("{} {}", style("Env").dim(), env_file.display());
        }
        println!("{} {}", style("Store").dim(), self.store);
        if self.store == StoreBackend::Sqlite {
            println!("{} {}", style("Database").dim(), self.database_url);
        }
        println!("{} {}", style("Port").dim(), self.port);
        println!();

        println!("{}", style("Endpoints").dim());
        println!(
            "  POST http://localhost:{}/v1/qs/{{namespace}}/{{key}}",
            self.port
        );
        println!(
            "  GET  http://localhost:{}/v1/qs/{{namespace}}/{{key}}?next={{cursor}}",
            self.port
        );
        println!("  GET  http://localhost:{}/health", self.port);
        println!();
        println!("{}", style("Press Ctrl+C to stop").dim());
        println!();

        let options = self.server_options();
        match self.store {
            StoreBackend::Memory => start_server(MemoryStore::new(), options)
                .await
                .map_err(RunCommandError::Serve),
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite => {
                let store = SqliteStore::open(&self.database_url)
                    .map_err(|e| RunCommandError::OpenStore(self.database_url.clone(), e))?;
                start_server(store, options)
                    .await
                    .map_err(RunCommandError::Serve)
            }
            #[cfg(not(feature = "sqlite"))]
            StoreBackend::Sqlite => Err(RunCommandError::Unsupported(self.store)),
        }
    }
}
