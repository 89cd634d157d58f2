//! stanza server binary: load a directive configuration file, compile
//! it into a middleware chain, and serve it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use stanza::http::server::spawn_reload_on_sighup;
use stanza::observability::logging;
use stanza::{DirectiveRegistry, Server, Shutdown};

#[derive(Parser)]
#[command(name = "stanza", about = "Directive-configured HTTP server")]
struct Args {
    /// Path to the directive configuration file.
    #[arg(default_value = "Stanzafile")]
    config: PathBuf,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("stanza=info");

    let args = Args::parse();
    let source = std::fs::read_to_string(&args.config)?;

    let registry = DirectiveRegistry::standard();
    let server = Arc::new(Server::new(&source, registry)?);
    tracing::info!(config = %args.config.display(), "configuration compiled");

    let listener = TcpListener::bind(&args.listen).await?;

    spawn_reload_on_sighup(server.clone(), args.config.clone());

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.trigger();
        }
    });

    server.run(listener, receiver).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
