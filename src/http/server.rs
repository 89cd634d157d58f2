//! HTTP server and configuration generations.
//!
//! # Responsibilities
//! - Accept connections, one tokio task per connection
//! - Adapt hyper requests to the chain's buffered model
//! - Hold the current configuration generation and swap it atomically
//!   on reload
//!
//! # Design Decisions
//! - A generation is an `Arc`: requests clone it on dispatch, so a
//!   reload never disturbs in-flight requests and the old chain (and
//!   its log handle) is released when the last of them finishes
//! - The chain runs synchronously inside `spawn_blocking`; handler
//!   file I/O never stalls the reactor
//! - A failed reload leaves the serving generation untouched

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::config::{compile, ConfigError, DirectiveRegistry};
use crate::http::request::{Request, ResponseWriter};
use crate::middleware::{assemble, Handler, NotFound};

/// Largest request body the host buffers for the chain.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// One immutable, fully assembled chain plus its resources. Valid
/// until the next successful reload.
pub struct Generation {
    pub chain: Arc<dyn Handler>,
}

/// Directive-configured HTTP server.
pub struct Server {
    registry: DirectiveRegistry,
    generation: ArcSwap<Generation>,
}

impl Server {
    /// Compile `source` against `registry` and stand up the first
    /// generation. A compile error means no server.
    pub fn new(source: &str, registry: DirectiveRegistry) -> Result<Self, ConfigError> {
        let generation = build_generation(source, &registry)?;
        Ok(Self {
            registry,
            generation: ArcSwap::from_pointee(generation),
        })
    }

    /// Compile a replacement generation and swap it in. On error the
    /// current generation keeps serving.
    pub fn reload(&self, source: &str) -> Result<(), ConfigError> {
        let generation = build_generation(source, &self.registry)?;
        self.generation.store(Arc::new(generation));
        tracing::info!("configuration reloaded, new generation serving");
        Ok(())
    }

    /// Snapshot of the generation serving right now.
    pub fn current(&self) -> Arc<Generation> {
        self.generation.load_full()
    }

    /// Accept connections until the shutdown signal fires. In-flight
    /// connections finish on their own tasks.
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> io::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "HTTP server listening");

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::error!(error = %err, "accept failed");
                        continue;
                    }
                },
                _ = shutdown.recv() => break,
            };

            let server = self.clone();
            tokio::spawn(async move {
                serve_client(server, stream, peer).await;
            });
        }

        tracing::info!("HTTP server stopped accepting connections");
        Ok(())
    }
}

fn build_generation(
    source: &str,
    registry: &DirectiveRegistry,
) -> Result<Generation, ConfigError> {
    let stack = compile(source, registry)?;
    tracing::debug!(directives = stack.len(), "configuration compiled");
    let chain = assemble(stack, Arc::new(NotFound));
    Ok(Generation { chain })
}

async fn serve_client(server: Arc<Server>, stream: TcpStream, peer: SocketAddr) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let server = server.clone();
        async move { Ok::<_, Infallible>(dispatch(server, peer, req).await) }
    });

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        tracing::debug!(peer = %peer, error = %err, "connection ended with error");
    }
}

/// Buffer the request, run the chain of the current generation on a
/// blocking thread, and flush whatever the chain wrote.
async fn dispatch(
    server: Arc<Server>,
    peer: SocketAddr,
    req: hyper::Request<Incoming>,
) -> hyper::Response<Full<Bytes>> {
    let generation = server.current();
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return bare_response(StatusCode::PAYLOAD_TOO_LARGE),
    };

    let request = Request {
        method: parts.method,
        uri: parts.uri,
        version: parts.version,
        headers: parts.headers,
        remote_addr: peer,
        body,
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let mut res = ResponseWriter::new();
        let result = generation.chain.handle(&request, &mut res);
        (result, res)
    })
    .await;

    match outcome {
        Ok((result, res)) => {
            let fallback = match result {
                Ok(status) => status,
                Err(err) => {
                    // Only reachable when no recovery middleware wraps
                    // the failing handler.
                    tracing::error!(error = %err, "unhandled chain error");
                    500
                }
            };
            let (status, headers, body) = res.into_parts();
            let code = StatusCode::from_u16(status.unwrap_or(fallback))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = hyper::Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = code;
            *response.headers_mut() = headers;
            response
        }
        Err(err) => {
            tracing::error!(error = %err, "chain task failed");
            bare_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn bare_response(status: StatusCode) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Re-read the configuration file and swap generations on SIGHUP.
/// On non-Unix platforms signal-driven reload is unavailable;
/// `Server::reload` remains callable directly.
pub fn spawn_reload_on_sighup(server: Arc<Server>, config_path: PathBuf) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(err) => {
                tracing::error!(error = %err, "failed to register SIGHUP handler");
                return;
            }
        };
        loop {
            sighup.recv().await;
            tracing::info!(path = %config_path.display(), "SIGHUP received, reloading");
            let reloaded = std::fs::read_to_string(&config_path)
                .map_err(ConfigError::from)
                .and_then(|source| server.reload(&source));
            if let Err(err) = reloaded {
                tracing::error!(error = %err, "reload failed, keeping current generation");
            }
        }
    });

    #[cfg(not(unix))]
    {
        let _ = (server, config_path);
        tracing::warn!("signal-driven reload is only supported on Unix");
    }
}
