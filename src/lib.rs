//! stanza: a directive-configured, extensible HTTP server.
//!
//! A configuration file is a sequence of directives. Each directive
//! owns its own small grammar and compiles to one middleware; the
//! compiled middlewares fold into a chain of handlers that each wrap
//! the next. The built-in `errors` directive is the worked example:
//! it recovers from failures in the chain it wraps, serves configured
//! error pages by status code, and writes a rotating diagnostic log.
//!
//! # Architecture
//! ```text
//! config text ─▶ config::tokenizer ─▶ config::compiler ─▶ setup fns
//!                                                            │
//!                          middleware constructors ◀─────────┘
//!                                     │
//!                      middleware::assemble (fold, first wraps outermost)
//!                                     │
//!                   http::Server { ArcSwap<Generation> }
//!                                     │
//!          request ─▶ chain.handle(&Request, &mut ResponseWriter)
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod middleware;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{compile, compile_file, ConfigError, DirectiveRegistry};
pub use http::{Request, ResponseWriter, Server};
pub use lifecycle::Shutdown;
pub use middleware::{assemble, Handler, HandlerError, HandlerResult, Middleware};
