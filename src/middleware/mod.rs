//! Request-handling middleware.
//!
//! # Data Flow
//! ```text
//! compiled directives (ordered middleware constructors)
//!     → chain.rs (fold from the end: each handler owns its `next`)
//!     → Arc<dyn Handler> (one immutable chain per generation)
//!     → handle(request, response) per request
//! ```
//!
//! # Design Decisions
//! - One-method Handler trait; composition over any handler hierarchy
//! - A constructor is a pure function of `next`; all directive data
//!   was captured at setup time
//! - Handlers are shared across request tasks, so they take `&self`
//!   and keep per-request state on the stack

pub mod chain;
pub mod errors;

use std::sync::Arc;

use crate::http::{Request, ResponseWriter};

pub use chain::{assemble, NotFound};

/// Failures a handler may propagate. The errors middleware is the
/// designated recovery boundary: anything the chain inside it returns
/// or panics with is converted to a 500 there and goes no further.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

/// Status code reported upstream, or a failure for an upstream
/// recovery boundary to absorb.
pub type HandlerResult = Result<u16, HandlerError>;

/// One unit in the request-processing chain. A handler may fully
/// service the request, delegate to its `next`, or both.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &Request, res: &mut ResponseWriter) -> HandlerResult;
}

/// A middleware: constructor from the next handler to a handler that
/// wraps it.
pub type Middleware = Box<dyn Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync>;
