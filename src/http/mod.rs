//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one task per connection)
//!     → hyper request, body buffered
//!     → request.rs snapshot + ResponseWriter
//!     → current generation's middleware chain (synchronous)
//!     → hyper response flushed to the client
//! ```

pub mod request;
pub mod server;

pub use request::{Request, ResponseWriter};
pub use server::{Generation, Server};
