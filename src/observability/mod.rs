//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Process events:
//!     all subsystems → tracing events → logging.rs (subscriber setup)
//!
//! Request diagnostics:
//!     errors middleware → rolling.rs (serialized, size-rotated log)
//! ```
//!
//! # Design Decisions
//! - Process tracing and the per-request diagnostic log are separate:
//!   the former is operator telemetry, the latter a data artifact with
//!   rotation semantics of its own
//! - Diagnostic log failures never propagate into request handling

pub mod logging;
pub mod rolling;

pub use rolling::DiagnosticLog;
