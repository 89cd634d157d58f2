//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config text (directive language)
//!     → tokenizer.rs (token stream with line positions)
//!     → compiler.rs (slice per directive, Cursor per instance)
//!     → registry.rs setup functions (validate, capture config)
//!     → Vec<CompiledDirective> (ordered middleware constructors)
//!     → middleware::assemble → one immutable chain per generation
//!
//! On reload:
//!     new text compiles completely or not at all
//!     → atomic swap of the generation; the old chain keeps serving
//!       its in-flight requests until the last one finishes
//! ```
//!
//! # Design Decisions
//! - Compilation is pure: (source, registry) in, chain out; no globals
//! - Validation happens entirely at setup time; static
//!   misconfiguration never surfaces at request time
//! - The `log` clause (roller.rs) is a shared sub-grammar with no
//!   knowledge of the directive using it

pub mod compiler;
pub mod cursor;
pub mod registry;
pub mod roller;
pub mod tokenizer;

pub use compiler::{compile, compile_file, CompiledDirective, ConfigError};
pub use cursor::{Cursor, CursorError};
pub use registry::{DirectiveRegistry, SetupFn};
pub use roller::{LogClause, RollPolicy};
