//! Shared `log` clause sub-grammar.
//!
//! Any directive that writes a diagnostic log accepts the same clause:
//!
//! ```text
//! log <file> [{
//!     size <megabytes>
//!     age  <days>
//!     keep <count>
//! }]
//! ```
//!
//! The parser here has no knowledge of the calling directive; it is
//! invoked with a cursor positioned just after the `log` keyword and
//! consumes the file argument plus the optional rotation block.

use crate::config::compiler::ConfigError;
use crate::config::cursor::{Cursor, CursorError};

/// Rotation limits for one log file. Either wholly absent (plain
/// append-only log) or fully populated, with 0 meaning "no limit" on
/// that axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollPolicy {
    /// The file the policy governs.
    pub filename: String,
    /// Max size in megabytes before the file is rotated out.
    pub max_size_mb: u64,
    /// Max age in days before a rotated backup is deleted.
    pub max_age_days: u64,
    /// Max number of rotated backups retained.
    pub max_backups: u64,
    /// Whether backup timestamps use local time rather than UTC.
    pub local_time: bool,
}

impl RollPolicy {
    fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            max_size_mb: 0,
            max_age_days: 0,
            max_backups: 0,
            local_time: true,
        }
    }
}

/// A parsed `log` clause: destination plus optional rotation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogClause {
    pub file: String,
    pub roller: Option<RollPolicy>,
}

/// Parse `<file> [{ size N age N keep N }]`, the tail of a `log`
/// clause. `roller` stays `None` when no block is present.
pub fn parse_log_clause(c: &mut Cursor) -> Result<LogClause, ConfigError> {
    let file = match c.next_arg() {
        Some(token) => token.text.clone(),
        None => return Err(c.validation_err("log expects a file argument")),
    };

    let roller = match c.next_block() {
        Ok(mut block) => Some(parse_roll_options(&mut block, &file)?),
        Err(CursorError::NoBlock) => None,
        Err(err) => return Err(c.validation_err(err.to_string())),
    };

    Ok(LogClause { file, roller })
}

fn parse_roll_options(block: &mut Cursor, file: &str) -> Result<RollPolicy, ConfigError> {
    let mut policy = RollPolicy::new(file);
    while let Some(option) = block.next() {
        if option.text == "{" || option.text == "}" {
            return Err(block.syntax_err(option.text.as_str(), "unexpected nested block"));
        }
        let value = match block.next_arg() {
            Some(token) => token,
            None => {
                return Err(block.validation_err(format!(
                    "rotation option '{}' expects an integer argument",
                    option.text
                )))
            }
        };
        let parsed: i64 = value.text.parse().map_err(|_| {
            block.syntax_err(value.text.as_str(), "expecting an integer rotation value")
        })?;
        if parsed < 0 {
            return Err(
                block.validation_err(format!("rotation value {} must not be negative", parsed))
            );
        }
        match option.text.as_str() {
            "size" => policy.max_size_mb = parsed as u64,
            "age" => policy.max_age_days = parsed as u64,
            "keep" => policy.max_backups = parsed as u64,
            unknown => {
                return Err(block.syntax_err(unknown, "unknown log rotation option"));
            }
        }
    }
    Ok(policy)
}
