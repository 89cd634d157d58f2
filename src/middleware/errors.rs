//! The `errors` directive.
//!
//! Recovers from failures anywhere in the chain it wraps, maps status
//! codes to custom error pages, and appends a line per request to a
//! (optionally rotated) diagnostic log.
//!
//! ```text
//! errors [<logfile>]
//! errors {
//!     log <logfile> [{ size <mb> age <days> keep <count> }]
//!     <statuscode> <page>
//!     ...
//! }
//! ```
//!
//! Within one request: recovery always precedes page serving, which
//! always precedes logging.

use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::config::compiler::ConfigError;
use crate::config::cursor::{Cursor, CursorError};
use crate::config::roller::{parse_log_clause, RollPolicy};
use crate::http::{Request, ResponseWriter};
use crate::middleware::{Handler, HandlerResult, Middleware};
use crate::observability::rolling::DiagnosticLog;

/// Log destination used when the directive names none. The sentinel
/// selects the stderr sink; the field is always set, never empty.
pub const DEFAULT_LOG_FILENAME: &str = "stderr";

/// Validated configuration of one `errors` directive occurrence.
/// Immutable after setup; read-only during request handling.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorsConfig {
    pub log_file: String,
    pub error_pages: HashMap<u16, PathBuf>,
    pub roller: Option<RollPolicy>,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            log_file: DEFAULT_LOG_FILENAME.to_string(),
            error_pages: HashMap::new(),
            roller: None,
        }
    }
}

/// Setup function registered for the `errors` directive name.
pub fn setup(c: &mut Cursor) -> Result<Middleware, ConfigError> {
    let conf = parse(c)?;
    // One log handle per configuration generation, shared by every
    // request that reaches this middleware.
    let log = Arc::new(DiagnosticLog::new(&conf.log_file, conf.roller.clone()));
    Ok(Box::new(move |next| {
        Arc::new(ErrorHandler {
            conf: conf.clone(),
            log: log.clone(),
            next,
        })
    }))
}

fn parse(c: &mut Cursor) -> Result<ErrorsConfig, ConfigError> {
    let mut conf = ErrorsConfig::default();

    match c.next_block() {
        Ok(mut block) => {
            let mut saw_log = false;
            while let Some(option) = block.next() {
                if option.text == "log" {
                    if saw_log {
                        return Err(block.validation_err("duplicate log line"));
                    }
                    saw_log = true;
                    let clause = parse_log_clause(&mut block)?;
                    conf.log_file = clause.file;
                    conf.roller = clause.roller;
                } else {
                    let code: i64 = option.text.parse().map_err(|_| {
                        block.syntax_err(option.text.as_str(), "expecting a numeric status code")
                    })?;
                    if code <= 0 || code > u16::MAX as i64 {
                        return Err(block.validation_err(format!(
                            "status code {code} is not a positive integer in range"
                        )));
                    }
                    let page = block.next_arg().ok_or_else(|| {
                        block.validation_err(format!("status code {code} expects a page path"))
                    })?;
                    // Repeated codes keep only the later page.
                    conf.error_pages
                        .insert(code as u16, PathBuf::from(&page.text));
                }
            }
        }
        Err(CursorError::NoBlock) => {
            if let Some(file) = c.next_arg() {
                conf.log_file = file.text.clone();
                if let Some(extra) = c.next_arg() {
                    return Err(c.syntax_err(extra.text.as_str(), "unexpected extra argument"));
                }
            }
        }
        Err(err) => return Err(c.validation_err(err.to_string())),
    }

    if let Some(trailing) = c.next() {
        return Err(c.syntax_err(trailing.text.as_str(), "unexpected token after directive"));
    }
    Ok(conf)
}

/// Request-time recovery boundary for the chain it wraps.
pub struct ErrorHandler {
    conf: ErrorsConfig,
    log: Arc<DiagnosticLog>,
    next: Arc<dyn Handler>,
}

impl Handler for ErrorHandler {
    fn handle(&self, req: &Request, res: &mut ResponseWriter) -> HandlerResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.next.handle(req, res)));

        let status = match outcome {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                self.log.write_line(&format!(
                    "{} [ERROR {} {}] {}",
                    timestamp(),
                    500,
                    req.path(),
                    err
                ));
                self.recovered(res)
            }
            Err(payload) => {
                self.log.write_line(&format!(
                    "{} [PANIC {}] {}",
                    timestamp(),
                    req.path(),
                    panic_message(payload.as_ref())
                ));
                self.recovered(res)
            }
        };

        self.serve_error_page(status, res);

        self.log.write_line(&format!(
            "{} {} {} {} {}",
            timestamp(),
            req.remote_addr,
            req.method,
            req.path(),
            status
        ));
        Ok(status)
    }
}

impl ErrorHandler {
    /// Synthesize a 500 for an abnormal exit from `next`. Whatever
    /// `next` already wrote is left alone; only a missing status is
    /// filled in.
    fn recovered(&self, res: &mut ResponseWriter) -> u16 {
        if res.status().is_none() {
            res.set_status(500);
        }
        500
    }

    /// Serve the configured page for `status`, if any. An unreadable
    /// page degrades to a bare status with no body; it never fails the
    /// request.
    fn serve_error_page(&self, status: u16, res: &mut ResponseWriter) {
        let Some(page) = self.conf.error_pages.get(&status) else {
            return;
        };
        match fs::read(page) {
            Ok(bytes) => {
                res.clear_body();
                res.set_status(status);
                if let Ok(value) = http::HeaderValue::from_str("text/html; charset=utf-8") {
                    res.headers_mut().insert(http::header::CONTENT_TYPE, value);
                }
                res.write(&bytes);
            }
            Err(err) => {
                tracing::warn!(
                    page = %page.display(),
                    status,
                    error = %err,
                    "error page unreadable, serving bare status"
                );
                res.clear_body();
                res.set_status(status);
            }
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
