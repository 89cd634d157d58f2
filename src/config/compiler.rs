//! Configuration compiler.
//!
//! # Data Flow
//! ```text
//! config text
//!     → tokenizer.rs (flat token stream)
//!     → per-directive slicing (name + same-line args + optional block)
//!     → Cursor handed to the directive's setup function
//!     → Vec<CompiledDirective> (ordered middleware constructors)
//! ```
//!
//! # Design Decisions
//! - Compilation is a pure function of (source, registry); no globals
//! - Any error aborts the whole compile so a broken config never
//!   half-replaces a serving generation
//! - Output order is registry order; source order only among repeated
//!   instances of the same directive

use std::fs;
use std::path::Path;

use crate::config::cursor::Cursor;
use crate::config::registry::DirectiveRegistry;
use crate::config::tokenizer::{tokenize, Token};
use crate::middleware::Middleware;

/// Configuration-load failures. All of these surface before a new
/// generation is accepted; a previously serving generation is never
/// affected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed directive text.
    #[error("{directive} directive, line {line}: {message} (near '{token}')")]
    Syntax {
        directive: String,
        line: usize,
        token: String,
        message: String,
    },

    /// Well-formed text with an invalid value.
    #[error("{directive} directive, line {line}: {message}")]
    Validation {
        directive: String,
        line: usize,
        message: String,
    },

    #[error("unknown directive '{name}' on line {line}")]
    UnknownDirective { name: String, line: usize },

    /// A token outside any directive, e.g. a stray brace.
    #[error("unexpected '{token}' on line {line}")]
    Unexpected { token: String, line: usize },

    #[error("directive '{0}' is already registered")]
    DuplicateDirective(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// One directive occurrence compiled to its middleware constructor.
pub struct CompiledDirective {
    pub name: &'static str,
    pub middleware: Middleware,
}

/// Compile configuration text against a directive registry into the
/// ordered middleware stack.
pub fn compile(
    source: &str,
    registry: &DirectiveRegistry,
) -> Result<Vec<CompiledDirective>, ConfigError> {
    let tokens = tokenize(source);
    let mut buckets: Vec<Vec<Middleware>> = (0..registry.len()).map(|_| Vec::new()).collect();

    let mut i = 0;
    while i < tokens.len() {
        let name = &tokens[i];
        if name.text == "{" || name.text == "}" {
            return Err(ConfigError::Unexpected {
                token: name.text.clone(),
                line: name.line,
            });
        }
        let entry_index =
            registry
                .position(&name.text)
                .ok_or_else(|| ConfigError::UnknownDirective {
                    name: name.text.clone(),
                    line: name.line,
                })?;

        let end = instance_end(&tokens, i)?;
        let mut cursor = Cursor::new(&name.text, &tokens[i + 1..end], name.line);
        let entry = &registry.entries()[entry_index];
        let middleware = (entry.setup)(&mut cursor)?;
        buckets[entry_index].push(middleware);
        i = end;
    }

    let mut stack = Vec::new();
    for (index, bucket) in buckets.into_iter().enumerate() {
        let name = registry.entries()[index].name;
        stack.extend(
            bucket
                .into_iter()
                .map(|middleware| CompiledDirective { name, middleware }),
        );
    }
    Ok(stack)
}

/// Read a configuration file and compile it.
pub fn compile_file(
    path: &Path,
    registry: &DirectiveRegistry,
) -> Result<Vec<CompiledDirective>, ConfigError> {
    let source = fs::read_to_string(path)?;
    compile(&source, registry)
}

/// Index one past the end of the directive instance starting at
/// `start`: same-line arguments, then a block if one opens on that
/// same line.
fn instance_end(tokens: &[Token], start: usize) -> Result<usize, ConfigError> {
    let name = &tokens[start];
    let mut i = start + 1;
    while i < tokens.len()
        && tokens[i].line == name.line
        && tokens[i].text != "{"
        && tokens[i].text != "}"
    {
        i += 1;
    }

    if i < tokens.len() && tokens[i].text == "{" && tokens[i].line == name.line {
        let mut level = 1;
        let mut j = i + 1;
        while j < tokens.len() {
            match tokens[j].text.as_str() {
                "{" => level += 1,
                "}" => {
                    level -= 1;
                    if level == 0 {
                        return Ok(j + 1);
                    }
                }
                _ => {}
            }
            j += 1;
        }
        return Err(ConfigError::Syntax {
            directive: name.text.clone(),
            line: tokens[i].line,
            token: "{".to_string(),
            message: "unclosed block".to_string(),
        });
    }
    Ok(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;

    use crate::http::{Request, ResponseWriter};
    use crate::middleware::{Handler, HandlerResult};

    thread_local! {
        // compile() runs on the calling thread, so each test observes
        // only its own setup invocations.
        static LAST_SEEN_ARGS: Cell<usize> = const { Cell::new(0) };
    }

    struct Passthrough(Arc<dyn Handler>);

    impl Handler for Passthrough {
        fn handle(&self, req: &Request, res: &mut ResponseWriter) -> HandlerResult {
            self.0.handle(req, res)
        }
    }

    fn counting_setup(c: &mut Cursor) -> Result<Middleware, ConfigError> {
        let mut args = 0;
        while c.next_arg().is_some() {
            args += 1;
        }
        LAST_SEEN_ARGS.with(|seen| seen.set(args));
        Ok(Box::new(|next| Arc::new(Passthrough(next))))
    }

    fn registry() -> DirectiveRegistry {
        let mut registry = DirectiveRegistry::new();
        registry.register("probe", counting_setup).unwrap();
        registry
    }

    #[test]
    fn test_empty_source_compiles_to_empty_stack() {
        let stack = compile("", &registry()).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_unknown_directive_names_token_and_line() {
        let err = compile("probe\nbogus arg\n", &registry()).unwrap_err();
        match err {
            ConfigError::UnknownDirective { name, line } => {
                assert_eq!(name, "bogus");
                assert_eq!(line, 2);
            }
            other => panic!("expected UnknownDirective, got {other:?}"),
        }
    }

    #[test]
    fn test_stray_brace_rejected() {
        assert!(matches!(
            compile("}", &registry()),
            Err(ConfigError::Unexpected { .. })
        ));
    }

    #[test]
    fn test_unclosed_block_rejected() {
        let err = compile("probe {\n a b\n", &registry()).unwrap_err();
        assert!(err.to_string().contains("unclosed block"), "got: {err}");
    }

    #[test]
    fn test_directive_sees_only_its_own_tokens() {
        let stack = compile("probe one two\nprobe three\n", &registry()).unwrap();
        assert_eq!(stack.len(), 2);
        // The last instance parsed saw exactly one argument.
        assert_eq!(LAST_SEEN_ARGS.with(|seen| seen.get()), 1);
    }

    #[test]
    fn test_compile_file_reads_and_compiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf");
        std::fs::write(&path, "probe one\n").unwrap();
        let stack = compile_file(&path, &registry()).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].name, "probe");
    }

    #[test]
    fn test_compile_file_missing_path_is_io_error() {
        let err = compile_file(Path::new("/no/such/conf"), &registry()).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_block_on_next_line_is_not_attached() {
        // A brace that does not open on the directive's line reads as a
        // stray token, not as that directive's block.
        assert!(matches!(
            compile("probe\n{ a }\n", &registry()),
            Err(ConfigError::Unexpected { .. })
        ));
    }
}
