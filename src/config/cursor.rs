//! Per-directive token cursor.
//!
//! A `Cursor` is handed to a directive's setup function and exposes
//! exactly that directive's tokens: same-line arguments and, where the
//! grammar allows one, a `{ }` block as a bounded sub-cursor. It also
//! carries the directive name and the current line so setup functions
//! can build errors with full context. A cursor lives only for the
//! duration of one setup call.

use crate::config::compiler::ConfigError;
use crate::config::tokenizer::Token;

/// Maximum block nesting: a directive block plus one sub-block
/// (e.g. the rotation options of a `log` clause).
pub const MAX_NESTING: usize = 2;

/// Signals from block entry that callers route into `ConfigError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    /// No `{` follows; legal for directives with only inline arguments.
    #[error("directive has no block")]
    NoBlock,
    /// A block opened deeper than the grammar allows.
    #[error("unexpected nested block (line {0})")]
    UnexpectedBlock(usize),
    /// A `{` with no matching `}` inside this cursor's window.
    #[error("unclosed block (line {0})")]
    UnbalancedBlock(usize),
}

pub struct Cursor<'a> {
    directive: &'a str,
    tokens: &'a [Token],
    pos: usize,
    /// Line of the most recently consumed token (starts at the line of
    /// the directive name), used for same-line argument checks.
    line: usize,
    depth: usize,
}

impl<'a> Cursor<'a> {
    /// Cursor over `tokens`, which hold everything after the directive
    /// name: inline arguments and, possibly, a balanced block.
    pub fn new(directive: &'a str, tokens: &'a [Token], name_line: usize) -> Self {
        Self {
            directive,
            tokens,
            pos: 0,
            line: name_line,
            depth: 0,
        }
    }

    pub fn directive(&self) -> &str {
        self.directive
    }

    /// Line of the most recently consumed token.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Advance one token, if any remain in this cursor's window.
    pub fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        self.line = token.line;
        Some(token)
    }

    /// Advance only if the next token is a bare argument on the same
    /// line as the previous token. Block delimiters never qualify.
    pub fn next_arg(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        if token.line != self.line || token.text == "{" || token.text == "}" {
            return None;
        }
        self.pos += 1;
        self.line = token.line;
        Some(token)
    }

    /// Enter a `{ }` block at the current position, returning a
    /// sub-cursor bounded to the block's contents. The parent cursor
    /// resumes after the closing brace.
    pub fn next_block(&mut self) -> Result<Cursor<'a>, CursorError> {
        let open = match self.tokens.get(self.pos) {
            Some(t) if t.text == "{" => t,
            _ => return Err(CursorError::NoBlock),
        };
        if self.depth >= MAX_NESTING {
            return Err(CursorError::UnexpectedBlock(open.line));
        }

        let mut level = 1;
        let mut close = self.pos + 1;
        while close < self.tokens.len() {
            match self.tokens[close].text.as_str() {
                "{" => level += 1,
                "}" => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                }
                _ => {}
            }
            close += 1;
        }
        if level != 0 {
            return Err(CursorError::UnbalancedBlock(open.line));
        }

        let inner = Cursor {
            directive: self.directive,
            tokens: &self.tokens[self.pos + 1..close],
            pos: 0,
            line: open.line,
            depth: self.depth + 1,
        };
        self.line = self.tokens[close].line;
        self.pos = close + 1;
        Ok(inner)
    }

    /// Syntax error at the current line, naming the offending token.
    pub fn syntax_err(
        &self,
        token: impl Into<String>,
        message: impl Into<String>,
    ) -> ConfigError {
        ConfigError::Syntax {
            directive: self.directive.to_string(),
            line: self.line,
            token: token.into(),
            message: message.into(),
        }
    }

    /// Validation error at the current line.
    pub fn validation_err(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Validation {
            directive: self.directive.to_string(),
            line: self.line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tokenizer::tokenize;

    fn cursor<'a>(tokens: &'a [Token]) -> Cursor<'a> {
        Cursor::new("errors", tokens, 1)
    }

    #[test]
    fn test_next_arg_stops_at_line_end() {
        let tokens = tokenize("one two\nthree");
        let mut c = cursor(&tokens);
        assert_eq!(c.next_arg().unwrap().text, "one");
        assert_eq!(c.next_arg().unwrap().text, "two");
        assert!(c.next_arg().is_none());
        assert_eq!(c.next().unwrap().text, "three");
    }

    #[test]
    fn test_next_arg_refuses_braces() {
        let tokens = tokenize("{ inner }");
        let mut c = cursor(&tokens);
        assert!(c.next_arg().is_none());
    }

    #[test]
    fn test_block_yields_bounded_sub_cursor() {
        let tokens = tokenize("{ log errors.txt }\ntrailing");
        let mut c = cursor(&tokens);
        let mut block = c.next_block().unwrap();
        assert_eq!(block.next().unwrap().text, "log");
        assert_eq!(block.next_arg().unwrap().text, "errors.txt");
        assert!(block.next().is_none());
        // Parent resumes after the closing brace.
        assert_eq!(c.next().unwrap().text, "trailing");
    }

    #[test]
    fn test_no_block() {
        let tokens = tokenize("errors.txt");
        let mut c = cursor(&tokens);
        assert_eq!(c.next_block(), Err(CursorError::NoBlock));
    }

    #[test]
    fn test_nesting_capped() {
        let tokens = tokenize("{ a { b { c } } }");
        let mut c = cursor(&tokens);
        let mut level1 = c.next_block().unwrap();
        assert_eq!(level1.next().unwrap().text, "a");
        let mut level2 = level1.next_block().unwrap();
        assert_eq!(level2.next().unwrap().text, "b");
        assert!(matches!(
            level2.next_block(),
            Err(CursorError::UnexpectedBlock(_))
        ));
    }

    #[test]
    fn test_unbalanced_block() {
        let tokens = tokenize("{ log errors.txt");
        let mut c = cursor(&tokens);
        assert!(matches!(
            c.next_block(),
            Err(CursorError::UnbalancedBlock(1))
        ));
    }
}
