//! Directive registry.
//!
//! The set of known directives is an explicit, ordered table passed
//! into the compiler, never a mutable global: compilation stays a pure
//! function of (source text, registry). Registration order is load-
//! bearing: it fixes the position of each directive's middleware in
//! the request chain (first registered wraps outermost and runs
//! first).

use crate::config::compiler::ConfigError;
use crate::config::cursor::Cursor;
use crate::middleware::Middleware;

/// A directive's setup function: consumes the directive's tokens,
/// validates its configuration, and returns the middleware constructor
/// that captures it.
pub type SetupFn = fn(&mut Cursor) -> Result<Middleware, ConfigError>;

pub struct DirectiveEntry {
    pub name: &'static str,
    pub setup: SetupFn,
}

pub struct DirectiveRegistry {
    entries: Vec<DirectiveEntry>,
}

impl DirectiveRegistry {
    /// Empty registry; useful for hosts that wire their own directive set.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with the built-in directives.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register("errors", crate::middleware::errors::setup)
            .expect("built-in directive set has unique names");
        registry
    }

    /// Append a directive. Names must be unique within the registry.
    pub fn register(&mut self, name: &'static str, setup: SetupFn) -> Result<(), ConfigError> {
        if self.entries.iter().any(|e| e.name == name) {
            return Err(ConfigError::DuplicateDirective(name.to_string()));
        }
        self.entries.push(DirectiveEntry { name, setup });
        Ok(())
    }

    pub fn entries(&self) -> &[DirectiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of a directive in registration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_setup(_c: &mut Cursor) -> Result<Middleware, ConfigError> {
        Ok(Box::new(|next| next))
    }

    #[test]
    fn test_standard_registry_knows_errors() {
        let registry = DirectiveRegistry::standard();
        assert_eq!(registry.position("errors"), Some(0));
        assert!(registry.position("proxy").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = DirectiveRegistry::new();
        registry.register("first", noop_setup).unwrap();
        let err = registry.register("first", noop_setup).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDirective(_)));
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = DirectiveRegistry::new();
        registry.register("outer", noop_setup).unwrap();
        registry.register("inner", noop_setup).unwrap();
        assert_eq!(registry.position("outer"), Some(0));
        assert_eq!(registry.position("inner"), Some(1));
    }
}
