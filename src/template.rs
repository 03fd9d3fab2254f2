//! Hermetic template rendering.
//!
//! Config values are rendered with minijinja against an explicit scope built
//! by the resolver. The environment exposes only the built-in pure
//! string/collection/math filters: no wall-clock time, no host environment
//! lookups, no randomness. Backend settings must evaluate identically on
//! every machine, otherwise the drift check would compare noise.
//!
//! Referencing a name the scope does not contain is a hard error, not a
//! silent empty substitution, so configuration typos surface immediately.

use minijinja::{Environment, UndefinedBehavior};

use crate::error::{Result, TfwrapError};

/// Stateless template engine with strict undefined handling.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Render `template` against `scope`. `context` names the config entry
    /// being rendered and is carried into the error for diagnostics.
    pub fn render(&self, scope: &minijinja::Value, template: &str, context: &str) -> Result<String> {
        self.env
            .render_str(template, scope)
            .map_err(|e| TfwrapError::template(context, e))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
