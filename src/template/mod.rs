//! Entrypoint script rendering
//!
//! Role scripts are minijinja templates embedded in the binary. Values come
//! from a [`ScriptContext`] built from the defaulted cluster record:
//! - `{{ node.* }}` - the role's node configuration
//! - `{{ spec.* }}` - pool-wide values (`serviceName`, `config.password`, ...)
//! - `{{ cluster_name }}`, `{{ namespace }}` - owning record identity
//!
//! Undefined values are errors, so a typo in a script fails the pass instead
//! of producing a pool that cannot start.

mod context;
mod engine;
mod error;

pub use context::ScriptContext;
pub use engine::{Script, ScriptEngine, FRAGMENTS};
pub use error::TemplateError;
