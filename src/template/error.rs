//! Template error types

use minijinja::ErrorKind;
use thiserror::Error;

/// Errors raised while loading or rendering entrypoint scripts
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Rendering failed for a reason other than syntax or a missing value
    #[error("template render error: {0}")]
    Render(#[source] minijinja::Error),
    /// A script fragment does not parse
    #[error("template syntax error: {0}")]
    Syntax(String),
    /// A script referenced a value the context does not carry
    #[error("undefined variable: {0}")]
    Undefined(String),
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        match err.kind() {
            ErrorKind::UndefinedError => Self::Undefined(err.to_string()),
            ErrorKind::SyntaxError => Self::Syntax(err.to_string()),
            _ => Self::Render(err),
        }
    }
}
