//! Error types for the Condor operator

use thiserror::Error;

use crate::template::TemplateError;

/// Main error type for Condor operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error (any lookup or create failure other than not-found)
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Entrypoint script rendering failed
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// A resource limit or request could not be parsed as a quantity
    #[error("invalid quantity for resource '{resource}': '{value}' ({reason})")]
    Quantity {
        /// Resource name (e.g. `cpu`, `memory`)
        resource: String,
        /// The rejected value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Validation error for CondorCluster specs
    #[error("validation error: {0}")]
    Validation(String),

    /// The CondorCluster has no namespace
    #[error("missing namespace on CondorCluster")]
    MissingNamespace,

    /// Owner reference could not be built (cluster has no name or uid yet)
    #[error("cannot build owner reference for '{0}': name or uid missing")]
    MissingOwnerMetadata(String),

    /// Token helper output did not contain the sentinel marker
    #[error("token not yet available: marker '{marker}' not found in helper output")]
    TokenMarkerNotFound {
        /// The marker that was searched for
        marker: &'static str,
    },

    /// The caller cancelled an in-flight operation
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a quantity error for one resource entry
    pub fn quantity(
        resource: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Quantity {
            resource: resource.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying without a spec change can ever succeed.
    ///
    /// Validation, template and quantity errors come from the record or the
    /// embedded scripts, so the controller waits for the record to change.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Template(_) | Error::Quantity { .. }
        )
    }
}
