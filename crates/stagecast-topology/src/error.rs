//! Error types for stagecast-topology

use thiserror::Error;

/// Errors raised by topology and secret lookups
#[derive(Error, Debug, Clone)]
pub enum TopologyError {
    /// Cluster not known to the directory
    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    /// Host not known to the directory
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// Secret reference could not be resolved. The error carries the
    /// reference, never the secret value.
    #[error("secret not found for reference: {reference}")]
    SecretNotFound {
        /// The unresolved placeholder
        reference: String,
    },

    /// Secret reference did not match the `SECRET:<type>:<version>:<name>` form
    #[error("malformed secret reference: {reference}")]
    MalformedSecretReference {
        /// The malformed placeholder
        reference: String,
    },
}
