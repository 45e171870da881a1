//! Secret reference resolution
//!
//! Caller parameters may carry placeholders instead of secret values, in the
//! form `SECRET:<config-type>:<version>:<property>`. Placeholders are
//! substituted with real values immediately before dispatch, after all other
//! parameter copying. Resolved values must never reach logs or error text;
//! errors cite the reference only.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::TopologyError;

const SECRET_PREFIX: &str = "SECRET:";

/// Whether a parameter value is a secret placeholder
#[must_use]
pub fn is_secret_reference(value: &str) -> bool {
    value.starts_with(SECRET_PREFIX)
}

/// Split a reference into (config type, version, property).
///
/// # Errors
/// Returns `MalformedSecretReference` when the value does not match the
/// `SECRET:<config-type>:<version>:<property>` form.
pub fn parse_reference(value: &str) -> Result<(&str, &str, &str), TopologyError> {
    let malformed = || TopologyError::MalformedSecretReference {
        reference: value.to_string(),
    };

    let rest = value.strip_prefix(SECRET_PREFIX).ok_or_else(malformed)?;
    let mut parts = rest.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(config_type), Some(version), Some(property))
            if !config_type.is_empty() && !version.is_empty() && !property.is_empty() =>
        {
            Ok((config_type, version, property))
        }
        _ => Err(malformed()),
    }
}

/// Resolves secret references to their values.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolve one reference for the given cluster.
    ///
    /// # Errors
    /// `SecretNotFound` when the reference is valid but unknown;
    /// `MalformedSecretReference` when it cannot be parsed.
    async fn resolve(
        &self,
        cluster: Option<&str>,
        reference: &str,
    ) -> Result<String, TopologyError>;
}

/// Substitute every secret placeholder in `params` in place.
///
/// Non-reference values pass through untouched. Must run after all other
/// parameter copying so no later step re-introduces placeholders.
///
/// # Errors
/// Propagates the first resolution failure; the map may be partially
/// substituted in that case and must be discarded by the caller.
pub async fn resolve_secret_params(
    resolver: &dyn SecretResolver,
    cluster: Option<&str>,
    params: &mut BTreeMap<String, String>,
) -> Result<(), TopologyError> {
    for value in params.values_mut() {
        if is_secret_reference(value) {
            *value = resolver.resolve(cluster, value).await?;
        }
    }
    Ok(())
}

/// In-memory [`SecretResolver`] keyed by full reference string.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret under its full reference
    #[must_use]
    pub fn with_secret(mut self, reference: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(reference.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretResolver for StaticSecretStore {
    async fn resolve(
        &self,
        _cluster: Option<&str>,
        reference: &str,
    ) -> Result<String, TopologyError> {
        parse_reference(reference)?;
        self.secrets
            .get(reference)
            .cloned()
            .ok_or_else(|| TopologyError::SecretNotFound {
                reference: reference.to_string(),
            })
    }
}
