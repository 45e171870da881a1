//! Command assembly
//!
//! Turns a validated action plus its selected hosts into one frozen
//! [`CommandEnvelope`] per host. Per-stage data (topology snapshot,
//! repository version) is fetched once; per-host data (config tags, OS
//! family) is resolved inside the loop. Secret substitution runs after all
//! other parameter copying so no later step re-introduces placeholders.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use tracing::debug;

use stagecast_api::ActionRequest;
use stagecast_command::envelope::{CommandEnvelope, RoleCommand};
use stagecast_command::keys;
use stagecast_topology::directory::TopologyDirectory;
use stagecast_topology::secrets::{SecretResolver, resolve_secret_params};
use stagecast_topology::types::RepositoryVersion;

use crate::config::DispatchConfig;
use crate::error::BuildError;
use crate::validate::ValidatedAction;

/// Well-known action with bespoke stage metadata
pub const ACTION_UPDATE_REPO: &str = "update_repo";
/// Caller parameter overriding the `update_repo` success factor
pub const SUCCESS_FACTOR_PARAMETER: &str = "success_factor";

const UPDATE_REPO_SUCCESS_FACTOR_DEFAULT: f32 = 0.0;

/// Known action kinds, resolved from the action name at a single point.
///
/// Each kind owns its stage-metadata parsing; everything else is `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// `update_repo`: carries a per-role success factor override
    UpdateRepo,
    /// No stage-level metadata
    Generic,
}

impl ActionKind {
    /// Classify an action by name
    #[must_use]
    pub fn of(action: &str) -> Self {
        match action {
            ACTION_UPDATE_REPO => ActionKind::UpdateRepo,
            _ => ActionKind::Generic,
        }
    }

    /// Role success factors this action attaches to its stage.
    ///
    /// # Errors
    /// `BadParameter` when a supplied override is not a float in `[0, 1]`.
    /// An absent override takes the kind's documented default instead.
    pub fn stage_success_factors(
        self,
        request: &ActionRequest,
    ) -> Result<BTreeMap<String, f32>, BuildError> {
        match self {
            ActionKind::Generic => Ok(BTreeMap::new()),
            ActionKind::UpdateRepo => {
                let factor = match request.parameters.get(SUCCESS_FACTOR_PARAMETER) {
                    None => UPDATE_REPO_SUCCESS_FACTOR_DEFAULT,
                    Some(raw) => {
                        let parsed: f32 =
                            raw.parse().map_err(|_| BuildError::BadParameter {
                                action: request.action.clone(),
                                parameter: SUCCESS_FACTOR_PARAMETER.to_string(),
                            })?;
                        if !(0.0..=1.0).contains(&parsed) {
                            return Err(BuildError::BadParameter {
                                action: request.action.clone(),
                                parameter: SUCCESS_FACTOR_PARAMETER.to_string(),
                            });
                        }
                        parsed
                    }
                };
                Ok(BTreeMap::from([(request.action.clone(), factor)]))
            }
        }
    }
}

/// Builds command envelopes from dispatch configuration and topology reads.
///
/// Pure and synchronous apart from directory lookups; holds no long-lived
/// state and may serve concurrent stages without coordination.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    config: DispatchConfig,
}

impl CommandBuilder {
    /// Create a builder with explicit dispatch configuration
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    /// Effective command timeout: the context timeout when it exceeds the
    /// configured agent default, the default otherwise.
    #[must_use]
    pub fn resolve_timeout(&self, context_timeout_secs: Option<u64>) -> u64 {
        match context_timeout_secs {
            Some(secs) if secs > self.config.default_agent_timeout_secs => secs,
            _ => self.config.default_agent_timeout_secs,
        }
    }

    /// Build one envelope per selected host.
    ///
    /// # Errors
    /// Any failure (secret resolution, snapshot serialization) aborts the
    /// whole dispatch; no partial stage is exposed.
    pub async fn build_envelopes(
        &self,
        validated: &ValidatedAction,
        targets: &[String],
        topology: &dyn TopologyDirectory,
        secrets: &dyn SecretResolver,
    ) -> Result<Vec<CommandEnvelope>, BuildError> {
        let request = &validated.request;
        let cluster = request.cluster.as_deref();
        let filter = validated.filter();

        // Fetched once per stage; identical for every host.
        let (host_info, repository) = match cluster {
            Some(name) => {
                let info = match topology.cluster_host_info(name).await {
                    Some(snapshot) => Some(
                        serde_json::to_value(snapshot)
                            .map_err(|e| BuildError::Snapshot(e.to_string()))?,
                    ),
                    None => None,
                };
                (info, topology.current_repository(name).await)
            }
            None => (None, None),
        };

        let refresh_tags: BTreeSet<String> = request
            .parameters
            .get(keys::REFRESH_CONFIG_TAGS_BEFORE_EXECUTION)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let service = if validated.target_service.is_empty() {
            filter.service_name()
        } else {
            validated.target_service.as_str()
        };
        let component = if validated.target_component.is_empty() {
            filter.component_name()
        } else {
            validated.target_component.as_str()
        };

        let timeout = self.resolve_timeout(request.timeout_secs);

        let mut envelopes = Vec::with_capacity(targets.len());
        for host in targets {
            let mut builder = CommandEnvelope::builder(host, validated.role())
                .role_command(RoleCommand::ActionExecute)
                .service(service)
                .component(component)
                .command_param(keys::COMMAND_TIMEOUT, timeout.to_string())
                .command_param(keys::SCRIPT, format!("{}.py", request.action))
                .command_param(keys::SCRIPT_TYPE, keys::SCRIPT_TYPE_PYTHON)
                .refresh_config_tags(refresh_tags.clone())
                .scheduler_hints(request.retry_allowed, request.failure_auto_skipped);

            if let Some(name) = cluster {
                builder = builder
                    .cluster(name)
                    .config_tags(topology.resolve_config_tags(name, host).await);

                if let Some(info) = &host_info {
                    builder = builder.cluster_host_info(info.clone());
                }
                if let Some(repository) = &repository
                    && let Some(record) = topology.host(name, host).await
                    && let Some(info) = repo_info_for(repository, &record.os_family)
                {
                    builder = builder.repo_info(info);
                }
            }

            // Copy caller parameters first, substitute secrets last, then
            // attach the component category.
            let mut role_params = request.parameters.clone();
            resolve_secret_params(secrets, cluster, &mut role_params).await?;
            if let Some(info) = &validated.component_info {
                role_params.insert(keys::COMPONENT_CATEGORY.to_string(), info.category.clone());
            }

            envelopes.push(builder.role_params(role_params).finish());
        }

        debug!(
            action = %request.action,
            hosts = envelopes.len(),
            timeout_secs = timeout,
            "built command envelopes"
        );

        Ok(envelopes)
    }
}

/// Repository metadata for one host, filtered to its OS family. Hosts whose
/// family has no matching entry get none.
fn repo_info_for(repository: &RepositoryVersion, os_family: &str) -> Option<serde_json::Value> {
    repository.repos_for_os(os_family).map(|repos| {
        let entries: Vec<_> = repos
            .iter()
            .map(|repo| {
                json!({
                    "base_url": repo.base_url,
                    "repo_name": repo.name,
                    "repo_id": repo.id,
                })
            })
            .collect();
        json!({ "repositories": entries })
    })
}
