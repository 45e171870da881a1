//! Action request validation
//!
//! All rules run before any host selection or command building; a failure
//! here means no stage, not a partial one. Rules apply in a fixed order so
//! callers see the most specific failure first.

use tracing::debug;

use stagecast_api::{ActionRequest, ResourceFilter, TargetHostType};
use stagecast_topology::catalog::{ActionCatalog, ActionDefinition};
use stagecast_topology::directory::TopologyDirectory;
use stagecast_topology::types::ComponentInfo;

use crate::error::ValidationError;

/// A request that passed validation, with its targets resolved.
#[derive(Debug, Clone)]
pub struct ValidatedAction {
    pub request: ActionRequest,
    pub definition: ActionDefinition,
    /// Request override when given, else the definition's target type
    pub target_type: TargetHostType,
    /// Resolved target service; empty means unconstrained
    pub target_service: String,
    /// Resolved target component; empty means unconstrained
    pub target_component: String,
    /// Stack metadata for the target component, when resolved
    pub component_info: Option<ComponentInfo>,
}

impl ValidatedAction {
    /// The request's single resource filter, or an empty one
    #[must_use]
    pub fn filter(&self) -> ResourceFilter {
        self.request.filter().cloned().unwrap_or_default()
    }

    /// Role name for the stage's tasks, derived from the action name
    #[must_use]
    pub fn role(&self) -> &str {
        &self.request.action
    }
}

/// Validate a request against the catalog and topology.
///
/// # Errors
/// Returns the first [`ValidationError`] in rule order: unknown action,
/// missing input, ambiguous filter, cluster/service/component resolution,
/// missing explicit hosts.
pub async fn validate(
    request: &ActionRequest,
    catalog: &dyn ActionCatalog,
    topology: &dyn TopologyDirectory,
) -> Result<ValidatedAction, ValidationError> {
    if request.action.is_empty() {
        return Err(ValidationError::UnknownAction(String::new()));
    }
    let definition = catalog
        .lookup(&request.action)
        .ok_or_else(|| ValidationError::UnknownAction(request.action.clone()))?;

    for input in definition.mandatory_inputs() {
        if !request.parameters.contains_key(input) {
            return Err(ValidationError::MissingInput {
                action: request.action.clone(),
                input: input.to_string(),
            });
        }
    }

    if request.filters.len() > 1 {
        return Err(ValidationError::AmbiguousFilter);
    }
    let filter = request.filter().cloned().unwrap_or_default();

    let mut target_service = String::new();
    let mut target_component = String::new();
    let mut component_info = None;

    if let Some(cluster) = request.cluster.as_deref() {
        if !topology.cluster_exists(cluster).await {
            return Err(ValidationError::UnknownCluster(cluster.to_string()));
        }

        let expected_service = definition.target_service_name();
        let actual_service = filter.service_name();
        if !expected_service.is_empty()
            && !actual_service.is_empty()
            && expected_service != actual_service
        {
            return Err(ValidationError::ServiceMismatch {
                action: request.action.clone(),
                expected: expected_service.to_string(),
                actual: actual_service.to_string(),
            });
        }

        target_service = if expected_service.is_empty() {
            actual_service.to_string()
        } else {
            expected_service.to_string()
        };

        if !target_service.is_empty() && !topology.service_in_stack(cluster, &target_service).await
        {
            return Err(ValidationError::UnknownService {
                action: request.action.clone(),
                service: target_service,
            });
        }

        let expected_component = definition.target_component_name();
        let actual_component = filter.component_name();
        if !expected_component.is_empty()
            && !actual_component.is_empty()
            && expected_component != actual_component
        {
            return Err(ValidationError::ComponentMismatch {
                action: request.action.clone(),
                expected: expected_component.to_string(),
                actual: actual_component.to_string(),
            });
        }

        target_component = if expected_component.is_empty() {
            actual_component.to_string()
        } else {
            expected_component.to_string()
        };

        if !target_component.is_empty() && target_service.is_empty() {
            return Err(ValidationError::ComponentWithoutService {
                action: request.action.clone(),
                component: target_component,
            });
        }

        if !target_component.is_empty() {
            component_info = topology
                .component_in_stack(cluster, &target_service, &target_component)
                .await;
            if component_info.is_none() {
                return Err(ValidationError::UnknownComponent {
                    action: request.action.clone(),
                    component: target_component,
                });
            }
        }
    }

    let target_type = request.target_type_override.unwrap_or(definition.target_type);

    // SPECIFIC actions and cluster-wide actions must name their hosts unless
    // the selection policy can self-select.
    if (target_type == TargetHostType::Specific
        || (target_service.is_empty() && target_component.is_empty()))
        && filter.hosts.is_empty()
        && !allows_empty_hosts(target_type)
    {
        return Err(ValidationError::MissingHosts {
            action: request.action.clone(),
        });
    }

    debug!(
        action = %request.action,
        service = %target_service,
        component = %target_component,
        target_type = %target_type,
        "request validated"
    );

    Ok(ValidatedAction {
        request: request.clone(),
        definition,
        target_type,
        target_service,
        target_component,
        component_info,
    })
}

fn allows_empty_hosts(target_type: TargetHostType) -> bool {
    matches!(
        target_type,
        TargetHostType::All | TargetHostType::Any | TargetHostType::Majority
    )
}
