//! Candidate resolution and host selection policy
//!
//! Candidates come from the topology directory (component placement, service
//! placement, or the whole cluster), shrink through the maintenance filter,
//! and are then narrowed to the actual targets by the action's target host
//! type.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use stagecast_api::TargetHostType;
use stagecast_topology::directory::TopologyDirectory;
use stagecast_topology::maintenance::{MaintenanceFilter, OperationScope, filter_maintenance};
use stagecast_topology::types::HostHealth;

use crate::error::SelectionError;
use crate::validate::ValidatedAction;

/// Compute the candidate host set for a validated action.
///
/// Service + component named: hosts running that component. Service only:
/// hosts running any of its components. Neither: every host in the cluster.
/// Requests without a cluster have no candidates and may only address
/// explicit hosts. Maintenance filtering shrinks the result and never fails.
pub async fn resolve_candidates(
    validated: &ValidatedAction,
    topology: &dyn TopologyDirectory,
    maintenance: &dyn MaintenanceFilter,
) -> BTreeSet<String> {
    let Some(cluster) = validated.request.cluster.as_deref() else {
        return BTreeSet::new();
    };

    let service = validated.target_service.as_str();
    let component = validated.target_component.as_str();

    let mut candidates = if !service.is_empty() && !component.is_empty() {
        topology.hosts_for_component(cluster, service, component).await
    } else if !service.is_empty() {
        topology.hosts_for_service(cluster, service).await
    } else {
        topology.all_hosts(cluster).await
    };

    let mut scope = OperationScope::cluster_wide(cluster);
    if !service.is_empty() {
        scope = scope.with_service(service);
    }
    if !component.is_empty() {
        scope = scope.with_component(component);
    }
    filter_maintenance(maintenance, &scope, &mut candidates).await;

    debug!(
        action = %validated.request.action,
        service = %service,
        component = %component,
        candidates = candidates.len(),
        "resolved candidate hosts"
    );

    candidates
}

/// Narrow candidates to the hosts that will receive tasks.
///
/// Explicit hosts are validated for membership (when candidates exist) and
/// returned verbatim, order preserved. Otherwise the target type's policy
/// selects from the candidates.
///
/// # Errors
/// `HostNotInScope` for an explicit host outside the candidate set,
/// `NoSuitableHosts` when there is nothing to select from, and
/// `UnsupportedTargetType` when the policy cannot self-select.
pub fn select_targets(
    candidates: &BTreeSet<String>,
    explicit: &[String],
    target_type: TargetHostType,
    health: &HashMap<String, HostHealth>,
    scope_service: &str,
    scope_component: &str,
) -> Result<Vec<String>, SelectionError> {
    if !explicit.is_empty() {
        if !candidates.is_empty() {
            for host in explicit {
                if !candidates.contains(host) {
                    return Err(SelectionError::HostNotInScope {
                        host: host.clone(),
                        service: scope_service.to_string(),
                        component: scope_component.to_string(),
                    });
                }
            }
        }
        return Ok(explicit.to_vec());
    }

    if candidates.is_empty() {
        return Err(SelectionError::NoSuitableHosts {
            service: scope_service.to_string(),
            component: scope_component.to_string(),
        });
    }

    match target_type {
        TargetHostType::All => Ok(candidates.iter().cloned().collect()),
        TargetHostType::Any => Ok(vec![healthiest(candidates, health)]),
        TargetHostType::Majority => {
            let mut pool = candidates.clone();
            let quorum = candidates.len() / 2 + 1;
            let mut targets = Vec::with_capacity(quorum);
            for _ in 0..quorum {
                let host = healthiest(&pool, health);
                pool.remove(&host);
                targets.push(host);
            }
            Ok(targets)
        }
        TargetHostType::Specific => Err(SelectionError::UnsupportedTargetType(target_type)),
    }
}

/// Deterministic healthiest-host choice: best health rank first, then lowest
/// host name. Hosts without a health record rank as unreachable.
fn healthiest(pool: &BTreeSet<String>, health: &HashMap<String, HostHealth>) -> String {
    debug_assert!(!pool.is_empty());
    pool.iter()
        .min_by_key(|host| {
            let rank = health
                .get(*host)
                .copied()
                .unwrap_or(HostHealth::Unreachable)
                .rank();
            (rank, (*host).clone())
        })
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn all_healthy(names: &[&str]) -> HashMap<String, HostHealth> {
        names
            .iter()
            .map(|s| ((*s).to_string(), HostHealth::Healthy))
            .collect()
    }

    #[test]
    fn test_all_returns_every_candidate() {
        let candidates = hosts(&["h3", "h1", "h2"]);
        let targets = select_targets(
            &candidates,
            &[],
            TargetHostType::All,
            &all_healthy(&["h1", "h2", "h3"]),
            "",
            "",
        )
        .unwrap();

        assert_eq!(targets.len(), candidates.len());
        let unique: BTreeSet<_> = targets.iter().cloned().collect();
        assert_eq!(unique, candidates);
    }

    #[test]
    fn test_any_returns_one_deterministically() {
        let candidates = hosts(&["h2", "h1", "h3"]);
        let health = all_healthy(&["h1", "h2", "h3"]);

        let first = select_targets(&candidates, &[], TargetHostType::Any, &health, "", "").unwrap();
        let second = select_targets(&candidates, &[], TargetHostType::Any, &health, "", "").unwrap();

        // equal health: lowest name wins, on every call
        assert_eq!(first, vec!["h1".to_string()]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_any_prefers_healthier_host() {
        let candidates = hosts(&["h1", "h2"]);
        let mut health = all_healthy(&["h2"]);
        health.insert("h1".to_string(), HostHealth::Degraded);

        let targets = select_targets(&candidates, &[], TargetHostType::Any, &health, "", "").unwrap();
        assert_eq!(targets, vec!["h2".to_string()]);
    }

    #[test]
    fn test_majority_sizes() {
        for n in 1..=9 {
            let names: Vec<String> = (1..=n).map(|i| format!("h{i}")).collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let candidates = hosts(&name_refs);
            let health = all_healthy(&name_refs);

            let targets =
                select_targets(&candidates, &[], TargetHostType::Majority, &health, "", "")
                    .unwrap();

            assert_eq!(targets.len(), n / 2 + 1, "n = {n}");
            let unique: BTreeSet<_> = targets.iter().cloned().collect();
            assert_eq!(unique.len(), targets.len(), "duplicates for n = {n}");
            assert!(targets.iter().all(|h| candidates.contains(h)));
        }
    }

    #[test]
    fn test_explicit_hosts_returned_verbatim() {
        let candidates = hosts(&["h1", "h2", "h3"]);
        let explicit = vec!["h3".to_string(), "h1".to_string()];

        let targets = select_targets(
            &candidates,
            &explicit,
            TargetHostType::Specific,
            &HashMap::new(),
            "",
            "",
        )
        .unwrap();

        assert_eq!(targets, explicit);
    }

    #[test]
    fn test_explicit_host_out_of_scope() {
        let candidates = hosts(&["h1", "h2"]);
        let explicit = vec!["h3".to_string()];

        let err = select_targets(
            &candidates,
            &explicit,
            TargetHostType::Specific,
            &HashMap::new(),
            "HDFS",
            "DATANODE",
        )
        .unwrap_err();

        assert!(matches!(err, SelectionError::HostNotInScope { host, .. } if host == "h3"));
    }

    #[test]
    fn test_empty_candidates_without_explicit_hosts() {
        let err = select_targets(
            &BTreeSet::new(),
            &[],
            TargetHostType::All,
            &HashMap::new(),
            "",
            "",
        )
        .unwrap_err();

        assert!(matches!(err, SelectionError::NoSuitableHosts { .. }));
    }

    #[test]
    fn test_specific_cannot_self_select() {
        let candidates = hosts(&["h1"]);
        let err = select_targets(
            &candidates,
            &[],
            TargetHostType::Specific,
            &HashMap::new(),
            "",
            "",
        )
        .unwrap_err();

        assert!(matches!(err, SelectionError::UnsupportedTargetType(_)));
    }
}
