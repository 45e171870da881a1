use std::sync::Arc;

use async_trait::async_trait;
use kameo::actor::Spawn;
use tokio::sync::broadcast;

use stagecast_api::events::StageEvent;
use stagecast_api::{ActionRequest, ResourceFilter, TargetHostType};
use stagecast_command::keys;
use stagecast_command::state::TaskState;
use stagecast_command::traits::NullSink;
use stagecast_core::*;
use stagecast_topology::catalog::{ActionDefinition, StaticCatalog};
use stagecast_topology::directory::InMemoryTopology;
use stagecast_topology::maintenance::{MaintenanceFilter, NoMaintenance, OperationScope};
use stagecast_topology::secrets::StaticSecretStore;
use stagecast_topology::types::{ComponentInfo, Host, RepoEntry, RepositoryVersion, StackId};

// Mock implementations

struct FixedMaintenance(Vec<String>);

#[async_trait]
impl MaintenanceFilter for FixedMaintenance {
    async fn is_excluded(&self, _scope: &OperationScope, host: &str) -> bool {
        self.0.iter().any(|h| h == host)
    }
}

fn test_topology() -> InMemoryTopology {
    let mut topology = InMemoryTopology::new()
        .with_cluster("prod", StackId::new("HDP", "2.3"))
        .with_component(
            "prod",
            "HDFS",
            ComponentInfo::new("DATANODE", "SLAVE"),
            ["h1", "h2", "h3", "h4"],
        )
        .with_repository(
            "prod",
            RepositoryVersion::new("2.3.0.0-2557").with_os(
                "redhat6",
                vec![RepoEntry::new("HDP-2.3", "HDP", "http://repo/hdp/2.3")],
            ),
        );
    for name in ["h1", "h2", "h3", "h4"] {
        topology = topology.with_host("prod", Host::new(name, "redhat6"));
    }
    topology
}

fn test_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_action(
            ActionDefinition::new("update_repo", TargetHostType::All)
                .with_description("refresh package repositories"),
        )
        .with_action(ActionDefinition::new("restart_agent", TargetHostType::All))
}

struct TestSetup {
    dispatcher: kameo::actor::ActorRef<DispatcherActor>,
    sink: Arc<NullSink>,
    event_rx: broadcast::Receiver<StageEvent>,
}

fn spawn_dispatcher(maintenance: Arc<dyn MaintenanceFilter>) -> TestSetup {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let config = DispatchConfig::default();
    let (event_tx, event_rx) = broadcast::channel(config.event_channel_capacity);
    let sink = Arc::new(NullSink::new());

    let dispatcher = DispatcherActor::spawn(DispatcherArgs {
        config,
        topology: Arc::new(test_topology()),
        catalog: Arc::new(test_catalog()),
        maintenance,
        secrets: Arc::new(StaticSecretStore::new()),
        sink: sink.clone(),
        event_tx,
    });

    TestSetup {
        dispatcher,
        sink,
        event_rx,
    }
}

async fn drive_task(
    dispatcher: &kameo::actor::ActorRef<DispatcherActor>,
    stage: u64,
    host: &str,
    role: &str,
    terminal: TaskState,
) {
    for state in [TaskState::Queued, TaskState::InProgress, terminal] {
        dispatcher
            .ask(ReportTask {
                stage,
                host: host.to_string(),
                role: role.to_string(),
                state,
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_update_repo_majority_end_to_end() {
    let mut setup = spawn_dispatcher(Arc::new(NoMaintenance));

    let request = ActionRequest::new("update_repo")
        .with_cluster("prod")
        .with_parameter("success_factor", "0.5")
        .with_target_type(TargetHostType::Majority);

    let status = setup
        .dispatcher
        .ask(SubmitAction { request })
        .await
        .unwrap();

    // 4 candidates, MAJORITY selects floor(4/2) + 1 = 3 distinct hosts
    assert_eq!(status.tasks.len(), 3);
    assert_eq!(status.outcome, StageOutcome::InProgress);
    let role = &status.roles[0];
    assert_eq!(role.role, "update_repo");
    assert!((role.success_factor - 0.5).abs() < f32::EPSILON);
    assert_eq!(role.required, 2);

    // every envelope carries the script binding and was handed to transport
    let deliveries = setup.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    let (stage_id, envelopes) = &deliveries[0];
    assert_eq!(*stage_id, status.stage);
    assert_eq!(envelopes.len(), 3);
    for envelope in envelopes {
        assert_eq!(envelope.command_params[keys::SCRIPT], "update_repo.py");
        assert_eq!(envelope.command_params[keys::SCRIPT_TYPE], "PYTHON");
        assert!(envelope.cluster_host_info.is_some());
        assert!(envelope.repo_info.is_some());
    }

    // all healthy: deterministic pick of the lexicographically lowest hosts
    let hosts: Vec<_> = envelopes.iter().map(|e| e.host.as_str()).collect();
    assert_eq!(hosts, vec!["h1", "h2", "h3"]);

    // quorum 0.5 of 3 needs 2 completions; the stage succeeds while the
    // third task is still pending
    drive_task(&setup.dispatcher, status.stage, "h1", "update_repo", TaskState::Completed).await;
    drive_task(&setup.dispatcher, status.stage, "h2", "update_repo", TaskState::Completed).await;

    let status = setup
        .dispatcher
        .ask(GetStage { stage: status.stage })
        .await
        .unwrap();
    assert_eq!(status.outcome, StageOutcome::Succeeded);
    assert!(
        status
            .tasks
            .iter()
            .any(|task| task.state == TaskState::Pending)
    );

    // events were broadcast along the way
    let mut saw_finished = false;
    while let Ok(event) = setup.event_rx.try_recv() {
        if matches!(event, StageEvent::StageFinished { .. }) {
            saw_finished = true;
        }
    }
    assert!(saw_finished);

    setup.dispatcher.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_validation_failure_registers_no_stage() {
    let setup = spawn_dispatcher(Arc::new(NoMaintenance));

    let result = setup
        .dispatcher
        .ask(SubmitAction {
            request: ActionRequest::new("no_such_action").with_cluster("prod"),
        })
        .await;
    assert!(result.is_err());

    let stages = setup.dispatcher.ask(ListStages).await.unwrap();
    assert!(stages.is_empty());
    assert!(setup.sink.deliveries().is_empty());

    setup.dispatcher.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_bad_success_factor_aborts_dispatch() {
    let setup = spawn_dispatcher(Arc::new(NoMaintenance));

    let result = setup
        .dispatcher
        .ask(SubmitAction {
            request: ActionRequest::new("update_repo")
                .with_cluster("prod")
                .with_parameter("success_factor", "half"),
        })
        .await;
    assert!(result.is_err());

    // no partial stage and nothing handed to transport
    assert!(setup.dispatcher.ask(ListStages).await.unwrap().is_empty());
    assert!(setup.sink.deliveries().is_empty());

    setup.dispatcher.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_maintenance_filter_shrinks_candidates() {
    let setup = spawn_dispatcher(Arc::new(FixedMaintenance(vec!["h4".to_string()])));

    let status = setup
        .dispatcher
        .ask(SubmitAction {
            request: ActionRequest::new("update_repo").with_cluster("prod"),
        })
        .await
        .unwrap();

    // ALL over 4 hosts minus one under maintenance
    assert_eq!(status.tasks.len(), 3);
    assert!(status.tasks.iter().all(|task| task.host != "h4"));

    setup.dispatcher.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_explicit_host_out_of_scope_is_rejected() {
    let setup = spawn_dispatcher(Arc::new(NoMaintenance));

    let result = setup
        .dispatcher
        .ask(SubmitAction {
            request: ActionRequest::new("restart_agent")
                .with_cluster("prod")
                .with_filter(ResourceFilter::new().with_host("h9")),
        })
        .await;
    assert!(result.is_err());
    assert!(setup.sink.deliveries().is_empty());

    setup.dispatcher.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_abort_stage_is_idempotent() {
    let setup = spawn_dispatcher(Arc::new(NoMaintenance));

    let status = setup
        .dispatcher
        .ask(SubmitAction {
            request: ActionRequest::new("restart_agent").with_cluster("prod"),
        })
        .await
        .unwrap();
    assert_eq!(status.tasks.len(), 4);

    setup
        .dispatcher
        .ask(AbortStage { stage: status.stage })
        .await
        .unwrap();

    let status = setup
        .dispatcher
        .ask(GetStage { stage: status.stage })
        .await
        .unwrap();
    assert_eq!(status.outcome, StageOutcome::Aborted);
    assert!(
        status
            .tasks
            .iter()
            .all(|task| task.state == TaskState::Aborted)
    );

    // aborting again is a no-op
    setup
        .dispatcher
        .ask(AbortStage { stage: status.stage })
        .await
        .unwrap();

    setup.dispatcher.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_unknown_stage_report() {
    let setup = spawn_dispatcher(Arc::new(NoMaintenance));

    let result = setup
        .dispatcher
        .ask(ReportTask {
            stage: 42,
            host: "h1".to_string(),
            role: "update_repo".to_string(),
            state: TaskState::Queued,
        })
        .await;
    assert!(result.is_err());

    setup.dispatcher.stop_gracefully().await.unwrap();
}
