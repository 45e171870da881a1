//! `DispatcherActor`: Action dispatch control flow
//!
//! Owns the registry of live stage actors and the external collaborator
//! handles. A submitted request flows through validation, candidate
//! resolution, maintenance filtering, host selection, and command building;
//! only a fully built stage is handed to the transport and registered.

use std::collections::HashMap;
use std::sync::Arc;

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::broadcast;
use tracing::{info, warn};

use stagecast_api::StageEvent;
use stagecast_command::traits::CommandSink;
use stagecast_topology::catalog::ActionCatalog;
use stagecast_topology::directory::TopologyDirectory;
use stagecast_topology::maintenance::MaintenanceFilter;
use stagecast_topology::secrets::SecretResolver;
use stagecast_topology::types::HostHealth;

use crate::actor::stage::{StageActor, StageActorArgs};
use crate::build::{ActionKind, CommandBuilder};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::message::{
    Abort, AbortStage, GetStage, GetStatus, ListStages, ReportTask, ReportTaskState, StageStatus,
    SubmitAction,
};
use crate::select::{resolve_candidates, select_targets};
use crate::stage::Stage;
use crate::validate::validate;

/// Arguments for spawning a `DispatcherActor`
pub struct DispatcherArgs {
    /// Dispatch configuration
    pub config: DispatchConfig,
    /// Cluster topology reads
    pub topology: Arc<dyn TopologyDirectory>,
    /// Action definitions
    pub catalog: Arc<dyn ActionCatalog>,
    /// Maintenance exclusion predicate
    pub maintenance: Arc<dyn MaintenanceFilter>,
    /// Secret reference resolution
    pub secrets: Arc<dyn SecretResolver>,
    /// Transport handoff for built stages
    pub sink: Arc<dyn CommandSink>,
    /// Event broadcast sender shared with stage actors
    pub event_tx: broadcast::Sender<StageEvent>,
}

/// Dispatch orchestrator managing all stage actors
pub struct DispatcherActor {
    builder: CommandBuilder,
    topology: Arc<dyn TopologyDirectory>,
    catalog: Arc<dyn ActionCatalog>,
    maintenance: Arc<dyn MaintenanceFilter>,
    secrets: Arc<dyn SecretResolver>,
    sink: Arc<dyn CommandSink>,
    event_tx: broadcast::Sender<StageEvent>,
    /// Registry of live stage actors by stage id
    stages: HashMap<u64, ActorRef<StageActor>>,
    next_stage_id: u64,
}

impl DispatcherActor {
    /// Get number of registered stages
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn stage_ref(&self, stage: u64) -> Result<&ActorRef<StageActor>, DispatchError> {
        self.stages
            .get(&stage)
            .ok_or(DispatchError::StageNotFound(stage))
    }

    async fn health_of(
        &self,
        cluster: Option<&str>,
        hosts: impl Iterator<Item = &String>,
    ) -> HashMap<String, HostHealth> {
        let mut health = HashMap::new();
        if let Some(cluster) = cluster {
            for host in hosts {
                if let Some(record) = self.topology.host(cluster, host).await {
                    health.insert(host.clone(), record.health);
                }
            }
        }
        health
    }
}

impl Actor for DispatcherActor {
    type Args = DispatcherArgs;
    type Error = DispatchError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(id = %actor_ref.id(), "DispatcherActor starting");

        Ok(Self {
            builder: CommandBuilder::new(args.config),
            topology: args.topology,
            catalog: args.catalog,
            maintenance: args.maintenance,
            secrets: args.secrets,
            sink: args.sink,
            event_tx: args.event_tx,
            stages: HashMap::new(),
            next_stage_id: 1,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, "DispatcherActor stopping");

        for (stage, actor_ref) in &self.stages {
            info!(stage = stage, "stopping StageActor");
            actor_ref.stop_gracefully().await.ok();
        }

        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<SubmitAction> for DispatcherActor {
    type Reply = Result<StageStatus, DispatchError>;

    async fn handle(
        &mut self,
        msg: SubmitAction,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let request = msg.request;

        let validated = validate(&request, self.catalog.as_ref(), self.topology.as_ref()).await?;

        let candidates = resolve_candidates(
            &validated,
            self.topology.as_ref(),
            self.maintenance.as_ref(),
        )
        .await;

        let explicit = validated.filter().hosts;
        let health = self
            .health_of(request.cluster.as_deref(), candidates.iter())
            .await;
        let targets = select_targets(
            &candidates,
            &explicit,
            validated.target_type,
            &health,
            &validated.target_service,
            &validated.target_component,
        )?;

        let success_factors =
            ActionKind::of(&request.action).stage_success_factors(&request)?;

        let envelopes = self
            .builder
            .build_envelopes(
                &validated,
                &targets,
                self.topology.as_ref(),
                self.secrets.as_ref(),
            )
            .await?;

        let stage_id = self.next_stage_id;
        self.next_stage_id += 1;
        let stage = Stage::new(stage_id, &request.action, &success_factors, envelopes.clone());
        let status = StageStatus::of(&stage);

        // Hand off to transport before registering; a rejected stage leaves
        // no trace in the registry
        self.sink.deliver(stage_id, &envelopes).await?;

        let actor_ref = StageActor::spawn(StageActorArgs {
            stage,
            event_tx: self.event_tx.clone(),
        });
        self.stages.insert(stage_id, actor_ref);

        info!(
            stage = stage_id,
            action = %request.action,
            tasks = envelopes.len(),
            target_type = %validated.target_type,
            "stage dispatched"
        );

        Ok(status)
    }
}

impl Message<ReportTask> for DispatcherActor {
    type Reply = Result<(), DispatchError>;

    async fn handle(
        &mut self,
        msg: ReportTask,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let actor_ref = self.stage_ref(msg.stage)?;

        match actor_ref
            .ask(ReportTaskState {
                host: msg.host,
                role: msg.role,
                state: msg.state,
            })
            .await
        {
            Ok(inner_result) => Ok(inner_result),
            Err(e) => Err(DispatchError::ActorError(e.to_string())),
        }
    }
}

impl Message<AbortStage> for DispatcherActor {
    type Reply = Result<(), DispatchError>;

    async fn handle(
        &mut self,
        msg: AbortStage,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let actor_ref = self.stage_ref(msg.stage)?;

        match actor_ref.ask(Abort).await {
            Ok(inner_result) => Ok(inner_result),
            Err(e) => Err(DispatchError::ActorError(e.to_string())),
        }
    }
}

impl Message<GetStage> for DispatcherActor {
    type Reply = Result<StageStatus, DispatchError>;

    async fn handle(
        &mut self,
        msg: GetStage,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let actor_ref = self.stage_ref(msg.stage)?;

        actor_ref
            .ask(GetStatus)
            .await
            .map_err(|e| DispatchError::ActorError(e.to_string()))
    }
}

impl Message<ListStages> for DispatcherActor {
    type Reply = Vec<StageStatus>;

    async fn handle(
        &mut self,
        _msg: ListStages,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let mut statuses = Vec::with_capacity(self.stages.len());

        for (stage, actor_ref) in &self.stages {
            match actor_ref.ask(GetStatus).await {
                Ok(status) => statuses.push(status),
                Err(e) => {
                    warn!(stage = stage, error = %e, "failed to get stage status");
                }
            }
        }

        statuses.sort_by_key(|status| status.stage);
        statuses
    }
}
