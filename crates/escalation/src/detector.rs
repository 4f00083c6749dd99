//! Detection loop and escalation worker pool

use crate::{DetectorError, Escalation, EscalationConfig, ProcessedSet, Step};
use container_runtime::{names, ContainerRuntime};
use event_bus::{EscalationEvent, EventSender, Shutdown};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Summary of one detection cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Containers reported unhealthy
    pub unhealthy: usize,
    /// Units whose escalation was re-armed this cycle
    pub rearmed: Vec<String>,
    /// Escalation tasks launched
    pub launched: usize,
    /// Warning events emitted
    pub warnings: usize,
    /// Alarm events emitted
    pub alarms: usize,
}

/// State shared by the escalation tasks of a detector
struct TaskContext {
    runtime: Arc<dyn ContainerRuntime>,
    events: EventSender,
    processed: ProcessedSet,
    config: EscalationConfig,
}

#[derive(Debug, Default)]
struct TaskOutcome {
    warnings: usize,
    alarmed: bool,
}

/// Escalation detector
pub struct Detector {
    ctx: Arc<TaskContext>,
    /// Worker pool slots
    permits: Arc<Semaphore>,
}

impl Detector {
    /// Create a detector emitting on `events`.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        events: EventSender,
        config: EscalationConfig,
    ) -> Result<Self, DetectorError> {
        config.validate()?;
        info!(
            "Creating escalation detector: interval={}s, recheck={}s, max_retries={}, concurrency={}",
            config.poll_interval_secs, config.recheck_delay_secs, config.max_retries, config.concurrency
        );
        Ok(Self {
            permits: Arc::new(Semaphore::new(config.concurrency)),
            ctx: Arc::new(TaskContext {
                runtime,
                events,
                processed: ProcessedSet::new(),
                config,
            }),
        })
    }

    /// Units whose alarm has been emitted and not yet re-armed
    pub fn processed(&self) -> &ProcessedSet {
        &self.ctx.processed
    }

    /// Run one detection cycle and wait for the escalations it launched.
    pub async fn poll_once(&self, shutdown: &Shutdown) -> Result<CycleReport, DetectorError> {
        let unhealthy = self.ctx.runtime.list_unhealthy().await?;
        let unhealthy_names: HashSet<String> = names(&unhealthy);

        let mut report = CycleReport {
            unhealthy: unhealthy.len(),
            rearmed: self.ctx.processed.retain(|unit| unhealthy_names.contains(unit)),
            ..Default::default()
        };
        for unit in &report.rearmed {
            info!(service = %unit, "container no longer unhealthy, escalation re-armed");
        }

        let mut tasks = JoinSet::new();
        for container in unhealthy {
            if self.ctx.processed.contains(&container.name) {
                debug!(service = %container.name, "already escalated, skipping");
                continue;
            }

            let ctx = self.ctx.clone();
            let permits = self.permits.clone();
            let shutdown = shutdown.clone();
            report.launched += 1;
            tasks.spawn(async move {
                // The semaphore is never closed.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return TaskOutcome::default();
                };
                escalate(&ctx, container.name, shutdown).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.warnings += outcome.warnings;
                    report.alarms += usize::from(outcome.alarmed);
                }
                Err(e) => error!(error = %e, "escalation task failed"),
            }
        }

        Ok(report)
    }

    /// Run detection cycles until shutdown.
    ///
    /// A failing cycle is logged and retried at the next interval.
    pub async fn run(&self, mut shutdown: Shutdown) {
        info!("Starting escalation detector");

        while !shutdown.is_triggered() {
            match self.poll_once(&shutdown).await {
                Ok(report) => debug!(
                    unhealthy = report.unhealthy,
                    launched = report.launched,
                    warnings = report.warnings,
                    alarms = report.alarms,
                    "detection cycle complete"
                ),
                Err(e) => warn!(error = %e, "detection cycle failed, retrying next interval"),
            }

            if !shutdown.sleep(self.ctx.config.poll_interval()).await {
                break;
            }
        }

        info!("Escalation detector stopped");
    }
}

/// Watch one container through its check cycles.
async fn escalate(ctx: &TaskContext, service: String, mut shutdown: Shutdown) -> TaskOutcome {
    let mut machine = Escalation::new(service.as_str(), ctx.config.max_retries);
    let mut outcome = TaskOutcome::default();

    loop {
        // The alarm cycle fires on the failure count alone.
        let healthy = !machine.alarm_due() && is_healthy(ctx, &service).await;

        let already_escalated = ctx.processed.contains(&service);
        match machine.tick(healthy, already_escalated) {
            Step::Warn(event) => {
                info!(service = %service, state = ?machine.state(), "health check failing, emitting warning");
                if !emit(ctx, event, &mut shutdown).await {
                    break;
                }
                outcome.warnings += 1;
                if !shutdown.sleep(ctx.config.recheck_delay()).await {
                    debug!(service = %service, "escalation interrupted by shutdown");
                    break;
                }
            }
            Step::Alarm(event) => {
                if ctx.processed.mark(&service) {
                    warn!(service = %service, "check cycles exhausted, escalating to alarm");
                    outcome.alarmed = emit(ctx, event, &mut shutdown).await;
                } else {
                    machine.suppress();
                }
                break;
            }
            Step::Stop => {
                debug!(service = %service, state = ?machine.state(), "escalation finished");
                break;
            }
        }
    }

    outcome
}

async fn is_healthy(ctx: &TaskContext, service: &str) -> bool {
    match ctx.runtime.list_healthy().await {
        Ok(healthy) => healthy.iter().any(|c| c.name == service),
        Err(e) => {
            warn!(service = %service, error = %e, "health recheck failed, assuming still unhealthy");
            false
        }
    }
}

async fn emit(ctx: &TaskContext, event: EscalationEvent, shutdown: &mut Shutdown) -> bool {
    match ctx.events.send(event, shutdown).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "failed to queue escalation event");
            false
        }
    }
}
