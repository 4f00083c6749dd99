//! Alert dispatcher loop

use crate::{
    backoff_delay, Alert, AlertKind, AlertLedger, AlertStatus, AlertTransport, DispatchError,
    DispatcherConfig, Endpoint, RetryLedger,
};
use container_runtime::{names, ContainerRuntime};
use event_bus::{EscalationEvent, EventReceiver, Shutdown};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause after a failed iteration
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Result of submitting an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Endpoint confirmed with 200/201
    Delivered,
    /// An identical alert is already active
    Deduplicated,
    /// Retry budget already exhausted; nothing was sent
    Skipped,
    /// Every attempt in the budget failed
    Exhausted,
    /// Shutdown interrupted the retry backoff
    Interrupted,
}

/// Alert whose delivery budget ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub endpoint: Endpoint,
    pub unit: String,
    pub alert: Alert,
    pub attempts: u32,
}

/// Alert dispatcher
///
/// Owns all alert state; a single task drives it.
pub struct Dispatcher {
    runtime: Arc<dyn ContainerRuntime>,
    transport: Arc<dyn AlertTransport>,
    events: EventReceiver,
    config: DispatcherConfig,
    ledger: AlertLedger,
    retries: RetryLedger,
    dead_letters: VecDeque<DeadLetter>,
    shutdown: Shutdown,
}

impl Dispatcher {
    /// Create a dispatcher draining `events`
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        transport: Arc<dyn AlertTransport>,
        events: EventReceiver,
        config: DispatcherConfig,
        shutdown: Shutdown,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        info!(
            "Creating alert dispatcher: endpoint={}, max_retries={}, initial_backoff={}ms",
            config.base_url, config.max_retries, config.initial_backoff_ms
        );
        Ok(Self {
            runtime,
            transport,
            events,
            retries: RetryLedger::new(config.max_retries, config.retry_cooldown()),
            dead_letters: VecDeque::with_capacity(config.dead_letter_capacity.min(1024)),
            ledger: AlertLedger::new(),
            config,
            shutdown,
        })
    }

    /// Active alerts
    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    /// Delivery retry budgets
    pub fn retries(&self) -> &RetryLedger {
        &self.retries
    }

    /// Undeliverable alerts, oldest first
    pub fn dead_letters(&self) -> impl Iterator<Item = &DeadLetter> {
        self.dead_letters.iter()
    }

    fn build_alert(&self, service: &str, kind: AlertKind, status: AlertStatus) -> Alert {
        Alert::healthcheck_failed(&self.config.severity, &self.config.host, service, kind, status)
    }

    /// Raise the alert an escalation event calls for.
    pub async fn process_event(&mut self, event: EscalationEvent) -> Delivery {
        let kind = AlertKind::from_is_alarm(event.escalated);
        if self.ledger.is_active(kind, &event.service) {
            debug!(service = %event.service, %kind, "alert already active, skipping");
            return Delivery::Deduplicated;
        }

        let alert = self.build_alert(&event.service, kind, AlertStatus::Active);
        self.send(Endpoint::Raise, alert, &event.service).await
    }

    /// Deliver an alert within the `(endpoint, unit)` retry budget.
    ///
    /// The ledger only changes on a 200/201 answer.
    pub async fn send(&mut self, endpoint: Endpoint, alert: Alert, unit: &str) -> Delivery {
        if self.retries.is_exhausted(endpoint, unit) {
            warn!(%endpoint, service = %unit, "skipping alert, maximum retries reached");
            return Delivery::Skipped;
        }

        let kind = alert.kind();
        let mut retry = 0;
        loop {
            info!(%endpoint, service = %unit, %kind, status = ?alert.status, "sending alert");
            let response = self.transport.post(endpoint, &alert).await;
            match response {
                Ok(200 | 201) => {
                    match endpoint {
                        Endpoint::Raise => self.ledger.record_raised(kind, unit),
                        Endpoint::Clear => self.ledger.record_cleared(kind, unit),
                    };
                    self.retries.reset(endpoint, unit);
                    metrics::counter!("watchdog_alerts_delivered_total").increment(1);
                    info!(%endpoint, service = %unit, %kind, "alert request executed successfully");
                    return Delivery::Delivered;
                }
                Ok(status) => {
                    error!(%endpoint, service = %unit, status, "alert endpoint rejected request")
                }
                Err(e) => error!(%endpoint, service = %unit, error = %e, "alert request failed"),
            }

            let attempts = self.retries.record_failure(endpoint, unit);
            if attempts >= self.retries.max_retries() {
                break;
            }

            retry += 1;
            let delay = backoff_delay(self.config.initial_backoff(), retry);
            debug!(%endpoint, service = %unit, attempts, ?delay, "backing off before retry");
            if !self.shutdown.sleep(delay).await {
                return Delivery::Interrupted;
            }
        }

        error!(
            %endpoint,
            service = %unit,
            %kind,
            "exceeded maximum retries, dropping alert"
        );
        metrics::counter!("watchdog_alerts_exhausted_total").increment(1);
        self.dead_letter(DeadLetter {
            endpoint,
            unit: unit.to_string(),
            alert,
            attempts: self.retries.max_retries(),
        });
        Delivery::Exhausted
    }

    fn dead_letter(&mut self, letter: DeadLetter) {
        if self.config.dead_letter_capacity == 0 {
            return;
        }
        while self.dead_letters.len() >= self.config.dead_letter_capacity {
            self.dead_letters.pop_front();
        }
        self.dead_letters.push_back(letter);
    }

    /// Clear active alerts whose container recovered or disappeared.
    ///
    /// Returns the number of clears delivered.
    pub async fn reconcile(&mut self) -> Result<usize, DispatchError> {
        let healthy = names(&self.runtime.list_healthy().await?);
        let known = names(&self.runtime.list_all().await?);

        let mut cleared = 0;
        for kind in [AlertKind::Warning, AlertKind::Alarm] {
            let recovered: Vec<String> = self
                .ledger
                .active(kind)
                .filter(|unit| healthy.contains(*unit) || !known.contains(*unit))
                .map(str::to_string)
                .collect();

            for unit in recovered {
                info!(service = %unit, %kind, present = known.contains(&unit), "container recovered, clearing alert");
                let alert = self.build_alert(&unit, kind, AlertStatus::Cleared);
                if self.send(Endpoint::Clear, alert, &unit).await == Delivery::Delivered {
                    cleared += 1;
                }
            }
        }

        Ok(cleared)
    }

    /// One dispatcher iteration: raise for `event`, then reconcile if
    /// anything is outstanding.
    pub async fn step(&mut self, event: Option<EscalationEvent>) -> Result<(), DispatchError> {
        if let Some(event) = event {
            info!(service = %event.service, escalated = event.escalated, "processing event");
            self.process_event(event).await;
        }

        if !self.ledger.is_empty() {
            self.reconcile().await?;
        }
        Ok(())
    }

    /// Run until shutdown.
    ///
    /// Each iteration waits for an event or the poll interval; a failing
    /// iteration is logged and the loop continues after a short pause.
    pub async fn run(mut self) {
        info!("Starting alert dispatcher");
        let mut channel_open = true;

        loop {
            let interval = self.config.poll_interval();
            let event = tokio::select! {
                received = self.events.recv(), if channel_open => {
                    if received.is_none() {
                        warn!("event channel closed, reconciling only");
                        channel_open = false;
                    }
                    received
                }
                _ = tokio::time::sleep(interval) => None,
                _ = self.shutdown.wait() => break,
            };

            if let Err(e) = self.step(event).await {
                error!(error = %e, "dispatcher iteration failed");
                if !self.shutdown.sleep(ERROR_PAUSE).await {
                    break;
                }
            }
            if self.shutdown.is_triggered() {
                break;
            }
        }

        info!(
            outstanding = self.ledger.len(),
            dead_letters = self.dead_letters.len(),
            "Alert dispatcher stopped"
        );
    }
}
