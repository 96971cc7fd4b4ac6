//! Thread boundary between a unit and its host.
//!
//! `UnitBuilder` creates the mailboxes and spawns the unit on a dedicated
//! thread. `UnitHandle` is the host-side end: it sends rules, queries and
//! input, hands out subscriptions, and signals shutdown.

use crate::error::{ErrorKind, Result, UnitError};
use crate::unit::broadcast::{Broadcaster, Publish, Subscription};
use crate::unit::executor::{Mailboxes, Unit, UnitStats};
use crate::unit::kind::UnitKind;
use crate::unit::node::AnyTransform;
use crate::unit::port::{has_input, PortKind};
use crate::unit::sampler::{seeded_source, UniformSource};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, never, Receiver, RecvTimeoutError, Sender};
use serde_json::Value;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Channel capacity for each inbound mailbox (host → unit).
pub const MAILBOX_CAPACITY: usize = 256;
/// Channel capacity for error reports (unit → host).
pub const REPORT_CAPACITY: usize = 1024;

/// A failure a unit recovered from, reported to the host.
#[derive(Debug)]
pub struct UnitReport {
    /// Name of the reporting unit.
    pub unit: String,
    /// Kind of the reporting unit.
    pub unit_kind: String,
    pub error: UnitError,
    pub at: DateTime<Utc>,
}

impl UnitReport {
    pub fn error_kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl std::fmt::Display for UnitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.at.format("%H:%M:%S%.3f"),
            self.unit,
            self.unit_kind,
            self.error
        )
    }
}

enum Output {
    Broadcaster(Broadcaster),
    Publisher(Arc<dyn Publish>),
}

/// Builder for spawning a unit.
pub struct UnitBuilder {
    name: String,
    kind: Option<UnitKind>,
    transform: Option<AnyTransform>,
    seed: Option<u64>,
    sampler: Option<Box<dyn UniformSource>>,
    mailbox_capacity: usize,
    output: Option<Output>,
    reports: Option<Sender<UnitReport>>,
}

impl UnitBuilder {
    /// Builder for a built-in unit kind.
    pub fn new(kind: UnitKind) -> Self {
        Self {
            name: kind.name().to_string(),
            kind: Some(kind),
            transform: None,
            seed: None,
            sampler: None,
            mailbox_capacity: MAILBOX_CAPACITY,
            output: None,
            reports: None,
        }
    }

    /// Builder for a unit running an already constructed transform.
    pub fn with_transform(transform: AnyTransform) -> Self {
        Self {
            name: transform.name().to_string(),
            kind: None,
            transform: Some(transform),
            seed: None,
            sampler: None,
            mailbox_capacity: MAILBOX_CAPACITY,
            output: None,
            reports: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Seed the unit's sample source. Ignored when `sampler` is set.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn sampler(mut self, sampler: Box<dyn UniformSource>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Publish into an existing broadcaster.
    pub fn broadcaster(mut self, broadcaster: Broadcaster) -> Self {
        self.output = Some(Output::Broadcaster(broadcaster));
        self
    }

    /// Publish through a host-provided capability. The handle then
    /// cannot hand out subscriptions.
    pub fn publisher(mut self, publisher: Arc<dyn Publish>) -> Self {
        self.output = Some(Output::Publisher(publisher));
        self
    }

    /// Send reports to a shared host channel instead of a per-unit one.
    pub fn report_to(mut self, reports: Sender<UnitReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Spawn the unit on its own thread.
    pub fn spawn(self) -> Result<UnitHandle> {
        let transform = match (self.transform, self.kind) {
            (Some(transform), _) => transform,
            (None, Some(kind)) => {
                tracing::debug!("Spawning unit '{}' ({}: {})", self.name, kind, kind.description());
                let sampler = self.sampler.unwrap_or_else(|| seeded_source(self.seed));
                AnyTransform::for_kind(kind, sampler)
            }
            (None, None) => {
                return Err(UnitError::Config("unit has neither kind nor transform".into()))
            }
        };
        let unit_kind = transform.name().to_string();
        let ports = transform.ports();

        let (rule_tx, rule_rx) = if has_input(ports, PortKind::Rule) {
            let (tx, rx) = bounded(self.mailbox_capacity);
            (Some(tx), rx)
        } else {
            (None, never())
        };
        let (query_tx, query_rx) = if has_input(ports, PortKind::Query) {
            let (tx, rx) = bounded(self.mailbox_capacity);
            (Some(tx), rx)
        } else {
            (None, never())
        };
        let (data_tx, data_rx) = bounded(self.mailbox_capacity);
        let (quit_tx, quit_rx) = bounded(1);

        let (reports_tx, reports_rx) = match self.reports {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = bounded(REPORT_CAPACITY);
                (tx, Some(rx))
            }
        };

        let (publisher, broadcaster): (Arc<dyn Publish>, Option<Broadcaster>) = match self.output {
            Some(Output::Broadcaster(b)) => (Arc::new(b.clone()), Some(b)),
            Some(Output::Publisher(p)) => (p, None),
            None => {
                let b = Broadcaster::default();
                (Arc::new(b.clone()), Some(b))
            }
        };

        let unit = Unit::new(self.name.clone(), transform, publisher, reports_tx);
        let mailboxes = Mailboxes {
            rule: rule_rx,
            query: query_rx,
            data: data_rx,
            quit: quit_rx,
        };

        let thread = std::thread::Builder::new()
            .name(format!("unit-{}", self.name))
            .spawn(move || unit.run(mailboxes))?;

        Ok(UnitHandle {
            name: self.name,
            unit_kind,
            rule_tx,
            query_tx,
            data_tx,
            quit_tx,
            broadcaster,
            reports: reports_rx,
            thread: Some(thread),
        })
    }
}

/// Host-side handle for one running unit.
///
/// Dropping the handle signals shutdown but does not wait for the thread.
pub struct UnitHandle {
    name: String,
    unit_kind: String,
    rule_tx: Option<Sender<Value>>,
    query_tx: Option<Sender<Sender<Value>>>,
    data_tx: Sender<Value>,
    quit_tx: Sender<()>,
    broadcaster: Option<Broadcaster>,
    reports: Option<Receiver<UnitReport>>,
    thread: Option<JoinHandle<UnitStats>>,
}

impl UnitHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.unit_kind
    }

    fn unsupported(&self, route: &str) -> UnitError {
        UnitError::UnsupportedRoute {
            kind: self.unit_kind.clone(),
            route: route.to_string(),
        }
    }

    fn stopped(&self) -> UnitError {
        UnitError::Channel(format!("unit '{}' has stopped", self.name))
    }

    /// Queue a rule update. The outcome is visible through `query_rule`
    /// and the report channel.
    pub fn update_rule(&self, rule: Value) -> Result<()> {
        let tx = self.rule_tx.as_ref().ok_or_else(|| self.unsupported("rule"))?;
        tx.send(rule).map_err(|_| self.stopped())
    }

    /// Ask for the applied rule and wait up to `timeout` for the reply.
    pub fn query_rule(&self, timeout: Duration) -> Result<Value> {
        let tx = self.query_tx.as_ref().ok_or_else(|| self.unsupported("query"))?;
        let (reply_tx, reply_rx) = bounded(1);
        tx.send_timeout(reply_tx, timeout).map_err(|_| self.stopped())?;

        reply_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => UnitError::Timeout(format!(
                "unit '{}' did not answer a query within {:?}",
                self.name, timeout
            )),
            RecvTimeoutError::Disconnected => self.stopped(),
        })
    }

    /// Queue one input message.
    pub fn send(&self, msg: Value) -> Result<()> {
        self.data_tx.send(msg).map_err(|_| self.stopped())
    }

    /// Subscribe to the unit's output. `None` when the unit publishes
    /// through a host-provided capability.
    pub fn subscribe(&self) -> Option<Subscription> {
        self.broadcaster.as_ref().map(Broadcaster::subscribe)
    }

    pub fn broadcaster(&self) -> Option<&Broadcaster> {
        self.broadcaster.as_ref()
    }

    /// Per-unit report channel. `None` when reports go to a shared channel.
    pub fn reports(&self) -> Option<&Receiver<UnitReport>> {
        self.reports.as_ref()
    }

    /// Signal shutdown. Repeated calls are harmless.
    pub fn shutdown(&self) {
        let _ = self.quit_tx.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the unit to stop and return its counters. Does not signal
    /// shutdown by itself.
    pub fn join(mut self) -> Result<UnitStats> {
        let thread = self.thread.take().ok_or_else(|| self.stopped())?;
        thread
            .join()
            .map_err(|_| UnitError::Channel(format!("unit '{}' panicked", self.name)))
    }

    /// Signal shutdown and wait for the unit to stop.
    pub fn stop(self) -> Result<UnitStats> {
        self.shutdown();
        self.join()
    }
}

impl Drop for UnitHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}
