//! Unit executor: the actor loop.
//!
//! A unit runs on its own thread and owns all of its state. Each iteration
//! waits for exactly one message from one of four mailboxes and handles it
//! to completion before waiting again:
//!
//! 1. `rule`: replace the rule (atomic: parse and compile, or nothing).
//! 2. `query`: reply with a snapshot of the applied rule.
//! 3. `in`: transform one input and publish the result.
//! 4. `quit`: stop. Queued messages are not drained.
//!
//! When several mailboxes are ready at once the choice between them is
//! random (`crossbeam_channel::select!`). Each mailbox on its own is FIFO.

use crate::error::UnitError;
use crate::unit::bridge::UnitReport;
use crate::unit::broadcast::Publish;
use crate::unit::id::RuleVersion;
use crate::unit::node::AnyTransform;
use chrono::Utc;
use crossbeam_channel::{select, Receiver, Sender};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// How long a query reply may wait for the requester.
pub const QUERY_REPLY_TIMEOUT: Duration = Duration::from_millis(100);

/// Unit lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    Stopped,
}

/// Counters kept by the unit and returned when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStats {
    /// Inputs handed to the transform.
    pub inputs: u64,
    /// Records published.
    pub outputs: u64,
    /// Inputs dropped because no rule was ever applied.
    pub quiescent_drops: u64,
    /// Failures reported to the host.
    pub errors: u64,
    pub rules_applied: u64,
    pub rules_rejected: u64,
    pub queries: u64,
}

/// One message taken from a mailbox.
#[derive(Debug)]
pub enum UnitEvent {
    Rule(Value),
    Query(Sender<Value>),
    Data(Value),
    Quit,
    /// Every sender of the named mailbox is gone.
    Closed(&'static str),
}

/// The unit's four inbound mailboxes. Routes a kind does not have use
/// `crossbeam_channel::never()`.
pub struct Mailboxes {
    pub rule: Receiver<Value>,
    pub query: Receiver<Sender<Value>>,
    pub data: Receiver<Value>,
    pub quit: Receiver<()>,
}

impl Mailboxes {
    /// Block until one mailbox yields a message.
    pub fn next_event(&self) -> UnitEvent {
        select! {
            recv(self.quit) -> _ => UnitEvent::Quit,
            recv(self.rule) -> msg => match msg {
                Ok(rule) => UnitEvent::Rule(rule),
                Err(_) => UnitEvent::Closed("rule"),
            },
            recv(self.query) -> msg => match msg {
                Ok(reply) => UnitEvent::Query(reply),
                Err(_) => UnitEvent::Closed("query"),
            },
            recv(self.data) -> msg => match msg {
                Ok(data) => UnitEvent::Data(data),
                Err(_) => UnitEvent::Closed("in"),
            },
        }
    }
}

/// A processing unit: one transform strategy plus the state the actor
/// loop owns.
pub struct Unit {
    name: String,
    transform: AnyTransform,
    version: RuleVersion,
    lifecycle: Lifecycle,
    publisher: Arc<dyn Publish>,
    reports: Sender<UnitReport>,
    stats: UnitStats,
}

impl Unit {
    pub fn new(
        name: impl Into<String>,
        transform: AnyTransform,
        publisher: Arc<dyn Publish>,
        reports: Sender<UnitReport>,
    ) -> Self {
        Self {
            name: name.into(),
            transform,
            version: RuleVersion::UNCONFIGURED,
            lifecycle: Lifecycle::Running,
            publisher,
            reports,
            stats: UnitStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        self.transform.name()
    }

    pub fn version(&self) -> RuleVersion {
        self.version
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn stats(&self) -> UnitStats {
        self.stats
    }

    /// Units that consume rules drop all input until one is applied.
    pub fn is_quiescent(&self) -> bool {
        self.transform.accepts_rule() && !self.version.is_configured()
    }

    // ── Main run loop ──

    /// Run until shutdown, then return the final counters.
    pub fn run(mut self, mailboxes: Mailboxes) -> UnitStats {
        tracing::info!("Unit '{}' ({}) started", self.name, self.kind());

        while self.lifecycle == Lifecycle::Running {
            let event = mailboxes.next_event();
            self.handle(event);
        }

        tracing::info!(
            "Unit '{}' stopped: {} inputs, {} outputs, {} errors, {} dropped while unconfigured",
            self.name,
            self.stats.inputs,
            self.stats.outputs,
            self.stats.errors,
            self.stats.quiescent_drops
        );
        self.stats
    }

    /// Handle one event to completion.
    pub fn handle(&mut self, event: UnitEvent) {
        if self.lifecycle == Lifecycle::Stopped {
            return;
        }

        match event {
            UnitEvent::Rule(rule) => self.handle_rule(&rule),
            UnitEvent::Query(reply) => self.handle_query(reply),
            UnitEvent::Data(msg) => self.handle_data(&msg),
            UnitEvent::Quit => {
                self.lifecycle = Lifecycle::Stopped;
            }
            UnitEvent::Closed(mailbox) => {
                tracing::debug!("Unit '{}': '{}' mailbox closed, stopping", self.name, mailbox);
                self.lifecycle = Lifecycle::Stopped;
            }
        }
    }

    // ── Handlers ──

    fn handle_rule(&mut self, rule: &Value) {
        match self.transform.apply_rule(rule) {
            Ok(()) => {
                self.version = self.version.next();
                self.stats.rules_applied += 1;
                tracing::info!("Unit '{}' applied rule {}", self.name, self.version);
            }
            Err(e) => {
                self.stats.rules_rejected += 1;
                self.report(e);
            }
        }
    }

    fn handle_query(&mut self, reply: Sender<Value>) {
        self.stats.queries += 1;
        let snapshot = self.transform.rule().unwrap_or(Value::Null);
        if reply.send_timeout(snapshot, QUERY_REPLY_TIMEOUT).is_err() {
            tracing::debug!("Unit '{}': query requester went away", self.name);
        }
    }

    fn handle_data(&mut self, msg: &Value) {
        if self.is_quiescent() {
            self.stats.quiescent_drops += 1;
            tracing::trace!("Unit '{}' not configured, dropping input", self.name);
            return;
        }

        self.stats.inputs += 1;
        match self.transform.on_data(msg) {
            Ok(Some(record)) => {
                self.publisher.publish(record);
                self.stats.outputs += 1;
            }
            Ok(None) => {}
            Err(e) => self.report(e),
        }
    }

    fn report(&mut self, error: UnitError) {
        self.stats.errors += 1;
        tracing::warn!("Unit '{}': {}", self.name, error);

        let report = UnitReport {
            unit: self.name.clone(),
            unit_kind: self.kind().to_string(),
            error,
            at: Utc::now(),
        };
        if self.reports.try_send(report).is_err() {
            tracing::trace!("Unit '{}': report channel full or closed", self.name);
        }
    }
}
