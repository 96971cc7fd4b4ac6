//! Runtime hosting a set of named units.
//!
//! The runtime spawns the units an [`AppConfig`] declares, routes
//! [`Envelope`]s to them, and collects every unit's error reports on one
//! shared channel.

use crate::config::{AppConfig, UnitConfig};
use crate::error::{Result, ResultExt, UnitError};
use crate::unit::bridge::{UnitBuilder, UnitHandle, UnitReport};
use crate::unit::broadcast::{Broadcaster, OverflowPolicy, Subscription};
use crate::unit::executor::UnitStats;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default wait for a query reply.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Mailbox an envelope is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Rule,
    Query,
    In,
    Quit,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Route::Rule => "rule",
            Route::Query => "query",
            Route::In => "in",
            Route::Quit => "quit",
        };
        write!(f, "{}", s)
    }
}

/// A message addressed to one unit's mailbox.
///
/// ```json
/// {"unit": "clf", "route": "in", "msg": {"x": 1.0}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub unit: String,
    pub route: Route,
    #[serde(default)]
    pub msg: Value,
}

impl Envelope {
    pub fn new(unit: impl Into<String>, route: Route, msg: Value) -> Self {
        Self {
            unit: unit.into(),
            route,
            msg,
        }
    }

    /// Parse one JSON line.
    pub fn from_json(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// A set of running units keyed by name.
pub struct Runtime {
    units: BTreeMap<String, UnitHandle>,
    reports_tx: Sender<UnitReport>,
    reports_rx: Receiver<UnitReport>,
    mailbox_capacity: usize,
    subscriber_capacity: usize,
    policy: OverflowPolicy,
}

impl Runtime {
    /// Empty runtime using the config's channel settings.
    pub fn new(config: &AppConfig) -> Self {
        let (reports_tx, reports_rx) = bounded(config.reports.capacity.max(1));
        Self {
            units: BTreeMap::new(),
            reports_tx,
            reports_rx,
            mailbox_capacity: config.mailbox.capacity,
            subscriber_capacity: config.broadcast.capacity,
            policy: config.broadcast.policy,
        }
    }

    /// Validate the config and spawn every unit it declares.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let mut runtime = Self::new(config);
        for unit in &config.units {
            runtime
                .spawn_unit(unit)
                .with_context(|| format!("spawning unit '{}'", unit.name))?;
        }
        tracing::info!("Runtime started with {} units", runtime.units.len());
        Ok(runtime)
    }

    /// Spawn one unit and queue its initial rule, if any.
    pub fn spawn_unit(&mut self, config: &UnitConfig) -> Result<()> {
        if self.units.contains_key(&config.name) {
            return Err(UnitError::Config(format!(
                "duplicate unit name '{}'",
                config.name
            )));
        }

        let mut builder = UnitBuilder::new(config.unit_kind()?)
            .name(config.name.clone())
            .mailbox_capacity(self.mailbox_capacity)
            .broadcaster(Broadcaster::new(
                self.policy,
                Some(self.subscriber_capacity),
            ))
            .report_to(self.reports_tx.clone());
        if let Some(seed) = config.seed {
            builder = builder.seed(seed);
        }

        let handle = builder.spawn()?;
        if let Some(rule) = &config.rule {
            handle.update_rule(rule.clone())?;
        }
        self.units.insert(config.name.clone(), handle);
        Ok(())
    }

    pub fn unit(&self, name: &str) -> Result<&UnitHandle> {
        self.units
            .get(name)
            .ok_or_else(|| UnitError::UnknownUnit(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn subscribe(&self, name: &str) -> Result<Subscription> {
        let unit = self.unit(name)?;
        unit.subscribe().ok_or_else(|| {
            UnitError::Config(format!("unit '{}' has no broadcaster", name))
        })
    }

    /// Reports from every unit in this runtime.
    pub fn reports(&self) -> &Receiver<UnitReport> {
        &self.reports_rx
    }

    /// Route one envelope. Returns the reply for `query`, `None` otherwise.
    pub fn dispatch(&self, envelope: Envelope) -> Result<Option<Value>> {
        let unit = self.unit(&envelope.unit)?;
        tracing::trace!("Dispatching '{}' to unit '{}'", envelope.route, envelope.unit);

        match envelope.route {
            Route::Rule => unit.update_rule(envelope.msg).map(|_| None),
            Route::Query => unit.query_rule(DEFAULT_QUERY_TIMEOUT).map(Some),
            Route::In => unit.send(envelope.msg).map(|_| None),
            Route::Quit => {
                unit.shutdown();
                Ok(None)
            }
        }
    }

    /// Signal every unit, then wait for all of them.
    pub fn shutdown(self) -> Result<BTreeMap<String, UnitStats>> {
        for unit in self.units.values() {
            unit.shutdown();
        }

        let mut stats = BTreeMap::new();
        for (name, unit) in self.units {
            let s = unit.join().with_context(|| format!("joining unit '{}'", name))?;
            stats.insert(name, s);
        }
        tracing::info!("Runtime stopped");
        Ok(stats)
    }
}
