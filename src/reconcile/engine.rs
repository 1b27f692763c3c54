// Firewalld State - Transaction Engine
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Idempotent check-then-mutate across the selected layers.

use serde::Serialize;
use tracing::{debug, info};

use super::RuleOps;
use crate::error::{ReconcileError, Result};
use crate::firewall::FirewallBackend;
use crate::models::{DesiredState, Layer, Layers};

/// Result of reconciling one primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub messages: Vec<String>,
}

/// Reconciles one primitive in one zone.
pub struct Transaction<'a, K: RuleOps> {
    fw: &'a dyn FirewallBackend,
    kind: K,
    zone: String,
    desired: DesiredState,
    layers: Layers,
    check_mode: bool,
}

impl<'a, K: RuleOps> Transaction<'a, K> {
    pub fn new(
        fw: &'a dyn FirewallBackend,
        kind: K,
        zone: impl Into<String>,
        desired: DesiredState,
        layers: Layers,
    ) -> Self {
        Self {
            fw,
            kind,
            zone: zone.into(),
            desired,
            layers,
            check_mode: false,
        }
    }

    /// Report what would change without changing it.
    pub fn check_mode(mut self, enabled: bool) -> Self {
        self.check_mode = enabled;
        self
    }

    /// Probe every selected layer, then fix the ones that differ.
    ///
    /// All probes run before the first mutation, so a failing probe leaves
    /// both layers untouched.
    pub fn run(&self) -> Result<Outcome> {
        if self.layers.immediate && self.fw.is_offline() {
            return Err(ReconcileError::UnreachableDaemon);
        }

        let mut probes = Vec::with_capacity(2);
        if self.layers.permanent {
            let enabled = self.kind.get_enabled_permanent(self.fw, &self.zone)?;
            probes.push((Layer::Permanent, enabled));
        }
        if self.layers.immediate {
            let enabled = self.kind.get_enabled_immediate(self.fw, &self.zone)?;
            probes.push((Layer::Runtime, enabled));
        }

        let want = self.desired.wants_enabled();
        let mut outcome = Outcome::default();

        for (layer, enabled) in probes {
            if enabled == want {
                debug!("{} layer already {}", layer, self.desired);
                continue;
            }

            if !self.check_mode {
                self.apply(layer, want)?;
            }

            let message = if want {
                self.kind.enabled_message(&self.zone)
            } else {
                self.kind.disabled_message(&self.zone)
            };
            info!("{} ({} layer)", message, layer);
            outcome.changed = true;
            outcome.messages.push(format!("{} ({} layer)", message, layer));
        }

        Ok(outcome)
    }

    fn apply(&self, layer: Layer, enable: bool) -> Result<()> {
        let (fw, zone) = (self.fw, self.zone.as_str());
        match (layer, enable) {
            (Layer::Permanent, true) => self.kind.set_enabled_permanent(fw, zone),
            (Layer::Permanent, false) => self.kind.set_disabled_permanent(fw, zone),
            (Layer::Runtime, true) => self.kind.set_enabled_immediate(fw, zone),
            (Layer::Runtime, false) => self.kind.set_disabled_immediate(fw, zone),
        }
    }
}
