//! Mute and unmute
//!
//! Muting takes a module out of the signal path without deleting it: every
//! connection touching it is captured and removed, and the source of the first
//! captured incoming connection is wired straight to every captured outgoing
//! destination. Unmuting reverses exactly that.
//!
//! A module muted after its neighbour captures the neighbour's splice as its
//! own wiring, so mutes form a stack: they are lifted newest first and laid
//! back oldest first.

use serde::Serialize;

use super::editor::PatchEditor;
use crate::error::{PatchError, Result};
use crate::patch::{Connection, ModuleGraph, ModuleId};

/// Everything needed to undo a mute splice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutedState {
    pub incoming: Vec<Connection>,
    pub outgoing: Vec<Connection>,
    /// Splice connections this mute actually created
    pub splices: Vec<Connection>,
}

impl MutedState {
    /// Capture the wiring of `id` as it is now
    pub fn capture<G: ModuleGraph + ?Sized>(graph: &G, id: ModuleId) -> Self {
        Self {
            incoming: graph.incoming(id),
            outgoing: graph.outgoing(id),
            splices: Vec::new(),
        }
    }

    /// Connections the splice should create
    pub fn planned_splices(&self) -> Vec<Connection> {
        let Some(first) = self.incoming.first() else {
            return Vec::new();
        };
        self.outgoing
            .iter()
            .map(|out| Connection::new(first.src, first.src_channel, out.dst, out.dst_channel))
            .collect()
    }

    /// Disconnect the captured wiring and splice around the module.
    ///
    /// Returns the splice edges the graph refused.
    pub fn apply<G: ModuleGraph + ?Sized>(&mut self, graph: &mut G) -> Vec<Connection> {
        for connection in self.incoming.iter().chain(self.outgoing.iter()) {
            if !graph.disconnect(connection) {
                tracing::debug!(%connection, "captured connection already gone");
            }
        }

        self.splices.clear();
        let mut refused = Vec::new();
        for splice in self.planned_splices() {
            if graph.connect(&splice) {
                self.splices.push(splice);
            } else {
                tracing::warn!(connection = %splice, "mute splice refused");
                refused.push(splice);
            }
        }
        refused
    }

    /// Remove the splice and restore every captured connection.
    ///
    /// Returns the captured connections that could not be restored.
    pub fn revert<G: ModuleGraph + ?Sized>(&self, graph: &mut G) -> Vec<Connection> {
        for splice in &self.splices {
            if !graph.disconnect(splice) {
                tracing::debug!(connection = %splice, "mute splice already gone");
            }
        }

        let mut refused = Vec::new();
        for connection in self.incoming.iter().chain(self.outgoing.iter()) {
            if !graph.connect(connection) {
                tracing::warn!(%connection, "could not restore connection on unmute");
                refused.push(*connection);
            }
        }
        refused
    }

    /// The module's wiring as if it were not muted
    pub fn canonical_connections(&self) -> impl Iterator<Item = &Connection> {
        self.incoming.iter().chain(self.outgoing.iter())
    }
}

/// Mute records in the order the modules were muted
#[derive(Debug, Clone, Default)]
pub struct MuteStack {
    records: Vec<(ModuleId, MutedState)>,
}

impl MuteStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: ModuleId) -> Option<&MutedState> {
        self.records.iter().find(|(m, _)| *m == id).map(|(_, state)| state)
    }

    /// Muted modules, oldest mute first
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.records.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, id: ModuleId) -> Option<usize> {
        self.records.iter().position(|(m, _)| *m == id)
    }

    pub(crate) fn push(&mut self, id: ModuleId, state: MutedState) {
        self.records.push((id, state));
    }

    /// Drop a record without touching the graph
    pub(crate) fn remove(&mut self, id: ModuleId) -> Option<MutedState> {
        self.position(id).map(|index| self.records.remove(index).1)
    }

    pub(crate) fn retain(&mut self, keep: impl Fn(ModuleId) -> bool) {
        self.records.retain(|(id, _)| keep(*id));
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    fn split_off(&mut self, index: usize) -> Vec<(ModuleId, MutedState)> {
        self.records.split_off(index.min(self.records.len()))
    }

    /// Records newest first
    fn iter_rev(&self) -> impl Iterator<Item = &MutedState> {
        self.records.iter().rev().map(|(_, state)| state)
    }
}

impl<G: ModuleGraph> PatchEditor<G> {
    /// Mute a module. Returns `false` when it was already muted.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn mute_module(&mut self, id: ModuleId) -> Result<bool> {
        if id.is_sink() {
            tracing::debug!("the sink cannot be muted");
            return Ok(false);
        }
        if !self.graph.contains(id) {
            return Err(PatchError::ModuleNotFound { id });
        }
        if self.muted.contains(id) {
            return Ok(false);
        }

        let mut state = MutedState::capture(&self.graph, id);
        let refused = state.apply(&mut self.graph);
        self.stats.failed_connections += refused.len() as u64;
        tracing::info!(
            %id,
            captured = state.incoming.len() + state.outgoing.len(),
            splices = state.splices.len(),
            "muted module"
        );
        self.muted.push(id, state);

        self.finish_edit(format!("Mute module {}", id))?;
        Ok(true)
    }

    /// Unmute a module. Returns `false` when it was not muted.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn unmute_module(&mut self, id: ModuleId) -> Result<bool> {
        if !self.unmute_for_edit(id) {
            return Ok(false);
        }
        tracing::info!(%id, "unmuted module");
        self.finish_edit(format!("Unmute module {}", id))?;
        Ok(true)
    }

    /// Flip the mute state of a module; returns whether it is muted afterwards
    pub fn toggle_mute(&mut self, id: ModuleId) -> Result<bool> {
        if self.is_muted(id) {
            self.unmute_module(id)?;
            Ok(false)
        } else {
            self.mute_module(id)
        }
    }

    pub fn is_muted(&self, id: ModuleId) -> bool {
        self.muted.contains(id)
    }

    /// Muted modules, oldest mute first
    pub fn muted_modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.muted.ids()
    }

    pub fn mute_record(&self, id: ModuleId) -> Option<&MutedState> {
        self.muted.get(id)
    }

    /// The whole graph's wiring with every mute lifted, computed without
    /// touching the graph
    pub(crate) fn canonical_wiring(&self) -> Vec<Connection> {
        let mut wiring = self.graph.connections();
        for state in self.muted.iter_rev() {
            wiring.retain(|c| !state.splices.contains(c));
            for connection in state.canonical_connections() {
                if !wiring.contains(connection) {
                    wiring.push(*connection);
                }
            }
        }
        wiring
    }

    /// Restore a muted module's wiring and drop its record, without a
    /// snapshot. Mutes laid after it are lifted and laid back around it.
    /// Used before edits that need the canonical wiring.
    pub(crate) fn unmute_for_edit(&mut self, id: ModuleId) -> bool {
        let Some(index) = self.muted.position(id) else {
            return false;
        };
        let mut lifted = self.lift_mutes(index);
        lifted.retain(|m| *m != id);
        let refused = self.lay_mutes(&lifted);
        self.stats.failed_connections += refused.len() as u64;
        true
    }

    /// Revert the mutes from stack position `index` up, newest first.
    /// Returns their ids in mute order.
    pub(crate) fn lift_mutes(&mut self, index: usize) -> Vec<ModuleId> {
        let lifted = self.muted.split_off(index);
        for (_, state) in lifted.iter().rev() {
            let refused = state.revert(&mut self.graph);
            self.stats.failed_connections += refused.len() as u64;
        }
        lifted.into_iter().map(|(id, _)| id).collect()
    }

    /// Mute `ids` in order against the current wiring. Returns the splice
    /// edges the graph refused.
    pub(crate) fn lay_mutes(&mut self, ids: &[ModuleId]) -> Vec<Connection> {
        let mut refused = Vec::new();
        for id in ids {
            if id.is_sink() || !self.graph.contains(*id) || self.muted.contains(*id) {
                continue;
            }
            let mut state = MutedState::capture(&self.graph, *id);
            refused.extend(state.apply(&mut self.graph));
            self.muted.push(*id, state);
        }
        refused
    }
}
