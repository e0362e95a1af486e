//! Duplicate selection

use std::collections::BTreeMap;

use serde::Serialize;

use super::editor::PatchEditor;
use crate::error::{PatchError, Result};
use crate::patch::{Connection, ModuleGraph, ModuleId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateReport {
    /// Original id → copy id
    pub copies: BTreeMap<ModuleId, ModuleId>,
    pub connected: Vec<Connection>,
    pub failed: Vec<Connection>,
}

impl DuplicateReport {
    pub fn copy_of(&self, original: ModuleId) -> Option<ModuleId> {
        self.copies.get(&original).copied()
    }
}

impl<G: ModuleGraph> PatchEditor<G> {
    /// Copy every selected module, optionally with its wiring.
    ///
    /// Connections between two selected modules are copied between the two
    /// copies. A connection to an unselected module is copied in parallel, so
    /// the unselected neighbour ends up wired to both the original and the
    /// copy.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn duplicate_selection(
        &mut self,
        ids: &[ModuleId],
        copy_connections: bool,
    ) -> Result<DuplicateReport> {
        let selection = self.filter_selection(ids);
        if selection.is_empty() {
            return Err(PatchError::EmptySelection);
        }

        let mut report = DuplicateReport::default();
        for original in &selection {
            let type_tag = self
                .graph
                .module_type(*original)
                .ok_or(PatchError::ModuleNotFound { id: *original })?;
            let copy = match self.graph.add_module(&type_tag) {
                Some(copy) => copy,
                None => {
                    for created in report.copies.values() {
                        self.graph.remove_module(*created);
                        self.forget_module(*created);
                    }
                    tracing::warn!(
                        %original,
                        %type_tag,
                        "duplicate aborted, module creation failed"
                    );
                    return Err(PatchError::ModuleCreationFailed { type_tag });
                }
            };
            self.stats.modules_created += 1;

            let state = self.graph.module_state(*original).unwrap_or_default();
            if !state.is_empty() && !self.graph.set_module_state(copy, &state) {
                tracing::warn!(%copy, "could not copy module state");
            }
            let position = self.layout.position(*original).unwrap_or_default();
            self.layout.place(copy, position + self.config.duplicate_offset);
            report.copies.insert(*original, copy);
        }

        if copy_connections {
            let mut wiring: Vec<Connection> = Vec::new();
            for original in &selection {
                for connection in self.canonical_connections(*original) {
                    if !wiring.contains(&connection) {
                        wiring.push(connection);
                    }
                }
            }
            for connection in wiring {
                let copied = Connection::new(
                    report.copy_of(connection.src).unwrap_or(connection.src),
                    connection.src_channel,
                    report.copy_of(connection.dst).unwrap_or(connection.dst),
                    connection.dst_channel,
                );
                if self.connect_or_record(copied, &mut report.failed) {
                    report.connected.push(copied);
                }
            }
        }

        tracing::info!(
            copies = report.copies.len(),
            connections = report.connected.len(),
            "duplicated selection"
        );
        self.finish_edit(format!("Duplicate {} modules", report.copies.len()))?;
        Ok(report)
    }
}
