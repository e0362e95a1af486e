//! Group into composite / ungroup
//!
//! Collapsing serializes the selected modules, the connections between them
//! and one placeholder per external pin into a [`CompositeBlob`], replaces the
//! selection with a single composite module carrying that blob and rewires
//! the outside world to the composite's pins. Expanding reverses it.
//!
//! Inlets are keyed by the outer source pin that fed the selection, outlets by
//! the inner source pin that left it. Every placeholder is one channel wide,
//! in first-seen order.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::editor::PatchEditor;
use crate::canvas::Point;
use crate::error::{PatchError, Result};
use crate::patch::catalog;
use crate::patch::{
    CompositeBlob, Connection, ModuleGraph, ModuleId, NestedModule, Placeholder, PlaceholderRole,
};

/// Vertical spacing for nested modules that were never placed
const UNPLACED_STAGGER: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollapseReport {
    pub composite: ModuleId,
    pub grouped: Vec<ModuleId>,
    pub inlets: usize,
    pub outlets: usize,
    pub connected: Vec<Connection>,
    pub failed: Vec<Connection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandReport {
    /// Id inside the composite → id of the recreated module
    pub restored: BTreeMap<ModuleId, ModuleId>,
    pub connected: Vec<Connection>,
    pub failed: Vec<Connection>,
}

/// Connections touching a selection, split by where they cross its border
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boundary {
    pub internal: Vec<Connection>,
    pub inbound: Vec<Connection>,
    pub outbound: Vec<Connection>,
}

impl Boundary {
    pub fn of(selected: &BTreeSet<ModuleId>, connections: &[Connection]) -> Self {
        let mut boundary = Boundary::default();
        for connection in connections {
            match (selected.contains(&connection.src), selected.contains(&connection.dst)) {
                (true, true) => boundary.internal.push(*connection),
                (false, true) => boundary.inbound.push(*connection),
                (true, false) => boundary.outbound.push(*connection),
                (false, false) => {}
            }
        }
        boundary
    }
}

fn find_or_add(
    placeholders: &mut Vec<Placeholder>,
    role: PlaceholderRole,
    endpoint: (ModuleId, u16),
    next_id: &mut u32,
) -> usize {
    if let Some(index) = placeholders
        .iter()
        .position(|p| p.role == role && p.endpoint == endpoint)
    {
        return index;
    }
    let same_role: Vec<&Placeholder> = placeholders.iter().filter(|p| p.role == role).collect();
    let pin = same_role.len() as u16;
    let base_channel = same_role.iter().map(|p| p.width).sum();
    placeholders.push(Placeholder {
        id: ModuleId(*next_id),
        role,
        pin,
        width: 1,
        base_channel,
        endpoint,
        externals: Vec::new(),
    });
    *next_id = next_id.saturating_add(1);
    placeholders.len() - 1
}

/// Placeholders and nested connections for a selection's border.
///
/// Placeholder ids start at `first_free`, which must not clash with any
/// selected module.
pub fn plan_placeholders(
    boundary: &Boundary,
    first_free: ModuleId,
) -> (Vec<Placeholder>, Vec<Connection>) {
    let mut next_id = first_free.0;
    let mut placeholders = Vec::new();
    let mut nested = boundary.internal.clone();

    for connection in &boundary.inbound {
        let index = find_or_add(
            &mut placeholders,
            PlaceholderRole::Inlet,
            (connection.src, connection.src_channel),
            &mut next_id,
        );
        nested.push(Connection::new(
            placeholders[index].id,
            0,
            connection.dst,
            connection.dst_channel,
        ));
    }

    for connection in &boundary.outbound {
        let known = placeholders.len();
        let index = find_or_add(
            &mut placeholders,
            PlaceholderRole::Outlet,
            (connection.src, connection.src_channel),
            &mut next_id,
        );
        if index == known {
            nested.push(Connection::new(
                connection.src,
                connection.src_channel,
                placeholders[index].id,
                0,
            ));
        }
        placeholders[index]
            .externals
            .push((connection.dst, connection.dst_channel));
    }

    (placeholders, nested)
}

impl<G: ModuleGraph> PatchEditor<G> {
    /// Replace the selection with one composite module
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn collapse_to_composite(&mut self, ids: &[ModuleId]) -> Result<CollapseReport> {
        let selection = self.filter_selection(ids);
        if selection.is_empty() {
            return Err(PatchError::EmptySelection);
        }
        let composite = self.create_module(catalog::COMPOSITE, None)?;
        let was_muted: Vec<ModuleId> =
            self.muted.ids().filter(|id| selection.contains(id)).collect();
        for id in &was_muted {
            self.unmute_for_edit(*id);
        }

        let (blob, centroid) = match self.store_composite(composite, &selection) {
            Ok(stored) => stored,
            Err(e) => {
                self.graph.remove_module(composite);
                self.forget_module(composite);
                let refused = self.lay_mutes(&was_muted);
                self.stats.failed_connections += refused.len() as u64;
                tracing::warn!(error = %e, "collapse aborted, selection left as it was");
                return Err(e);
            }
        };

        for id in &selection {
            self.graph.remove_module(*id);
            self.forget_module(*id);
        }

        let mut connected = Vec::new();
        let mut failed = Vec::new();
        for inlet in blob.inlets() {
            let (module, channel) = inlet.endpoint;
            let edge = Connection::new(module, channel, composite, inlet.base_channel);
            if self.connect_or_record(edge, &mut failed) {
                connected.push(edge);
            }
        }
        for outlet in blob.outlets() {
            for (module, channel) in &outlet.externals {
                let edge = Connection::new(composite, outlet.base_channel, *module, *channel);
                if self.connect_or_record(edge, &mut failed) {
                    connected.push(edge);
                }
            }
        }

        if let Some(centroid) = centroid {
            self.layout.place(composite, centroid);
        }

        let report = CollapseReport {
            composite,
            grouped: selection,
            inlets: blob.inlets().count(),
            outlets: blob.outlets().count(),
            connected,
            failed,
        };
        tracing::info!(
            %composite,
            grouped = report.grouped.len(),
            inlets = report.inlets,
            outlets = report.outlets,
            "collapsed selection into composite"
        );
        self.finish_edit(format!("Collapse {} modules into composite", report.grouped.len()))?;
        Ok(report)
    }

    /// Build the blob for `selection` and store it as the state of
    /// `composite`. Returns the blob and the selection's centroid.
    fn store_composite(
        &mut self,
        composite: ModuleId,
        selection: &[ModuleId],
    ) -> Result<(CompositeBlob, Option<Point>)> {
        let selected: BTreeSet<ModuleId> = selection.iter().copied().collect();
        let boundary = Boundary::of(&selected, &self.graph.connections());
        let first_free = selected
            .iter()
            .next_back()
            .map_or(ModuleId(1), |max| ModuleId(max.0.saturating_add(1)));
        let (placeholders, connections) = plan_placeholders(&boundary, first_free);

        let placed: Vec<Point> = selection
            .iter()
            .filter_map(|id| self.layout.position(*id))
            .collect();
        let centroid = (!placed.is_empty()).then(|| {
            let sum = placed.iter().fold(Point::ORIGIN, |acc, p| acc + *p);
            Point::new(sum.x / placed.len() as f32, sum.y / placed.len() as f32)
        });

        let mut blob = CompositeBlob::new();
        for id in selection {
            let type_tag = self
                .graph
                .module_type(*id)
                .ok_or(PatchError::ModuleNotFound { id: *id })?;
            let offset = match (centroid, self.layout.position(*id)) {
                (Some(c), Some(p)) => Some(p - c),
                _ => None,
            };
            blob.modules.push(NestedModule {
                id: *id,
                type_tag,
                state: self.graph.module_state(*id).unwrap_or_default(),
                offset,
            });
        }
        blob.placeholders = placeholders;
        blob.connections = connections;

        if !self.graph.set_module_state(composite, &blob.to_bytes()?) {
            return Err(PatchError::ModuleCreationFailed {
                type_tag: catalog::COMPOSITE.to_string(),
            });
        }
        Ok((blob, centroid))
    }

    /// Replace a composite with the modules it carries
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn expand_composite(&mut self, id: ModuleId) -> Result<ExpandReport> {
        let type_tag = self
            .graph
            .module_type(id)
            .ok_or(PatchError::ModuleNotFound { id })?;
        if type_tag != catalog::COMPOSITE {
            return Err(PatchError::NotComposite { id });
        }
        let blob = CompositeBlob::from_bytes(&self.graph.module_state(id).unwrap_or_default())?;
        let anchor = self.layout.position(id).unwrap_or_default();

        let mut report = ExpandReport::default();
        let mut positions = Vec::with_capacity(blob.modules.len());
        for (index, nested) in blob.modules.iter().enumerate() {
            let Some(created) = self.graph.add_module(&nested.type_tag) else {
                for restored in report.restored.values() {
                    self.graph.remove_module(*restored);
                }
                tracing::warn!(
                    %id,
                    type_tag = %nested.type_tag,
                    "expand aborted, module creation failed"
                );
                return Err(PatchError::ModuleCreationFailed {
                    type_tag: nested.type_tag.clone(),
                });
            };
            self.stats.modules_created += 1;
            if !nested.state.is_empty() && !self.graph.set_module_state(created, &nested.state) {
                tracing::warn!(%created, "could not restore nested module state");
            }
            let offset = nested
                .offset
                .unwrap_or_else(|| Point::new(0.0, index as f32 * UNPLACED_STAGGER));
            positions.push((created, anchor + offset));
            report.restored.insert(nested.id, created);
        }

        self.unmute_for_edit(id);
        let incoming = self.graph.incoming(id);
        let outgoing = self.graph.outgoing(id);
        self.graph.remove_module(id);
        self.forget_module(id);
        for (created, position) in positions {
            self.layout.place(created, position);
        }

        let remap = |module: ModuleId| report.restored.get(&module).copied();
        let mut wiring: Vec<Connection> = Vec::new();
        for connection in &blob.connections {
            match (blob.placeholder(connection.src), blob.placeholder(connection.dst)) {
                (None, None) => {
                    if let (Some(src), Some(dst)) = (remap(connection.src), remap(connection.dst)) {
                        wiring.push(Connection::new(
                            src,
                            connection.src_channel,
                            dst,
                            connection.dst_channel,
                        ));
                    }
                }
                (Some(inlet), None) if inlet.role == PlaceholderRole::Inlet => {
                    let Some(dst) = remap(connection.dst) else { continue };
                    let channel = inlet.base_channel + connection.src_channel;
                    wiring.extend(
                        incoming
                            .iter()
                            .filter(|outer| outer.dst_channel == channel)
                            .map(|outer| {
                                Connection::new(
                                    outer.src,
                                    outer.src_channel,
                                    dst,
                                    connection.dst_channel,
                                )
                            }),
                    );
                }
                (None, Some(outlet)) if outlet.role == PlaceholderRole::Outlet => {
                    let Some(src) = remap(connection.src) else { continue };
                    let channel = outlet.base_channel + connection.dst_channel;
                    wiring.extend(
                        outgoing
                            .iter()
                            .filter(|outer| outer.src_channel == channel)
                            .map(|outer| {
                                Connection::new(
                                    src,
                                    connection.src_channel,
                                    outer.dst,
                                    outer.dst_channel,
                                )
                            }),
                    );
                }
                _ => tracing::warn!(%connection, "skipping malformed nested connection"),
            }
        }
        for connection in wiring {
            if self.connect_or_record(connection, &mut report.failed) {
                report.connected.push(connection);
            }
        }

        tracing::info!(%id, restored = report.restored.len(), "expanded composite");
        self.finish_edit(format!("Expand composite {}", id))?;
        Ok(report)
    }
}
