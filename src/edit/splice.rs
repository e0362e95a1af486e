//! Splice edits
//!
//! Inserting a module into an existing cable, bypass-deleting a module so its
//! neighbours stay connected, and the plain placement/removal edits. Module
//! creation always happens before anything is disconnected; once the
//! destructive part starts, refused connections are collected and the edit
//! carries on.

use serde::Serialize;

use super::editor::PatchEditor;
use crate::canvas::Point;
use crate::error::{PatchError, Result};
use crate::patch::{Connection, LinkId, ModuleGraph, ModuleId};

/// What a splice-style edit did to the graph
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpliceReport {
    pub created: Vec<ModuleId>,
    pub removed: Vec<ModuleId>,
    pub connected: Vec<Connection>,
    pub disconnected: Vec<Connection>,
    /// Connections the graph refused
    pub failed: Vec<Connection>,
}

impl SpliceReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Order two links as (left, right) stereo channels, if they form a pair
fn stereo_pair(a: Connection, b: Connection) -> Option<(Connection, Connection)> {
    if a.src != b.src || a.dst != b.dst {
        return None;
    }
    let consecutive = |l: &Connection, r: &Connection| {
        l.src_channel.checked_add(1) == Some(r.src_channel)
            && l.dst_channel.checked_add(1) == Some(r.dst_channel)
    };
    if consecutive(&a, &b) {
        Some((a, b))
    } else if consecutive(&b, &a) {
        Some((b, a))
    } else {
        None
    }
}

impl<G: ModuleGraph> PatchEditor<G> {
    fn link_connection(&self, link: LinkId) -> Result<Connection> {
        self.registry
            .connection(link)
            .ok_or(PatchError::LinkNotFound { link })
    }

    fn disconnect_logged(&mut self, connection: Connection, report: &mut SpliceReport) {
        if self.graph.disconnect(&connection) {
            report.disconnected.push(connection);
        } else {
            tracing::warn!(%connection, "connection to remove was already gone");
        }
    }

    fn connect_logged(&mut self, connection: Connection, report: &mut SpliceReport) {
        if self.connect_or_record(connection, &mut report.failed) {
            report.connected.push(connection);
        }
    }

    /// Splice a new module into `connection` without finishing the edit
    pub(crate) fn splice_into(
        &mut self,
        type_tag: &str,
        connection: Connection,
        position: Point,
        report: &mut SpliceReport,
    ) -> Result<ModuleId> {
        let caps = self
            .catalog
            .get(type_tag)
            .cloned()
            .ok_or_else(|| PatchError::ModuleCreationFailed {
                type_tag: type_tag.to_string(),
            })?;
        let signal = self.classify(&connection.source_pin());
        let id = self.create_module(type_tag, Some(signal))?;
        self.layout.place(id, position);
        report.created.push(id);

        self.disconnect_logged(connection, report);
        self.connect_logged(
            Connection::new(connection.src, connection.src_channel, id, caps.primary_input()),
            report,
        );
        self.connect_logged(
            Connection::new(id, caps.primary_output(), connection.dst, connection.dst_channel),
            report,
        );
        Ok(id)
    }

    /// Create a module at `position` and route `link` through it
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn insert_node_on_link(
        &mut self,
        type_tag: &str,
        link: LinkId,
        position: Point,
    ) -> Result<SpliceReport> {
        let connection = self.link_connection(link)?;
        let mut report = SpliceReport::default();
        let id = self.splice_into(type_tag, connection, position, &mut report)?;

        tracing::info!(%id, type_tag, %connection, "inserted module on link");
        self.finish_edit(format!("Insert {} on {}", type_tag, connection))?;
        Ok(report)
    }

    /// Route two links of a stereo pair through one new two-channel module
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn insert_node_on_link_stereo(
        &mut self,
        type_tag: &str,
        link_a: LinkId,
        link_b: LinkId,
        position: Point,
    ) -> Result<SpliceReport> {
        let a = self.link_connection(link_a)?;
        let b = self.link_connection(link_b)?;
        let (left, right) = stereo_pair(a, b).ok_or_else(|| PatchError::StereoLinkMismatch {
            reason: format!("{} and {} are not consecutive channels of one cable pair", a, b),
        })?;

        let caps = self
            .catalog
            .get(type_tag)
            .cloned()
            .ok_or_else(|| PatchError::ModuleCreationFailed {
                type_tag: type_tag.to_string(),
            })?;
        if caps.input_count(&[]) < 2 || caps.output_count(&[]) < 2 {
            return Err(PatchError::StereoLinkMismatch {
                reason: format!("'{}' does not have two inputs and two outputs", type_tag),
            });
        }

        let signal = self.classify(&left.source_pin());
        let id = self.create_module(type_tag, Some(signal))?;
        self.layout.place(id, position);

        let mut report = SpliceReport {
            created: vec![id],
            ..Default::default()
        };
        self.disconnect_logged(left, &mut report);
        self.disconnect_logged(right, &mut report);
        for (channel, original) in [(0u16, left), (1u16, right)] {
            self.connect_logged(
                Connection::new(original.src, original.src_channel, id, channel),
                &mut report,
            );
            self.connect_logged(
                Connection::new(id, channel, original.dst, original.dst_channel),
                &mut report,
            );
        }

        tracing::info!(%id, type_tag, %left, %right, "inserted stereo module");
        self.finish_edit(format!("Insert stereo {} on {} and {}", type_tag, left, right))?;
        Ok(report)
    }

    /// Remove a module, connecting what fed it to what it fed
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn bypass_delete_node(&mut self, id: ModuleId) -> Result<SpliceReport> {
        if id.is_sink() {
            tracing::debug!("the sink cannot be deleted");
            return Ok(SpliceReport::default());
        }
        if !self.graph.contains(id) {
            return Err(PatchError::ModuleNotFound { id });
        }
        self.unmute_for_edit(id);

        let incoming = self.graph.incoming(id);
        let outgoing = self.graph.outgoing(id);
        let mut report = SpliceReport::default();

        for out in &outgoing {
            let feeder = incoming
                .iter()
                .find(|inc| inc.dst_channel == out.src_channel)
                .or_else(|| incoming.first())
                .copied();
            match feeder {
                Some(inc) => {
                    if !report.disconnected.contains(&inc) {
                        self.disconnect_logged(inc, &mut report);
                    }
                    self.disconnect_logged(*out, &mut report);
                    self.connect_logged(
                        Connection::new(inc.src, inc.src_channel, out.dst, out.dst_channel),
                        &mut report,
                    );
                }
                None => self.disconnect_logged(*out, &mut report),
            }
        }

        if self.graph.remove_module(id) {
            report.removed.push(id);
        }
        self.forget_module(id);

        tracing::info!(%id, reconnected = report.connected.len(), "bypass-deleted module");
        self.finish_edit(format!("Bypass delete module {}", id))?;
        Ok(report)
    }

    /// Remove one module and every connection touching it
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn delete_module(&mut self, id: ModuleId) -> Result<SpliceReport> {
        if !id.is_sink() && !self.graph.contains(id) {
            return Err(PatchError::ModuleNotFound { id });
        }
        self.delete_selection(&[id])
    }

    /// Remove every selected module. Missing ids and the sink are skipped.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn delete_selection(&mut self, ids: &[ModuleId]) -> Result<SpliceReport> {
        let selection = self.filter_selection(ids);
        if selection.is_empty() {
            return Err(PatchError::EmptySelection);
        }

        let mut report = SpliceReport::default();
        for id in &selection {
            self.unmute_for_edit(*id);
        }
        for id in selection {
            report.disconnected.extend(self.canonical_connections(id));
            if self.graph.remove_module(id) {
                report.removed.push(id);
            }
            self.forget_module(id);
        }

        tracing::info!(removed = report.removed.len(), "deleted modules");
        let description = match report.removed.as_slice() {
            [single] => format!("Delete module {}", single),
            many => format!("Delete {} modules", many.len()),
        };
        self.finish_edit(description)?;
        Ok(report)
    }

    /// Create a module at a cursor-drop position
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn place_module(&mut self, type_tag: &str, position: Point) -> Result<ModuleId> {
        let id = self.create_module(type_tag, None)?;
        self.layout.place(id, position);
        tracing::info!(%id, type_tag, "placed module");
        self.finish_edit(format!("Place {}", type_tag))?;
        Ok(id)
    }

    /// Move a module on the canvas
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn move_module(&mut self, id: ModuleId, position: Point) -> Result<()> {
        if !self.graph.contains(id) {
            return Err(PatchError::ModuleNotFound { id });
        }
        self.layout.set_position(id, position);
        self.finish_edit(format!("Move module {}", id))
    }

    /// Selected ids that can be edited: existing, not the sink, no repeats,
    /// in selection order
    pub(crate) fn filter_selection(&self, ids: &[ModuleId]) -> Vec<ModuleId> {
        let mut selection = Vec::with_capacity(ids.len());
        for id in ids {
            if id.is_sink() {
                tracing::debug!("sink removed from selection");
            } else if !self.graph.contains(*id) {
                tracing::warn!(%id, "selected module does not exist");
            } else if !selection.contains(id) {
                selection.push(*id);
            }
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_pair_orders_channels() {
        let l = Connection::new(ModuleId(1), 0, ModuleId(2), 0);
        let r = Connection::new(ModuleId(1), 1, ModuleId(2), 1);
        assert_eq!(stereo_pair(r, l), Some((l, r)));
        assert_eq!(stereo_pair(l, r), Some((l, r)));
    }

    #[test]
    fn test_stereo_pair_rejects_mismatches() {
        let l = Connection::new(ModuleId(1), 0, ModuleId(2), 0);
        let other_source = Connection::new(ModuleId(3), 1, ModuleId(2), 1);
        let gap = Connection::new(ModuleId(1), 2, ModuleId(2), 2);
        let crossed = Connection::new(ModuleId(1), 1, ModuleId(2), 0);
        assert!(stereo_pair(l, other_source).is_none());
        assert!(stereo_pair(l, gap).is_none());
        assert!(stereo_pair(l, crossed).is_none());
    }

    #[test]
    fn test_stereo_pair_into_sink() {
        let l = Connection::new(ModuleId(4), 0, ModuleId::SINK, 0);
        let r = Connection::new(ModuleId(4), 1, ModuleId::SINK, 1);
        assert!(stereo_pair(l, r).is_some());
    }
}
