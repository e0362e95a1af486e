//! In-memory module graph
//!
//! Reference implementation of [`ModuleGraph`]. Edits land in a draft; the
//! committed topology is published as an immutable, shareable value at each
//! commit, which is all a real-time reader would ever see.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::catalog::{self, ModuleCatalog};
use super::graph::{Connection, ModuleGraph, ModuleId};
use crate::error::{PatchError, Result};

/// Current graph blob schema
pub const GRAPH_BLOB_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModuleRecord {
    type_tag: String,
    #[serde(default)]
    state: Vec<u8>,
}

/// Serialized form of the whole graph
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphDocument {
    version: u32,
    next_id: u32,
    modules: Vec<SavedModule>,
    connections: Vec<Connection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedModule {
    id: ModuleId,
    #[serde(flatten)]
    record: ModuleRecord,
}

/// Topology as last committed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommittedTopology {
    pub generation: u64,
    pub modules: Vec<(ModuleId, String)>,
    pub connections: Vec<Connection>,
}

/// Module graph held entirely in memory
#[derive(Debug, Clone)]
pub struct InMemoryGraph {
    catalog: Arc<ModuleCatalog>,
    modules: BTreeMap<ModuleId, ModuleRecord>,
    connections: Vec<Connection>,
    next_id: u32,
    committed: Arc<CommittedTopology>,
    dirty: bool,
}

impl InMemoryGraph {
    /// Empty graph containing only the sink
    pub fn new(catalog: Arc<ModuleCatalog>) -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(
            ModuleId::SINK,
            ModuleRecord {
                type_tag: catalog::SINK.to_string(),
                state: Vec::new(),
            },
        );
        Self {
            catalog,
            modules,
            connections: Vec::new(),
            next_id: 1,
            committed: Arc::new(CommittedTopology::default()),
            dirty: true,
        }
    }

    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    /// Snapshot of the last committed topology
    pub fn committed(&self) -> Arc<CommittedTopology> {
        Arc::clone(&self.committed)
    }

    /// Whether the draft differs from the committed topology
    pub fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn pin_counts(&self, id: ModuleId) -> Option<(u16, u16)> {
        let record = self.modules.get(&id)?;
        let caps = self.catalog.get(&record.type_tag)?;
        Some((
            caps.input_count(&record.state),
            caps.output_count(&record.state),
        ))
    }

    fn validate(&self, connection: &Connection) -> std::result::Result<(), String> {
        if connection.src.is_sink() {
            return Err("the sink has no outputs".to_string());
        }
        let (_, src_outputs) = self
            .pin_counts(connection.src)
            .ok_or_else(|| format!("unknown source module {}", connection.src))?;
        let (dst_inputs, _) = self
            .pin_counts(connection.dst)
            .ok_or_else(|| format!("unknown destination module {}", connection.dst))?;
        if connection.src_channel >= src_outputs {
            return Err(format!(
                "module {} has no output {}",
                connection.src, connection.src_channel
            ));
        }
        if connection.dst_channel >= dst_inputs {
            return Err(format!(
                "module {} has no input {}",
                connection.dst, connection.dst_channel
            ));
        }
        if self.connections.contains(connection) {
            return Err("connection already exists".to_string());
        }
        Ok(())
    }
}

impl ModuleGraph for InMemoryGraph {
    fn add_module(&mut self, type_tag: &str) -> Option<ModuleId> {
        let creatable = self
            .catalog
            .get(type_tag)
            .map_or(false, |caps| caps.user_creatable());
        if !creatable {
            tracing::debug!(type_tag, "refusing to create module of unknown or internal type");
            return None;
        }

        let id = ModuleId(self.next_id);
        self.next_id = self.next_id.checked_add(1)?;
        self.modules.insert(
            id,
            ModuleRecord {
                type_tag: type_tag.to_string(),
                state: Vec::new(),
            },
        );
        self.dirty = true;
        Some(id)
    }

    fn remove_module(&mut self, id: ModuleId) -> bool {
        if id.is_sink() || self.modules.remove(&id).is_none() {
            return false;
        }
        self.connections.retain(|c| !c.touches(id));
        self.dirty = true;
        true
    }

    fn connect(&mut self, connection: &Connection) -> bool {
        match self.validate(connection) {
            Ok(()) => {
                self.connections.push(*connection);
                self.dirty = true;
                true
            }
            Err(reason) => {
                tracing::debug!(%connection, %reason, "connection rejected");
                false
            }
        }
    }

    fn disconnect(&mut self, connection: &Connection) -> bool {
        match self.connections.iter().position(|c| c == connection) {
            Some(index) => {
                self.connections.remove(index);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    fn connections(&self) -> Vec<Connection> {
        self.connections.clone()
    }

    fn module_type(&self, id: ModuleId) -> Option<String> {
        self.modules.get(&id).map(|r| r.type_tag.clone())
    }

    fn module_ids(&self) -> Vec<ModuleId> {
        self.modules.keys().copied().collect()
    }

    fn module_state(&self, id: ModuleId) -> Option<Vec<u8>> {
        self.modules.get(&id).map(|r| r.state.clone())
    }

    fn set_module_state(&mut self, id: ModuleId, state: &[u8]) -> bool {
        match self.modules.get_mut(&id) {
            Some(record) => {
                record.state = state.to_vec();
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    fn state_blob(&self) -> Result<Vec<u8>> {
        let document = GraphDocument {
            version: GRAPH_BLOB_VERSION,
            next_id: self.next_id,
            modules: self
                .modules
                .iter()
                .filter(|(id, _)| !id.is_sink())
                .map(|(id, record)| SavedModule {
                    id: *id,
                    record: record.clone(),
                })
                .collect(),
            connections: self.connections.clone(),
        };
        Ok(serde_json::to_vec(&document)?)
    }

    fn set_state_blob(&mut self, blob: &[u8]) -> Result<()> {
        let document: GraphDocument =
            serde_json::from_slice(blob).map_err(|e| PatchError::InvalidBlob {
                reason: format!("graph blob: {}", e),
            })?;
        if document.version != GRAPH_BLOB_VERSION {
            return Err(PatchError::InvalidBlob {
                reason: format!("unsupported graph blob version {}", document.version),
            });
        }

        let mut fresh = InMemoryGraph::new(Arc::clone(&self.catalog));
        fresh.next_id = document.next_id.max(1);
        for saved in document.modules {
            if saved.id.is_sink() || !self.catalog.contains(&saved.record.type_tag) {
                tracing::warn!(
                    id = %saved.id,
                    type_tag = %saved.record.type_tag,
                    "module could not be recreated from state blob"
                );
                continue;
            }
            fresh.next_id = fresh.next_id.max(saved.id.0.saturating_add(1));
            fresh.modules.insert(saved.id, saved.record);
        }
        for connection in document.connections {
            if !fresh.connect(&connection) {
                tracing::warn!(%connection, "connection could not be recreated from state blob");
            }
        }

        fresh.committed = Arc::clone(&self.committed);
        *self = fresh;
        Ok(())
    }

    fn commit_pending_topology(&mut self) {
        if !self.dirty {
            return;
        }
        self.committed = Arc::new(CommittedTopology {
            generation: self.committed.generation + 1,
            modules: self
                .modules
                .iter()
                .map(|(id, r)| (*id, r.type_tag.clone()))
                .collect(),
            connections: self.connections.clone(),
        });
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> InMemoryGraph {
        InMemoryGraph::new(Arc::new(ModuleCatalog::with_builtins()))
    }

    #[test]
    fn test_new_graph_has_sink() {
        let g = graph();
        assert!(g.contains(ModuleId::SINK));
        assert_eq!(g.module_type(ModuleId::SINK).as_deref(), Some(catalog::SINK));
    }

    #[test]
    fn test_add_unknown_type_fails() {
        let mut g = graph();
        assert!(g.add_module("does_not_exist").is_none());
        assert!(g.add_module(catalog::INLET).is_none());
        assert_eq!(g.module_count(), 1);
    }

    #[test]
    fn test_connect_validates_channels() {
        let mut g = graph();
        let osc = g.add_module("oscillator").unwrap();
        let vca = g.add_module("vca").unwrap();

        assert!(g.connect(&Connection::new(osc, 0, vca, 1)));
        assert!(!g.connect(&Connection::new(osc, 0, vca, 1)), "duplicate");
        assert!(!g.connect(&Connection::new(osc, 3, vca, 0)), "no such output");
        assert!(!g.connect(&Connection::new(ModuleId::SINK, 0, vca, 0)), "sink as source");
        assert!(g.connect(&Connection::new(vca, 0, ModuleId::SINK, 1)));
    }

    #[test]
    fn test_remove_module_drops_connections() {
        let mut g = graph();
        let osc = g.add_module("oscillator").unwrap();
        g.connect(&Connection::new(osc, 0, ModuleId::SINK, 0));
        assert!(g.remove_module(osc));
        assert!(g.connections().is_empty());
        assert!(!g.remove_module(ModuleId::SINK));
    }

    #[test]
    fn test_commit_publishes_draft() {
        let mut g = graph();
        let osc = g.add_module("oscillator").unwrap();
        g.connect(&Connection::new(osc, 0, ModuleId::SINK, 0));
        assert!(g.committed().connections.is_empty());
        assert!(g.has_pending_changes());

        g.commit_pending_topology();
        let committed = g.committed();
        assert_eq!(committed.generation, 1);
        assert_eq!(committed.connections.len(), 1);
        assert!(!g.has_pending_changes());

        g.commit_pending_topology();
        assert_eq!(g.committed().generation, 1, "no-op commit");
    }

    #[test]
    fn test_state_blob_roundtrip() {
        let mut g = graph();
        let osc = g.add_module("oscillator").unwrap();
        let filter = g.add_module("filter").unwrap();
        g.set_module_state(filter, b"{\"cutoff\":440}");
        g.connect(&Connection::new(osc, 0, filter, 0));
        g.connect(&Connection::new(filter, 0, ModuleId::SINK, 0));
        let blob = g.state_blob().unwrap();

        let mut other = graph();
        other.set_state_blob(&blob).unwrap();
        assert_eq!(other.connections(), g.connections());
        assert_eq!(other.module_state(filter), g.module_state(filter));
        assert_eq!(other.add_module("lfo"), Some(ModuleId(3)));
    }

    #[test]
    fn test_state_blob_skips_unknown_types() {
        let mut g = graph();
        let blob = br#"{"version":1,"next_id":3,"modules":[
            {"id":1,"type_tag":"oscillator","state":[]},
            {"id":2,"type_tag":"theremin","state":[]}],
            "connections":[{"src":2,"src_channel":0,"dst":0,"dst_channel":0}]}"#;
        g.set_state_blob(blob).unwrap();
        assert!(g.contains(ModuleId(1)));
        assert!(!g.contains(ModuleId(2)));
        assert!(g.connections().is_empty());
    }

    #[test]
    fn test_state_blob_rejects_garbage() {
        let mut g = graph();
        assert!(g.set_state_blob(b"][").is_err());
    }
}
