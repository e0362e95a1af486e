//! Editor session
//!
//! [`PatchEditor`] owns everything one editing session needs: the graph
//! collaborator, the per-cycle connection registry, module layout, mute
//! records, undo history and cached pin geometry. Each edit operation lives
//! in its own module as an `impl` block on the editor; this module holds the
//! edit cycle itself (commit, registry rebuild, snapshot) and undo/redo.

use std::sync::Arc;

use serde::Serialize;

use super::mute::MuteStack;
use crate::canvas::{GeometryCache, Point, Size};
use crate::config::EditorConfig;
use crate::error::{PatchError, Result};
use crate::patch::catalog::{self, AdapterParams};
use crate::patch::{
    Connection, ConnectionRegistry, KindTable, ModuleCatalog, ModuleGraph, ModuleId, PinAddress,
    SignalClassifier, SignalKind,
};
use crate::state::{HistoryManager, LayoutStore, LayoutTree, Snapshot};

/// Per-session counters, reported by `inspect`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditStats {
    /// Completed edit cycles (commit + registry rebuild)
    pub cycles: u64,
    pub snapshots: u64,
    pub undos: u64,
    pub redos: u64,
    pub modules_created: u64,
    pub adapters_inserted: u64,
    /// Connections the graph refused during multi-edge operations
    pub failed_connections: u64,
    /// Layout entries dropped on restore because their module was missing
    pub skipped_layout_entries: u64,
}

/// One editing session over a module graph
pub struct PatchEditor<G: ModuleGraph> {
    pub(crate) graph: G,
    pub(crate) catalog: Arc<ModuleCatalog>,
    pub(crate) classifier: Box<dyn SignalClassifier>,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) layout: LayoutStore,
    pub(crate) muted: MuteStack,
    pub(crate) history: HistoryManager,
    pub(crate) geometry: GeometryCache,
    pub(crate) config: EditorConfig,
    pub(crate) stats: EditStats,
}

impl<G: ModuleGraph> PatchEditor<G> {
    /// Open a session on `graph` and record its current state as the first
    /// snapshot.
    pub fn new(graph: G, catalog: Arc<ModuleCatalog>, config: EditorConfig) -> Result<Self> {
        Self::open(graph, catalog, config, &LayoutTree::default())
    }

    /// Open a session on a saved patch: `graph` holds the canonical wiring,
    /// `layout` the positions and mute flags saved with it.
    pub fn open(
        graph: G,
        catalog: Arc<ModuleCatalog>,
        config: EditorConfig,
        layout: &LayoutTree,
    ) -> Result<Self> {
        config.validate()?;
        let mut editor = Self {
            graph,
            catalog,
            classifier: Box::new(KindTable::new()),
            registry: ConnectionRegistry::new(),
            layout: LayoutStore::new(),
            muted: MuteStack::new(),
            history: HistoryManager::new(config.history.max_undo_levels),
            geometry: GeometryCache::new(),
            config,
            stats: EditStats::default(),
        };
        editor.apply_layout_tree(layout);
        editor.refresh();
        editor.push_snapshot("Open patch")?;
        Ok(editor)
    }

    /// Replace the signal-kind classifier used by `connect`
    pub fn with_classifier(mut self, classifier: impl SignalClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn set_classifier(&mut self, classifier: impl SignalClassifier + 'static) {
        self.classifier = Box::new(classifier);
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn into_graph(self) -> G {
        self.graph
    }

    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn layout(&self) -> &LayoutStore {
        &self.layout
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn stats(&self) -> &EditStats {
        &self.stats
    }

    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    /// Pin positions are written by the UI as it draws
    pub fn geometry_mut(&mut self) -> &mut GeometryCache {
        &mut self.geometry
    }

    /// Record the size the UI measured for a module
    pub fn record_size(&mut self, id: ModuleId, size: Size) {
        self.layout.record_size(id, size);
    }

    pub fn position(&self, id: ModuleId) -> Option<Point> {
        self.layout.position(id)
    }

    pub fn classify(&self, pin: &PinAddress) -> SignalKind {
        self.classifier.classify(pin)
    }

    /// Footprint used for layout: measured, else estimated, else the fallback
    pub fn footprint(&self, id: ModuleId) -> Size {
        if let Some(size) = self.layout.measured_size(id) {
            return size;
        }
        self.graph
            .module_type(id)
            .and_then(|tag| self.catalog.get(&tag).cloned())
            .map(|caps| caps.footprint(&self.graph.module_state(id).unwrap_or_default()))
            .unwrap_or(self.config.layout.fallback_size)
    }

    /// Connections of a module as they are when nothing is muted,
    /// incoming first
    pub fn canonical_connections(&self, id: ModuleId) -> Vec<Connection> {
        if self.muted.is_empty() {
            let mut connections = self.graph.incoming(id);
            connections.extend(self.graph.outgoing(id));
            return connections;
        }
        let wiring = self.canonical_wiring();
        let mut connections: Vec<Connection> =
            wiring.iter().filter(|c| c.dst == id).copied().collect();
        connections.extend(wiring.iter().filter(|c| c.src == id));
        connections
    }

    /// Commit the draft topology and rebuild everything derived from it
    pub(crate) fn refresh(&mut self) {
        self.graph.commit_pending_topology();
        let graph = &self.graph;
        self.layout.confirm_pending(|id| graph.contains(id));
        self.registry.rebuild(&self.graph.connections());
        self.stats.cycles += 1;
    }

    /// End of every mutating operation: drop records of vanished modules,
    /// snapshot, then commit.
    pub(crate) fn finish_edit(&mut self, description: impl Into<String>) -> Result<()> {
        let graph = &self.graph;
        self.layout.retain(|id| graph.contains(id));
        self.muted.retain(|id| graph.contains(id));
        self.push_snapshot(description)?;
        self.refresh();
        Ok(())
    }

    /// Connect one edge of a multi-edge operation, recording a refusal
    pub(crate) fn connect_or_record(
        &mut self,
        connection: Connection,
        failed: &mut Vec<Connection>,
    ) -> bool {
        if self.graph.connect(&connection) {
            true
        } else {
            tracing::warn!(%connection, "connection refused, continuing");
            self.stats.failed_connections += 1;
            failed.push(connection);
            false
        }
    }

    /// Create a module, seeding adapter and pass-through state from the
    /// signal kind feeding it.
    pub(crate) fn create_module(
        &mut self,
        type_tag: &str,
        fed_by: Option<SignalKind>,
    ) -> Result<ModuleId> {
        let id = self.graph.add_module(type_tag).ok_or_else(|| {
            tracing::warn!(type_tag, "module creation failed");
            PatchError::ModuleCreationFailed {
                type_tag: type_tag.to_string(),
            }
        })?;
        self.stats.modules_created += 1;

        if let Some(params) = self.seed_params(type_tag, fed_by.unwrap_or_default()) {
            if !self.graph.set_module_state(id, &params.to_bytes()?) {
                tracing::warn!(%id, type_tag, "could not seed module state");
            }
        }
        Ok(id)
    }

    fn seed_params(&self, type_tag: &str, signal: SignalKind) -> Option<AdapterParams> {
        if self.catalog.is_passthrough(type_tag) {
            return Some(AdapterParams::Passthrough { signal });
        }
        match type_tag {
            catalog::MAP_RANGE => {
                let (min, max) = signal.range()?;
                Some(AdapterParams::MapRange {
                    in_min: min,
                    in_max: max,
                    out_min: min,
                    out_max: max,
                })
            }
            catalog::COMPARATOR => {
                let threshold = signal.range().map_or(0.5, |(min, max)| (min + max) / 2.0);
                Some(AdapterParams::Comparator { threshold })
            }
            _ => None,
        }
    }

    /// Drop a module's editor-side records after it left the graph
    pub(crate) fn forget_module(&mut self, id: ModuleId) {
        self.layout.remove(id);
        self.geometry.forget_module(id);
        self.muted.remove(id);
    }

    /// Capture the current patch onto the undo stack.
    ///
    /// Pending layout writes are confirmed first. The graph blob is taken
    /// with every mute lifted, then the mutes are laid back in their order.
    pub fn push_snapshot(&mut self, description: impl Into<String>) -> Result<Arc<Snapshot>> {
        let graph = &self.graph;
        self.layout.confirm_pending(|id| graph.contains(id));

        let mute_order = self.lift_mutes(0);
        let blob = self.graph.state_blob();
        for connection in self.lay_mutes(&mute_order) {
            tracing::debug!(%connection, "splice refused while re-muting");
        }
        let blob = blob?;

        let snapshot = Snapshot::new(description, blob, self.layout.to_tree(&mute_order));
        tracing::debug!(snapshot = %snapshot, "pushed snapshot");
        self.stats.snapshots += 1;
        Ok(self.history.push(snapshot))
    }

    /// Step back to the previous snapshot
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn undo(&mut self) -> Result<Arc<Snapshot>> {
        let snapshot = self.history.undo()?;
        if let Err(e) = self.restore(&snapshot) {
            self.history.redo()?;
            return Err(e);
        }
        self.stats.undos += 1;
        tracing::info!(description = %snapshot.description, "undo");
        Ok(snapshot)
    }

    /// Re-apply the most recently undone snapshot
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn redo(&mut self) -> Result<Arc<Snapshot>> {
        let snapshot = self.history.redo()?;
        if let Err(e) = self.restore(&snapshot) {
            self.history.undo()?;
            return Err(e);
        }
        self.stats.redos += 1;
        tracing::info!(description = %snapshot.description, "redo");
        Ok(snapshot)
    }

    /// Graph blob first, then layout, then mutes
    fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.graph.set_state_blob(&snapshot.state)?;
        self.geometry.clear();
        self.apply_layout_tree(&snapshot.layout);
        self.refresh();
        Ok(())
    }

    /// Overlay positions and mute flags onto canonically wired graph state
    fn apply_layout_tree(&mut self, tree: &LayoutTree) {
        self.muted.clear();
        let graph = &self.graph;
        let skipped = self.layout.apply_tree(tree, |id| graph.contains(id));
        for id in &skipped {
            tracing::warn!(%id, "layout entry refers to a module that was not restored");
        }
        self.stats.skipped_layout_entries += skipped.len() as u64;

        for connection in self.lay_mutes(&tree.muted_ids()) {
            tracing::debug!(%connection, "splice refused while restoring mutes");
        }
    }

    /// Canonical graph blob and layout tree of the current state, as saved in
    /// the latest snapshot
    pub fn current_state(&self) -> Option<(Arc<[u8]>, LayoutTree)> {
        self.history
            .current()
            .map(|snapshot| (Arc::clone(&snapshot.state), snapshot.layout.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::InMemoryGraph;

    fn editor() -> PatchEditor<InMemoryGraph> {
        let catalog = Arc::new(ModuleCatalog::with_builtins());
        PatchEditor::new(
            InMemoryGraph::new(Arc::clone(&catalog)),
            catalog,
            EditorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_editor_has_initial_snapshot() {
        let editor = editor();
        assert_eq!(editor.history().undo_count(), 0);
        assert_eq!(editor.history().current().unwrap().description, "Open patch");
        assert!(matches!(
            editor.history().clone().undo(),
            Err(PatchError::NothingToUndo)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let catalog = Arc::new(ModuleCatalog::with_builtins());
        let mut config = EditorConfig::default();
        config.cut.curve_samples = 0;
        let result = PatchEditor::new(InMemoryGraph::new(Arc::clone(&catalog)), catalog, config);
        assert!(matches!(result, Err(PatchError::Config { .. })));
    }

    #[test]
    fn test_created_passthrough_gets_seeded_state() {
        let mut editor = editor();
        let id = editor
            .create_module(catalog::PASSTHROUGH, Some(SignalKind::Gate))
            .unwrap();
        let state = editor.graph().module_state(id).unwrap();
        assert_eq!(
            AdapterParams::from_bytes(&state).unwrap(),
            AdapterParams::Passthrough {
                signal: SignalKind::Gate
            }
        );
    }

    #[test]
    fn test_footprint_prefers_measured_size() {
        let mut editor = editor();
        let id = editor.create_module("scope", None).unwrap();
        let estimated = editor.footprint(id);
        assert!(estimated.height > 32.0);

        editor.record_size(id, Size::new(10.0, 10.0));
        assert_eq!(editor.footprint(id), Size::new(10.0, 10.0));
        assert_eq!(editor.footprint(ModuleId(999)), editor.config().layout.fallback_size);
    }

    #[test]
    fn test_redo_without_undo() {
        let mut editor = editor();
        assert!(matches!(editor.redo(), Err(PatchError::NothingToRedo)));
        assert!(matches!(editor.undo(), Err(PatchError::NothingToUndo)));
    }
}
