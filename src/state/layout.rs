//! Module layout store
//!
//! Positions are written by the UI (cursor drops, drags), by auto-layout, and
//! by snapshot restore. A write for a module the graph has not confirmed yet
//! is held as pending and only becomes part of the layout once the module is
//! known to exist.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::{Point, Size};
use crate::error::Result;
use crate::patch::ModuleId;

/// One persisted layout entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub id: ModuleId,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub muted: bool,
}

/// Persisted layout: one entry per module, ordered by id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutTree {
    pub entries: Vec<LayoutEntry>,
    /// Muted modules in the order they were muted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mute_order: Vec<ModuleId>,
}

impl LayoutTree {
    pub fn get(&self, id: ModuleId) -> Option<&LayoutEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Muted modules in mute order. Trees without a recorded order fall back
    /// to the entry flags, by id.
    pub fn muted_ids(&self) -> Vec<ModuleId> {
        if !self.mute_order.is_empty() {
            return self.mute_order.clone();
        }
        self.entries.iter().filter(|e| e.muted).map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the tree as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Editor-side layout state
#[derive(Debug, Clone, Default)]
pub struct LayoutStore {
    positions: BTreeMap<ModuleId, Point>,
    pending: BTreeMap<ModuleId, Point>,
    sizes: HashMap<ModuleId, Size>,
}

impl LayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a position for a module that may not be confirmed yet
    pub fn place(&mut self, id: ModuleId, position: Point) {
        self.pending.insert(id, position);
    }

    /// Set the position of a module known to exist
    pub fn set_position(&mut self, id: ModuleId, position: Point) {
        self.pending.remove(&id);
        self.positions.insert(id, position);
    }

    /// Move pending writes for existing modules into the layout.
    ///
    /// Returns how many writes were confirmed. Writes for modules that do not
    /// exist (yet) stay pending.
    pub fn confirm_pending(&mut self, exists: impl Fn(ModuleId) -> bool) -> usize {
        let ready: Vec<ModuleId> = self
            .pending
            .keys()
            .copied()
            .filter(|id| exists(*id))
            .collect();
        for id in &ready {
            if let Some(position) = self.pending.remove(id) {
                self.positions.insert(*id, position);
            }
        }
        ready.len()
    }

    /// Latest known position, pending writes included
    pub fn position(&self, id: ModuleId) -> Option<Point> {
        self.pending
            .get(&id)
            .or_else(|| self.positions.get(&id))
            .copied()
    }

    /// Confirmed position only
    pub fn confirmed_position(&self, id: ModuleId) -> Option<Point> {
        self.positions.get(&id).copied()
    }

    pub fn is_pending(&self, id: ModuleId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn remove(&mut self, id: ModuleId) {
        self.positions.remove(&id);
        self.pending.remove(&id);
        self.sizes.remove(&id);
    }

    /// Size the UI measured for a module
    pub fn record_size(&mut self, id: ModuleId, size: Size) {
        self.sizes.insert(id, size);
    }

    pub fn measured_size(&self, id: ModuleId) -> Option<Size> {
        self.sizes.get(&id).copied()
    }

    /// Drop everything about modules that no longer exist. Pending writes
    /// are kept, their modules may not be confirmed yet.
    pub fn retain(&mut self, exists: impl Fn(ModuleId) -> bool) {
        self.positions.retain(|id, _| exists(*id));
        self.sizes.retain(|id, _| exists(*id));
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Export confirmed positions together with the mutes, given in mute
    /// order
    pub fn to_tree(&self, muted: &[ModuleId]) -> LayoutTree {
        LayoutTree {
            mute_order: muted.to_vec(),
            entries: self
                .positions
                .iter()
                .map(|(id, p)| LayoutEntry {
                    id: *id,
                    x: p.x,
                    y: p.y,
                    muted: muted.contains(id),
                })
                .collect(),
        }
    }

    /// Replace all positions with those from `tree`, keeping only entries for
    /// which `exists` holds. Returns the ids that were skipped.
    pub fn apply_tree(
        &mut self,
        tree: &LayoutTree,
        exists: impl Fn(ModuleId) -> bool,
    ) -> Vec<ModuleId> {
        self.positions.clear();
        self.pending.clear();
        let mut skipped = Vec::new();
        for entry in &tree.entries {
            if exists(entry.id) {
                self.positions.insert(entry.id, Point::new(entry.x, entry.y));
            } else {
                skipped.push(entry.id);
            }
        }
        let positions = &self.positions;
        self.sizes.retain(|id, _| positions.contains_key(id));
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pending_until_confirmed() {
        let mut store = LayoutStore::new();
        store.place(ModuleId(4), Point::new(10.0, 20.0));

        assert!(store.is_pending(ModuleId(4)));
        assert_eq!(store.confirmed_position(ModuleId(4)), None);
        assert_eq!(store.position(ModuleId(4)), Some(Point::new(10.0, 20.0)));

        assert_eq!(store.confirm_pending(|id| id == ModuleId(9)), 0);
        assert!(store.is_pending(ModuleId(4)));

        assert_eq!(store.confirm_pending(|id| id == ModuleId(4)), 1);
        assert_eq!(store.confirmed_position(ModuleId(4)), Some(Point::new(10.0, 20.0)));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_tree_carries_mute_flags() {
        let mut store = LayoutStore::new();
        store.set_position(ModuleId(1), Point::new(0.0, 0.0));
        store.set_position(ModuleId(2), Point::new(5.0, 5.0));
        let tree = store.to_tree(&[ModuleId(2)]);
        assert_eq!(tree.len(), 2);
        assert!(!tree.get(ModuleId(1)).unwrap().muted);
        assert!(tree.get(ModuleId(2)).unwrap().muted);
        assert_eq!(tree.muted_ids(), vec![ModuleId(2)]);
    }

    #[test]
    fn test_apply_tree_skips_missing_modules() {
        let tree = LayoutTree {
            entries: vec![
                LayoutEntry { id: ModuleId(1), x: 1.0, y: 2.0, muted: false },
                LayoutEntry { id: ModuleId(8), x: 3.0, y: 4.0, muted: false },
            ],
            mute_order: Vec::new(),
        };
        let mut store = LayoutStore::new();
        store.place(ModuleId(5), Point::ORIGIN);

        let skipped = store.apply_tree(&tree, |id| id == ModuleId(1));
        assert_eq!(skipped, vec![ModuleId(8)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layouts").join("patch.layout.json");

        let mut store = LayoutStore::new();
        store.set_position(ModuleId(3), Point::new(120.5, -40.0));
        let tree = store.to_tree(&[ModuleId(3)]);
        tree.save(&path).unwrap();

        let loaded = LayoutTree::load(&path).unwrap();
        assert_eq!(loaded, tree);
    }

    #[test]
    fn test_remove_clears_everything() {
        let mut store = LayoutStore::new();
        store.set_position(ModuleId(1), Point::ORIGIN);
        store.record_size(ModuleId(1), Size::new(10.0, 10.0));
        store.remove(ModuleId(1));
        assert!(store.is_empty());
        assert!(store.measured_size(ModuleId(1)).is_none());
    }
}
