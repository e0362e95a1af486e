//! Patch documents and edit scripts
//!
//! A patch document wraps the in-memory graph's blob and the layout tree; it
//! exists for the command-line harness and is not a project format.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canvas::{Point, Segment};
use crate::config::EditorConfig;
use crate::edit::PatchEditor;
use crate::error::{PatchError, Result};
use crate::patch::{Connection, InMemoryGraph, ModuleCatalog, ModuleGraph, ModuleId, PinAddress};
use crate::state::LayoutTree;

/// Current patch document schema
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchDocument {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Graph state blob, canonical wiring
    pub graph: Value,
    pub layout: LayoutTree,
}

impl PatchDocument {
    /// Document holding an empty graph
    pub fn empty(catalog: &Arc<ModuleCatalog>) -> Result<Self> {
        let graph = InMemoryGraph::new(Arc::clone(catalog));
        let now = Utc::now();
        Ok(Self {
            version: DOCUMENT_VERSION,
            created_at: now,
            modified_at: now,
            graph: serde_json::from_slice(&graph.state_blob()?)?,
            layout: LayoutTree::default(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let document: PatchDocument = serde_json::from_str(&content)?;
        if document.version != DOCUMENT_VERSION {
            return Err(PatchError::InvalidBlob {
                reason: format!("unsupported document version {}", document.version),
            });
        }
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Start an editing session on this document
    pub fn open(
        &self,
        catalog: &Arc<ModuleCatalog>,
        config: EditorConfig,
    ) -> Result<PatchEditor<InMemoryGraph>> {
        let mut graph = InMemoryGraph::new(Arc::clone(catalog));
        graph.set_state_blob(&serde_json::to_vec(&self.graph)?)?;
        PatchEditor::open(graph, Arc::clone(catalog), config, &self.layout)
    }

    /// Take over the editor's current state
    pub fn update_from<G: ModuleGraph>(&mut self, editor: &PatchEditor<G>) -> Result<()> {
        let (blob, layout) = editor.current_state().ok_or_else(|| PatchError::InvalidBlob {
            reason: "editor has no snapshot to save".to_string(),
        })?;
        self.graph = serde_json::from_slice(&blob)?;
        self.layout = layout;
        self.modified_at = Utc::now();
        Ok(())
    }
}

/// One step of an edit script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    Place { type_tag: String, at: Point },
    Connect { link: Connection },
    Disconnect { link: Connection },
    Insert { type_tag: String, link: Connection, at: Point },
    InsertStereo { type_tag: String, left: Connection, right: Connection, at: Point },
    Bypass { id: ModuleId },
    Delete { ids: Vec<ModuleId> },
    Move { id: ModuleId, to: Point },
    Mute { id: ModuleId },
    Unmute { id: ModuleId },
    Duplicate {
        ids: Vec<ModuleId>,
        #[serde(default)]
        connections: bool,
    },
    Collapse { ids: Vec<ModuleId> },
    Expand { id: ModuleId },
    Cut { from: Point, to: Point },
    Layout,
    Undo,
    Redo,
}

impl EditOp {
    /// Run this step against an editor, returning a one-line summary
    pub fn apply<G: ModuleGraph>(&self, editor: &mut PatchEditor<G>) -> Result<String> {
        let find_link = |editor: &PatchEditor<G>, connection: &Connection| {
            editor
                .registry()
                .link_for(connection)
                .ok_or(PatchError::ConnectionNotFound {
                    connection: *connection,
                })
        };

        let summary = match self {
            EditOp::Place { type_tag, at } => {
                format!("placed {} as {}", type_tag, editor.place_module(type_tag, *at)?)
            }
            EditOp::Connect { link } => {
                let outcome = editor.connect(
                    PinAddress::output(link.src, link.src_channel),
                    PinAddress::input(link.dst, link.dst_channel),
                )?;
                match outcome.adapter() {
                    Some(adapter) => format!("connected {} through adapter {}", link, adapter),
                    None => format!("connected {}", link),
                }
            }
            EditOp::Disconnect { link } => {
                let id = find_link(editor, link)?;
                format!("disconnected {}", editor.disconnect(id)?)
            }
            EditOp::Insert { type_tag, link, at } => {
                let id = find_link(editor, link)?;
                let report = editor.insert_node_on_link(type_tag, id, *at)?;
                format!("inserted {} on {} ({:?})", type_tag, link, report.created)
            }
            EditOp::InsertStereo {
                type_tag,
                left,
                right,
                at,
            } => {
                let a = find_link(editor, left)?;
                let b = find_link(editor, right)?;
                let report = editor.insert_node_on_link_stereo(type_tag, a, b, *at)?;
                format!("inserted stereo {} ({:?})", type_tag, report.created)
            }
            EditOp::Bypass { id } => {
                let report = editor.bypass_delete_node(*id)?;
                format!("bypass-deleted {} ({} reconnected)", id, report.connected.len())
            }
            EditOp::Delete { ids } => {
                let report = editor.delete_selection(ids)?;
                format!("deleted {:?}", report.removed)
            }
            EditOp::Move { id, to } => {
                editor.move_module(*id, *to)?;
                format!("moved {} to ({}, {})", id, to.x, to.y)
            }
            EditOp::Mute { id } => match editor.mute_module(*id)? {
                true => format!("muted {}", id),
                false => format!("{} unchanged", id),
            },
            EditOp::Unmute { id } => match editor.unmute_module(*id)? {
                true => format!("unmuted {}", id),
                false => format!("{} was not muted", id),
            },
            EditOp::Duplicate { ids, connections } => {
                let report = editor.duplicate_selection(ids, *connections)?;
                format!("duplicated {:?}", report.copies)
            }
            EditOp::Collapse { ids } => {
                let report = editor.collapse_to_composite(ids)?;
                format!(
                    "collapsed {:?} into {} ({} inlets, {} outlets)",
                    report.grouped, report.composite, report.inlets, report.outlets
                )
            }
            EditOp::Expand { id } => {
                let report = editor.expand_composite(*id)?;
                format!("expanded {} into {:?}", id, report.restored.values().collect::<Vec<_>>())
            }
            EditOp::Cut { from, to } => {
                let report = editor.cut_links(Segment::new(*from, *to))?;
                format!("cut {} cables, inserted {:?}", report.links.len(), report.inserted)
            }
            EditOp::Layout => {
                let plan = editor.auto_layout()?;
                format!("laid out {} modules in {} columns", plan.positions.len(), plan.order.len())
            }
            EditOp::Undo => format!("undid '{}'", editor.undo()?.description),
            EditOp::Redo => format!("redid '{}'", editor.redo()?.description),
        };
        Ok(summary)
    }
}

/// Read an edit script file
pub fn load_script(path: &Path) -> Result<Vec<EditOp>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_script_parses() {
        let script = r#"[
            {"op": "place", "type_tag": "oscillator", "at": {"x": 0.0, "y": 0.0}},
            {"op": "connect", "link": {"src": 1, "src_channel": 0, "dst": 0, "dst_channel": 0}},
            {"op": "duplicate", "ids": [1]},
            {"op": "cut", "from": {"x": 1.0, "y": 2.0}, "to": {"x": 3.0, "y": 4.0}},
            {"op": "undo"}
        ]"#;
        let ops: Vec<EditOp> = serde_json::from_str(script).unwrap();
        assert_eq!(ops.len(), 5);
        assert_eq!(
            ops[2],
            EditOp::Duplicate {
                ids: vec![ModuleId(1)],
                connections: false
            }
        );
        assert_eq!(ops[4], EditOp::Undo);
    }

    #[test]
    fn test_document_round_trip_through_editor() {
        let catalog = Arc::new(ModuleCatalog::with_builtins());
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("patch.json");

        let mut document = PatchDocument::empty(&catalog).unwrap();
        let mut editor = document.open(&catalog, EditorConfig::default()).unwrap();
        EditOp::Place {
            type_tag: "oscillator".to_string(),
            at: Point::new(10.0, 20.0),
        }
        .apply(&mut editor)
        .unwrap();
        EditOp::Connect {
            link: Connection::new(ModuleId(1), 0, ModuleId::SINK, 0),
        }
        .apply(&mut editor)
        .unwrap();
        EditOp::Mute { id: ModuleId(1) }.apply(&mut editor).unwrap();
        document.update_from(&editor).unwrap();
        document.save(&path).unwrap();

        let loaded = PatchDocument::load(&path).unwrap();
        let reopened = loaded.open(&catalog, EditorConfig::default()).unwrap();
        assert!(reopened.is_muted(ModuleId(1)));
        assert_eq!(reopened.position(ModuleId(1)), Some(Point::new(10.0, 20.0)));
        // muted with no inputs: the module is silent
        assert!(reopened.graph().outgoing(ModuleId(1)).is_empty());
        assert_eq!(
            reopened.canonical_connections(ModuleId(1)),
            vec![Connection::new(ModuleId(1), 0, ModuleId::SINK, 0)]
        );
    }

    #[test]
    fn test_unknown_link_is_rejected() {
        let catalog = Arc::new(ModuleCatalog::with_builtins());
        let document = PatchDocument::empty(&catalog).unwrap();
        let mut editor = document.open(&catalog, EditorConfig::default()).unwrap();
        let err = EditOp::Disconnect {
            link: Connection::new(ModuleId(5), 0, ModuleId::SINK, 0),
        }
        .apply(&mut editor)
        .unwrap_err();
        assert_eq!(err.error_code(), "LINK_NOT_FOUND");
        assert!(matches!(err, PatchError::ConnectionNotFound { .. }));
    }
}
