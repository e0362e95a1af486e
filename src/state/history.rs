//! Undo/Redo history
//!
//! Every mutating edit pushes one immutable [`Snapshot`] (graph state blob plus
//! layout tree). The top of the undo stack is always the current state, so
//! undo needs at least two entries. Snapshots are shared through `Arc` and can
//! be handed to background collaborators (autosave, export) without copying.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::DEFAULT_MAX_UNDO_LEVELS;
use crate::error::{PatchError, Result};
use crate::state::layout::LayoutTree;

/// A point-in-time capture of the patch
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Unique identifier for this snapshot.
    pub id: String,

    /// Human-readable description of the edit that produced it.
    pub description: String,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Opaque graph state, captured with all modules un-muted.
    pub state: Arc<[u8]>,

    /// Module positions and mute flags.
    pub layout: LayoutTree,

    /// SHA-256 over state and layout, hex encoded.
    pub fingerprint: String,
}

impl Snapshot {
    pub fn new(description: impl Into<String>, state: Vec<u8>, layout: LayoutTree) -> Self {
        let fingerprint = fingerprint(&state, &layout);
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            timestamp: Utc::now(),
            state: state.into(),
            layout,
            fingerprint,
        }
    }

    /// Whether two snapshots capture the same patch, regardless of when
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.fingerprint == other.fingerprint
    }

    /// Short form of the fingerprint for display
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..12.min(self.fingerprint.len())]
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.short_fingerprint(),
            self.description
        )
    }
}

fn fingerprint(state: &[u8], layout: &LayoutTree) -> String {
    let mut hasher = Sha256::new();
    hasher.update(state);
    for entry in &layout.entries {
        hasher.update(entry.id.0.to_le_bytes());
        hasher.update(entry.x.to_bits().to_le_bytes());
        hasher.update(entry.y.to_bits().to_le_bytes());
        hasher.update([entry.muted as u8]);
    }
    for id in &layout.mute_order {
        hasher.update(id.0.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Manages the undo and redo stacks of one editing session.
///
/// The history manager maintains:
/// - An undo stack whose top is the current state (limited by max_undo_levels)
/// - A redo stack of undone snapshots
/// - A list of snapshot IDs discarded when history is trimmed
#[derive(Debug, Clone)]
pub struct HistoryManager {
    /// Snapshots that can be returned to, oldest first.
    undo_stack: Vec<Arc<Snapshot>>,

    /// Snapshots that were undone, most recently undone last.
    redo_stack: Vec<Arc<Snapshot>>,

    /// Maximum number of snapshots kept on the undo stack.
    max_undo_levels: usize,

    /// IDs of snapshots that were discarded due to history trimming.
    discarded_snapshot_ids: Vec<String>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_LEVELS)
    }
}

impl HistoryManager {
    /// Create a history manager keeping at most `max_levels` snapshots.
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo_levels: max_levels.max(2),
            discarded_snapshot_ids: Vec::new(),
        }
    }

    /// Push a new snapshot onto the undo stack.
    ///
    /// This clears the redo stack (since the history has diverged)
    /// and trims the undo stack if it exceeds max_undo_levels.
    pub fn push(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.redo_stack.clear();
        self.undo_stack.push(Arc::clone(&snapshot));
        self.trim_history();
        snapshot
    }

    /// Step back one snapshot.
    ///
    /// Moves the current snapshot to the redo stack and returns the new
    /// current one, which the caller restores.
    pub fn undo(&mut self) -> Result<Arc<Snapshot>> {
        if self.undo_stack.len() < 2 {
            return Err(PatchError::NothingToUndo);
        }
        let undone = self.undo_stack.pop().ok_or(PatchError::NothingToUndo)?;
        self.redo_stack.push(undone);
        self.undo_stack
            .last()
            .cloned()
            .ok_or(PatchError::NothingToUndo)
    }

    /// Step forward one snapshot.
    ///
    /// Pops the most recently undone snapshot, makes it current again and
    /// returns it for the caller to restore.
    pub fn redo(&mut self) -> Result<Arc<Snapshot>> {
        let snapshot = self.redo_stack.pop().ok_or(PatchError::NothingToRedo)?;
        self.undo_stack.push(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// The snapshot describing the current state, if any was pushed.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.undo_stack.last().cloned()
    }

    /// Get the number of edits that can be undone.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len().saturating_sub(1)
    }

    /// Get the number of edits that can be redone.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// The snapshot an undo would step away from.
    pub fn peek_undo(&self) -> Option<&Snapshot> {
        if self.can_undo() {
            self.undo_stack.last().map(|s| s.as_ref())
        } else {
            None
        }
    }

    /// The snapshot a redo would restore.
    pub fn peek_redo(&self) -> Option<&Snapshot> {
        self.redo_stack.last().map(|s| s.as_ref())
    }

    /// Trim the undo stack to the maximum allowed levels.
    ///
    /// When the stack exceeds max_undo_levels, the oldest snapshots are removed
    /// and their IDs are tracked in discarded_snapshot_ids.
    pub fn trim_history(&mut self) {
        if self.undo_stack.len() <= self.max_undo_levels {
            return;
        }
        let excess = self.undo_stack.len() - self.max_undo_levels;
        for removed in self.undo_stack.drain(..excess) {
            self.discarded_snapshot_ids.push(removed.id.clone());
        }
    }

    pub fn max_undo_levels(&self) -> usize {
        self.max_undo_levels
    }

    /// Set the maximum number of snapshots kept.
    ///
    /// If the new limit is lower than the current stack size, the stack will be trimmed.
    pub fn set_max_undo_levels(&mut self, max_levels: usize) {
        self.max_undo_levels = max_levels.max(2);
        self.trim_history();
    }

    pub fn discarded_snapshot_ids(&self) -> &[String] {
        &self.discarded_snapshot_ids
    }

    /// Forget all history except the current snapshot.
    pub fn clear(&mut self) {
        let keep = self.undo_stack.pop();
        for snapshot in self.undo_stack.drain(..).chain(self.redo_stack.drain(..)) {
            self.discarded_snapshot_ids.push(snapshot.id.clone());
        }
        self.undo_stack.extend(keep);
    }

    /// Undo stack for display, most recent first.
    pub fn undo_stack_summary(&self) -> Vec<(String, String)> {
        self.undo_stack
            .iter()
            .rev()
            .map(|s| (s.id.clone(), s.description.clone()))
            .collect()
    }

    /// Redo stack for display, next to redo first.
    pub fn redo_stack_summary(&self) -> Vec<(String, String)> {
        self.redo_stack
            .iter()
            .rev()
            .map(|s| (s.id.clone(), s.description.clone()))
            .collect()
    }
}
