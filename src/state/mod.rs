//! State Management Module
//!
//! Editor-side state that is not owned by the graph: module layout and the
//! undo/redo snapshot history.

pub mod history;
pub mod layout;

pub use history::{HistoryManager, Snapshot};
pub use layout::{LayoutEntry, LayoutStore, LayoutTree};
