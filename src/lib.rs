//! Patchwire - Graph-Editing Core for a Modular Audio Patcher
//!
//! Patchwire keeps a gesture-driven patching surface consistent with a module
//! graph owned by a separate real-time collaborator. It never processes audio;
//! it adds, removes, rewires, mutes, duplicates and groups modules, and makes
//! every one of those edits undoable.
//!
//! # Architecture
//!
//! - `patch`: pin addressing, the connection registry, the graph and
//!   module-capability interfaces, and an in-memory reference graph
//! - `edit`: the mutation engine, one [`PatchEditor`] per editing session
//! - `state`: undo/redo history and module layout
//! - `canvas`: geometry, auto-layout and cable cutting

pub mod canvas;
pub mod cli;
pub mod config;
pub mod edit;
pub mod error;
pub mod patch;
pub mod state;

pub use config::EditorConfig;
pub use edit::PatchEditor;
pub use error::{PatchError, Result};
pub use patch::{Connection, InMemoryGraph, ModuleCatalog, ModuleGraph, ModuleId, PinAddress};
