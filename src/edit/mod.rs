//! Graph mutation engine
//!
//! All structural edits go through [`PatchEditor`]. Each operation commits the
//! draft topology, rebuilds the connection registry and pushes one snapshot.

mod arrange;
pub mod composite;
pub mod connect;
pub mod cut;
pub mod duplicate;
pub mod editor;
pub mod mute;
pub mod splice;

pub use composite::{Boundary, CollapseReport, ExpandReport};
pub use connect::{bridge_for, ConnectOutcome};
pub use cut::CutReport;
pub use duplicate::DuplicateReport;
pub use editor::{EditStats, PatchEditor};
pub use mute::{MuteStack, MutedState};
pub use splice::SpliceReport;
