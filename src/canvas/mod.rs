//! Canvas-side computations: geometry primitives, automatic layout and cable
//! cutting. Nothing here touches the graph directly.

pub mod autolayout;
pub mod cut;
pub mod geometry;

pub use autolayout::{assign_columns, compute_layout, LayoutNode, LayoutPlan};
pub use cut::{find_cut_hits, CutGesture, CutHit, GeometryCache};
pub use geometry::{cable_polyline, Point, Rect, Segment, Size};
