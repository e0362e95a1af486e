//! Patch model
//!
//! Value types shared by the whole editor (module ids, connections, pin
//! addresses, link ids), the interfaces to the external graph and type
//! resolver, and the per-cycle connection registry.

pub mod catalog;
pub mod graph;
pub mod memory;
pub mod nested;
pub mod pin;
pub mod registry;

pub use catalog::{AdapterParams, ModuleCapabilities, ModuleCatalog};
pub use graph::{Connection, KindTable, ModuleGraph, ModuleId, SignalClassifier, SignalKind};
pub use memory::{CommittedTopology, InMemoryGraph};
pub use nested::{CompositeBlob, NestedModule, Placeholder, PlaceholderRole};
pub use pin::{PinAddress, PinDirection, PinKey};
pub use registry::{ConnectionRegistry, LinkEndpoints, LinkId};
