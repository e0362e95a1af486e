//! Graph collaborator interface
//!
//! The authoritative signal graph lives outside this crate (it is owned by the
//! real-time engine). The editor only talks to it through [`ModuleGraph`], and
//! asks a [`SignalClassifier`] what kind of signal a pin carries.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::pin::{PinAddress, PinDirection};
use crate::error::Result;

/// Stable integer identity of a module in the graph
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ModuleId(pub u32);

impl ModuleId {
    /// The graph's terminal sink. Always present, never a connection source.
    pub const SINK: ModuleId = ModuleId(0);

    pub fn is_sink(self) -> bool {
        self == Self::SINK
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed channel-level edge between two modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    pub src: ModuleId,
    pub src_channel: u16,
    pub dst: ModuleId,
    pub dst_channel: u16,
}

impl Connection {
    pub fn new(src: ModuleId, src_channel: u16, dst: ModuleId, dst_channel: u16) -> Self {
        Self {
            src,
            src_channel,
            dst,
            dst_channel,
        }
    }

    /// Output pin this connection leaves from
    pub fn source_pin(&self) -> PinAddress {
        PinAddress::output(self.src, self.src_channel)
    }

    /// Input pin this connection arrives at
    pub fn dest_pin(&self) -> PinAddress {
        PinAddress::input(self.dst, self.dst_channel)
    }

    /// Whether either endpoint belongs to `id`
    pub fn touches(&self, id: ModuleId) -> bool {
        self.src == id || self.dst == id
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src, self.src_channel, self.dst, self.dst_channel
        )
    }
}

/// Signal kind reported by the type-resolution collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalKind {
    /// Full-range audio (-1..1), compatible with everything continuous
    #[default]
    Audio,
    /// Continuous control signal with a known value range
    Control { min: f32, max: f32 },
    /// Threshold/boolean signal (triggers, gates)
    Gate,
}

impl SignalKind {
    /// Value range of a continuous signal
    pub fn range(&self) -> Option<(f32, f32)> {
        match *self {
            SignalKind::Audio => Some((-1.0, 1.0)),
            SignalKind::Control { min, max } => Some((min, max)),
            SignalKind::Gate => None,
        }
    }

    pub fn is_continuous(&self) -> bool {
        !matches!(self, SignalKind::Gate)
    }
}

/// The external graph owned by the real-time collaborator.
///
/// Edits land in a pending draft; `commit_pending_topology` is the single
/// point per edit cycle where the real-time side picks them up.
pub trait ModuleGraph {
    /// Create a module of the given type. `None` when the type is unknown or
    /// creation fails for any other reason.
    fn add_module(&mut self, type_tag: &str) -> Option<ModuleId>;

    /// Remove a module together with every connection touching it
    fn remove_module(&mut self, id: ModuleId) -> bool;

    fn connect(&mut self, connection: &Connection) -> bool;

    fn disconnect(&mut self, connection: &Connection) -> bool;

    /// All connections in the draft topology, in graph order
    fn connections(&self) -> Vec<Connection>;

    fn module_type(&self, id: ModuleId) -> Option<String>;

    /// Every existing module id, sink included
    fn module_ids(&self) -> Vec<ModuleId>;

    /// Opaque per-module parameter/state blob
    fn module_state(&self, id: ModuleId) -> Option<Vec<u8>>;

    fn set_module_state(&mut self, id: ModuleId, state: &[u8]) -> bool;

    /// Serialize the whole graph into an opaque blob
    fn state_blob(&self) -> Result<Vec<u8>>;

    /// Recreate the whole graph from a blob produced by `state_blob`
    fn set_state_blob(&mut self, blob: &[u8]) -> Result<()>;

    fn commit_pending_topology(&mut self);

    fn contains(&self, id: ModuleId) -> bool {
        self.module_type(id).is_some()
    }

    /// Connections arriving at `id`, in graph order
    fn incoming(&self, id: ModuleId) -> Vec<Connection> {
        self.connections()
            .into_iter()
            .filter(|c| c.dst == id)
            .collect()
    }

    /// Connections leaving `id`, in graph order
    fn outgoing(&self, id: ModuleId) -> Vec<Connection> {
        self.connections()
            .into_iter()
            .filter(|c| c.src == id)
            .collect()
    }
}

/// Type-resolution collaborator. Treated as a pure function of the pin.
pub trait SignalClassifier {
    fn classify(&self, pin: &PinAddress) -> SignalKind;
}

impl<F> SignalClassifier for F
where
    F: Fn(&PinAddress) -> SignalKind,
{
    fn classify(&self, pin: &PinAddress) -> SignalKind {
        self(pin)
    }
}

/// Table-driven classifier; unlisted pins are audio.
#[derive(Debug, Clone, Default)]
pub struct KindTable {
    kinds: HashMap<(ModuleId, PinDirection, u16), SignalKind>,
}

impl KindTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        module: ModuleId,
        direction: PinDirection,
        channel: u16,
        kind: SignalKind,
    ) {
        self.kinds.insert((module, direction, channel), kind);
    }

    /// Builder-style variant of [`KindTable::set`]
    pub fn with(
        mut self,
        module: ModuleId,
        direction: PinDirection,
        channel: u16,
        kind: SignalKind,
    ) -> Self {
        self.set(module, direction, channel, kind);
        self
    }
}

impl SignalClassifier for KindTable {
    fn classify(&self, pin: &PinAddress) -> SignalKind {
        self.kinds
            .get(&(pin.module, pin.direction, pin.channel))
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_pins() {
        let c = Connection::new(ModuleId(3), 1, ModuleId::SINK, 0);
        assert_eq!(c.source_pin().direction, PinDirection::Output);
        assert_eq!(c.dest_pin().module, ModuleId::SINK);
        assert!(c.touches(ModuleId(3)));
        assert!(!c.touches(ModuleId(4)));
        assert_eq!(c.to_string(), "3:1 -> 0:0");
    }

    #[test]
    fn test_signal_kind_ranges() {
        assert_eq!(SignalKind::Audio.range(), Some((-1.0, 1.0)));
        assert_eq!(SignalKind::Gate.range(), None);
        assert!(!SignalKind::Gate.is_continuous());
    }

    #[test]
    fn test_kind_table_defaults_to_audio() {
        let table = KindTable::new().with(ModuleId(2), PinDirection::Input, 1, SignalKind::Gate);
        assert_eq!(table.classify(&PinAddress::input(ModuleId(2), 1)), SignalKind::Gate);
        assert_eq!(table.classify(&PinAddress::input(ModuleId(2), 0)), SignalKind::Audio);
    }

    #[test]
    fn test_closure_classifier() {
        let classifier = |pin: &PinAddress| {
            if pin.channel == 9 {
                SignalKind::Gate
            } else {
                SignalKind::Audio
            }
        };
        assert_eq!(classifier.classify(&PinAddress::input(ModuleId(1), 9)), SignalKind::Gate);
    }
}
