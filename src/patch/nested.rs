//! Nested graph blob carried by composite modules
//!
//! A composite's state is a serialized subgraph: the grouped modules with their
//! own state, the connections between them, and one placeholder per external
//! pin. Placeholders take part in the nested connection list like ordinary
//! modules, so the subgraph is self-contained.

use serde::{Deserialize, Serialize};

use super::graph::{Connection, ModuleId};
use crate::canvas::Point;
use crate::error::{PatchError, Result};

/// Current nested blob schema
pub const NESTED_BLOB_VERSION: u32 = 1;

/// One grouped module inside a composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedModule {
    /// Id the module had in the outer graph when it was grouped
    pub id: ModuleId,
    pub type_tag: String,
    #[serde(default)]
    pub state: Vec<u8>,
    /// Position relative to the composite's anchor
    #[serde(default)]
    pub offset: Option<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderRole {
    Inlet,
    Outlet,
}

/// External pin of a composite, represented inside the subgraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Id of the placeholder inside the nested connection list
    pub id: ModuleId,
    pub role: PlaceholderRole,
    /// First-seen order among placeholders of the same role
    pub pin: u16,
    /// Number of composite channels this placeholder occupies
    pub width: u16,
    /// First composite channel of this placeholder
    pub base_channel: u16,
    /// Inlets: the outer (module, channel) that fed the boundary.
    /// Outlets: the inner (module, channel) that left it.
    pub endpoint: (ModuleId, u16),
    /// Outlets: outer destinations recorded at grouping time
    #[serde(default)]
    pub externals: Vec<(ModuleId, u16)>,
}

impl Placeholder {
    /// Composite channels covered by this placeholder
    pub fn channels(&self) -> std::ops::Range<u16> {
        self.base_channel..self.base_channel + self.width
    }
}

/// Serialized subgraph of a composite module
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositeBlob {
    pub version: u32,
    pub modules: Vec<NestedModule>,
    pub placeholders: Vec<Placeholder>,
    /// Internal connections, including the ones to and from placeholders
    pub connections: Vec<Connection>,
}

impl CompositeBlob {
    pub fn new() -> Self {
        Self {
            version: NESTED_BLOB_VERSION,
            ..Default::default()
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let blob: CompositeBlob =
            serde_json::from_slice(bytes).map_err(|e| PatchError::InvalidBlob {
                reason: format!("composite blob: {}", e),
            })?;
        if blob.version != NESTED_BLOB_VERSION {
            return Err(PatchError::InvalidBlob {
                reason: format!("unsupported composite blob version {}", blob.version),
            });
        }
        Ok(blob)
    }

    pub fn inlets(&self) -> impl Iterator<Item = &Placeholder> {
        self.placeholders
            .iter()
            .filter(|p| p.role == PlaceholderRole::Inlet)
    }

    pub fn outlets(&self) -> impl Iterator<Item = &Placeholder> {
        self.placeholders
            .iter()
            .filter(|p| p.role == PlaceholderRole::Outlet)
    }

    /// Total input channels the composite exposes
    pub fn input_width(&self) -> u16 {
        self.inlets().map(|p| p.width).sum()
    }

    /// Total output channels the composite exposes
    pub fn output_width(&self) -> u16 {
        self.outlets().map(|p| p.width).sum()
    }

    pub fn placeholder(&self, id: ModuleId) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.id == id)
    }

    pub fn is_placeholder(&self, id: ModuleId) -> bool {
        self.placeholder(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompositeBlob {
        let mut blob = CompositeBlob::new();
        blob.modules.push(NestedModule {
            id: ModuleId(5),
            type_tag: "filter".to_string(),
            state: b"{}".to_vec(),
            offset: Some(Point::new(-10.0, 0.0)),
        });
        blob.placeholders.push(Placeholder {
            id: ModuleId(6),
            role: PlaceholderRole::Inlet,
            pin: 0,
            width: 1,
            base_channel: 0,
            endpoint: (ModuleId(1), 0),
            externals: Vec::new(),
        });
        blob.placeholders.push(Placeholder {
            id: ModuleId(7),
            role: PlaceholderRole::Outlet,
            pin: 0,
            width: 2,
            base_channel: 0,
            endpoint: (ModuleId(5), 0),
            externals: vec![(ModuleId::SINK, 0)],
        });
        blob.connections.push(Connection::new(ModuleId(6), 0, ModuleId(5), 0));
        blob
    }

    #[test]
    fn test_widths() {
        let blob = sample();
        assert_eq!(blob.input_width(), 1);
        assert_eq!(blob.output_width(), 2);
        assert_eq!(blob.outlets().next().unwrap().channels(), 0..2);
        assert!(blob.is_placeholder(ModuleId(6)));
        assert!(!blob.is_placeholder(ModuleId(5)));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let blob = sample();
        let bytes = blob.to_bytes().unwrap();
        assert_eq!(CompositeBlob::from_bytes(&bytes).unwrap(), blob);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = CompositeBlob::from_bytes(b"not json").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_BLOB");
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut blob = sample();
        blob.version = 99;
        let bytes = serde_json::to_vec(&blob).unwrap();
        assert!(CompositeBlob::from_bytes(&bytes).is_err());
    }
}
