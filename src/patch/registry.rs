//! Connection registry
//!
//! Rebuilt from scratch once per edit cycle. Every connection the graph reports
//! gets a [`LinkId`] derived from its two pin keys, so a link id handed to the
//! UI in one cycle always resolves to the same endpoints or to nothing at all.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::graph::{Connection, ModuleId};
use super::pin::{decode, encode, PinAddress, PinKey};

/// Per-cycle identifier of an existing connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{:016x}", self.0)
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Order-sensitive link id for a (source, destination) key pair
pub fn derive_link_id(src: PinKey, dst: PinKey) -> LinkId {
    LinkId(splitmix64(splitmix64(src.0) ^ dst.0.rotate_left(17)))
}

/// Both endpoint keys of a registered link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkEndpoints {
    pub src: PinKey,
    pub dst: PinKey,
}

impl LinkEndpoints {
    /// Decode back into a graph connection; `None` if either key is invalid
    pub fn connection(&self) -> Option<Connection> {
        let src = decode(self.src)?;
        let dst = decode(self.dst)?;
        if !src.is_output() || !dst.is_input() {
            return None;
        }
        Some(Connection::new(src.module, src.channel, dst.module, dst.channel))
    }
}

/// LinkId → endpoint map for the current edit cycle
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    links: BTreeMap<LinkId, LinkEndpoints>,
    by_pair: HashMap<(PinKey, PinKey), LinkId>,
    connected: HashSet<PinKey>,
    generation: u64,
    skipped: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents with the given connection list.
    ///
    /// Connections on modules that are off-screen are registered like any
    /// other; only connections with unencodable endpoints are skipped.
    pub fn rebuild(&mut self, connections: &[Connection]) {
        self.links.clear();
        self.by_pair.clear();
        self.connected.clear();
        self.skipped = 0;
        self.generation += 1;

        for connection in connections {
            let src = encode(&connection.source_pin());
            let dst = encode(&connection.dest_pin());
            if src == PinKey::INVALID || dst == PinKey::INVALID {
                self.skipped += 1;
                tracing::debug!(%connection, "skipping connection with unencodable pin");
                continue;
            }

            if self.by_pair.contains_key(&(src, dst)) {
                // duplicate edge, same endpoints, same id
                continue;
            }

            let mut id = derive_link_id(src, dst);
            while self.links.contains_key(&id) {
                id = LinkId(splitmix64(id.0));
            }

            self.links.insert(id, LinkEndpoints { src, dst });
            self.by_pair.insert((src, dst), id);
            self.connected.insert(src);
            self.connected.insert(dst);
        }

        tracing::trace!(
            generation = self.generation,
            links = self.links.len(),
            "connection registry rebuilt"
        );
    }

    pub fn endpoints(&self, link: LinkId) -> Option<LinkEndpoints> {
        self.links.get(&link).copied()
    }

    /// The connection a link denotes
    pub fn connection(&self, link: LinkId) -> Option<Connection> {
        self.endpoints(link)?.connection()
    }

    /// Link id currently assigned to a connection
    pub fn link_for(&self, connection: &Connection) -> Option<LinkId> {
        let src = encode(&connection.source_pin());
        let dst = encode(&connection.dest_pin());
        self.by_pair.get(&(src, dst)).copied()
    }

    pub fn is_connected(&self, pin: &PinAddress) -> bool {
        self.connected.contains(&encode(pin))
    }

    /// Links with an endpoint on `module`, in link id order
    pub fn links_of_module(&self, module: ModuleId) -> Vec<LinkId> {
        self.links
            .iter()
            .filter(|(_, ends)| {
                [ends.src, ends.dst]
                    .iter()
                    .filter_map(|k| decode(*k))
                    .any(|pin| pin.module == module)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LinkId, LinkEndpoints)> + '_ {
        self.links.iter().map(|(id, ends)| (*id, *ends))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Number of rebuilds so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Connections dropped in the last rebuild because a pin was unencodable
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Connection> {
        vec![
            Connection::new(ModuleId(1), 0, ModuleId(2), 0),
            Connection::new(ModuleId(2), 0, ModuleId(3), 1),
            Connection::new(ModuleId(3), 0, ModuleId::SINK, 0),
            Connection::new(ModuleId(3), 0, ModuleId::SINK, 1),
        ]
    }

    #[test]
    fn test_every_connection_has_one_link() {
        let mut registry = ConnectionRegistry::new();
        let connections = chain();
        registry.rebuild(&connections);

        assert_eq!(registry.len(), connections.len());
        for c in &connections {
            let link = registry.link_for(c).unwrap();
            assert_eq!(registry.connection(link), Some(*c));
        }
    }

    #[test]
    fn test_link_ids_stable_across_rebuilds() {
        let mut registry = ConnectionRegistry::new();
        registry.rebuild(&chain());
        let first: Vec<_> = registry.iter().collect();

        registry.rebuild(&chain());
        let second: Vec<_> = registry.iter().collect();

        assert_eq!(first, second);
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    fn test_link_id_is_order_sensitive() {
        let a = encode(&PinAddress::output(ModuleId(1), 0));
        let b = encode(&PinAddress::input(ModuleId(2), 0));
        assert_ne!(derive_link_id(a, b), derive_link_id(b, a));
    }

    #[test]
    fn test_duplicate_edges_share_a_link() {
        let mut registry = ConnectionRegistry::new();
        let c = Connection::new(ModuleId(1), 0, ModuleId(2), 0);
        registry.rebuild(&[c, c]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unencodable_connection_skipped() {
        let mut registry = ConnectionRegistry::new();
        let bad = Connection::new(ModuleId(1), u16::MAX, ModuleId(2), 0);
        registry.rebuild(&[bad]);
        assert!(registry.is_empty());
        assert_eq!(registry.skipped(), 1);
    }

    #[test]
    fn test_connected_classification() {
        let mut registry = ConnectionRegistry::new();
        registry.rebuild(&chain());
        assert!(registry.is_connected(&PinAddress::output(ModuleId(1), 0)));
        assert!(registry.is_connected(&PinAddress::input(ModuleId(3), 1)));
        assert!(!registry.is_connected(&PinAddress::input(ModuleId(3), 0)));
        assert_eq!(registry.links_of_module(ModuleId(3)).len(), 3);
    }

    #[test]
    fn test_stale_link_resolves_to_nothing() {
        let mut registry = ConnectionRegistry::new();
        registry.rebuild(&chain());
        let link = registry.link_for(&chain()[0]).unwrap();

        registry.rebuild(&chain()[1..]);
        assert!(registry.connection(link).is_none());
    }
}
