//! Connect and disconnect
//!
//! A direct connection is made when the two pins carry compatible signals.
//! Otherwise an adapter module is placed between them: a range mapper when a
//! wide continuous signal feeds a narrower control input, a comparator when a
//! continuous signal feeds a gate input.

use serde::Serialize;

use super::editor::PatchEditor;
use crate::error::{PatchError, Result};
use crate::patch::catalog::{self, AdapterParams};
use crate::patch::{Connection, LinkId, ModuleGraph, ModuleId, PinAddress, SignalKind};

/// How a `connect` request was satisfied
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    Direct { connection: Connection },
    Bridged { adapter: ModuleId, params: AdapterParams },
}

impl ConnectOutcome {
    pub fn adapter(&self) -> Option<ModuleId> {
        match self {
            ConnectOutcome::Direct { .. } => None,
            ConnectOutcome::Bridged { adapter, .. } => Some(*adapter),
        }
    }
}

/// Adapter needed between a source and destination signal, if any
pub fn bridge_for(source: SignalKind, dest: SignalKind) -> Option<AdapterParams> {
    match (source, dest) {
        (src, SignalKind::Control { min, max }) if src.is_continuous() => {
            let (in_min, in_max) = src.range()?;
            if in_min < min || in_max > max {
                Some(AdapterParams::MapRange {
                    in_min,
                    in_max,
                    out_min: min,
                    out_max: max,
                })
            } else {
                None
            }
        }
        (src, SignalKind::Gate) if src.is_continuous() => {
            let (lo, hi) = src.range()?;
            Some(AdapterParams::Comparator {
                threshold: (lo + hi) / 2.0,
            })
        }
        _ => None,
    }
}

fn adapter_type(params: &AdapterParams) -> &'static str {
    match params {
        AdapterParams::MapRange { .. } => catalog::MAP_RANGE,
        AdapterParams::Comparator { .. } => catalog::COMPARATOR,
        AdapterParams::Passthrough { .. } => catalog::PASSTHROUGH,
    }
}

impl<G: ModuleGraph> PatchEditor<G> {
    /// Connect an output pin to an input pin, bridging incompatible signals
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn connect(&mut self, src: PinAddress, dst: PinAddress) -> Result<ConnectOutcome> {
        if !src.is_output() {
            return Err(PatchError::InvalidPinDirection {
                reason: format!("{} is not an output", src),
            });
        }
        if !dst.is_input() {
            return Err(PatchError::InvalidPinDirection {
                reason: format!("{} is not an input", dst),
            });
        }
        for id in [src.module, dst.module] {
            if !self.graph.contains(id) {
                return Err(PatchError::ModuleNotFound { id });
            }
        }

        let source_kind = self.classify(&src);
        let dest_kind = self.classify(&dst);
        let Some(params) = bridge_for(source_kind, dest_kind) else {
            let connection = Connection::new(src.module, src.channel, dst.module, dst.channel);
            if !self.graph.connect(&connection) {
                return Err(PatchError::ConnectionRejected {
                    reason: connection.to_string(),
                });
            }
            tracing::info!(%connection, "connected");
            self.finish_edit(format!("Connect {}", connection))?;
            return Ok(ConnectOutcome::Direct { connection });
        };

        let adapter = self.insert_adapter(src, dst, &params)?;
        self.stats.adapters_inserted += 1;
        tracing::info!(%src, %dst, %adapter, ?params, "connected through adapter");
        self.finish_edit(format!("Connect {} -> {} via {}", src, dst, adapter_type(&params)))?;
        Ok(ConnectOutcome::Bridged { adapter, params })
    }

    fn insert_adapter(
        &mut self,
        src: PinAddress,
        dst: PinAddress,
        params: &AdapterParams,
    ) -> Result<ModuleId> {
        let type_tag = adapter_type(params);
        let caps = self
            .catalog
            .get(type_tag)
            .cloned()
            .ok_or_else(|| PatchError::ModuleCreationFailed {
                type_tag: type_tag.to_string(),
            })?;
        let adapter = self.create_module(type_tag, None)?;
        self.graph.set_module_state(adapter, &params.to_bytes()?);

        let into = Connection::new(src.module, src.channel, adapter, caps.primary_input());
        let out_of = Connection::new(adapter, caps.primary_output(), dst.module, dst.channel);
        if !self.graph.connect(&into) || !self.graph.connect(&out_of) {
            self.graph.remove_module(adapter);
            return Err(PatchError::ConnectionRejected {
                reason: format!("{} -> {} through {}", src, dst, type_tag),
            });
        }

        let endpoints = (
            self.layout.position(src.module),
            self.layout.position(dst.module),
        );
        if let (Some(a), Some(b)) = endpoints {
            self.layout.place(adapter, a.midpoint(b));
        }
        Ok(adapter)
    }

    /// Remove exactly the connection `link` denotes
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn disconnect(&mut self, link: LinkId) -> Result<Connection> {
        let connection = self
            .registry
            .connection(link)
            .ok_or(PatchError::LinkNotFound { link })?;
        if !self.graph.disconnect(&connection) {
            return Err(PatchError::LinkNotFound { link });
        }
        tracing::info!(%connection, "disconnected");
        self.finish_edit(format!("Disconnect {}", connection))?;
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(SignalKind::Audio, SignalKind::Audio ; "audio into audio")]
    #[test_case(SignalKind::Gate, SignalKind::Audio ; "gate into audio")]
    #[test_case(
        SignalKind::Control { min: 0.0, max: 1.0 },
        SignalKind::Control { min: -1.0, max: 1.0 }
        ; "narrow into wide control"
    )]
    fn test_compatible_kinds_need_no_bridge(source: SignalKind, dest: SignalKind) {
        assert_eq!(bridge_for(source, dest), None);
    }

    #[test]
    fn test_wide_into_narrow_maps_range() {
        let params = bridge_for(SignalKind::Audio, SignalKind::Control { min: 0.0, max: 1.0 });
        assert_eq!(
            params,
            Some(AdapterParams::MapRange {
                in_min: -1.0,
                in_max: 1.0,
                out_min: 0.0,
                out_max: 1.0
            })
        );
    }

    #[test]
    fn test_continuous_into_gate_uses_comparator() {
        let params = bridge_for(SignalKind::Control { min: 0.0, max: 10.0 }, SignalKind::Gate);
        assert_eq!(params, Some(AdapterParams::Comparator { threshold: 5.0 }));
        assert_eq!(adapter_type(&params.unwrap()), catalog::COMPARATOR);
    }
}
