//! Pin addressing
//!
//! A [`PinAddress`] names one connectable point on a module. The UI and the
//! connection registry work with the compact [`PinKey`] form; the two convert
//! losslessly for every address inside the supported ranges.
//!
//! Key layout (least significant bit first):
//!
//! | bits   | field                                   |
//! |--------|-----------------------------------------|
//! | 0      | direction (1 = output)                  |
//! | 1      | modulation flag                         |
//! | 2..4   | reserved, always zero                   |
//! | 4..16  | channel                                 |
//! | 16..32 | parameter slot (0 = none, n = param n-1) |
//! | 32..64 | module id                               |

use std::fmt;

use serde::{Deserialize, Serialize};

use super::graph::ModuleId;

/// Highest encodable channel index
pub const MAX_CHANNEL: u16 = 0x0FFF;

/// Highest encodable parameter identifier
pub const MAX_PARAM: u16 = 0xFFFD;

const DIRECTION_BIT: u64 = 1;
const MODULATION_BIT: u64 = 1 << 1;
const RESERVED_MASK: u64 = 0b1100;
const CHANNEL_SHIFT: u32 = 4;
const CHANNEL_MASK: u64 = 0x0FFF;
const PARAM_SHIFT: u32 = 16;
const PARAM_MASK: u64 = 0xFFFF;
const MODULE_SHIFT: u32 = 32;

/// Which side of a module a pin sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinDirection {
    Input,
    Output,
}

impl fmt::Display for PinDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinDirection::Input => write!(f, "in"),
            PinDirection::Output => write!(f, "out"),
        }
    }
}

/// Logical identity of a connectable point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinAddress {
    pub module: ModuleId,
    pub channel: u16,
    pub direction: PinDirection,
    /// Modulation pins drive a module parameter instead of its audio path
    pub modulation: bool,
    /// Parameter targeted by a modulation pin. Audio pins never carry one.
    pub param: Option<u16>,
}

impl PinAddress {
    /// Audio input pin
    pub fn input(module: ModuleId, channel: u16) -> Self {
        Self {
            module,
            channel,
            direction: PinDirection::Input,
            modulation: false,
            param: None,
        }
    }

    /// Audio output pin
    pub fn output(module: ModuleId, channel: u16) -> Self {
        Self {
            module,
            channel,
            direction: PinDirection::Output,
            modulation: false,
            param: None,
        }
    }

    /// Modulation input driving `param`
    pub fn modulation_input(module: ModuleId, channel: u16, param: u16) -> Self {
        Self {
            module,
            channel,
            direction: PinDirection::Input,
            modulation: true,
            param: Some(param),
        }
    }

    pub fn is_input(&self) -> bool {
        self.direction == PinDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == PinDirection::Output
    }

    /// Whether this address lies inside the encodable ranges
    pub fn is_encodable(&self) -> bool {
        if self.channel > MAX_CHANNEL {
            return false;
        }
        match self.param {
            Some(_) if !self.modulation => false,
            Some(p) => p <= MAX_PARAM,
            None => true,
        }
    }

    pub fn encode(&self) -> PinKey {
        encode(self)
    }
}

impl fmt::Display for PinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.module, self.direction, self.channel)?;
        if let Some(param) = self.param {
            write!(f, "@p{}", param)?;
        } else if self.modulation {
            write!(f, "@mod")?;
        }
        Ok(())
    }
}

/// Compact pin key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinKey(pub u64);

impl PinKey {
    /// Sentinel for anything that is not a real pin. Reserved bits are set, so
    /// no valid address ever encodes to it.
    pub const INVALID: PinKey = PinKey(u64::MAX);

    pub fn is_valid(self) -> bool {
        decode(self).is_some()
    }

    pub fn decode(self) -> Option<PinAddress> {
        decode(self)
    }
}

impl fmt::Display for PinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Encode an address into its key, or [`PinKey::INVALID`] when the address is
/// out of range or malformed.
pub fn encode(address: &PinAddress) -> PinKey {
    if !address.is_encodable() {
        return PinKey::INVALID;
    }

    let mut key = (address.module.0 as u64) << MODULE_SHIFT;
    key |= (address.channel as u64 & CHANNEL_MASK) << CHANNEL_SHIFT;
    if let Some(param) = address.param {
        key |= (param as u64 + 1) << PARAM_SHIFT;
    }
    if address.modulation {
        key |= MODULATION_BIT;
    }
    if address.is_output() {
        key |= DIRECTION_BIT;
    }
    PinKey(key)
}

/// Decode a key. `None` for the sentinel and for any key no valid address
/// could have produced; callers skip those.
pub fn decode(key: PinKey) -> Option<PinAddress> {
    let raw = key.0;
    if raw & RESERVED_MASK != 0 {
        return None;
    }

    let modulation = raw & MODULATION_BIT != 0;
    let slot = (raw >> PARAM_SHIFT) & PARAM_MASK;
    let param = match slot {
        0 => None,
        s if s - 1 > MAX_PARAM as u64 => return None,
        s => Some((s - 1) as u16),
    };
    if param.is_some() && !modulation {
        return None;
    }

    let direction = if raw & DIRECTION_BIT != 0 {
        PinDirection::Output
    } else {
        PinDirection::Input
    };

    Some(PinAddress {
        module: ModuleId((raw >> MODULE_SHIFT) as u32),
        channel: ((raw >> CHANNEL_SHIFT) & CHANNEL_MASK) as u16,
        direction,
        modulation,
        param,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_across_ranges() {
        let modules = [0u32, 1, 2, 255, 65_536, u32::MAX];
        let channels = [0u16, 1, 7, 1024, MAX_CHANNEL];
        let params = [None, Some(0u16), Some(42), Some(MAX_PARAM)];

        for &m in &modules {
            for &ch in &channels {
                for direction in [PinDirection::Input, PinDirection::Output] {
                    for modulation in [false, true] {
                        for &param in &params {
                            if param.is_some() && !modulation {
                                continue;
                            }
                            let addr = PinAddress {
                                module: ModuleId(m),
                                channel: ch,
                                direction,
                                modulation,
                                param,
                            };
                            let key = encode(&addr);
                            assert_ne!(key, PinKey::INVALID, "{} should encode", addr);
                            assert_eq!(decode(key), Some(addr));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_distinct_addresses_distinct_keys() {
        let a = encode(&PinAddress::input(ModuleId(1), 0));
        let b = encode(&PinAddress::output(ModuleId(1), 0));
        let c = encode(&PinAddress::input(ModuleId(1), 1));
        let d = encode(&PinAddress::modulation_input(ModuleId(1), 0, 0));
        let keys = [a, b, c, d];
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_out_of_range_encodes_to_sentinel() {
        let mut addr = PinAddress::input(ModuleId(3), MAX_CHANNEL + 1);
        assert_eq!(encode(&addr), PinKey::INVALID);

        addr.channel = 0;
        addr.param = Some(3);
        assert_eq!(encode(&addr), PinKey::INVALID, "audio pin with a parameter");

        let modulation = PinAddress::modulation_input(ModuleId(3), 0, MAX_PARAM + 1);
        assert_eq!(encode(&modulation), PinKey::INVALID);
    }

    #[test]
    fn test_malformed_keys_decode_to_none() {
        assert_eq!(decode(PinKey::INVALID), None);
        assert!(!PinKey::INVALID.is_valid());
        // reserved bit
        assert_eq!(decode(PinKey(0b0100)), None);
        // parameter slot on an audio key
        assert_eq!(decode(PinKey(1 << PARAM_SHIFT)), None);
        // parameter slot beyond range
        assert_eq!(decode(PinKey(MODULATION_BIT | (0xFFFF << PARAM_SHIFT))), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(PinAddress::output(ModuleId(4), 1).to_string(), "4:out1");
        assert_eq!(
            PinAddress::modulation_input(ModuleId(4), 0, 2).to_string(),
            "4:in0@p2"
        );
    }
}
