use std::fmt;
use std::str::FromStr;

use crate::error::{AgentError, Result};

/// Lookup key for the kernel counter table.
///
/// The XDP program stores the IPv4 source address in wire order and the map
/// reads it back as a native `u32`. On the little-endian hosts we run on
/// that puts the first octet in the least-significant byte, so `1.2.3.4`
/// becomes `0x04030201`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetKey(u32);

impl TargetKey {
    /// Encode a dotted-decimal IPv4 address.
    ///
    /// Exactly four segments of ASCII digits, each in `0..=255`. Anything
    /// else (whitespace, signs, empty or extra segments) is rejected.
    pub fn encode(text: &str) -> Result<Self> {
        let mut octets = [0u8; 4];
        let mut segments = text.split('.');

        for (i, slot) in octets.iter_mut().enumerate() {
            let segment = segments.next().ok_or_else(|| {
                AgentError::invalid_address(text, format!("expected 4 octets, found {i}"))
            })?;
            *slot = parse_octet(text, segment)?;
        }
        if segments.next().is_some() {
            return Err(AgentError::invalid_address(
                text,
                "expected 4 octets, found more",
            ));
        }

        Ok(Self(u32::from_le_bytes(octets)))
    }

    /// The raw map key.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Octets in the order they were written, `[o1, o2, o3, o4]`.
    pub fn octets(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

fn parse_octet(input: &str, segment: &str) -> Result<u8> {
    if segment.is_empty() {
        return Err(AgentError::invalid_address(input, "empty octet"));
    }
    let mut value: u32 = 0;
    for b in segment.bytes() {
        if !b.is_ascii_digit() {
            return Err(AgentError::invalid_address(
                input,
                format!("octet {segment:?} is not a decimal number"),
            ));
        }
        value = value * 10 + u32::from(b - b'0');
        if value > u32::from(u8::MAX) {
            return Err(AgentError::invalid_address(
                input,
                format!("octet {segment:?} is out of range 0-255"),
            ));
        }
    }
    Ok(value as u8)
}

impl FromStr for TargetKey {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::encode(s)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}
