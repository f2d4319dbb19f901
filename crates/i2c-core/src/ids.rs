//! Identifier newtypes shared by generated tables and the bus server.

use std::fmt;

/// Highest address representable in 7-bit I2C addressing.
pub const MAX_ADDRESS: u8 = 0x7F;

/// Capability naming the task that owns a device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TaskId(pub u16);

/// Physical I2C peripheral, numbered as in the part's reference manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Controller(pub u8);

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I2C{}", self.0)
    }
}

///
/// The port index for a controller. A controller may be wired out on several
/// alternative pin sets; each pin set is a port, indexed in declaration
/// order. Only one port of a controller carries traffic at a time.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PortIndex(pub u8);

/// Dense, zero-based multiplexer identifier, unique across a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MuxId(pub u8);

/// Segment number on a multiplexer, counted from 1 as labelled on the part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SegmentId(pub u8);

impl SegmentId {
    /// Zero-based channel index, or `None` for the invalid segment 0.
    #[must_use]
    pub const fn channel(self) -> Option<u8> {
        self.0.checked_sub(1)
    }
}

/// The mux and segment that must be selected before a device is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Route {
    /// Multiplexer the device sits behind.
    pub mux: MuxId,
    /// Segment of that multiplexer the device is wired to.
    pub segment: SegmentId,
}

impl Route {
    /// Creates a route through `mux` to `segment`.
    #[must_use]
    pub const fn new(mux: MuxId, segment: SegmentId) -> Self {
        Self { mux, segment }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mux {} segment {}", self.mux.0, self.segment.0)
    }
}

/// Dense global sensor identifier assigned at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SensorId(pub u32);

/// Returns true for addresses the I2C specification sets aside
/// (general call, CBUS, high-speed codes, 10-bit prefixes).
#[must_use]
pub const fn is_reserved_address(address: u8) -> bool {
    matches!(address, 0x00..=0x07 | 0x78..=0x7F)
}

/// Returns true when `address` may be assigned to a device or mux.
#[must_use]
pub const fn is_assignable_address(address: u8) -> bool {
    address <= MAX_ADDRESS && !is_reserved_address(address)
}
