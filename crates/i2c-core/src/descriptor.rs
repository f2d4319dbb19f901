//! Controller, pin, and mux descriptors produced by the generator and
//! consumed by the bus-owning server at task start.

use std::borrow::Cow;

use crate::{Controller, MuxDriverKind, MuxId, PortIndex, SegmentId};

/// Whether a controller drives the bus or answers on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ControllerMode {
    /// Controller is the bus master.
    #[default]
    Initiator,
    /// Controller responds as a target (slave).
    Target,
}

/// One configured I2C controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ControllerDescriptor {
    /// Peripheral instance.
    pub controller: Controller,
    /// Initiator or target operation.
    pub mode: ControllerMode,
    /// Number of alternative pin mappings (ports).
    pub ports: u8,
}

impl ControllerDescriptor {
    /// Returns true when `port` is one of this controller's ports.
    #[must_use]
    pub const fn has_port(&self, port: PortIndex) -> bool {
        port.0 < self.ports
    }
}

/// A set of GPIO pins on one GPIO port, muxed to an alternate function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PinDescriptor {
    /// Controller these pins belong to.
    pub controller: Controller,
    /// Port these pins make up.
    pub port: PortIndex,
    /// GPIO port name (e.g. `"F"`).
    pub gpio_port: Cow<'static, str>,
    /// Bitmask of pin numbers within the GPIO port.
    pub pins: u16,
    /// Alternate-function selector.
    pub function: u8,
}

/// One multiplexer attached to a controller port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MuxDescriptor {
    /// Dense topology-wide identifier.
    pub id: MuxId,
    /// Controller the mux hangs off.
    pub controller: Controller,
    /// Port of that controller.
    pub port: PortIndex,
    /// Part family, which fixes the select encoding.
    pub driver: MuxDriverKind,
    /// 7-bit address of the mux itself.
    pub address: u8,
    /// Number of downstream segments wired, numbered from 1.
    pub segments: u8,
    /// Active-low reset pin, if one is wired.
    pub nreset: Option<PinDescriptor>,
}

impl MuxDescriptor {
    /// Returns true when `segment` is wired on this mux.
    #[must_use]
    pub const fn has_segment(&self, segment: SegmentId) -> bool {
        segment.0 >= 1 && segment.0 <= self.segments
    }

    /// Returns true when this mux sits on the given bus.
    #[must_use]
    pub fn is_on(&self, controller: Controller, port: PortIndex) -> bool {
        self.controller == controller && self.port == port
    }
}

#[cfg(test)]
mod tests {
    use super::{ControllerDescriptor, ControllerMode, MuxDescriptor};
    use crate::{Controller, MuxDriverKind, MuxId, PortIndex, SegmentId};

    fn mux(segments: u8) -> MuxDescriptor {
        MuxDescriptor {
            id: MuxId(0),
            controller: Controller(2),
            port: PortIndex(1),
            driver: MuxDriverKind::Pca9548,
            address: 0x70,
            segments,
            nreset: None,
        }
    }

    #[test]
    fn segments_are_numbered_from_one() {
        let mux = mux(4);
        assert!(!mux.has_segment(SegmentId(0)));
        assert!(mux.has_segment(SegmentId(1)));
        assert!(mux.has_segment(SegmentId(4)));
        assert!(!mux.has_segment(SegmentId(5)));
    }

    #[test]
    fn mux_bus_membership_checks_controller_and_port() {
        let mux = mux(8);
        assert!(mux.is_on(Controller(2), PortIndex(1)));
        assert!(!mux.is_on(Controller(2), PortIndex(0)));
        assert!(!mux.is_on(Controller(3), PortIndex(1)));
    }

    #[test]
    fn controller_port_bound_is_exclusive() {
        let controller = ControllerDescriptor {
            controller: Controller(1),
            mode: ControllerMode::Initiator,
            ports: 2,
        };
        assert!(controller.has_port(PortIndex(1)));
        assert!(!controller.has_port(PortIndex(2)));
    }
}
