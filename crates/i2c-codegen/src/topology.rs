//! The validated, indexed model produced by [`crate::resolve::resolve`].
//!
//! All collections are dense and in declaration order; all maps preserve
//! insertion order. Two resolutions of one document compare equal.

use i2c_core::{
    Controller, ControllerMode, MuxDescriptor, PinDescriptor, PortIndex, Route, SensorBinding,
    SensorKind, SensorRange,
};
use indexmap::IndexMap;

/// A resolved controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedController {
    /// Peripheral number.
    pub controller: Controller,
    /// Initiator or target.
    pub mode: ControllerMode,
    /// Dense indices into [`ResolvedTopology::ports`], in port order.
    pub ports: Vec<usize>,
}

/// A resolved controller port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPort {
    /// Owning controller.
    pub controller: Controller,
    /// Index within the controller.
    pub index: PortIndex,
    /// Port key as declared (e.g. `"F"`).
    pub key: String,
    /// Bus name, if declared.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Pin sets, expanded to masks.
    pub pins: Vec<PinDescriptor>,
    /// Dense indices into [`ResolvedTopology::muxes`], in declaration order.
    pub muxes: Vec<usize>,
}

/// Power-rail metadata carried by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPower {
    /// Rail names in declaration order, placeholders included.
    pub rails: Vec<String>,
    /// Phase numbers per rail.
    pub phases: Option<Vec<Vec<u8>>>,
    /// Device speaks PMBus.
    pub pmbus: bool,
    /// Device is one of several phase controllers of its rails.
    pub multiphase: bool,
}

/// A resolved device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    /// Driver kind.
    pub kind: String,
    /// Declared names.
    pub names: Vec<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Controller the device hangs off.
    pub controller: Controller,
    /// Port of that controller.
    pub port: PortIndex,
    /// Dense index into [`ResolvedTopology::ports`].
    pub port_slot: usize,
    /// Mux route, if behind a mux.
    pub route: Option<Route>,
    /// 7-bit address.
    pub address: u8,
    /// Bus-grouping name: the name of the port the device sits on.
    pub bus: Option<String>,
    /// Reference designator.
    pub refdes: Option<String>,
    /// Device may be absent.
    pub removable: bool,
    /// Shares its identity tuple with an earlier device on purpose.
    pub alias: bool,
    /// Power-rail metadata.
    pub power: Option<ResolvedPower>,
}

impl ResolvedDevice {
    /// Human-readable label for diagnostics and generated comments.
    #[must_use]
    pub fn label(&self) -> String {
        describe(&self.kind, self.names.first().map(String::as_str), self.address)
    }
}

pub(crate) fn describe(kind: &str, name: Option<&str>, address: u8) -> String {
    name.map_or_else(
        || format!("{kind} at {address:#04x}"),
        |name| format!("{kind} \"{name}\" at {address:#04x}"),
    )
}

/// Devices of one driver kind and their lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceGroup {
    /// Device indices in declaration order.
    pub devices: Vec<usize>,
    /// Declared name to device index.
    pub by_name: IndexMap<String, usize>,
    /// Reference designator to device index.
    pub by_refdes: IndexMap<String, usize>,
    /// Bus-grouping name to device indices.
    pub by_bus: IndexMap<String, Vec<usize>>,
}

/// Sensor-id assignment for the whole topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorTable {
    /// One binding per device, indexed like [`ResolvedTopology::devices`].
    pub bindings: Vec<SensorBinding>,
    /// Total ids per kind, for every kind, in canonical order.
    pub per_kind: IndexMap<SensorKind, u32>,
    /// Total ids assigned.
    pub total: u32,
}

impl SensorTable {
    /// Ranges assigned to one device.
    #[must_use]
    pub fn ranges(&self, device: usize) -> &[SensorRange] {
        self.bindings
            .get(device)
            .map_or(&[][..], |b| b.ranges.as_slice())
    }
}

/// One device's claim on a rail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailEntry {
    /// Device index.
    pub device: usize,
    /// Position of the rail in the device's rail list.
    pub index: u8,
    /// Phases the device drives on this rail.
    pub phases: Option<Vec<u8>>,
}

/// Output of topology resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTopology {
    /// Controllers in declaration order.
    pub controllers: Vec<ResolvedController>,
    /// Ports of every controller, controller-major.
    pub ports: Vec<ResolvedPort>,
    /// Muxes with dense ids in declaration order.
    pub muxes: Vec<MuxDescriptor>,
    /// Devices in declaration order.
    pub devices: Vec<ResolvedDevice>,
    /// Driver kind to its devices, in first-appearance order.
    pub groups: IndexMap<String, DeviceGroup>,
    /// Sensor-id assignment.
    pub sensors: SensorTable,
    /// Rail name to claims, in first-appearance order.
    pub rails: IndexMap<String, Vec<RailEntry>>,
}

impl ResolvedTopology {
    /// Device index for a declared name of a driver kind.
    #[must_use]
    pub fn device_by_name(&self, kind: &str, name: &str) -> Option<usize> {
        self.groups.get(kind)?.by_name.get(name).copied()
    }

    /// Device index for a reference designator of a driver kind.
    #[must_use]
    pub fn device_by_refdes(&self, kind: &str, refdes: &str) -> Option<usize> {
        self.groups.get(kind)?.by_refdes.get(refdes).copied()
    }

    /// Controllers operating in `mode`.
    pub fn controllers_in(&self, mode: ControllerMode) -> impl Iterator<Item = &ResolvedController> {
        self.controllers.iter().filter(move |c| c.mode == mode)
    }

    /// Muxes on the ports of `controller`.
    pub fn muxes_of(&self, controller: Controller) -> impl Iterator<Item = &MuxDescriptor> {
        self.muxes.iter().filter(move |m| m.controller == controller)
    }
}
