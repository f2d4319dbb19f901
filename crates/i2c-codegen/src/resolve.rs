//! Topology resolution: cross-reference checks, dense ids, sensor ids, and
//! the rail index.
//!
//! Controllers are processed before devices; devices are walked in
//! declaration order and the first failure is returned.

use std::borrow::Cow;

use i2c_core::{
    is_assignable_address, Controller, ControllerMode, MuxDescriptor, MuxId, PinDescriptor,
    PortIndex, Route, SegmentId, SensorBinding, SensorId, SensorKind, SensorRange,
};
use indexmap::IndexMap;
use log::debug;

use crate::document::{ControllerDecl, DeviceDecl, Document, PinSetDecl, PowerDecl};
use crate::errors::TopologyError;
use crate::topology::{
    describe, RailEntry, ResolvedController, ResolvedDevice, ResolvedPort, ResolvedPower,
    ResolvedTopology,
};

/// Pins per GPIO port.
const GPIO_PINS: u8 = 16;

type Identity = (Controller, PortIndex, Option<Route>, u8);

/// Resolves a parsed document into a [`ResolvedTopology`].
///
/// # Errors
///
/// Returns the first [`TopologyError`] found.
pub fn resolve(doc: &Document) -> Result<ResolvedTopology, TopologyError> {
    let mut resolver = Resolver::new();
    for controller in &doc.controllers {
        resolver.controller(controller)?;
    }
    for (index, device) in doc.devices.iter().enumerate() {
        resolver.device(index, device)?;
    }
    let topology = resolver.finish();
    debug!(
        "resolved {} controllers, {} ports, {} muxes, {} devices, {} sensors",
        topology.controllers.len(),
        topology.ports.len(),
        topology.muxes.len(),
        topology.devices.len(),
        topology.sensors.total
    );
    Ok(topology)
}

struct Resolver {
    topology: ResolvedTopology,
    buses: IndexMap<String, usize>,
    identities: IndexMap<Identity, usize>,
    next_sensor: u32,
}

impl Resolver {
    fn new() -> Self {
        let mut topology = ResolvedTopology::default();
        topology.sensors.per_kind = SensorKind::ALL.iter().map(|kind| (*kind, 0)).collect();
        Self {
            topology,
            buses: IndexMap::new(),
            identities: IndexMap::new(),
            next_sensor: 0,
        }
    }

    fn finish(mut self) -> ResolvedTopology {
        self.topology.sensors.total = self.next_sensor;
        self.topology
    }

    fn controller(&mut self, decl: &ControllerDecl) -> Result<(), TopologyError> {
        let controller = Controller(decl.controller);
        if self
            .topology
            .controllers
            .iter()
            .any(|c| c.controller == controller)
        {
            return Err(TopologyError::DuplicateController {
                controller: decl.controller,
            });
        }
        let mode = if decl.target {
            ControllerMode::Target
        } else {
            ControllerMode::Initiator
        };

        let mut slots = Vec::with_capacity(decl.ports.len());
        for (position, (key, port)) in decl.ports.iter().enumerate() {
            let index = PortIndex(u8::try_from(position).map_err(|_| TopologyError::TooMany {
                what: "ports on one controller",
                count: decl.ports.len(),
            })?);
            let slot = self.topology.ports.len();

            if let Some(name) = &port.name {
                if self.buses.insert(name.clone(), slot).is_some() {
                    return Err(TopologyError::DuplicateBusName { name: name.clone() });
                }
            }

            let pins = port
                .pins
                .iter()
                .map(|set| pin_descriptor(controller, index, key, set))
                .collect::<Result<Vec<_>, _>>()?;

            let mut muxes = Vec::with_capacity(port.muxes.len());
            for (position, mux) in port.muxes.iter().enumerate() {
                let what = format!("mux {} on {controller} port {key}", position + 1);
                if !is_assignable_address(mux.address) {
                    return Err(TopologyError::InvalidAddress {
                        what,
                        address: mux.address,
                    });
                }
                let max = mux.driver.max_segments();
                let segments = mux.segments.unwrap_or(max);
                if segments == 0 || segments > max {
                    return Err(TopologyError::InvalidSegmentCount {
                        mux: what,
                        segments,
                        max,
                    });
                }
                if muxes
                    .iter()
                    .any(|m: &usize| self.topology.muxes[*m].address == mux.address)
                {
                    return Err(TopologyError::MuxAddressConflict {
                        what,
                        controller: decl.controller,
                        port: key.clone(),
                        address: mux.address,
                    });
                }
                let count = self.topology.muxes.len();
                let id = MuxId(u8::try_from(count).map_err(|_| TopologyError::TooMany {
                    what: "muxes",
                    count: count + 1,
                })?);
                let nreset = mux
                    .nreset
                    .as_ref()
                    .map(|set| pin_descriptor(controller, index, key, set))
                    .transpose()?;

                muxes.push(count);
                self.topology.muxes.push(MuxDescriptor {
                    id,
                    controller,
                    port: index,
                    driver: mux.driver,
                    address: mux.address,
                    segments,
                    nreset,
                });
            }

            self.topology.ports.push(ResolvedPort {
                controller,
                index,
                key: key.clone(),
                name: port.name.clone(),
                description: port.description.clone(),
                pins,
                muxes,
            });
            slots.push(slot);
        }

        debug!("{controller}: {mode:?} with {} port(s)", slots.len());
        self.topology.controllers.push(ResolvedController {
            controller,
            mode,
            ports: slots,
        });
        Ok(())
    }

    fn device(&mut self, index: usize, decl: &DeviceDecl) -> Result<(), TopologyError> {
        let label = describe(
            &decl.device,
            decl.names.first().map(String::as_str),
            decl.address,
        );
        let slot = self.bus_slot(decl, &label)?;
        let route = self.route(decl, slot, &label)?;
        let port = &self.topology.ports[slot];

        if !is_assignable_address(decl.address) {
            return Err(TopologyError::InvalidAddress {
                what: label,
                address: decl.address,
            });
        }
        if port
            .muxes
            .iter()
            .any(|m| self.topology.muxes[*m].address == decl.address)
        {
            return Err(TopologyError::MuxAddressConflict {
                what: label,
                controller: port.controller.0,
                port: port.key.clone(),
                address: decl.address,
            });
        }

        let identity = (port.controller, port.index, route, decl.address);
        match self.identities.get(&identity) {
            Some(&other) if !decl.alias => {
                return Err(TopologyError::AddressConflict {
                    device: label,
                    other: self.topology.devices[other].label(),
                });
            }
            Some(_) => {}
            None => {
                self.identities.insert(identity, index);
            }
        }

        let device = ResolvedDevice {
            kind: decl.device.clone(),
            names: decl.names.clone(),
            description: decl.description.clone(),
            controller: port.controller,
            port: port.index,
            port_slot: slot,
            route,
            address: decl.address,
            bus: port.name.clone(),
            refdes: decl.refdes.clone(),
            removable: decl.removable,
            alias: decl.alias,
            power: decl.power.as_ref().map(|power| ResolvedPower {
                rails: power.rails.clone(),
                phases: power.phases.clone(),
                pmbus: power.pmbus,
                multiphase: power.multiphase,
            }),
        };

        self.group(index, &device)?;
        self.sensors(index, decl)?;
        if let Some(power) = &decl.power {
            self.rails(index, decl, power, &label)?;
        }

        self.topology.devices.push(device);
        Ok(())
    }

    fn bus_slot(&self, decl: &DeviceDecl, label: &str) -> Result<usize, TopologyError> {
        let ambiguous = |reason| TopologyError::AmbiguousBusReference {
            device: label.to_string(),
            reason,
        };
        let unknown = |reference| TopologyError::UnknownBusReference {
            device: label.to_string(),
            reference,
        };

        match (&decl.bus, decl.controller) {
            (Some(_), Some(_)) => Err(ambiguous("names both a bus and a controller")),
            (None, None) => Err(ambiguous("names neither a bus nor a controller")),
            (Some(bus), None) => {
                if decl.port.is_some() {
                    return Err(ambiguous("names both a bus and a port"));
                }
                self.buses
                    .get(bus)
                    .copied()
                    .ok_or_else(|| unknown(format!("bus \"{bus}\"")))
            }
            (None, Some(id)) => {
                let controller = Controller(id);
                let resolved = self
                    .topology
                    .controllers
                    .iter()
                    .find(|c| c.controller == controller)
                    .ok_or_else(|| unknown(format!("controller {controller}")))?;
                match &decl.port {
                    Some(key) => resolved
                        .ports
                        .iter()
                        .copied()
                        .find(|slot| self.topology.ports[*slot].key == *key)
                        .ok_or_else(|| unknown(format!("port {key} on {controller}"))),
                    None => match resolved.ports.as_slice() {
                        [slot] => Ok(*slot),
                        [] => Err(unknown(format!("port on {controller}"))),
                        _ => Err(ambiguous("omits the port of a multi-port controller")),
                    },
                }
            }
        }
    }

    fn route(
        &self,
        decl: &DeviceDecl,
        slot: usize,
        label: &str,
    ) -> Result<Option<Route>, TopologyError> {
        let (mux, segment) = match (decl.mux, decl.segment) {
            (None, None) => return Ok(None),
            (Some(mux), Some(segment)) => (mux, segment),
            _ => {
                return Err(TopologyError::IncompleteMuxReference {
                    device: label.to_string(),
                })
            }
        };

        let port = &self.topology.ports[slot];
        let unknown = |reference| TopologyError::UnknownBusReference {
            device: label.to_string(),
            reference,
        };
        let descriptor = usize::from(mux)
            .checked_sub(1)
            .and_then(|position| port.muxes.get(position))
            .map(|m| &self.topology.muxes[*m])
            .ok_or_else(|| {
                unknown(format!(
                    "mux {mux} on {} port {}",
                    port.controller, port.key
                ))
            })?;
        if !descriptor.has_segment(SegmentId(segment)) {
            return Err(unknown(format!("segment {segment} of mux {mux}")));
        }
        Ok(Some(Route::new(descriptor.id, SegmentId(segment))))
    }

    fn group(&mut self, index: usize, device: &ResolvedDevice) -> Result<(), TopologyError> {
        let group = self.topology.groups.entry(device.kind.clone()).or_default();
        let duplicate = |field, identifier: &str| TopologyError::DuplicateDeviceIdentity {
            kind: device.kind.clone(),
            field,
            identifier: identifier.to_string(),
        };

        for name in &device.names {
            if group.by_name.insert(name.clone(), index).is_some() {
                return Err(duplicate("name", name));
            }
        }
        if let Some(refdes) = &device.refdes {
            if group.by_refdes.insert(refdes.clone(), index).is_some() {
                return Err(duplicate("refdes", refdes));
            }
        }
        if let Some(bus) = &device.bus {
            group.by_bus.entry(bus.clone()).or_default().push(index);
        }
        group.devices.push(index);
        Ok(())
    }

    fn sensors(&mut self, index: usize, decl: &DeviceDecl) -> Result<(), TopologyError> {
        let mut ranges = Vec::new();
        for kind in SensorKind::ALL {
            let count = decl.sensors.count(kind);
            if count == 0 {
                continue;
            }
            let first = self.next_sensor;
            self.next_sensor = first.checked_add(count).ok_or(TopologyError::TooMany {
                what: "sensors",
                count: usize::try_from(u64::from(first) + u64::from(count)).unwrap_or(usize::MAX),
            })?;
            *self.topology.sensors.per_kind.entry(kind).or_insert(0) += count;
            ranges.push(SensorRange {
                kind,
                first: SensorId(first),
                count,
            });
        }
        self.topology.sensors.bindings.push(SensorBinding {
            device: index,
            ranges,
        });
        Ok(())
    }

    fn rails(
        &mut self,
        index: usize,
        decl: &DeviceDecl,
        power: &PowerDecl,
        label: &str,
    ) -> Result<(), TopologyError> {
        if let Some(phases) = &power.phases {
            if phases.len() != power.rails.len() {
                return Err(TopologyError::RailPhaseMismatch {
                    device: label.to_string(),
                    rails: power.rails.len(),
                    phases: phases.len(),
                });
            }
        }

        for (position, rail) in power.rails.iter().enumerate() {
            if rail.is_empty() {
                continue;
            }
            let rail_index = u8::try_from(position).map_err(|_| TopologyError::TooMany {
                what: "rails on one device",
                count: power.rails.len(),
            })?;

            let devices = &self.topology.devices;
            let entries = self.topology.rails.entry(rail.clone()).or_default();
            let clash = entries.iter().any(|entry| {
                entry.device == index || {
                    let other = &devices[entry.device];
                    other.kind == decl.device
                        && !(power.multiphase
                            && other.power.as_ref().is_some_and(|p| p.multiphase))
                }
            });
            if clash {
                return Err(TopologyError::DuplicateRail {
                    kind: decl.device.clone(),
                    rail: rail.clone(),
                });
            }
            entries.push(RailEntry {
                device: index,
                index: rail_index,
                phases: power
                    .phases
                    .as_ref()
                    .and_then(|phases| phases.get(position).cloned()),
            });
        }
        Ok(())
    }
}

fn pin_descriptor(
    controller: Controller,
    port: PortIndex,
    key: &str,
    set: &PinSetDecl,
) -> Result<PinDescriptor, TopologyError> {
    let mut mask = 0u16;
    for &pin in &set.pins {
        if pin >= GPIO_PINS {
            return Err(TopologyError::InvalidPin {
                controller: controller.0,
                port: key.to_string(),
                pin,
            });
        }
        mask |= 1 << pin;
    }
    Ok(PinDescriptor {
        controller,
        port,
        gpio_port: Cow::Owned(set.gpio_port.clone().unwrap_or_else(|| key.to_string())),
        pins: mask,
        function: set.af,
    })
}
