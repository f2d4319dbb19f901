//! Artifact intermediate representation.
//!
//! Every generated identifier is derived and collision-checked here, so the
//! renderers only format what they are given.

use std::collections::BTreeSet;

use i2c_core::{
    checks, Controller, ControllerDescriptor, ControllerMode, DeviceHandle, MuxDescriptor,
    PinDescriptor, PortIndex, Route, SensorBinding, SensorId, SensorKind, TaskId,
};
use log::debug;

use super::ident::{snake, upper, Namespace};
use super::{Artifact, Disposition, EmitOptions};
use crate::errors::EmitError;
use crate::topology::{ResolvedDevice, ResolvedTopology};

/// Bus address of a device, without an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleTemplate {
    /// Controller.
    pub controller: Controller,
    /// Port of that controller.
    pub port: PortIndex,
    /// Mux route, if any.
    pub route: Option<Route>,
    /// 7-bit address.
    pub address: u8,
}

impl HandleTemplate {
    /// Handle owned by `owner`.
    #[must_use]
    pub const fn bind(self, owner: TaskId) -> DeviceHandle {
        DeviceHandle::new(owner, self.controller, self.port, self.route, self.address)
    }
}

impl From<&ResolvedDevice> for HandleTemplate {
    fn from(device: &ResolvedDevice) -> Self {
        Self {
            controller: device.controller,
            port: device.port,
            route: device.route,
            address: device.address,
        }
    }
}

/// One row of the device table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Driver kind.
    pub kind: String,
    /// Comment line for generated code.
    pub comment: String,
    /// Bus address.
    pub template: HandleTemplate,
}

/// A port accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRecord {
    /// Function name.
    pub function: String,
    /// Port index it returns.
    pub index: PortIndex,
}

/// Initiator or target setup tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSet {
    /// Mode of the listed controllers.
    pub mode: ControllerMode,
    /// Controllers.
    pub controllers: Vec<ControllerDescriptor>,
    /// Pins of their ports.
    pub pins: Vec<PinDescriptor>,
    /// Port accessors.
    pub ports: Vec<PortRecord>,
    /// Muxes; always empty for target setup.
    pub muxes: Vec<MuxDescriptor>,
}

/// An accessor returning one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Single {
    /// Function name.
    pub function: String,
    /// Device index.
    pub device: usize,
}

/// An accessor returning an ordered set of devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Several {
    /// Function name.
    pub function: String,
    /// Device indices.
    pub devices: Vec<usize>,
}

/// One family's accessors for one driver kind, rendered as a module named
/// after the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindModule<T> {
    /// Module name.
    pub module: String,
    /// Accessors in declaration order.
    pub accessors: Vec<T>,
}

/// Devices accessors, by family.
///
/// Only the all-instances family lives directly in `devices`; the others
/// each get a family module holding one module per kind, so an identifier
/// only has to be unique among its kind's names, designators, or buses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessorSet {
    /// All devices of a kind.
    pub by_kind: Vec<Several>,
    /// One device by declared name.
    pub by_name: Vec<KindModule<Single>>,
    /// One device by reference designator.
    pub by_refdes: Vec<KindModule<Single>>,
    /// Devices of a kind on one named bus.
    pub by_bus: Vec<KindModule<Several>>,
    /// Rail accessors: (device, rail index) pairs per rail.
    pub rails: Vec<RailRecord>,
}

/// Claims on one rail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailRecord {
    /// Function name.
    pub function: String,
    /// Rail name as declared.
    pub rail: String,
    /// (device index, rail index) pairs.
    pub entries: Vec<(usize, u8)>,
}

/// One device's entry in its kind's sensor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInstance {
    /// Device index.
    pub device: usize,
    /// `by_name` constants naming this device's record.
    pub constants: Vec<String>,
    /// Ids per kind present in the group, in canonical kind order.
    pub ids: Vec<Vec<SensorId>>,
}

/// Sensor tables of one driver kind, rendered as a module named after the
/// kind holding a `Sensors` record type, an `ALL` array of records, an `ids`
/// module, and a `by_name` module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorGroup {
    /// Module name.
    pub module: String,
    /// Sensor kinds present, with the field name and `ids` constant name.
    pub kinds: Vec<(SensorKind, String, String)>,
    /// Devices with sensors, in group order.
    pub instances: Vec<SensorInstance>,
}

/// Sensor id tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSet {
    /// Ids assigned overall.
    pub total: u32,
    /// Ids per kind, with the count constant's name.
    pub per_kind: Vec<(SensorKind, String, u32)>,
    /// Per driver kind tables.
    pub groups: Vec<SensorGroup>,
    /// Per device bindings, indexed like the device table.
    pub bindings: Vec<SensorBinding>,
}

/// One arm of the validation routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRecord {
    /// Device index.
    pub device: usize,
    /// Path of the driver-specific check, if the kind has one.
    pub check: Option<String>,
}

/// Everything one artifact contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactIr {
    /// Generated module name.
    pub module: String,
    /// Runtime crate path.
    pub core_path: String,
    /// Full or standalone.
    pub artifact: Artifact,
    /// Device table; empty for standalone artifacts.
    pub devices: Vec<DeviceRecord>,
    /// Initiator or target setup.
    pub bus: Option<BusSet>,
    /// Device accessors.
    pub accessors: Option<AccessorSet>,
    /// Sensor tables.
    pub sensors: Option<SensorSet>,
    /// Validation arms.
    pub validation: Option<Vec<ValidationRecord>>,
}

/// Builds the IR for `dispositions`.
///
/// # Errors
///
/// Returns [`EmitError::ConflictingDispositions`] for initiator plus target,
/// [`EmitError::TargetCount`] when a full target artifact does not find
/// exactly one target controller, and [`EmitError::Invariant`] for
/// identifier collisions.
pub fn build(
    topology: &ResolvedTopology,
    dispositions: &[Disposition],
    options: &EmitOptions,
) -> Result<ArtifactIr, EmitError> {
    let wanted: BTreeSet<Disposition> = dispositions.iter().copied().collect();
    if wanted.contains(&Disposition::Initiator) && wanted.contains(&Disposition::Target) {
        return Err(EmitError::ConflictingDispositions);
    }
    let standalone = options.artifact == Artifact::Standalone;

    let devices = if standalone {
        Vec::new()
    } else {
        topology
            .devices
            .iter()
            .map(|device| DeviceRecord {
                kind: device.kind.clone(),
                comment: device.description.as_ref().map_or_else(
                    || device.label(),
                    |description| format!("{}: {description}", device.label()),
                ),
                template: device.into(),
            })
            .collect()
    };

    let mut ir = ArtifactIr {
        module: options.module.clone(),
        core_path: options.core_path.clone(),
        artifact: options.artifact,
        devices,
        bus: None,
        accessors: None,
        sensors: None,
        validation: None,
    };

    for disposition in &wanted {
        match disposition {
            Disposition::Initiator => {
                ir.bus = Some(bus_set(topology, ControllerMode::Initiator, standalone)?);
            }
            Disposition::Target => {
                ir.bus = Some(bus_set(topology, ControllerMode::Target, standalone)?);
            }
            Disposition::Devices => {
                ir.accessors = Some(if standalone {
                    AccessorSet::default()
                } else {
                    accessors(topology)?
                });
            }
            Disposition::Sensors => ir.sensors = Some(sensor_set(topology, standalone)?),
            Disposition::Validation => {
                ir.validation = Some(
                    ir.devices
                        .iter()
                        .enumerate()
                        .map(|(device, record)| ValidationRecord {
                            device,
                            check: check_path(&record.kind, options),
                        })
                        .collect(),
                );
            }
        }
    }

    debug!(
        "artifact `{}`: {} disposition(s), {} device(s)",
        ir.module,
        wanted.len(),
        ir.devices.len()
    );
    Ok(ir)
}

fn check_path(kind: &str, options: &EmitOptions) -> Option<String> {
    options.checks.get(kind).cloned().or_else(|| {
        checks::builtin_check_path(kind).map(|path| format!("{}::{path}", options.core_path))
    })
}

fn bus_set(
    topology: &ResolvedTopology,
    mode: ControllerMode,
    standalone: bool,
) -> Result<BusSet, EmitError> {
    let mut set = BusSet {
        mode,
        controllers: Vec::new(),
        pins: Vec::new(),
        ports: Vec::new(),
        muxes: Vec::new(),
    };
    if standalone {
        return Ok(set);
    }

    let controllers: Vec<_> = topology.controllers_in(mode).collect();
    if mode == ControllerMode::Target && controllers.len() != 1 {
        return Err(EmitError::TargetCount {
            found: controllers.len(),
        });
    }

    let mut names = Namespace::default();
    for controller in controllers {
        let ports = u8::try_from(controller.ports.len()).map_err(|_| {
            EmitError::Invariant(format!("{} has too many ports", controller.controller))
        })?;
        set.controllers.push(ControllerDescriptor {
            controller: controller.controller,
            mode,
            ports,
        });
        for slot in &controller.ports {
            let port = &topology.ports[*slot];
            set.pins.extend(port.pins.iter().cloned());
            let function = names.claim(
                format!("i2c{}_{}", controller.controller.0, snake(&port.key)),
                format!("port {} of {}", port.key, controller.controller),
            )?;
            set.ports.push(PortRecord {
                function,
                index: port.index,
            });
        }
        if mode == ControllerMode::Initiator {
            set.muxes
                .extend(topology.muxes_of(controller.controller).cloned());
        }
    }
    Ok(set)
}

fn accessors(topology: &ResolvedTopology) -> Result<AccessorSet, EmitError> {
    let mut set = AccessorSet::default();
    let mut kinds = Namespace::default();

    for (kind, group) in &topology.groups {
        let module = kinds.claim(snake(kind), format!("device kind {kind}"))?;
        set.by_kind.push(Several {
            function: module.clone(),
            devices: group.devices.clone(),
        });

        let mut names = Namespace::default();
        let mut by_name = Vec::with_capacity(group.by_name.len());
        for (name, device) in &group.by_name {
            by_name.push(Single {
                function: names.claim(snake(name), format!("{kind} name {name}"))?,
                device: *device,
            });
        }
        push_module(&mut set.by_name, &module, by_name);

        let mut designators = Namespace::default();
        let mut by_refdes = Vec::with_capacity(group.by_refdes.len());
        for (refdes, device) in &group.by_refdes {
            by_refdes.push(Single {
                function: designators.claim(snake(refdes), format!("{kind} refdes {refdes}"))?,
                device: *device,
            });
        }
        push_module(&mut set.by_refdes, &module, by_refdes);

        let mut buses = Namespace::default();
        let mut by_bus = Vec::with_capacity(group.by_bus.len());
        for (bus, devices) in &group.by_bus {
            by_bus.push(Several {
                function: buses.claim(snake(bus), format!("{kind} on bus {bus}"))?,
                devices: devices.clone(),
            });
        }
        push_module(&mut set.by_bus, &module, by_bus);
    }

    let mut rail_names = Namespace::default();
    for (rail, entries) in &topology.rails {
        set.rails.push(RailRecord {
            function: rail_names.claim(snake(rail), format!("rail {rail}"))?,
            rail: rail.clone(),
            entries: entries.iter().map(|e| (e.device, e.index)).collect(),
        });
    }
    Ok(set)
}

fn push_module<T>(family: &mut Vec<KindModule<T>>, module: &str, accessors: Vec<T>) {
    if !accessors.is_empty() {
        family.push(KindModule {
            module: module.to_string(),
            accessors,
        });
    }
}

fn sensor_set(topology: &ResolvedTopology, standalone: bool) -> Result<SensorSet, EmitError> {
    let mut names = Namespace::default();
    names.claim("NUM_SENSORS".to_string(), "sensor total")?;

    let mut modules = Namespace::default();
    let mut set = SensorSet {
        total: 0,
        per_kind: Vec::new(),
        groups: Vec::new(),
        bindings: Vec::new(),
    };
    for kind in SensorKind::ALL {
        let count = if standalone {
            0
        } else {
            topology.sensors.per_kind.get(&kind).copied().unwrap_or(0)
        };
        let constant = names.claim(
            format!("NUM_{}_SENSORS", upper(kind.as_str())),
            format!("{kind} count"),
        )?;
        set.per_kind.push((kind, constant, count));
    }
    if standalone {
        return Ok(set);
    }
    set.total = topology.sensors.total;
    set.bindings.clone_from(&topology.sensors.bindings);

    for (kind, group) in &topology.groups {
        let with_sensors: Vec<usize> = group
            .devices
            .iter()
            .copied()
            .filter(|d| !topology.sensors.ranges(*d).is_empty())
            .collect();
        if with_sensors.is_empty() {
            continue;
        }

        let present: Vec<SensorKind> = SensorKind::ALL
            .into_iter()
            .filter(|k| {
                with_sensors
                    .iter()
                    .any(|d| topology.sensors.ranges(*d).iter().any(|r| r.kind == *k))
            })
            .collect();

        let module = modules.claim(snake(kind), format!("{kind} sensors"))?;
        let kinds = present
            .iter()
            .map(|sensor| (*sensor, snake(sensor.as_str()), upper(sensor.as_str())))
            .collect();

        let mut record_names = Namespace::default();
        let mut instances = Vec::with_capacity(with_sensors.len());
        for device in with_sensors {
            let binding = &topology.sensors.bindings[device];
            let mut constants = Vec::new();
            for name in &topology.devices[device].names {
                constants.push(record_names.claim(upper(name), format!("{kind} name {name}"))?);
            }
            instances.push(SensorInstance {
                device,
                constants,
                ids: present
                    .iter()
                    .map(|sensor| binding.ids(*sensor).collect())
                    .collect(),
            });
        }

        set.groups.push(SensorGroup {
            module,
            kinds,
            instances,
        });
    }
    Ok(set)
}
