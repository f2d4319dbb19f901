//! Rust source renderer for the build-script artifact.

use std::fmt::Write;

use i2c_core::{ControllerMode, MuxDescriptor, PinDescriptor, Route};

use super::ir::{
    AccessorSet, ArtifactIr, BusSet, KindModule, SensorGroup, SensorSet, Several, Single,
    ValidationRecord,
};
use super::Artifact;
use crate::errors::EmitError;

/// First line of every artifact.
pub const HEADER: &str = "// Generated by i2c-codegen. Do not edit.";

/// Renders `ir` as a single Rust module.
///
/// # Errors
///
/// Returns [`EmitError::Invariant`] when an accessor names a device missing
/// from the device table.
pub fn render(ir: &ArtifactIr) -> Result<String, EmitError> {
    let mut r = Renderer {
        ir,
        core: &ir.core_path,
        out: String::new(),
    };

    writeln!(r.out, "{HEADER}\n")?;
    writeln!(
        r.out,
        "#[allow(\n    dead_code,\n    missing_docs,\n    unreachable_code,\n    unused_imports,\n    \
         clippy::all,\n    clippy::pedantic,\n    clippy::nursery\n)]"
    )?;
    writeln!(r.out, "pub mod {} {{", ir.module)?;

    if let Some(bus) = &ir.bus {
        r.bus(bus)?;
    }
    if let Some(accessors) = &ir.accessors {
        r.devices(accessors)?;
    }
    if let Some(sensors) = &ir.sensors {
        r.sensors(sensors)?;
    }
    if let Some(validation) = &ir.validation {
        r.validation(validation)?;
    }

    writeln!(r.out, "}}")?;
    Ok(r.out)
}

struct Renderer<'a> {
    ir: &'a ArtifactIr,
    core: &'a str,
    out: String,
}

impl Renderer<'_> {
    fn standalone(&self) -> bool {
        self.ir.artifact == Artifact::Standalone
    }

    fn bus(&mut self, bus: &BusSet) -> Result<(), EmitError> {
        let core = self.core;
        writeln!(
            self.out,
            "    use ::std::borrow::Cow;
    use {core}::{{
        Controller, ControllerDescriptor, ControllerMode, MuxDescriptor, MuxDriverKind, MuxId,
        PinDescriptor, PortIndex,
    }};

    pub const NUM_CONTROLLERS: usize = {};
    pub const NUM_MUXES: usize = {};",
            bus.controllers.len(),
            bus.muxes.len()
        )?;

        writeln!(
            self.out,
            "\n    pub fn controllers() -> [ControllerDescriptor; {}] {{\n        [",
            bus.controllers.len()
        )?;
        for c in &bus.controllers {
            let mode = match c.mode {
                ControllerMode::Initiator => "Initiator",
                ControllerMode::Target => "Target",
            };
            writeln!(
                self.out,
                "            ControllerDescriptor {{
                controller: Controller({}),
                mode: ControllerMode::{mode},
                ports: {},
            }},",
                c.controller.0, c.ports
            )?;
        }
        writeln!(self.out, "        ]\n    }}")?;

        writeln!(
            self.out,
            "\n    pub fn pins() -> [PinDescriptor; {}] {{\n        [",
            bus.pins.len()
        )?;
        for pin in &bus.pins {
            writeln!(self.out, "            {},", pin_expr(pin, "            "))?;
        }
        writeln!(self.out, "        ]\n    }}")?;

        if bus.mode == ControllerMode::Initiator {
            writeln!(
                self.out,
                "\n    pub fn muxes() -> [MuxDescriptor; {}] {{\n        [",
                bus.muxes.len()
            )?;
            for mux in &bus.muxes {
                writeln!(self.out, "{}", mux_expr(mux))?;
            }
            writeln!(self.out, "        ]\n    }}")?;
        }

        writeln!(self.out, "\n    pub mod ports {{")?;
        if self.standalone() {
            writeln!(
                self.out,
                "        pub const fn i2c_mock() -> {core}::PortIndex {{
            {core}::PortIndex(0)
        }}"
            )?;
        }
        for port in &bus.ports {
            writeln!(
                self.out,
                "        pub const fn {}() -> {core}::PortIndex {{
            {core}::PortIndex({})
        }}",
                port.function, port.index.0
            )?;
        }
        writeln!(self.out, "    }}")?;
        Ok(())
    }

    fn handle(&self, device: usize) -> Result<(String, String), EmitError> {
        let record = self.ir.devices.get(device).ok_or_else(|| {
            EmitError::Invariant(format!("accessor names device {device}, which does not exist"))
        })?;
        let t = record.template;
        let route = t.route.map_or_else(|| "None".to_string(), route_expr);
        Ok((
            record.comment.replace(['\r', '\n'], " "),
            format!(
                "DeviceHandle::new(task, Controller({}), PortIndex({}), {route}, {:#04x})",
                t.controller.0, t.port.0, t.address
            ),
        ))
    }

    fn handle_use(&mut self, indent: &str) -> Result<(), EmitError> {
        writeln!(
            self.out,
            "{indent}use {}::{{Controller, DeviceHandle, MuxId, PortIndex, Route, SegmentId, TaskId}};",
            self.core
        )?;
        Ok(())
    }

    fn single(&mut self, accessor: &Single, indent: &str) -> Result<(), EmitError> {
        let (comment, handle) = self.handle(accessor.device)?;
        writeln!(
            self.out,
            "\n{indent}pub fn {}(task: TaskId) -> DeviceHandle {{
{indent}    // {comment}
{indent}    {handle}
{indent}}}",
            accessor.function
        )?;
        Ok(())
    }

    fn several(&mut self, accessor: &Several, indent: &str) -> Result<(), EmitError> {
        writeln!(
            self.out,
            "\n{indent}pub fn {}(task: TaskId) -> [DeviceHandle; {}] {{\n{indent}    [",
            accessor.function,
            accessor.devices.len()
        )?;
        for device in &accessor.devices {
            let (comment, handle) = self.handle(*device)?;
            writeln!(
                self.out,
                "{indent}        // {comment}\n{indent}        {handle},"
            )?;
        }
        writeln!(self.out, "{indent}    ]\n{indent}}}")?;
        Ok(())
    }

    fn family<T>(
        &mut self,
        name: &str,
        modules: &[KindModule<T>],
        accessor: fn(&mut Self, &T, &str) -> Result<(), EmitError>,
    ) -> Result<(), EmitError> {
        writeln!(self.out, "\n        pub mod {name} {{")?;
        for module in modules {
            writeln!(self.out, "\n            pub mod {} {{", module.module)?;
            self.handle_use("                ")?;
            for item in &module.accessors {
                accessor(self, item, "                ")?;
            }
            writeln!(self.out, "            }}")?;
        }
        writeln!(self.out, "        }}")?;
        Ok(())
    }

    fn devices(&mut self, accessors: &AccessorSet) -> Result<(), EmitError> {
        writeln!(self.out, "\n    pub mod devices {{")?;
        self.handle_use("        ")?;

        if self.standalone() {
            writeln!(
                self.out,
                "
        pub fn mock(task: TaskId) -> DeviceHandle {{
            DeviceHandle::mock(task)
        }}
    }}"
            )?;
            return Ok(());
        }

        for accessor in &accessors.by_kind {
            self.several(accessor, "        ")?;
        }
        self.family("by_name", &accessors.by_name, Self::single)?;
        self.family("by_refdes", &accessors.by_refdes, Self::single)?;
        self.family("by_bus", &accessors.by_bus, Self::several)?;
        writeln!(self.out, "    }}")?;

        writeln!(self.out, "\n    pub mod power {{")?;
        self.handle_use("        ")?;
        for rail in &accessors.rails {
            writeln!(
                self.out,
                "\n        // {}
        pub fn {}(task: TaskId) -> [(DeviceHandle, u8); {}] {{\n            [",
                rail.rail,
                rail.function,
                rail.entries.len()
            )?;
            for (device, index) in &rail.entries {
                let (comment, handle) = self.handle(*device)?;
                writeln!(
                    self.out,
                    "                // {comment}\n                ({handle}, {index}),"
                )?;
            }
            writeln!(self.out, "            ]\n        }}")?;
        }
        writeln!(self.out, "    }}")?;
        Ok(())
    }

    fn sensors(&mut self, sensors: &SensorSet) -> Result<(), EmitError> {
        writeln!(
            self.out,
            "\n    pub mod sensors {{
        pub const NUM_SENSORS: usize = {};",
            sensors.total
        )?;
        for (_, constant, count) in &sensors.per_kind {
            writeln!(self.out, "        pub const {constant}: usize = {count};")?;
        }
        for group in &sensors.groups {
            self.sensor_group(group)?;
        }
        writeln!(self.out, "    }}")?;
        Ok(())
    }

    fn sensor_group(&mut self, group: &SensorGroup) -> Result<(), EmitError> {
        let core = self.core;
        writeln!(
            self.out,
            "\n        pub mod {} {{
            use {core}::SensorId;

            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct Sensors {{",
            group.module
        )?;
        for (_, field, _) in &group.kinds {
            writeln!(self.out, "                pub {field}: &'static [SensorId],")?;
        }
        writeln!(
            self.out,
            "            }}\n\n            pub const ALL: [Sensors; {}] = [",
            group.instances.len()
        )?;
        for instance in &group.instances {
            let (comment, _) = self.handle(instance.device)?;
            let fields: Vec<String> = group
                .kinds
                .iter()
                .zip(&instance.ids)
                .map(|((_, field, _), ids)| format!("{field}: &[{}]", sensor_list(ids)))
                .collect();
            writeln!(
                self.out,
                "                // {comment}\n                Sensors {{ {} }},",
                fields.join(", ")
            )?;
        }
        writeln!(self.out, "            ];")?;

        writeln!(
            self.out,
            "\n            pub mod ids {{\n                use {core}::SensorId;\n"
        )?;
        for (position, (_, _, constant)) in group.kinds.iter().enumerate() {
            let ids: Vec<_> = group
                .instances
                .iter()
                .filter_map(|instance| instance.ids.get(position))
                .flatten()
                .copied()
                .collect();
            writeln!(
                self.out,
                "                pub const {constant}: [SensorId; {}] = [{}];",
                ids.len(),
                sensor_list(&ids)
            )?;
        }
        writeln!(self.out, "            }}\n\n            pub mod by_name {{")?;
        for (position, instance) in group.instances.iter().enumerate() {
            for constant in &instance.constants {
                writeln!(
                    self.out,
                    "                pub const {constant}: super::Sensors = super::ALL[{position}];"
                )?;
            }
        }
        writeln!(self.out, "            }}\n        }}")?;
        Ok(())
    }

    fn validation(&mut self, arms: &[ValidationRecord]) -> Result<(), EmitError> {
        let core = self.core;
        writeln!(
            self.out,
            "\n    pub mod validation {{
        use {core}::{{
            run_check, CheckFn, Controller, DeviceHandle, MuxId, PortIndex, Route, SegmentId,
            TaskId, Transport, ValidateError, ValidationOutcome,
        }};

        pub const NUM_DEVICES: usize = {};

        pub fn validate(
            transport: &dyn Transport,
            task: TaskId,
            index: usize,
        ) -> Result<ValidationOutcome, ValidateError> {{
            let (device, check): (DeviceHandle, Option<CheckFn>) = match index {{",
            arms.len()
        )?;
        for arm in arms {
            let (comment, handle) = self.handle(arm.device)?;
            let check = arm
                .check
                .as_ref()
                .map_or_else(|| "None".to_string(), |path| format!("Some({path} as CheckFn)"));
            writeln!(
                self.out,
                "                // {comment}\n                {} => ({handle}, {check}),",
                arm.device
            )?;
        }
        writeln!(
            self.out,
            "                _ => return Err(ValidateError::NoDevice(index)),
            }};
            Ok(run_check(&device, check, transport)?)
        }}
    }}"
        )?;
        Ok(())
    }
}

fn route_expr(route: Route) -> String {
    format!(
        "Some(Route::new(MuxId({}), SegmentId({})))",
        route.mux.0, route.segment.0
    )
}

fn pin_expr(pin: &PinDescriptor, indent: &str) -> String {
    format!(
        "PinDescriptor {{
{indent}    controller: Controller({}),
{indent}    port: PortIndex({}),
{indent}    gpio_port: Cow::Borrowed({:?}),
{indent}    pins: {:#06x},
{indent}    function: {},
{indent}}}",
        pin.controller.0,
        pin.port.0,
        &*pin.gpio_port,
        pin.pins,
        pin.function
    )
}

fn mux_expr(mux: &MuxDescriptor) -> String {
    let nreset = mux.nreset.as_ref().map_or_else(
        || "None".to_string(),
        |pin| format!("Some({})", pin_expr(pin, "                ")),
    );
    format!(
        "            MuxDescriptor {{
                id: MuxId({}),
                controller: Controller({}),
                port: PortIndex({}),
                driver: MuxDriverKind::{},
                address: {:#04x},
                segments: {},
                nreset: {nreset},
            }},",
        mux.id.0,
        mux.controller.0,
        mux.port.0,
        mux.driver.variant_name(),
        mux.address,
        mux.segments
    )
}

fn sensor_list(ids: &[i2c_core::SensorId]) -> String {
    ids.iter()
        .map(|id| format!("SensorId({})", id.0))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{render, HEADER};
    use crate::document::parse_document;
    use crate::emit::ir::build;
    use crate::emit::{Artifact, Disposition, EmitOptions};
    use crate::resolve::resolve;
    use crate::topology::ResolvedTopology;

    const BOARD: &str = r#"
[[controllers]]
controller = 2
[controllers.ports.F]
name = "front"
pins = [{ pins = [0, 1], af = 4 }]
muxes = [{ driver = "pca9548", address = 0x70, segments = 2, nreset = { gpio_port = "G", pins = [3], af = 0 } }]

[[devices]]
device = "tmp117"
name = "left"
description = "left inlet"
refdes = "U3"
bus = "front"
address = 0x44
mux = 1
segment = 1
sensors = { temperature = 1 }

[[devices]]
device = "tmp117"
name = "right"
bus = "front"
address = 0x44
mux = 1
segment = 2
sensors = { temperature = 1 }

[[devices]]
device = "isl68224"
bus = "front"
address = 0x60
power = { rails = ["VDD_CORE"] }
"#;

    fn topology() -> ResolvedTopology {
        resolve(&parse_document(BOARD).expect("parses")).expect("resolves")
    }

    fn artifact(dispositions: &[Disposition], options: &EmitOptions) -> String {
        render(&build(&topology(), dispositions, options).expect("builds")).expect("renders")
    }

    #[test]
    fn artifacts_open_with_the_header_and_module() {
        let text = artifact(&[Disposition::Initiator], &EmitOptions::default());
        assert!(text.starts_with(HEADER));
        assert!(text.contains("    clippy::pedantic,\n    clippy::nursery\n)]\npub mod i2c_config {"));
        assert!(text.contains("pub mod i2c_config {"));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn initiator_tables_are_rendered() {
        let text = artifact(&[Disposition::Initiator], &EmitOptions::default());
        assert!(text.contains("pub const NUM_CONTROLLERS: usize = 1;"));
        assert!(text.contains("pub const NUM_MUXES: usize = 1;"));
        assert!(text.contains("driver: MuxDriverKind::Pca9548,"));
        assert!(text.contains("address: 0x70,"));
        assert!(text.contains("gpio_port: Cow::Borrowed(\"G\"),"));
        assert!(text.contains("pins: 0x0003,"));
        assert!(text.contains("pub const fn i2c2_f() -> i2c_core::PortIndex {"));
    }

    #[test]
    fn device_accessors_carry_routes() {
        let text = artifact(&[Disposition::Devices], &EmitOptions::default());
        assert!(text.contains("pub fn tmp117(task: TaskId) -> [DeviceHandle; 2] {"));
        assert!(text.contains("// tmp117 \"left\" at 0x44: left inlet"));
        assert!(text.contains(
            "DeviceHandle::new(task, Controller(2), PortIndex(0), \
             Some(Route::new(MuxId(0), SegmentId(2))), 0x44)"
        ));
        assert!(text.contains(
            "        pub mod by_name {\n\n            pub mod tmp117 {\n                use i2c_core::{"
        ));
        assert!(text.contains("                pub fn left(task: TaskId) -> DeviceHandle {"));
        assert!(text.contains("        pub mod by_refdes {\n\n            pub mod tmp117 {"));
        assert!(text.contains("                pub fn u3(task: TaskId) -> DeviceHandle {"));
        assert!(text.contains("        pub mod by_bus {\n\n            pub mod tmp117 {"));
        assert!(text.contains("                pub fn front(task: TaskId) -> [DeviceHandle; 2] {"));
        assert!(text.contains("pub fn vdd_core(task: TaskId) -> [(DeviceHandle, u8); 1] {"));
    }

    #[test]
    fn sensor_tables_are_rendered() {
        let text = artifact(&[Disposition::Sensors], &EmitOptions::default());
        assert!(text.contains("pub const NUM_SENSORS: usize = 2;"));
        assert!(text.contains("pub const NUM_TEMPERATURE_SENSORS: usize = 2;"));
        assert!(text.contains("pub const NUM_SPEED_SENSORS: usize = 0;"));
        assert!(text.contains("        pub mod tmp117 {\n            use i2c_core::SensorId;"));
        assert!(text.contains("            pub struct Sensors {"));
        assert!(text.contains("pub temperature: &'static [SensorId],"));
        assert!(text.contains("pub const ALL: [Sensors; 2] = ["));
        assert!(text.contains("Sensors { temperature: &[SensorId(1)] },"));
        assert!(text.contains(
            "pub const TEMPERATURE: [SensorId; 2] = [SensorId(0), SensorId(1)];"
        ));
        assert!(text.contains("pub const RIGHT: super::Sensors = super::ALL[1];"));
        assert!(!text.contains("pub mod isl68224"));
    }

    #[test]
    fn device_names_never_shadow_kind_or_sensor_names() {
        let doc = parse_document(
            r#"
[[controllers]]
controller = 1
[controllers.ports.B]
name = "main"
pins = []

[[devices]]
device = "tmp117"
name = "temperature"
bus = "main"
address = 0x48
sensors = { temperature = 1 }

[[devices]]
device = "tmp117"
name = "x"
bus = "main"
address = 0x49
sensors = { temperature = 1 }

[[devices]]
device = "tmp117_x"
name = "y"
bus = "main"
address = 0x4a
sensors = { temperature = 1 }
"#,
        )
        .expect("parses");
        let topology = resolve(&doc).expect("resolves");
        let ir = build(
            &topology,
            &[Disposition::Devices, Disposition::Sensors],
            &EmitOptions::default(),
        )
        .expect("builds");
        let text = render(&ir).expect("renders");

        assert!(text.contains("pub fn tmp117(task: TaskId) -> [DeviceHandle; 2] {"));
        assert!(text.contains("pub fn tmp117_x(task: TaskId) -> [DeviceHandle; 1] {"));
        assert!(text.contains("                pub fn x(task: TaskId) -> DeviceHandle {"));
        assert!(text.contains("                pub fn y(task: TaskId) -> DeviceHandle {"));
        assert!(text.contains("pub const TEMPERATURE: [SensorId; 2] = [SensorId(0), SensorId(1)];"));
        assert!(text.contains("pub const TEMPERATURE: super::Sensors = super::ALL[0];"));
        assert!(text.contains("        pub mod tmp117_x {\n            use i2c_core::SensorId;"));
    }

    #[test]
    fn validation_has_one_arm_per_device() {
        let text = artifact(&[Disposition::Validation], &EmitOptions::default());
        assert!(text.contains("pub const NUM_DEVICES: usize = 3;"));
        assert!(text.contains("Some(i2c_core::checks::tmp117 as CheckFn)),"));
        assert!(text.contains("                2 => (DeviceHandle::new("));
        assert!(text.contains(", None),"));
        assert!(text.contains("_ => return Err(ValidateError::NoDevice(index)),"));
    }

    #[test]
    fn standalone_artifacts_hand_out_mocks() {
        let options = EmitOptions {
            artifact: Artifact::Standalone,
            ..EmitOptions::default()
        };
        let text = artifact(&[Disposition::Initiator, Disposition::Devices], &options);
        assert!(text.contains("pub const fn i2c_mock() -> i2c_core::PortIndex {"));
        assert!(text.contains("DeviceHandle::mock(task)"));
        assert!(!text.contains("tmp117"));
    }

    #[test]
    fn module_and_core_path_are_configurable() {
        let options = EmitOptions {
            module: "bus_config".to_string(),
            core_path: "crate::i2c".to_string(),
            ..EmitOptions::default()
        };
        let text = artifact(&[Disposition::Validation], &options);
        assert!(text.contains("pub mod bus_config {"));
        assert!(text.contains("use crate::i2c::{"));
        assert!(text.contains("Some(crate::i2c::checks::tmp117 as CheckFn)"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let options = EmitOptions::default();
        let all = [
            Disposition::Validation,
            Disposition::Initiator,
            Disposition::Sensors,
            Disposition::Devices,
        ];
        let mut reversed = all;
        reversed.reverse();
        assert_eq!(artifact(&all, &options), artifact(&reversed, &options));
    }
}
