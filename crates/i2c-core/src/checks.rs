//! Built-in driver-specific identity checks.
//!
//! Each check reads an identification register and compares it with the
//! value the datasheet fixes for the part. A wrong value is `Ok(false)`; a
//! failed read is an error.

use crate::{CheckFn, DeviceHandle, I2cError, Transport};

/// TMP117 device id register.
const TMP117_DEVICE_ID: u8 = 0x0F;
/// TMP117 device id field (bits 11:0).
const TMP117_ID: u16 = 0x0117;

/// Manufacturer id register shared by TMP451 and EMC2101.
const MANUFACTURER_ID: u8 = 0xFE;
/// Texas Instruments manufacturer id.
const TMP451_MANUFACTURER: u8 = 0x55;
/// SMSC/Microchip manufacturer id.
const EMC2101_MANUFACTURER: u8 = 0x5D;

/// Checks the TMP117 device id.
///
/// # Errors
///
/// Returns [`I2cError`] if the register read fails.
pub fn tmp117(device: &DeviceHandle, transport: &dyn Transport) -> Result<bool, I2cError> {
    let id = device.read_reg_u16_be(transport, TMP117_DEVICE_ID)?;
    Ok(id & 0x0FFF == TMP117_ID)
}

/// Checks the TMP451 manufacturer id.
///
/// # Errors
///
/// Returns [`I2cError`] if the register read fails.
pub fn tmp451(device: &DeviceHandle, transport: &dyn Transport) -> Result<bool, I2cError> {
    Ok(device.read_reg_u8(transport, MANUFACTURER_ID)? == TMP451_MANUFACTURER)
}

/// Checks the EMC2101 manufacturer id.
///
/// # Errors
///
/// Returns [`I2cError`] if the register read fails.
pub fn emc2101(device: &DeviceHandle, transport: &dyn Transport) -> Result<bool, I2cError> {
    Ok(device.read_reg_u8(transport, MANUFACTURER_ID)? == EMC2101_MANUFACTURER)
}

/// Driver kinds with a built-in check, and the check's path in this crate.
pub const BUILTIN: [(&str, CheckFn, &str); 3] = [
    ("tmp117", tmp117, "checks::tmp117"),
    ("tmp451", tmp451, "checks::tmp451"),
    ("emc2101", emc2101, "checks::emc2101"),
];

/// Built-in check for `kind`, if there is one.
#[must_use]
pub fn builtin_check(kind: &str) -> Option<CheckFn> {
    BUILTIN
        .iter()
        .find(|(name, ..)| *name == kind)
        .map(|(_, check, _)| *check)
}

/// Path of the built-in check for `kind` relative to the crate root.
#[must_use]
pub fn builtin_check_path(kind: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(name, ..)| *name == kind)
        .map(|(.., path)| *path)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;

    use super::{builtin_check, builtin_check_path};
    use crate::{
        mock::{MockBus, MockDevice},
        BusServer, Client, Controller, ControllerDescriptor, ControllerMode, DeviceHandle,
        PortIndex, TaskId,
    };

    fn server(registers: &[(u8, &[u8])]) -> Mutex<BusServer<MockBus>> {
        let mut device = MockDevice::new(Controller(1), PortIndex(0), None, 0x48);
        for (register, bytes) in registers {
            device = device.with_register(*register, bytes);
        }
        let mut bus = MockBus::new([]);
        bus.add_device(device);
        Mutex::new(BusServer::new(
            bus,
            [ControllerDescriptor {
                controller: Controller(1),
                mode: ControllerMode::Initiator,
                ports: 1,
            }],
            [],
        ))
    }

    fn handle() -> DeviceHandle {
        DeviceHandle::new(TaskId(1), Controller(1), PortIndex(0), None, 0x48)
    }

    #[rstest]
    #[case("tmp117", &[(0x0F, &[0x01, 0x17][..])], true)]
    #[case("tmp117", &[(0x0F, &[0x31, 0x17][..])], true)]
    #[case("tmp117", &[(0x0F, &[0x01, 0x18][..])], false)]
    #[case("tmp451", &[(0xFE, &[0x55][..])], true)]
    #[case("tmp451", &[(0xFE, &[0x5D][..])], false)]
    #[case("emc2101", &[(0xFE, &[0x5D][..])], true)]
    fn identity_checks(
        #[case] kind: &str,
        #[case] registers: &[(u8, &[u8])],
        #[case] expected: bool,
    ) {
        let server = server(registers);
        let client = Client::new(TaskId(1), &server);
        let check = builtin_check(kind).expect("builtin exists");
        assert_eq!(check(&handle(), &client), Ok(expected));
    }

    #[test]
    fn unknown_kinds_have_no_builtin() {
        assert!(builtin_check("max31790").is_none());
        assert_eq!(builtin_check_path("emc2101"), Some("checks::emc2101"));
    }
}
