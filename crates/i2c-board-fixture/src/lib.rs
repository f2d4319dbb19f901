//! A board crate built the way firmware tasks consume `i2c-codegen`: the
//! build script renders `board.toml` and the artifact is included here.

/// Board-specific identity checks named in the build script.
pub mod board_checks {
    use i2c_core::{DeviceHandle, I2cError, Transport};

    /// Offset of the FRU common header in the EEPROM.
    const FRU_HEADER: u8 = 0x00;
    /// Common header format version.
    const FRU_FORMAT_VERSION: u8 = 0x01;

    /// Checks that the FRU EEPROM starts with a version 1 common header.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError`] if the read fails.
    pub fn fru_header(device: &DeviceHandle, transport: &dyn Transport) -> Result<bool, I2cError> {
        Ok((device.read_reg_u8(transport, FRU_HEADER)? & 0x0F) == FRU_FORMAT_VERSION)
    }
}

include!(concat!(env!("OUT_DIR"), "/i2c_config.rs"));
