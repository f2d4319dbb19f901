//! Generates the board's I2C tables from `board.toml`.

use std::env;
use std::path::PathBuf;

use i2c_codegen::{codegen, Disposition, EmitOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let config = manifest_dir.join("board.toml");
    println!("cargo:rerun-if-changed={}", config.display());

    let mut options = EmitOptions::default();
    options.checks.insert(
        "at24csw080".to_string(),
        "crate::board_checks::fru_header".to_string(),
    );
    codegen(
        &config,
        &[
            Disposition::Initiator,
            Disposition::Devices,
            Disposition::Sensors,
            Disposition::Validation,
        ],
        &options,
        &out_dir,
    )?;
    Ok(())
}
