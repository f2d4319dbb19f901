//! Build-script pipeline: read a topology document, resolve it, emit it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::document::parse_document;
use crate::emit::{emit, Disposition, EmitOptions};
use crate::errors::CodegenError;
use crate::resolve::resolve;

/// Build-script variable naming the topology document.
pub const CONFIG_ENV: &str = "I2C_TOPOLOGY_CONFIG";

/// File name of the artifact inside the output directory.
pub const ARTIFACT_FILE: &str = "i2c_config.rs";

/// Parses, resolves, and renders `text` entirely in memory.
///
/// # Errors
///
/// Returns the first schema, topology, or emission error.
pub fn generate(
    text: &str,
    dispositions: &[Disposition],
    options: &EmitOptions,
) -> Result<String, CodegenError> {
    let document = parse_document(text)?;
    let topology = resolve(&document)?;
    Ok(emit(&topology, dispositions, options)?)
}

/// Generates the artifact for `config` into `out_dir` and returns its path.
///
/// Nothing is written unless generation succeeds.
///
/// # Errors
///
/// Returns [`CodegenError::Io`] if the document cannot be read or the
/// artifact cannot be written, and any generation error.
pub fn codegen(
    config: &Path,
    dispositions: &[Disposition],
    options: &EmitOptions,
    out_dir: &Path,
) -> Result<PathBuf, CodegenError> {
    let text = fs::read_to_string(config).map_err(|source| CodegenError::Io {
        path: config.to_path_buf(),
        source,
    })?;
    let artifact = generate(&text, dispositions, options)?;

    let dest = out_dir.join(ARTIFACT_FILE);
    fs::write(&dest, artifact).map_err(|source| CodegenError::Io {
        path: dest.clone(),
        source,
    })?;
    debug!("wrote {}", dest.display());
    Ok(dest)
}

/// Build-script entry point: reads the document named by
/// `I2C_TOPOLOGY_CONFIG` and writes the artifact into `OUT_DIR`.
///
/// Prints the `cargo:rerun-if-*` lines that make cargo rerun the build
/// script when the document changes.
///
/// # Errors
///
/// Returns [`CodegenError::Env`] if either variable is unset, and any
/// error from [`codegen`].
pub fn codegen_from_env(
    dispositions: &[Disposition],
    options: &EmitOptions,
) -> Result<PathBuf, CodegenError> {
    let config = env::var_os(CONFIG_ENV).ok_or(CodegenError::Env { var: CONFIG_ENV })?;
    let out_dir = env::var_os("OUT_DIR").ok_or(CodegenError::Env { var: "OUT_DIR" })?;
    let config = PathBuf::from(config);

    println!("cargo:rerun-if-env-changed={CONFIG_ENV}");
    println!("cargo:rerun-if-changed={}", config.display());

    codegen(&config, dispositions, options, Path::new(&out_dir))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{codegen, generate, ARTIFACT_FILE};
    use crate::emit::{Disposition, EmitOptions};
    use crate::errors::{CodegenError, TopologyError};

    const DOC: &str = r#"
[[controllers]]
controller = 1
[controllers.ports.B]
name = "main"
pins = [{ pins = [6, 7], af = 4 }]

[[devices]]
device = "tmp451"
bus = "main"
address = 0x4c
"#;

    #[test]
    fn writes_the_artifact_into_the_output_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("board.toml");
        fs::write(&config, DOC).expect("write config");

        let dest = codegen(
            &config,
            &[Disposition::Devices],
            &EmitOptions::default(),
            dir.path(),
        )
        .expect("codegen succeeds");
        assert_eq!(dest, dir.path().join(ARTIFACT_FILE));
        let text = fs::read_to_string(dest).expect("artifact readable");
        assert!(text.contains("pub fn tmp451(task: TaskId)"));
    }

    #[test]
    fn failures_write_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("board.toml");
        fs::write(&config, DOC.replace("\"main\"\naddress", "\"side\"\naddress"))
            .expect("write config");

        let err = codegen(
            &config,
            &[Disposition::Devices],
            &EmitOptions::default(),
            dir.path(),
        )
        .expect_err("unknown bus fails");
        assert!(matches!(
            err,
            CodegenError::Topology(TopologyError::UnknownBusReference { .. })
        ));
        assert!(!dir.path().join(ARTIFACT_FILE).exists());
    }

    #[test]
    fn missing_documents_report_their_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("absent.toml");
        let err = codegen(&config, &[], &EmitOptions::default(), dir.path())
            .expect_err("missing file fails");
        assert!(err.to_string().contains("absent.toml"), "{err}");
    }

    #[test]
    fn schema_errors_surface_through_generate() {
        let err = generate("[[devices]]\nbogus = 1\n", &[], &EmitOptions::default())
            .expect_err("schema violation");
        assert!(matches!(err, CodegenError::Schema(_)));
    }
}
