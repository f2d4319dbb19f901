//! CLI entry point for the i2c-codegen binary.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use convert_case as _;
use i2c_codegen::{
    generate, parse_document, resolve, Artifact, Disposition, EmitOptions, ResolvedTopology,
};
use i2c_core as _;
use indexmap::IndexMap;
use log::debug;
#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
use serde as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use toml as _;

#[derive(Debug, Parser)]
#[command(
    name = "i2c-codegen",
    version,
    about = "Compile I2C topology documents into runtime access tables"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a document and print a summary.
    Check {
        /// Topology document.
        config: PathBuf,
    },
    /// Emit the artifact for one or more dispositions.
    Emit(EmitArgs),
}

#[derive(Debug, Args)]
struct EmitArgs {
    /// Topology document.
    config: PathBuf,

    /// Disposition to emit; repeat for several.
    #[arg(short = 'd', long = "disposition", required = true)]
    dispositions: Vec<Disposition>,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit a mock device and mock port instead of the real tables.
    #[arg(long)]
    standalone: bool,

    /// Extra driver-specific check as `kind=path`.
    #[arg(long = "check", value_parser = parse_check)]
    checks: Vec<(String, String)>,

    /// Name of the generated module.
    #[arg(long, default_value = "i2c_config")]
    module: String,

    /// Path to the runtime crate from the including crate.
    #[arg(long, default_value = "i2c_core")]
    core_path: String,
}

impl EmitArgs {
    fn options(&self) -> EmitOptions {
        EmitOptions {
            artifact: if self.standalone {
                Artifact::Standalone
            } else {
                Artifact::Dist
            },
            module: self.module.clone(),
            core_path: self.core_path.clone(),
            checks: self.checks.iter().cloned().collect::<IndexMap<_, _>>(),
        }
    }
}

fn parse_check(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((kind, path)) if !kind.is_empty() && !path.is_empty() => {
            Ok((kind.to_string(), path.to_string()))
        }
        _ => Err(format!("expected `kind=path`, got `{value}`")),
    }
}

fn read_config(path: &Path) -> Result<String, i32> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("error: {}: {e}", path.display());
        1
    })
}

fn summary(path: &Path, topology: &ResolvedTopology) -> String {
    let mut lines = vec![format!(
        "{}: {} controller(s), {} port(s), {} mux(es), {} device(s), {} sensor(s), {} rail(s)",
        path.display(),
        topology.controllers.len(),
        topology.ports.len(),
        topology.muxes.len(),
        topology.devices.len(),
        topology.sensors.total,
        topology.rails.len()
    )];
    for (kind, group) in &topology.groups {
        lines.push(format!("  {kind}: {}", group.devices.len()));
    }
    lines.join("\n")
}

fn run_check(config: &Path) -> Result<(), i32> {
    let text = read_config(config)?;
    let topology = parse_document(&text)
        .map_err(|e| e.to_string())
        .and_then(|doc| resolve(&doc).map_err(|e| e.to_string()))
        .map_err(|e| {
            eprintln!("error: {}: {e}", config.display());
            1
        })?;
    println!("{}", summary(config, &topology));
    Ok(())
}

fn run_emit(args: &EmitArgs) -> Result<(), i32> {
    let text = read_config(&args.config)?;
    let artifact = generate(&text, &args.dispositions, &args.options()).map_err(|e| {
        eprintln!("error: {}: {e}", args.config.display());
        1
    })?;

    match &args.output {
        Some(path) => {
            fs::write(path, artifact).map_err(|e| {
                eprintln!("error: failed to write {}: {e}", path.display());
                1
            })?;
            debug!("wrote {}", path.display());
        }
        None => print!("{artifact}"),
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();

    let result = match &cli.command {
        Command::Check { config } => run_check(config),
        Command::Emit(args) => run_emit(args),
    };

    std::process::exit(match result {
        Ok(()) => 0,
        Err(code) => code,
    });
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use i2c_codegen::{Artifact, Disposition};

    use super::{parse_check, Cli, Command};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_emit_command() {
        let cli = Cli::try_parse_from([
            "i2c-codegen",
            "emit",
            "board.toml",
            "-d",
            "devices",
            "--disposition",
            "sensors",
            "--standalone",
            "--check",
            "at24csw080=drv_at24::check",
            "-v",
        ])
        .expect("valid emit args should parse");

        assert!(cli.verbose);
        let Command::Emit(args) = cli.command else {
            panic!("expected emit");
        };
        assert_eq!(
            args.dispositions,
            vec![Disposition::Devices, Disposition::Sensors]
        );
        let options = args.options();
        assert_eq!(options.artifact, Artifact::Standalone);
        assert_eq!(options.module, "i2c_config");
        assert_eq!(options.checks["at24csw080"], "drv_at24::check");
    }

    #[test]
    fn emit_requires_a_disposition() {
        assert!(Cli::try_parse_from(["i2c-codegen", "emit", "board.toml"]).is_err());
    }

    #[test]
    fn rejects_unknown_dispositions() {
        assert!(Cli::try_parse_from(["i2c-codegen", "emit", "board.toml", "-d", "pmbus"]).is_err());
    }

    #[test]
    fn check_specs_need_both_halves() {
        assert!(parse_check("tmp117").is_err());
        assert!(parse_check("=path").is_err());
        assert_eq!(
            parse_check("tmp117=checks::tmp117"),
            Ok(("tmp117".to_string(), "checks::tmp117".to_string()))
        );
    }
}
