//! Properties of resolution and emission over generated documents.

#![allow(clippy::pedantic, clippy::nursery)]

use clap as _;
use convert_case as _;
use env_logger as _;
use i2c_codegen::{
    emit, parse_document, resolve, Disposition, EmitOptions, ResolvedTopology, TopologyError,
};
use i2c_core as _;
use indexmap as _;
use log as _;
use proptest::prelude::*;
use rstest as _;
use serde as _;
use tempfile as _;
use thiserror as _;
use toml as _;

const KINDS: [&str; 3] = ["tmp117", "tmp451", "raa229618"];

#[derive(Debug, Clone)]
struct Spec {
    kind: usize,
    temperature: u32,
    voltage: u32,
    speed: u32,
    routed: Option<u8>,
}

fn spec() -> impl Strategy<Value = Spec> {
    (0..KINDS.len(), 0..3u32, 0..3u32, 0..2u32, prop::option::of(1..=4u8)).prop_map(
        |(kind, temperature, voltage, speed, routed)| Spec {
            kind,
            temperature,
            voltage,
            speed,
            routed,
        },
    )
}

fn document(specs: &[Spec]) -> String {
    let mut text = String::from(
        "[[controllers]]\ncontroller = 1\n[controllers.ports.B]\nname = \"main\"\n\
         pins = [{ pins = [6, 7], af = 4 }]\nmuxes = [{ driver = \"pca9545\", address = 0x70 }]\n",
    );
    for (i, spec) in specs.iter().enumerate() {
        text.push_str(&format!(
            "\n[[devices]]\ndevice = \"{}\"\nname = \"dev{i}\"\nbus = \"main\"\naddress = {}\n\
             sensors = {{ temperature = {}, voltage = {}, speed = {} }}\n",
            KINDS[spec.kind],
            0x10 + i,
            spec.temperature,
            spec.voltage,
            spec.speed
        ));
        if let Some(segment) = spec.routed {
            text.push_str(&format!("mux = 1\nsegment = {segment}\n"));
        }
    }
    text
}

fn resolved(text: &str) -> Result<ResolvedTopology, TopologyError> {
    resolve(&parse_document(text).unwrap())
}

proptest! {
    #[test]
    fn property_resolution_is_deterministic(specs in prop::collection::vec(spec(), 0..24)) {
        let text = document(&specs);
        let first = resolved(&text).unwrap();
        let second = resolved(&text).unwrap();
        prop_assert_eq!(&first, &second);

        let dispositions = [Disposition::Devices, Disposition::Sensors, Disposition::Validation];
        let options = EmitOptions::default();
        prop_assert_eq!(
            emit(&first, &dispositions, &options).unwrap(),
            emit(&second, &dispositions, &options).unwrap()
        );
    }

    #[test]
    fn property_sensor_ids_are_contiguous_in_declaration_order(
        specs in prop::collection::vec(spec(), 1..24)
    ) {
        let topology = resolved(&document(&specs)).unwrap();
        let mut next = 0;
        for binding in &topology.sensors.bindings {
            for range in &binding.ranges {
                prop_assert_eq!(range.first.0, next);
                prop_assert!(range.count > 0);
                next += range.count;
            }
        }
        prop_assert_eq!(topology.sensors.total, next);

        let expected: u32 = specs.iter().map(|s| s.temperature + s.voltage + s.speed).sum();
        prop_assert_eq!(next, expected);
    }

    #[test]
    fn property_duplicate_names_within_a_kind_are_rejected(
        specs in prop::collection::vec(spec(), 2..16),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut specs = specs;
        let last = specs.len() - 1;
        let first = pick.index(last);
        specs[last].kind = specs[first].kind;
        let text = document(&specs).replace(
            &format!("name = \"dev{last}\""),
            &format!("name = \"dev{first}\""),
        );

        prop_assert_eq!(
            resolved(&text),
            Err(TopologyError::DuplicateDeviceIdentity {
                kind: KINDS[specs[first].kind].to_string(),
                field: "name",
                identifier: format!("dev{first}"),
            })
        );
    }

    #[test]
    fn property_mux_without_segment_is_incomplete(
        specs in prop::collection::vec(spec(), 1..16),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut specs = specs;
        for spec in &mut specs {
            spec.routed = None;
        }
        let victim = pick.index(specs.len());
        let mut text = document(&specs);
        let marker = format!("name = \"dev{victim}\"\n");
        text = text.replace(&marker, &format!("{marker}mux = 1\n"));

        let err = resolved(&text).unwrap_err();
        prop_assert!(
            matches!(err, TopologyError::IncompleteMuxReference { .. }),
            "{:?}", err
        );
    }
}
