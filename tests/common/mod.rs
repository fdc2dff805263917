#![allow(dead_code)]

use beamforge::beam::{BeamField, BeamState};
use beamforge::lattice::{AttrValue, ElementKind, ElementRecord, Lattice};
use beamforge::model::Model;
use beamforge::optimizer::OptimizationOptions;
use beamforge::session::Session;
use beamforge::simulation::ResponseModel;
use std::sync::Arc;

/// Builder for ElementRecord to clean up tests
pub struct ElementBuilder {
    record: ElementRecord,
}

impl ElementBuilder {
    pub fn new(name: &str, kind: ElementKind) -> Self {
        Self {
            record: ElementRecord::new(name, kind),
        }
    }

    pub fn drift(name: &str, length: f64) -> Self {
        Self::new(name, ElementKind::Drift).attr("L", length)
    }

    pub fn quad(name: &str, length: f64, gradient: f64) -> Self {
        Self::new(name, ElementKind::Quadrupole)
            .attr("L", length)
            .attr("B2", gradient)
    }

    pub fn marker(name: &str) -> Self {
        Self::new(name, ElementKind::Marker)
    }

    pub fn attr(mut self, key: &str, value: f64) -> Self {
        self.record
            .attributes
            .insert(key.to_string(), AttrValue::Number(value));
        self
    }

    pub fn text(mut self, key: &str, value: &str) -> Self {
        self.record
            .attributes
            .insert(key.to_string(), AttrValue::Text(value.to_string()));
        self
    }

    pub fn build(self) -> ElementRecord {
        self.record
    }
}

/// The sample job shipped in `demos/`, same lattice as `abcd_lattice`.
pub const ABCD_WORKSPACE: &str = include_str!("../../demos/abcd.json");

/// Quadrupole gradient pushes kinetic energy: 1e5 eV/u per T/m.
pub const ENERGY_GAIN: f64 = 1e5;

/// `S | A(drift) B(quad, B2=3) C(drift) D(marker)`
pub fn abcd_lattice() -> Lattice {
    Lattice::from_records(vec![
        ElementBuilder::drift("A", 0.5).build(),
        ElementBuilder::quad("B", 0.2, 3.0).build(),
        ElementBuilder::drift("C", 0.5).build(),
        ElementBuilder::marker("D").build(),
    ])
    .unwrap()
}

pub fn energy_response() -> ResponseModel {
    ResponseModel::new().term(ElementKind::Quadrupole, "B2", BeamField::RefIonEk, ENERGY_GAIN)
}

pub fn test_options() -> OptimizationOptions {
    OptimizationOptions {
        num_threads: 2,
        ..Default::default()
    }
}

pub fn abcd_session() -> Session {
    let model = Model::new(abcd_lattice(), BeamState::reference());
    Session::new(model, Arc::new(energy_response()), test_options()).unwrap()
}

/// Knob B.B2, target D asking for `ref_IonEk = 2.5e6` with weight 1.
pub fn abcd_tuning_session() -> Session {
    let mut session = abcd_session();
    session.select_element_knob("B", "B2", None).unwrap();
    session.select_target("D").unwrap();
    session
        .add_target_parameter("ref_IonEk", "2.5e6", "1")
        .unwrap();
    session
}
