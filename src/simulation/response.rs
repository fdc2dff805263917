use super::{SimulationOracle, Trace, TraceRecord};
use crate::beam::{BeamField, BeamState};
use crate::error::{BeamForgeError, BfResult};
use crate::lattice::{ElementKind, Lattice};
use serde::{Deserialize, Serialize};

/// `field += gain * attribute` for every element of `kind` passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTerm {
    pub kind: ElementKind,
    pub attribute: String,
    pub field: BeamField,
    pub gain: f64,
}

/// First-order linear-response stand-in for a propagation engine.
///
/// Each element adds its length to the running position, then every term
/// matching the element's kind shifts one beam field by `gain` times the
/// element's attribute value. Elements missing the attribute, or carrying a
/// non-numeric value, contribute nothing. The total energy `ref_IonW` is
/// kept equal to `ref_IonEs + ref_IonEk` after every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseModel {
    #[serde(default)]
    pub terms: Vec<ResponseTerm>,
}

impl ResponseModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, kind: ElementKind, attribute: &str, field: BeamField, gain: f64) -> Self {
        self.terms.push(ResponseTerm {
            kind,
            attribute: attribute.to_string(),
            field,
            gain,
        });
        self
    }
}

impl SimulationOracle for ResponseModel {
    fn run(&self, lattice: &Lattice, beam: &BeamState, stop_at: usize) -> BfResult<Trace> {
        if stop_at > lattice.len() {
            return Err(BeamForgeError::IndexOutOfRange {
                index: stop_at,
                min: 0,
                max: lattice.len(),
            });
        }

        let mut state = beam.clone();
        let mut pos = 0.0;
        let mut records = Vec::with_capacity(stop_at + 1);
        records.push(TraceRecord {
            index: 0,
            pos,
            state: state.clone(),
        });

        for (index, element) in lattice.iter().take(stop_at) {
            pos += element.length();
            for term in self.terms.iter().filter(|t| t.kind == element.kind) {
                if let Some(v) = element.attribute(&term.attribute).and_then(|a| a.as_f64()) {
                    state.add(term.field, term.gain * v);
                }
            }
            state.set(
                BeamField::RefIonW,
                state.get(BeamField::RefIonEs) + state.get(BeamField::RefIonEk),
            );
            records.push(TraceRecord {
                index,
                pos,
                state: state.clone(),
            });
        }

        Ok(Trace { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::ElementRecord;

    fn lattice() -> Lattice {
        Lattice::from_records(vec![
            ElementRecord::new("D1", ElementKind::Drift).attr("L", 1.0),
            ElementRecord::new("Q1", ElementKind::Quadrupole)
                .attr("L", 0.5)
                .attr("B2", 2.0),
            ElementRecord::new("D2", ElementKind::Drift).attr("L", 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_response_applies_matching_terms() {
        let model = ResponseModel::new().term(
            ElementKind::Quadrupole,
            "B2",
            BeamField::XRms,
            0.25,
        );
        let beam = BeamState::reference().with(BeamField::XRms, 1.0);
        let trace = model.run(&lattice(), &beam, 3).unwrap();

        assert_eq!(trace.records.len(), 4);
        assert_eq!(trace.records[1].state.get(BeamField::XRms), 1.0);
        assert_eq!(trace.records[2].state.get(BeamField::XRms), 1.5);
        assert!((trace.last().unwrap().pos - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_stop_index_truncates_trace() {
        let model = ResponseModel::new();
        let trace = model.run(&lattice(), &BeamState::reference(), 1).unwrap();
        assert_eq!(trace.records.len(), 2);
        assert_eq!(trace.last().unwrap().index, 1);
    }

    #[test]
    fn test_stop_beyond_lattice_is_rejected() {
        let model = ResponseModel::new();
        let err = model.run(&lattice(), &BeamState::reference(), 4);
        assert!(matches!(err, Err(BeamForgeError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_total_energy_tracks_kinetic() {
        let model =
            ResponseModel::new().term(ElementKind::Quadrupole, "B2", BeamField::RefIonEk, 1e5);
        let trace = model.run(&lattice(), &BeamState::reference(), 2).unwrap();
        let s = trace.final_state().unwrap();
        assert_eq!(s.get(BeamField::RefIonEk), 1.2e6);
        assert_eq!(
            s.get(BeamField::RefIonW),
            s.get(BeamField::RefIonEs) + 1.2e6
        );
    }
}
