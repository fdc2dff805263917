use crate::beam::BeamState;
use crate::error::BfResult;
use crate::history::HistoryStack;
use crate::lattice::{ElementRecord, Lattice};
use crate::model::Model;
use crate::optimizer::{Algorithm, OptimizationOptions};
use crate::selection::Bounds;
use crate::session::Session;
use crate::simulation::ResponseModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A number, or whatever the operator typed instead of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Number(f64),
    Text(String),
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Number(v) => write!(f, "{}", v),
            Entry::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnobPlan {
    Element {
        element: String,
        attribute: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bounds: Option<Bounds>,
    },
    Beam {
        beam: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bounds: Option<Bounds>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPlan {
    pub name: String,
    pub desired: Entry,
    pub weight: Entry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPlan {
    pub element: String,
    #[serde(default)]
    pub parameters: Vec<ParameterPlan>,
}

/// The selection an optimisation run starts from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
    #[serde(default)]
    pub knobs: Vec<KnobPlan>,
    #[serde(default)]
    pub target: Option<TargetPlan>,
}

/// On-disk description of a tuning job: beam, elements, the response
/// model standing in for the engine, and the selection to optimise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default = "BeamState::reference")]
    pub beam: BeamState,
    pub elements: Vec<ElementRecord>,
    #[serde(default)]
    pub response: ResponseModel,
    #[serde(default)]
    pub plan: Plan,
}

impl Workspace {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BfResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> BfResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn model(&self) -> BfResult<Model> {
        let lattice = Lattice::from_records(self.elements.iter().cloned())?;
        Ok(Model::new(lattice, self.beam.clone()))
    }

    /// Replaces beam and elements with the current state of `model`.
    pub fn update_model(&mut self, model: &Model) {
        self.beam = model.beam.clone();
        self.elements = model.lattice.records();
    }

    /// Builds a session over this workspace and applies the plan's
    /// selection to it.
    pub fn into_session(&self, options: OptimizationOptions, history_depth: usize) -> BfResult<Session> {
        let oracle = Arc::new(self.response.clone());
        let mut session = Session::new(self.model()?, oracle, options)?
            .with_history(HistoryStack::with_depth(history_depth));

        if let Some(target) = &self.plan.target {
            for p in &target.parameters {
                session.add_target_parameter(&p.name, &p.desired.to_string(), &p.weight.to_string())?;
            }
        }
        for knob in &self.plan.knobs {
            match knob {
                KnobPlan::Element {
                    element,
                    attribute,
                    bounds,
                } => {
                    session.select_element_knob(element, attribute, *bounds)?;
                }
                KnobPlan::Beam { beam, bounds } => {
                    session.select_beam_knob(beam, *bounds)?;
                }
            }
        }
        if let Some(target) = &self.plan.target {
            session.select_target(&target.element)?;
        }

        info!(
            "📂 Workspace ready: {} elements, {} knob(s)",
            session.lattice().len(),
            session.tracker().knobs().len()
        );
        Ok(session)
    }
}
