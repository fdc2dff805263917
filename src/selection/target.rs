use crate::beam::BeamField;
use crate::error::{BeamForgeError, BfResult};
use crate::lattice::ElementId;
use std::collections::BTreeMap;

/// Desired value and weight of one beam-state parameter at the target.
/// Either side is `None` when the operator's entry was not a number.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetParam {
    pub desired: Option<f64>,
    pub weight: Option<f64>,
}

impl TargetParam {
    pub fn new(desired: f64, weight: f64) -> Self {
        Self {
            desired: Some(desired),
            weight: Some(weight),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.desired.is_some() && self.weight.is_some()
    }
}

/// Completed form of a [`TargetParam`], ready for cost evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub field: BeamField,
    pub desired: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSpec {
    element: Option<ElementId>,
    parameters: BTreeMap<BeamField, TargetParam>,
}

fn parse_entry(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl TargetSpec {
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    pub(crate) fn set_element(&mut self, element: Option<ElementId>) {
        self.element = element;
    }

    pub fn parameters(&self) -> &BTreeMap<BeamField, TargetParam> {
        &self.parameters
    }

    /// Adds or replaces a parameter from raw operator input. Entries that do
    /// not parse as finite numbers are kept but leave the parameter
    /// incomplete.
    pub fn add_parameter(&mut self, name: &str, desired: &str, weight: &str) -> BfResult<BeamField> {
        let field = BeamField::from_label(name)?;
        self.parameters.insert(
            field,
            TargetParam {
                desired: parse_entry(desired),
                weight: parse_entry(weight),
            },
        );
        Ok(field)
    }

    pub fn set_parameter(&mut self, field: BeamField, desired: f64, weight: f64) {
        self.parameters.insert(field, TargetParam::new(desired, weight));
    }

    pub fn remove_parameter(&mut self, name: &str) -> BfResult<bool> {
        let field = BeamField::from_label(name)?;
        Ok(self.parameters.remove(&field).is_some())
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    /// Every parameter as a complete goal, or the first reason it is not.
    pub fn goals(&self) -> BfResult<Vec<Goal>> {
        if self.parameters.is_empty() {
            return Err(BeamForgeError::EmptySelection(
                "No checked parameters".to_string(),
            ));
        }
        self.parameters
            .iter()
            .map(|(field, p)| match (p.desired, p.weight) {
                (Some(desired), Some(weight)) => Ok(Goal {
                    field: *field,
                    desired,
                    weight,
                }),
                _ => Err(BeamForgeError::IncompleteTarget {
                    parameter: field.to_string(),
                }),
            })
            .collect()
    }
}
