use crate::beam::BeamField;
use crate::error::{BeamForgeError, BfResult};
use crate::lattice::{AttrValue, ElementId, Lattice};
use crate::model::Model;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed search interval for one knob. `low == high` is a legal
/// (degenerate) interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.low).min(self.high)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// Default search interval around a knob's current value: one decade on
/// the side of its sign, `[0, 10]` for zero.
pub fn derive_bounds(v: f64) -> Bounds {
    if v > 0.0 {
        Bounds::new(0.0, (10.0 * v).floor())
    } else if v < 0.0 {
        Bounds::new((10.0 * v).ceil(), 0.0)
    } else {
        Bounds::new(0.0, 10.0)
    }
}

/// A tunable scalar of the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Knob {
    ElementAttribute { element: ElementId, attribute: String },
    BeamScalar { field: BeamField },
}

impl Knob {
    pub fn element_attribute(element: ElementId, attribute: &str) -> Self {
        Knob::ElementAttribute {
            element,
            attribute: attribute.to_string(),
        }
    }

    pub fn beam(field: BeamField) -> Self {
        Knob::BeamScalar { field }
    }

    pub fn element(&self) -> Option<ElementId> {
        match self {
            Knob::ElementAttribute { element, .. } => Some(*element),
            Knob::BeamScalar { .. } => None,
        }
    }

    /// Lattice position the knob acts at. Beam scalars act at the source.
    pub fn index(&self, lattice: &Lattice) -> Option<usize> {
        match self {
            Knob::ElementAttribute { element, .. } => lattice.index_of(*element),
            Knob::BeamScalar { .. } => Some(0),
        }
    }

    pub fn read(&self, model: &Model) -> BfResult<f64> {
        match self {
            Knob::ElementAttribute { element, attribute } => {
                model.lattice.require_id(*element)?.numeric(attribute)
            }
            Knob::BeamScalar { field } => Ok(model.beam.get(*field)),
        }
    }

    pub fn write(&self, model: &mut Model, value: f64) -> BfResult<()> {
        match self {
            Knob::ElementAttribute { element, attribute } => {
                let name = model.lattice.require_id(*element)?.name.clone();
                model
                    .lattice
                    .reconfigure(&name, [(attribute.as_str(), AttrValue::Number(value))])
            }
            Knob::BeamScalar { field } => {
                model.beam.set(*field, value);
                Ok(())
            }
        }
    }

    /// Human-readable name: `ELEMENT.attribute` or the beam field name.
    pub fn label(&self, lattice: &Lattice) -> String {
        match self {
            Knob::ElementAttribute { element, attribute } => match lattice.get_by_id(*element) {
                Some(e) => format!("{}.{}", e.name, attribute),
                None => format!("{}.{}", element, attribute),
            },
            Knob::BeamScalar { field } => field.to_string(),
        }
    }

    /// Checks that the knob points at an existing numeric quantity.
    pub fn check(&self, model: &Model) -> BfResult<()> {
        self.read(model).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnobEntry {
    pub knob: Knob,
    /// Operator override; `None` means derive from the current value.
    pub bounds: Option<Bounds>,
}

/// Ordered set of selected knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnobRegistry {
    entries: Vec<KnobEntry>,
}

impl KnobRegistry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KnobEntry] {
        &self.entries
    }

    pub fn knobs(&self) -> impl Iterator<Item = &Knob> {
        self.entries.iter().map(|e| &e.knob)
    }

    pub fn contains(&self, knob: &Knob) -> bool {
        self.entries.iter().any(|e| &e.knob == knob)
    }

    pub(crate) fn push(&mut self, knob: Knob, bounds: Option<Bounds>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.knob == knob) {
            if bounds.is_some() {
                entry.bounds = bounds;
            }
            return;
        }
        self.entries.push(KnobEntry { knob, bounds });
    }

    pub(crate) fn remove(&mut self, knob: &Knob) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.knob != knob);
        self.entries.len() != before
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Knob) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| keep(&e.knob));
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sets an explicit interval on an already selected knob.
    pub fn set_bounds(&mut self, knob: &Knob, bounds: Bounds) -> BfResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| &e.knob == knob)
            .ok_or_else(|| BeamForgeError::Config("knob is not selected".to_string()))?;
        entry.bounds = Some(bounds);
        Ok(())
    }

    pub fn current_value(&self, knob: &Knob, model: &Model) -> BfResult<f64> {
        knob.read(model)
    }

    pub fn apply_value(&self, knob: &Knob, model: &mut Model, value: f64) -> BfResult<()> {
        knob.write(model, value)
    }

    pub fn current_values(&self, model: &Model) -> BfResult<Vec<f64>> {
        self.knobs().map(|k| k.read(model)).collect()
    }

    /// Writes `x[i]` into knob `i`, in selection order.
    pub fn apply_vector(&self, model: &mut Model, x: &[f64]) -> BfResult<()> {
        for (knob, &v) in self.knobs().zip(x) {
            knob.write(model, v)?;
        }
        Ok(())
    }

    /// Effective bounds per knob: the override if set, else derived from
    /// the knob's current value. Malformed intervals surface as
    /// `MissingBounds`.
    pub fn bounds(&self, model: &Model) -> BfResult<Vec<Bounds>> {
        self.entries
            .iter()
            .map(|entry| {
                let b = match entry.bounds {
                    Some(b) => b,
                    None => derive_bounds(entry.knob.read(model)?),
                };
                if b.is_valid() {
                    Ok(b)
                } else {
                    Err(BeamForgeError::MissingBounds {
                        knob: entry.knob.label(&model.lattice),
                    })
                }
            })
            .collect()
    }

    pub fn labels(&self, lattice: &Lattice) -> Vec<String> {
        self.knobs().map(|k| k.label(lattice)).collect()
    }
}
