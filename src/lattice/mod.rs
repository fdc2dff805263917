pub mod kind;

pub use self::kind::{attribute_unit, ElementKind};

use crate::error::{BeamForgeError, BfResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Stable handle for an element. Survives insertions and removals around
/// it; the 1-based display index is derived from the element's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(v) => write!(f, "{}", v),
            AttrValue::Text(s) => write!(f, "{}", s),
            AttrValue::List(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Serialized shape of an element: what a workspace file or an insert
/// request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default, flatten)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl ElementRecord {
    pub fn new(name: &str, kind: ElementKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub kind: ElementKind,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Element {
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Numeric value of `key`, or the reason it cannot be tuned.
    pub fn numeric(&self, key: &str) -> BfResult<f64> {
        match self.attributes.get(key) {
            None => Err(BeamForgeError::UnknownAttribute {
                element: self.name.clone(),
                attribute: key.to_string(),
            }),
            Some(v) => v.as_f64().ok_or_else(|| BeamForgeError::NonNumericAttribute {
                element: self.name.clone(),
                attribute: key.to_string(),
            }),
        }
    }

    pub fn length(&self) -> f64 {
        self.numeric("L").unwrap_or(0.0)
    }

    pub fn record(&self) -> ElementRecord {
        ElementRecord {
            name: self.name.clone(),
            kind: self.kind,
            attributes: self.attributes.clone(),
        }
    }
}

/// Ordered element sequence. Position 0 always holds the source element;
/// real elements occupy `1..=len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    elements: Vec<Element>,
    next_id: u64,
}

impl Default for Lattice {
    fn default() -> Self {
        Self::with_source("S")
    }
}

impl Lattice {
    pub fn with_source(name: &str) -> Self {
        let source = Element {
            id: ElementId(0),
            name: name.to_string(),
            kind: ElementKind::Source,
            attributes: BTreeMap::new(),
        };
        Self {
            elements: vec![source],
            next_id: 1,
        }
    }

    /// Builds a lattice from records. A leading `source` record becomes the
    /// sentinel; otherwise a default source named `S` is supplied.
    pub fn from_records(records: impl IntoIterator<Item = ElementRecord>) -> BfResult<Self> {
        let mut records = records.into_iter().peekable();
        let mut lattice = match records.peek() {
            Some(first) if first.kind == ElementKind::Source => {
                let mut lat = Self::with_source(&first.name);
                lat.elements[0].attributes = first.attributes.clone();
                records.next();
                lat
            }
            _ => Self::default(),
        };
        for record in records {
            lattice.push(record)?;
        }
        Ok(lattice)
    }

    /// Number of real elements (the source sentinel is not counted).
    pub fn len(&self) -> usize {
        self.elements.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> &Element {
        &self.elements[0]
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn get_by_id(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Resolves a name to its element, failing with `UnknownElement`.
    pub fn require(&self, name: &str) -> BfResult<&Element> {
        self.get_by_name(name)
            .ok_or_else(|| BeamForgeError::UnknownElement(name.to_string()))
    }

    pub fn require_id(&self, id: ElementId) -> BfResult<&Element> {
        self.get_by_id(id)
            .ok_or_else(|| BeamForgeError::UnknownElement(id.to_string()))
    }

    /// All element names in order, source first.
    pub fn names(&self) -> Vec<&str> {
        self.elements.iter().map(|e| e.name.as_str()).collect()
    }

    /// Real elements paired with their display index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.elements.iter().enumerate().skip(1)
    }

    /// Inserts `record` so that it becomes the element at `index`
    /// (`1..=len()+1`). Required attributes missing from the record are
    /// filled from the kind defaults when one exists.
    pub fn insert(&mut self, index: usize, record: ElementRecord) -> BfResult<ElementId> {
        if index == 0 || index > self.elements.len() {
            return Err(BeamForgeError::IndexOutOfRange {
                index,
                min: 1,
                max: self.elements.len(),
            });
        }
        if record.kind == ElementKind::Source {
            return Err(BeamForgeError::Config(
                "only one source element is allowed".to_string(),
            ));
        }
        if self.get_by_name(&record.name).is_some() {
            return Err(BeamForgeError::DuplicateName(record.name));
        }

        let mut attributes = record.attributes;
        for (key, value) in record.kind.default_attributes() {
            attributes.entry(key.to_string()).or_insert(value);
        }

        let id = ElementId(self.next_id);
        self.next_id += 1;
        debug!("Inserting {} '{}' at index {}", record.kind, record.name, index);
        self.elements.insert(
            index,
            Element {
                id,
                name: record.name,
                kind: record.kind,
                attributes,
            },
        );
        Ok(id)
    }

    pub fn push(&mut self, record: ElementRecord) -> BfResult<ElementId> {
        self.insert(self.elements.len(), record)
    }

    /// Removes and returns the element at `index` (`1..=len()`).
    pub fn remove(&mut self, index: usize) -> BfResult<Element> {
        if index == 0 || index > self.len() {
            return Err(BeamForgeError::IndexOutOfRange {
                index,
                min: 1,
                max: self.len(),
            });
        }
        let removed = self.elements.remove(index);
        debug!("Removed '{}' from index {}", removed.name, index);
        Ok(removed)
    }

    /// Overwrites (or adds) attributes on the element called `name`.
    pub fn reconfigure<I, K>(&mut self, name: &str, attributes: I) -> BfResult<()>
    where
        I: IntoIterator<Item = (K, AttrValue)>,
        K: Into<String>,
    {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| BeamForgeError::UnknownElement(name.to_string()))?;
        for (key, value) in attributes {
            element.attributes.insert(key.into(), value);
        }
        Ok(())
    }

    /// Required attributes the element at `index` is still missing.
    pub fn missing_attributes(&self, index: usize) -> Vec<&'static str> {
        match self.get(index) {
            Some(e) => e
                .kind
                .required_attributes()
                .iter()
                .filter(|key| !e.attributes.contains_key(**key))
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn records(&self) -> Vec<ElementRecord> {
        self.elements.iter().map(Element::record).collect()
    }

    /// Cumulative longitudinal position at the exit of each element.
    pub fn positions(&self) -> Vec<f64> {
        let mut pos = 0.0;
        self.elements
            .iter()
            .map(|e| {
                pos += e.length();
                pos
            })
            .collect()
    }
}
