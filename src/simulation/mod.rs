pub mod response;

use crate::beam::{BeamField, BeamState};
use crate::error::BfResult;
use crate::lattice::Lattice;
use std::collections::BTreeMap;
use std::io;

pub use self::response::{ResponseModel, ResponseTerm};

/// Beam state observed at the exit of one lattice element.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub index: usize,
    pub pos: f64,
    pub state: BeamState,
}

/// Per-element results of one propagation, source first. The last record
/// is the state at the requested stop index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub records: Vec<TraceRecord>,
}

impl Trace {
    pub fn last(&self) -> Option<&TraceRecord> {
        self.records.last()
    }

    pub fn final_state(&self) -> Option<&BeamState> {
        self.records.last().map(|r| &r.state)
    }
}

/// The propagation engine. Implementations must be pure with respect to
/// their inputs: the same lattice and beam give the same trace.
pub trait SimulationOracle: Send + Sync {
    /// Propagates `beam` through elements `0..=stop_at`.
    fn run(&self, lattice: &Lattice, beam: &BeamState, stop_at: usize) -> BfResult<Trace>;
}

/// Selects columns out of a trace. Column names are `index`, `pos`, or any
/// beam-state field accepted by [`BeamField::from_label`].
pub fn collect_data(
    trace: &Trace,
    x_field: &str,
    y_fields: &[&str],
) -> BfResult<BTreeMap<String, Vec<f64>>> {
    let mut out = BTreeMap::new();
    for name in std::iter::once(x_field).chain(y_fields.iter().copied()) {
        if out.contains_key(name) {
            continue;
        }
        let column = Column::parse(name)?;
        let values = trace.records.iter().map(|r| column.read(r)).collect();
        out.insert(name.to_string(), values);
    }
    Ok(out)
}

/// Writes collected columns as CSV, `x_field` first, one row per trace
/// record.
pub fn write_csv<W: io::Write>(
    writer: W,
    data: &BTreeMap<String, Vec<f64>>,
    x_field: &str,
) -> BfResult<()> {
    let mut headers: Vec<&str> = vec![x_field];
    headers.extend(data.keys().map(String::as_str).filter(|k| *k != x_field));
    let rows = data.values().map(Vec::len).max().unwrap_or(0);

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&headers)?;
    for i in 0..rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| {
                data.get(*h)
                    .and_then(|col| col.get(i))
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

enum Column {
    Index,
    Pos,
    Field(BeamField),
}

impl Column {
    fn parse(name: &str) -> BfResult<Self> {
        Ok(match name {
            "index" => Column::Index,
            "pos" => Column::Pos,
            other => Column::Field(BeamField::from_label(other)?),
        })
    }

    fn read(&self, record: &TraceRecord) -> f64 {
        match self {
            Column::Index => record.index as f64,
            Column::Pos => record.pos,
            Column::Field(f) => record.state.get(*f),
        }
    }
}
