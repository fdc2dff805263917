use beamforge::lattice::{attribute_unit, Lattice};
use beamforge::objective::Residual;
use beamforge::optimizer::OptimizationOutcome;
use beamforge::session::Session;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::collections::BTreeMap;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn print_lattice(lattice: &Lattice, knob_indices: &[usize], target_index: Option<usize>) {
    println!("\nLattice ({} elements)", lattice.len());
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Type"),
        Cell::new("Attributes"),
        Cell::new("Role"),
    ]);

    let rows = std::iter::once((0, lattice.source())).chain(lattice.iter());
    for (index, element) in rows {
        let attrs: Vec<String> = element
            .attributes
            .iter()
            .map(|(k, v)| {
                let unit = attribute_unit(k);
                if unit.is_empty() {
                    format!("{}={}", k, v)
                } else {
                    format!("{}={} {}", k, v, unit)
                }
            })
            .collect();

        let role = if target_index == Some(index) {
            Cell::new("TARGET").fg(Color::Red)
        } else if knob_indices.contains(&index) {
            Cell::new("knob").fg(Color::Cyan)
        } else {
            Cell::new("")
        };

        table.add_row(vec![
            Cell::new(index).set_alignment(CellAlignment::Right),
            Cell::new(&element.name),
            Cell::new(element.kind),
            Cell::new(attrs.join(", ")),
            role,
        ]);
    }
    println!("{}", table);
}

pub fn print_knobs(session: &Session) {
    let lattice = session.lattice();
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Knob").add_attribute(Attribute::Bold),
        Cell::new("Index"),
        Cell::new("Value"),
        Cell::new("Bounds"),
    ]);

    for entry in session.tracker().knobs().entries() {
        let index = entry
            .knob
            .index(lattice)
            .map(|i| i.to_string())
            .unwrap_or_else(|| "?".to_string());
        let value = entry
            .knob
            .read(session.model())
            .map(|v| format!("{:.6}", v))
            .unwrap_or_else(|e| e.to_string());
        let bounds = match entry.bounds {
            Some(b) => b.to_string(),
            None => "derived".to_string(),
        };
        table.add_row(vec![
            Cell::new(entry.knob.label(lattice)),
            Cell::new(index).set_alignment(CellAlignment::Right),
            Cell::new(value).set_alignment(CellAlignment::Right),
            Cell::new(bounds),
        ]);
    }
    println!("{}", table);
}

pub fn print_residuals(title: &str, residuals: &[Residual]) {
    println!("\n{}", title);
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Parameter").add_attribute(Attribute::Bold),
        Cell::new("Description"),
        Cell::new("Unit"),
        Cell::new("Desired"),
        Cell::new("Weight"),
        Cell::new("Actual").fg(Color::Cyan),
        Cell::new("Residual").fg(Color::Red),
    ]);
    for r in residuals {
        table.add_row(vec![
            Cell::new(r.field),
            Cell::new(r.field.description()),
            Cell::new(r.field.unit()),
            Cell::new(format!("{:.6e}", r.desired)).set_alignment(CellAlignment::Right),
            Cell::new(r.weight).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.6e}", r.actual)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.3e}", r.residual)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{}", table);
}

pub fn print_outcome(labels: &[String], outcome: &OptimizationOutcome) {
    let d = &outcome.diagnostics;
    println!("\n=== 🏆 FINAL RESULT ===");
    println!("Algorithm:   {}", d.algorithm);
    println!("Cost:        {:.6e}", outcome.best_cost);
    println!(
        "Iterations:  {} ({} evaluations, {:.2?})",
        d.iterations, d.evaluations, d.elapsed
    );
    println!("Status:      {}", d.message);

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Knob").add_attribute(Attribute::Bold),
        Cell::new("Best").fg(Color::Green),
    ]);
    for (label, v) in labels.iter().zip(&outcome.best_x) {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(format!("{:.6}", v)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{}", table);
}

pub fn print_columns(data: &BTreeMap<String, Vec<f64>>, x_field: &str) {
    let mut headers: Vec<&str> = vec![x_field];
    headers.extend(data.keys().map(String::as_str).filter(|k| *k != x_field));

    let mut table = new_table();
    table.set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    let rows = data.get(x_field).map(Vec::len).unwrap_or(0);
    for i in 0..rows {
        table.add_row(headers.iter().map(|h| {
            let v = data.get(*h).and_then(|c| c.get(i)).copied().unwrap_or(f64::NAN);
            Cell::new(format!("{:.6e}", v)).set_alignment(CellAlignment::Right)
        }));
    }
    println!("{}", table);
}
