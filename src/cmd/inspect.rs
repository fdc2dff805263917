use crate::reports;
use beamforge::error::BfResult;
use beamforge::optimizer::OptimizationOptions;
use beamforge::simulation::{collect_data, write_csv};
use beamforge::workspace::Workspace;
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    pub workspace: PathBuf,

    /// Stop propagation at this element index (defaults to the end).
    #[arg(long)]
    pub stop: Option<usize>,

    #[arg(long, default_value = "pos")]
    pub x: String,

    #[arg(long, value_delimiter = ',', default_value = "ref_IonEk")]
    pub y: Vec<String>,

    #[arg(long)]
    pub csv: Option<PathBuf>,
}

pub fn run(args: InspectArgs) -> BfResult<()> {
    info!("📂 Loading Workspace: {}", args.workspace.display());
    let workspace = Workspace::load_from_file(&args.workspace)?;
    let options = OptimizationOptions {
        num_threads: 1,
        ..Default::default()
    };
    let session = workspace.into_session(options, 0)?;
    let lattice = session.lattice();

    reports::print_lattice(
        lattice,
        &session.tracker().knob_indices(lattice),
        session.tracker().target_index(lattice),
    );
    for (index, element) in lattice.iter() {
        let missing = lattice.missing_attributes(index);
        if !missing.is_empty() {
            warn!(
                "⚠️  {} '{}' is missing required attribute(s): {}",
                element.kind,
                element.name,
                missing.join(", ")
            );
        }
    }

    if !session.tracker().knobs().is_empty() {
        reports::print_knobs(&session);
    }
    if let Ok(residuals) = session.residuals() {
        reports::print_residuals("Target", &residuals);
    }

    let trace = session.simulate(args.stop)?;
    let ys: Vec<&str> = args.y.iter().map(String::as_str).collect();
    let data = collect_data(&trace, &args.x, &ys)?;
    reports::print_columns(&data, &args.x);

    if let Some(path) = &args.csv {
        write_csv(File::create(path)?, &data, &args.x)?;
        info!("💾 Trace written to {}", path.display());
    }
    Ok(())
}
