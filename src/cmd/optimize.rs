use crate::reports;
use beamforge::config::Config;
use beamforge::error::BfResult;
use beamforge::optimizer::{Algorithm, OptimizationOptions, ProgressCallback};
use beamforge::simulation::{collect_data, write_csv};
use beamforge::workspace::Workspace;
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    /// Workspace JSON (beam, elements, response model, plan).
    pub workspace: PathBuf,

    #[command(flatten)]
    pub config: Config,

    /// Write the tuned workspace here.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export the tuned trace as CSV.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    #[arg(long, default_value = "pos")]
    pub x: String,

    #[arg(long, value_delimiter = ',', default_value = "ref_IonEk")]
    pub y: Vec<String>,
}

/// Logs the running best at most once per second.
struct LogProgress {
    last: Mutex<Instant>,
}

impl ProgressCallback for LogProgress {
    fn on_progress(&self, iteration: usize, best_cost: f64, _best_x: &[f64]) -> bool {
        if let Ok(mut last) = self.last.lock() {
            if last.elapsed().as_secs_f32() >= 1.0 {
                info!("Iter {:6} | Best: {:.6e}", iteration, best_cost);
                *last = Instant::now();
            }
        }
        true
    }
}

pub fn run(args: OptimizeArgs, config: Config, algorithm_from_cli: bool) -> BfResult<()> {
    info!("📂 Loading Workspace: {}", args.workspace.display());
    let mut workspace = Workspace::load_from_file(&args.workspace)?;

    let algorithm = if algorithm_from_cli {
        config.runtime.algorithm
    } else {
        workspace.plan.algorithm.unwrap_or(config.runtime.algorithm)
    };

    let options = OptimizationOptions::from(&config);
    let mut session = workspace.into_session(options, config.runtime.history_depth)?;

    reports::print_lattice(
        session.lattice(),
        &session.tracker().knob_indices(session.lattice()),
        session.tracker().target_index(session.lattice()),
    );
    reports::print_knobs(&session);
    match session.residuals() {
        Ok(r) => reports::print_residuals("Before", &r),
        Err(e) => warn!("⚠️  Cannot evaluate target: {}", e),
    }

    let labels = session.tracker().knobs().labels(session.lattice());
    let progress = LogProgress {
        last: Mutex::new(Instant::now()),
    };
    let outcome = session.optimize(algorithm, &progress)?;

    reports::print_outcome(&labels, &outcome);
    reports::print_residuals("After", &session.residuals()?);

    if let Some(path) = &args.csv {
        let trace = session.simulate(None)?;
        let ys: Vec<&str> = args.y.iter().map(String::as_str).collect();
        let data = collect_data(&trace, &args.x, &ys)?;
        write_csv(File::create(path)?, &data, &args.x)?;
        info!("💾 Trace written to {}", path.display());
    }

    if let Some(path) = &args.output {
        workspace.update_model(session.model());
        workspace.plan.algorithm = Some(algorithm);
        workspace.save(path)?;
        info!("💾 Workspace written to {}", path.display());
    }

    if algorithm == Algorithm::NelderMead && !outcome.diagnostics.converged {
        warn!("⚠️  Search stopped before convergence; consider --nm-max-iterations");
    }
    Ok(())
}
