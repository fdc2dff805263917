use crate::error::{BeamForgeError, BfResult};
use crate::optimizer::Algorithm;
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub runtime: RuntimeParams,
    #[command(flatten)]
    pub nelder_mead: NelderMeadParams,
    #[command(flatten)]
    pub evolution: EvolutionParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeParams {
    #[arg(long, value_enum, default_value_t = Algorithm::NelderMead)]
    pub algorithm: Algorithm,

    /// Worker threads for the optimizer pool (defaults to all cores).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Undo snapshots kept; 0 keeps everything.
    #[arg(long, default_value_t = 0)]
    pub history_depth: usize,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::NelderMead,
            threads: None,
            history_depth: 0,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NelderMeadParams {
    #[arg(long, default_value_t = 1e-4)]
    pub nm_xatol: f64,
    #[arg(long, default_value_t = 1e-4)]
    pub nm_fatol: f64,
    #[arg(long)]
    pub nm_max_iterations: Option<usize>,
    #[arg(long)]
    pub nm_max_evaluations: Option<usize>,
    #[arg(long, default_value_t = false)]
    pub nm_adaptive: bool,
}

impl Default for NelderMeadParams {
    fn default() -> Self {
        Self {
            nm_xatol: 1e-4,
            nm_fatol: 1e-4,
            nm_max_iterations: None,
            nm_max_evaluations: None,
            nm_adaptive: false,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvolutionParams {
    #[arg(long, default_value_t = 15)]
    pub de_popsize: usize,
    #[arg(long, default_value_t = 0.5)]
    pub de_mutation_min: f64,
    #[arg(long, default_value_t = 1.0)]
    pub de_mutation_max: f64,
    #[arg(long, default_value_t = 0.7)]
    pub de_recombination: f64,
    #[arg(long, default_value_t = 0.01)]
    pub de_tol: f64,
    #[arg(long, default_value_t = 0.0)]
    pub de_atol: f64,
    #[arg(long, default_value_t = 1000)]
    pub de_max_iterations: usize,
    #[arg(long)]
    pub de_seed: Option<u64>,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub de_polish: bool,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            de_popsize: 15,
            de_mutation_min: 0.5,
            de_mutation_max: 1.0,
            de_recombination: 0.7,
            de_tol: 0.01,
            de_atol: 0.0,
            de_max_iterations: 1000,
            de_seed: None,
            de_polish: true,
        }
    }
}

macro_rules! update_if_present {
    ($self:ident, $cli:ident, $matches:ident, $($field:ident),+ $(,)?) => {
        $(
            if $matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                $self.$field = $cli.$field.clone();
            }
        )+
    };
}

impl RuntimeParams {
    pub fn merge_from_cli(&mut self, cli: &RuntimeParams, matches: &ArgMatches) {
        update_if_present!(self, cli, matches, algorithm, threads, history_depth);
    }
}

impl NelderMeadParams {
    pub fn merge_from_cli(&mut self, cli: &NelderMeadParams, matches: &ArgMatches) {
        update_if_present!(
            self,
            cli,
            matches,
            nm_xatol,
            nm_fatol,
            nm_max_iterations,
            nm_max_evaluations,
            nm_adaptive,
        );
    }
}

impl EvolutionParams {
    pub fn merge_from_cli(&mut self, cli: &EvolutionParams, matches: &ArgMatches) {
        update_if_present!(
            self,
            cli,
            matches,
            de_popsize,
            de_mutation_min,
            de_mutation_max,
            de_recombination,
            de_tol,
            de_atol,
            de_max_iterations,
            de_seed,
            de_polish,
        );
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BfResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays flags the user typed explicitly onto `self` (typically the
    /// file-loaded config). Defaults filled in by clap do not override.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        self.runtime.merge_from_cli(&cli.runtime, matches);
        self.nelder_mead.merge_from_cli(&cli.nelder_mead, matches);
        self.evolution.merge_from_cli(&cli.evolution, matches);
    }

    pub fn validate(&self) -> BfResult<()> {
        let e = &self.evolution;
        if !(0.0..=2.0).contains(&e.de_mutation_min)
            || !(0.0..=2.0).contains(&e.de_mutation_max)
            || e.de_mutation_min > e.de_mutation_max
        {
            return Err(BeamForgeError::Config(format!(
                "mutation interval [{}, {}) must lie within [0, 2]",
                e.de_mutation_min, e.de_mutation_max
            )));
        }
        if !(0.0..=1.0).contains(&e.de_recombination) {
            return Err(BeamForgeError::Config(format!(
                "recombination {} must lie within [0, 1]",
                e.de_recombination
            )));
        }
        let nm = &self.nelder_mead;
        if nm.nm_xatol < 0.0 || nm.nm_fatol < 0.0 {
            return Err(BeamForgeError::Config(
                "Nelder-Mead tolerances must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
