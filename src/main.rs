use beamforge::config::Config;
use beamforge::error::BfResult;
use clap::{parser::ValueSource, ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON optimizer settings; explicit flags override file values.
    #[arg(global = true, long)]
    settings: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tune the workspace's knobs toward its target.
    Optimize(cmd::optimize::OptimizeArgs),
    /// Show the lattice and propagate the beam without tuning.
    Inspect(cmd::inspect::InspectArgs),
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// File settings (when given) with explicit command-line flags on top.
fn resolve_config(cli_config: &Config, settings: Option<&str>, sub: &ArgMatches) -> BfResult<Config> {
    match settings {
        Some(path) => {
            info!("⚖️  Loading Settings from: {}", path);
            let mut config = Config::load_from_file(path)?;
            config.merge_from_cli(cli_config, sub);
            Ok(config)
        }
        None => {
            cli_config.validate()?;
            Ok(cli_config.clone())
        }
    }
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(cli.debug);
    info!("🚀 Initializing BeamForge...");

    let result = match cli.command {
        Commands::Optimize(args) => {
            let sub = matches.subcommand_matches("optimize").unwrap_or(&matches);
            let algorithm_from_cli =
                sub.value_source("algorithm") == Some(ValueSource::CommandLine);
            resolve_config(&args.config, cli.settings.as_deref(), sub)
                .and_then(|config| cmd::optimize::run(args, config, algorithm_from_cli))
        }
        Commands::Inspect(args) => cmd::inspect::run(args),
    };

    if let Err(e) = result {
        error!("❌ {}", e);
        process::exit(1);
    }
}
