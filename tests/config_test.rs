use beamforge::config::Config;
use beamforge::error::BeamForgeError;
use beamforge::optimizer::{Algorithm, OptimizationOptions};
use clap::{CommandFactory, FromArgMatches, Parser};
use std::fs::File;
use std::io::Write;

// Stand-in for the binary's parser so flattening works the same way
#[derive(Parser, Debug)]
struct TestCli {
    #[command(flatten)]
    config: Config,
}

fn parse(args: &[&str]) -> (Config, clap::ArgMatches) {
    let matches = TestCli::command().get_matches_from(args);
    let cli = TestCli::from_arg_matches(&matches).unwrap();
    (cli.config, matches)
}

#[test]
fn test_defaults_match_reference_optimizer() {
    let config = Config::default();
    assert_eq!(config.runtime.algorithm, Algorithm::NelderMead);
    assert_eq!(config.nelder_mead.nm_xatol, 1e-4);
    assert_eq!(config.nelder_mead.nm_fatol, 1e-4);
    assert_eq!(config.evolution.de_popsize, 15);
    assert_eq!(config.evolution.de_recombination, 0.7);
    assert!(config.evolution.de_polish);
    assert!(config.validate().is_ok());
}

#[test]
fn test_clap_defaults_equal_serde_defaults() {
    let (config, _) = parse(&["test"]);
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let mut file = File::create(&path).unwrap();
    writeln!(
        file,
        r#"{{ "runtime": {{ "algorithm": "differential-evolution" }}, "evolution": {{ "de_seed": 3 }} }}"#
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.runtime.algorithm, Algorithm::DifferentialEvolution);
    assert_eq!(config.evolution.de_seed, Some(3));
    assert_eq!(config.evolution.de_popsize, 15);
    assert_eq!(config.nelder_mead, Config::default().nelder_mead);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "evolution": { "de_recombination": 1.5 } }"#).unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(BeamForgeError::Config(_))
    ));

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(BeamForgeError::Json(_))
    ));
}

#[test]
fn test_mutation_interval_must_be_ordered() {
    let mut config = Config::default();
    config.evolution.de_mutation_min = 1.5;
    config.evolution.de_mutation_max = 0.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_cli_overrides_only_typed_flags() {
    let mut from_file = Config::default();
    from_file.evolution.de_popsize = 40;
    from_file.nelder_mead.nm_xatol = 1e-6;

    let (cli, matches) = parse(&["test", "--nm-xatol", "0.01", "--de-polish", "false"]);
    from_file.merge_from_cli(&cli, &matches);

    assert_eq!(from_file.nelder_mead.nm_xatol, 0.01);
    assert!(!from_file.evolution.de_polish);
    // Untyped flags keep the file value, not the clap default
    assert_eq!(from_file.evolution.de_popsize, 40);
}

#[test]
fn test_options_from_config() {
    let mut config = Config::default();
    config.runtime.threads = Some(3);
    config.evolution.de_mutation_min = 0.4;
    config.nelder_mead.nm_adaptive = true;

    let options = OptimizationOptions::from(&config);
    assert_eq!(options.num_threads, 3);
    assert_eq!(options.evolution.mutation, (0.4, 1.0));
    assert!(options.nelder_mead.adaptive);

    config.runtime.threads = None;
    assert!(OptimizationOptions::from(&config).num_threads >= 1);
}
