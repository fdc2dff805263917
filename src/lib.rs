pub mod beam;
pub mod config;
pub mod error;
pub mod history;
pub mod lattice;
pub mod model;
pub mod objective;
pub mod optimizer;
pub mod selection;
pub mod session;
pub mod simulation;
pub mod workspace;
