//! Record-enrichment pipeline for sieve.
//!
//! This crate ties the stage set, the fetch and translation adapters, and the
//! pipeline engine into the standard analyser run (`analyse`).

pub mod analyser;
pub mod engine;
pub mod stages;

pub use analyser::{AnalyseConfig, AnalyseResult, analyse, standard_stages};
pub use engine::{BASE_INPUT, Pipeline, ProgressReporter, SilentProgress};
pub use stages::{Join, Stage, StageDecl, Transform};
