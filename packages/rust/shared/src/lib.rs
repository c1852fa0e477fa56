//! Shared types, error model, configuration and NDJSON I/O for sieve.
//!
//! This crate is the foundation depended on by all other sieve crates.
//! It provides:
//! - [`SieveError`]: the unified error type
//! - Domain types ([`Record`], [`RawLink`], [`domain_key`], sentinel strings)
//! - Configuration ([`AppConfig`], runtime configs, config loading)
//! - NDJSON reading/appending ([`read_links`], [`append_records`])

pub mod config;
pub mod error;
pub mod ndjson;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalyserConfig, AnalyserSection, AppConfig, FetchConfig, FetchSection, JoinMiss,
    OutputSection, TranslationConfig, TranslationSection, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, SieveError};
pub use ndjson::{ReadReport, append_records, parse_link_line, read_links};
pub use types::{
    DESCRIPTION_SENTINEL, EMPTY_INPUT_SENTINEL, EMPTY_TRANSLATION_SENTINEL, RawLink, Record,
    TEXT_SENTINEL, TITLE_SENTINEL, TRANSLATION_FAILED_SENTINEL, domain_key,
};
