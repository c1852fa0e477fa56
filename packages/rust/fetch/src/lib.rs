//! Concurrent page fetching and HTML metadata extraction.
//!
//! This crate provides:
//! - [`Fetcher`]: bounded-concurrency HTTP retrieval with per-url failure isolation
//! - [`extract_page`]: title, meta description and heading/paragraph text extraction

pub mod engine;
pub mod extract;

pub use engine::{FetchCounters, FetchReport, Fetcher};
pub use extract::{PageData, extract_page};
