//! Machine translation for fetched page metadata.
//!
//! This crate provides:
//! - [`TranslationService`]: the external translation capability
//! - [`GoogleTranslate`]: HTTP implementation of that capability
//! - [`Translator`]: bounded-concurrency batch translation with sentinel degradation

pub mod batch;
pub mod service;

pub use batch::{TranslationItem, Translator, strip_punctuation};
pub use service::{GoogleTranslate, TranslationService};
