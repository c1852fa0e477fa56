//! Pipeline stages.
//!
//! A stage has one of two shapes: a single-input [`Transform`] or a
//! dual-input [`Join`]. The engine dispatches on that shape, which also fixes
//! how many predecessors a stage must declare.

mod domain;
mod enrich;
mod links;

use async_trait::async_trait;

use sieve_shared::{Record, Result, SieveError};

pub use domain::{AggregateByDomain, DeduplicateByDomain, GroupLocationsByDomain, JoinAggregate};
pub use enrich::{ClassifyMetadata, ExtractContacts, FetchAndExtract, TranslateMetadata};
pub use links::{Canonicalize, FilterByBlacklist};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A stage consuming one upstream collection.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Stable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Produce a new collection. `input` is never modified.
    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>>;
}

/// A stage consuming two upstream collections (fan-in).
#[async_trait]
pub trait Join: Send + Sync {
    /// Stable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Produce a new collection, preserving `primary` order.
    async fn apply(&self, primary: &[Record], secondary: &[Record]) -> Result<Vec<Record>>;
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A node in the pipeline graph.
pub enum Stage {
    Transform(Box<dyn Transform>),
    Join(Box<dyn Join>),
}

impl Stage {
    pub fn transform(stage: impl Transform + 'static) -> Self {
        Self::Transform(Box::new(stage))
    }

    pub fn join(stage: impl Join + 'static) -> Self {
        Self::Join(Box::new(stage))
    }

    /// Number of upstream collections this stage consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::Transform(_) => 1,
            Self::Join(_) => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Transform(stage) => stage.name(),
            Self::Join(stage) => stage.name(),
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Stage").field(&self.name()).finish()
    }
}

/// One stage declaration: `(id, predecessor ids, stage)`.
///
/// Predecessor `0` is the base input; any other id names a stage declared earlier.
#[derive(Debug)]
pub struct StageDecl {
    pub id: u32,
    pub predecessors: Vec<u32>,
    pub stage: Stage,
}

impl StageDecl {
    pub fn new(id: u32, predecessors: impl Into<Vec<u32>>, stage: Stage) -> Self {
        Self {
            id,
            predecessors: predecessors.into(),
            stage,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Domain key of a record, or a validation error naming the url.
pub(crate) fn require_domain(record: &Record) -> Result<String> {
    record
        .domain_key()
        .ok_or_else(|| SieveError::validation(format!("url '{}' has no domain", record.url)))
}

/// Occurrence count of a record, or a validation error naming the url.
pub(crate) fn require_count(record: &Record) -> Result<u64> {
    record.occurrence_count.ok_or_else(|| {
        SieveError::validation(format!("record '{}' has no occurrence count", record.url))
    })
}

#[cfg(test)]
pub(crate) fn link(url: &str, count: u64, loc: &str) -> Record {
    Record {
        url: url.into(),
        occurrence_count: Some(count),
        locations: vec![loc.into()],
        ..Record::default()
    }
}
