//! Pipeline engine: validates stage declarations and runs them in order.
//!
//! Each stage reads the outputs of its declared predecessors (id `0` is the
//! base input) and its own output becomes available to every later stage.
//! Stages run one at a time; concurrency lives inside the I/O stages.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use sieve_shared::{Record, Result, SieveError};

use crate::stages::{Stage, StageDecl};

/// Predecessor id that refers to the base input collection.
pub const BASE_INPUT: u32 = 0;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage runs. `position` is 1-based.
    fn stage_started(&self, stage_id: u32, name: &str, position: usize, total: usize);
    /// Called after a stage produced its output.
    fn stage_finished(&self, stage_id: u32, name: &str, records_out: usize, elapsed: Duration);
    /// Called once the final collection is ready.
    fn done(&self, records: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage_id: u32, _name: &str, _position: usize, _total: usize) {}
    fn stage_finished(&self, _stage_id: u32, _name: &str, _records_out: usize, _elapsed: Duration) {}
    fn done(&self, _records: usize) {}
}

/// A validated stage graph bound to its base input.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<StageDecl>,
    base: Vec<Record>,
}

impl Pipeline {
    /// Validate `stages` and bind them to `base`.
    ///
    /// Fails before anything runs if an id is zero or repeated, a predecessor
    /// is not `0` or an earlier id, or the predecessor count does not match
    /// the stage shape.
    pub fn new(stages: Vec<StageDecl>, base: Vec<Record>) -> Result<Self> {
        validate(&stages)?;
        Ok(Self { stages, base })
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage in declaration order and return the last stage's output.
    ///
    /// With no stages the base input is returned unchanged. Any stage failure
    /// aborts the run as [`SieveError::Stage`].
    #[instrument(skip_all, fields(stages = self.stages.len(), records = self.base.len()))]
    pub async fn run(self, progress: &dyn ProgressReporter) -> Result<Vec<Record>> {
        let start_time = Instant::now();
        let total = self.stages.len();
        let mut outputs: HashMap<u32, Vec<Record>> = HashMap::new();
        outputs.insert(BASE_INPUT, self.base);
        let mut last = BASE_INPUT;

        for (index, decl) in self.stages.iter().enumerate() {
            let name = decl.stage.name();
            progress.stage_started(decl.id, name, index + 1, total);
            let stage_start = Instant::now();

            let (records_in, result) = match &decl.stage {
                Stage::Transform(stage) => {
                    let records = predecessor_output(&outputs, decl, 0)?;
                    (records.len(), stage.apply(records).await)
                }
                Stage::Join(stage) => {
                    let primary = predecessor_output(&outputs, decl, 0)?;
                    let secondary = predecessor_output(&outputs, decl, 1)?;
                    (primary.len(), stage.apply(primary, secondary).await)
                }
            };
            let output = result.map_err(|e| e.in_stage(decl.id, name))?;

            let elapsed = stage_start.elapsed();
            info!(
                stage_id = decl.id,
                stage = name,
                records_in,
                records_out = output.len(),
                elapsed_ms = elapsed.as_millis(),
                "stage completed"
            );
            progress.stage_finished(decl.id, name, output.len(), elapsed);

            outputs.insert(decl.id, output);
            last = decl.id;
        }

        let records = outputs.remove(&last).unwrap_or_default();
        info!(
            records = records.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "pipeline completed"
        );
        progress.done(records.len());

        Ok(records)
    }
}

/// Output of the `position`-th predecessor of `decl`.
fn predecessor_output<'a>(
    outputs: &'a HashMap<u32, Vec<Record>>,
    decl: &StageDecl,
    position: usize,
) -> Result<&'a [Record]> {
    decl.predecessors
        .get(position)
        .and_then(|id| outputs.get(id))
        .map(Vec::as_slice)
        .ok_or_else(|| {
            SieveError::validation(format!("missing input {position}"))
                .in_stage(decl.id, decl.stage.name())
        })
}

fn validate(stages: &[StageDecl]) -> Result<()> {
    let mut declared: HashSet<u32> = HashSet::new();

    for decl in stages {
        if decl.id == BASE_INPUT {
            return Err(SieveError::config(format!(
                "stage '{}' uses reserved id 0",
                decl.stage.name()
            )));
        }
        if declared.contains(&decl.id) {
            return Err(SieveError::config(format!("duplicate stage id {}", decl.id)));
        }

        let expected = decl.stage.arity();
        if decl.predecessors.len() != expected {
            return Err(SieveError::config(format!(
                "stage {} ({}) needs {expected} predecessor(s), got {}",
                decl.id,
                decl.stage.name(),
                decl.predecessors.len()
            )));
        }

        if let Some(unknown) = decl
            .predecessors
            .iter()
            .find(|&&id| id != BASE_INPUT && !declared.contains(&id))
        {
            return Err(SieveError::config(format!(
                "stage {} ({}) depends on {unknown}, which is not declared before it",
                decl.id,
                decl.stage.name()
            )));
        }

        declared.insert(decl.id);
    }

    Ok(())
}
