//! The standard analyser: the fixed stage graph that turns crawled links into
//! enriched company records, plus the file-to-file entry point.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};

use sieve_fetch::Fetcher;
use sieve_shared::{
    AnalyserConfig, FetchConfig, Record, Result, TranslationConfig, append_records, read_links,
};
use sieve_translate::Translator;

use crate::engine::{Pipeline, ProgressReporter};
use crate::stages::{
    AggregateByDomain, Canonicalize, ClassifyMetadata, DeduplicateByDomain, ExtractContacts,
    FetchAndExtract, FilterByBlacklist, GroupLocationsByDomain, JoinAggregate, Stage, StageDecl,
    TranslateMetadata,
};

/// Configuration for one `analyse` run.
#[derive(Debug, Clone)]
pub struct AnalyseConfig {
    /// NDJSON file produced by the crawler.
    pub input: PathBuf,
    /// NDJSON file the enriched records are appended to.
    pub output: PathBuf,
    pub analyser: AnalyserConfig,
    pub fetch: FetchConfig,
    pub translation: TranslationConfig,
}

/// Summary of a completed `analyse` run.
#[derive(Debug, Clone)]
pub struct AnalyseResult {
    pub output: PathBuf,
    /// Valid input lines.
    pub records_in: usize,
    /// Input lines skipped as malformed.
    pub skipped: usize,
    /// Records appended to the output.
    pub records_out: usize,
    /// Records whose title or description matched a keyword.
    pub matched: usize,
    pub duration_ms: u64,
}

/// The analyser graph:
///
/// ```text
/// 1:[0] canonicalize   2:[1] aggregate    3:[1] group locations
/// 4:[3] blacklist      5:[4] dedup        6:[5,2] join
/// 7:[6] fetch          8:[7] contacts     9:[8] translate
/// 10:[9] classify
/// ```
pub fn standard_stages(
    config: &AnalyserConfig,
    fetcher: Fetcher,
    translator: Translator,
) -> Vec<StageDecl> {
    vec![
        StageDecl::new(
            1,
            [0],
            Stage::transform(Canonicalize::new(config.strip_substring.clone())),
        ),
        StageDecl::new(2, [1], Stage::transform(AggregateByDomain)),
        StageDecl::new(3, [1], Stage::transform(GroupLocationsByDomain)),
        StageDecl::new(
            4,
            [3],
            Stage::transform(FilterByBlacklist::new(config.blacklist.iter().cloned())),
        ),
        StageDecl::new(5, [4], Stage::transform(DeduplicateByDomain)),
        StageDecl::new(
            6,
            [5, 2],
            Stage::join(JoinAggregate::new(config.join_on_missing)),
        ),
        StageDecl::new(
            7,
            [6],
            Stage::transform(FetchAndExtract::new(fetcher, config.ascii_only)),
        ),
        StageDecl::new(8, [7], Stage::transform(ExtractContacts)),
        StageDecl::new(9, [8], Stage::transform(TranslateMetadata::new(translator))),
        StageDecl::new(
            10,
            [9],
            Stage::transform(ClassifyMetadata::new(&config.keywords)),
        ),
    ]
}

/// Read crawled links, run the standard graph over them and append the result.
///
/// Must be awaited directly on the runtime, not nested inside another
/// `block_on`: the translation stage drives its own concurrent batch.
#[instrument(skip_all, fields(input = %config.input.display(), output = %config.output.display()))]
pub async fn analyse(config: &AnalyseConfig, progress: &dyn ProgressReporter) -> Result<AnalyseResult> {
    let start = Instant::now();

    let report = read_links(&config.input)?;
    if report.skipped > 0 {
        warn!(skipped = report.skipped, "malformed input lines skipped");
    }
    let records_in = report.records.len();

    let fetcher = Fetcher::new(config.fetch.clone())?;
    let translator = Translator::from_config(&config.translation)?;
    let stages = standard_stages(&config.analyser, fetcher, translator);

    let pipeline = Pipeline::new(stages, report.records)?;
    info!(stages = pipeline.stage_count(), records_in, "analyser graph ready");
    let records: Vec<Record> = pipeline.run(progress).await?;

    append_records(&config.output, &records)?;

    let result = AnalyseResult {
        output: config.output.clone(),
        records_in,
        skipped: report.skipped,
        records_out: records.len(),
        matched: records
            .iter()
            .filter(|r| r.metadata_matches_keywords == Some(true))
            .count(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        records_out = result.records_out,
        matched = result.matched,
        duration_ms = result.duration_ms,
        "analyse completed"
    );

    Ok(result)
}
