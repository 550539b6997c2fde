//! FDIC panel pipeline: directory, bounded fan-out, merge, normalize,
//! aggregate, write.
//!
//! Each institution is fetched exactly once by one worker; retries happen
//! inside that worker's call, so there is never more than one request in
//! flight per institution. Every HTTP attempt also passes the shared request
//! throttle, which caps the global request rate regardless of `workers`.
//!
//! Fetches return owned [`InstitutionFetch`] values. Merging happens after the
//! fan-out, in directory order, so the output never depends on scheduling.

use bankpanel_core::data::{
    aggregate_with_stats, export_csv, fetch_active_institutions, fetch_financials,
    normalize_batch, DataError, FdicSource, FetchProgress, PanelError, PanelWriter, RawRecord,
};
use bankpanel_core::domain::Institution;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use thiserror::Error;

use crate::config::{ConfigError, PipelineConfig};
use crate::summary::{InstitutionFailure, RejectedFiling, RunSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("institution directory fetch failed: {0}")]
    Directory(#[source] DataError),

    #[error("provider refused further requests after {completed}/{total} institutions; no panel written")]
    ProviderUnavailable { completed: usize, total: usize },

    #[error("macro series {code} failed: {source}")]
    MacroSeries {
        code: String,
        #[source]
        source: DataError,
    },

    #[error("output error: {0}")]
    Output(#[from] PanelError),

    #[error("worker pool: {0}")]
    Pool(String),

    #[error("run manifest: {0}")]
    Manifest(String),
}

/// One institution's fetch result, owned by the worker that produced it.
#[derive(Debug)]
pub struct InstitutionFetch {
    pub institution: Institution,
    pub outcome: Result<Vec<RawRecord>, DataError>,
}

/// Fetch every institution's filings on a private pool of `workers` threads.
///
/// Results come back in `work` order. Once the source reports itself
/// unavailable (circuit breaker open), remaining items fail fast with
/// [`DataError::CircuitBreakerTripped`] instead of issuing requests.
pub fn fetch_all(
    source: &dyn FdicSource,
    work: &[Institution],
    limit: usize,
    workers: usize,
    progress: &dyn FetchProgress,
) -> Result<Vec<InstitutionFetch>, PipelineError> {
    let total = work.len();
    let done = AtomicUsize::new(0);

    let fetch_one = |institution: &Institution| {
        let outcome = if source.is_available() {
            fetch_financials(source, institution, limit)
        } else {
            Err(DataError::CircuitBreakerTripped)
        };
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        let counted = outcome.as_ref().map(|r| r.len()).map_err(Clone::clone);
        progress.on_institution(institution, n, total, &counted);
        InstitutionFetch {
            institution: institution.clone(),
            outcome,
        }
    };

    if workers <= 1 {
        return Ok(work.iter().map(fetch_one).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("bankpanel-fetch-{i}"))
        .build()
        .map_err(|e| PipelineError::Pool(e.to_string()))?;
    Ok(pool.install(|| work.par_iter().map(fetch_one).collect()))
}

/// Build the bank panel end to end and write it to `config.fdic_path()`.
pub fn run_fdic_pipeline(
    source: &dyn FdicSource,
    config: &PipelineConfig,
    progress: &dyn FetchProgress,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let started = Instant::now();

    let directory = fetch_active_institutions(source, config.fdic.directory_limit)
        .map_err(PipelineError::Directory)?;
    let work: Vec<Institution> = directory.into_iter().collect();
    let total = work.len();

    progress.on_start(total);
    let fetches = fetch_all(
        source,
        &work,
        config.fdic.financials_limit,
        config.pool.workers,
        progress,
    )?;

    let succeeded = fetches.iter().filter(|f| f.outcome.is_ok()).count();
    progress.on_batch_complete(succeeded, total - succeeded, total);

    if fetches
        .iter()
        .any(|f| matches!(f.outcome, Err(DataError::CircuitBreakerTripped)))
    {
        let completed = fetches
            .iter()
            .take_while(|f| !matches!(f.outcome, Err(DataError::CircuitBreakerTripped)))
            .count();
        tracing::error!(completed, total, "provider blocked requests, aborting run");
        return Err(PipelineError::ProviderUnavailable { completed, total });
    }

    // Merge in directory order, remembering which institution each row came from.
    let mut raws: Vec<RawRecord> = Vec::new();
    let mut owners: Vec<usize> = Vec::new();
    let mut failures = Vec::new();
    for (idx, fetch) in fetches.iter().enumerate() {
        match &fetch.outcome {
            Ok(records) => {
                raws.extend(records.iter().cloned());
                owners.extend(std::iter::repeat(idx).take(records.len()));
            }
            Err(e) => failures.push(InstitutionFailure {
                name: fetch.institution.parent_name.clone(),
                zip: fetch.institution.zip.clone(),
                error: e.to_string(),
            }),
        }
    }
    drop(fetches);

    let batch = normalize_batch(&raws);
    let rejected: Vec<RejectedFiling> = batch
        .rejected
        .iter()
        .map(|r| {
            let inst = &work[owners[r.index]];
            RejectedFiling {
                name: inst.parent_name.clone(),
                zip: inst.zip.clone(),
                id: r.id.clone(),
                error: r.error.to_string(),
            }
        })
        .collect();

    let (rows, stats) = aggregate_with_stats(&batch.records, &config.aggregation_scope());
    tracing::info!(
        records = batch.records.len(),
        rejected = rejected.len(),
        out_of_scope = stats.out_of_scope,
        rows = stats.rows,
        "aggregated bank panel"
    );

    let panel_path = config.fdic_path();
    let panel = PanelWriter::new(&panel_path).write(&rows)?;

    let csv_path = if config.output.csv {
        let path = config.csv_path();
        export_csv(&rows, &path)?;
        tracing::info!("wrote CSV copy to {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(RunSummary {
        institutions: total,
        fetched: succeeded,
        failures,
        raw_records: raws.len(),
        rejected,
        out_of_scope_records: stats.out_of_scope,
        panel_path,
        csv_path,
        panel,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
