//! Macro indicator pull: every configured series, one table.
//!
//! The series list is small and fixed, so a single failed series fails the
//! run rather than producing a table with a silently missing column.

use bankpanel_core::data::{MacroSeriesTable, SeriesSource};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineError;
use crate::summary::MacroSummary;

pub fn run_macro_pipeline(
    source: &dyn SeriesSource,
    config: &PipelineConfig,
) -> Result<MacroSummary, PipelineError> {
    config.validate()?;
    let started = Instant::now();
    let fred = &config.fred;

    let mut fetched = Vec::with_capacity(fred.series.len());
    for (i, spec) in fred.series.iter().enumerate() {
        let observations = source
            .fetch_series(&spec.code, fred.start_date, fred.end_date)
            .map_err(|source| PipelineError::MacroSeries {
                code: spec.code.clone(),
                source,
            })?;
        tracing::info!(
            "[{}/{}] {} -> {}: {} observations",
            i + 1,
            fred.series.len(),
            spec.code,
            spec.column,
            observations.len()
        );
        fetched.push((spec.clone(), observations));
    }

    let observations: usize = fetched.iter().map(|(_, obs)| obs.len()).sum();
    let missing_values = fetched
        .iter()
        .flat_map(|(_, obs)| obs.iter())
        .filter(|o| o.value.is_none())
        .count();

    let table = MacroSeriesTable::from_series(fetched);
    let table_path = config.fred_path();
    let meta = table.write(&table_path)?;

    Ok(MacroSummary {
        series: fred.series.len(),
        observations,
        missing_values,
        table_path,
        table: meta,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
