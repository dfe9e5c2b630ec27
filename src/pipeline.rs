use futures::{pin_mut, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::batch::BatchAccumulator;
use crate::classify::{classify, inactive_cutoff};
use crate::error::FetchError;
use crate::mailer::BatchSink;
use crate::models::{Category, Learner, RunSummary};

pub struct PipelineSettings {
    pub batch_limit: usize,
    pub inactive_days: i64,
    pub low_score_threshold: f64,
}

/// Sequential consumer loop: pull one record, classify it, accumulate, hand
/// finished batches to the sink. Sink failures are contained per batch; a
/// terminal source error propagates without flushing.
pub async fn run<S, K>(
    source: S,
    sink: &K,
    settings: &PipelineSettings,
) -> Result<RunSummary, FetchError>
where
    S: Stream<Item = Result<Learner, FetchError>>,
    K: BatchSink + ?Sized,
{
    pin_mut!(source);
    let mut accumulator = BatchAccumulator::new(settings.batch_limit);
    let mut summary = RunSummary::default();

    while let Some(item) = source.next().await {
        let learner = item?;
        summary.records_seen += 1;

        // The cutoff is recomputed per record so the inactivity window stays
        // relative to now over a long-running stream.
        let cutoff = inactive_cutoff(settings.inactive_days);
        match classify(&learner, cutoff, settings.low_score_threshold) {
            Some(category) => {
                match category {
                    Category::Inactive => summary.inactive_flagged += 1,
                    Category::LowScore => summary.low_score_flagged += 1,
                }
                for (emitted_category, batch) in accumulator.append(learner, category) {
                    dispatch(sink, emitted_category, batch, &mut summary).await;
                }
            }
            None => {
                debug!("record not classified, discarding");
                summary.records_skipped += 1;
            }
        }
    }

    for (category, batch) in accumulator.finish() {
        dispatch(sink, category, batch, &mut summary).await;
    }

    Ok(summary)
}

async fn dispatch<K: BatchSink + ?Sized>(
    sink: &K,
    category: Category,
    batch: Vec<Learner>,
    summary: &mut RunSummary,
) {
    info!(category = %category, size = batch.len(), "emitting batch");
    match sink.dispatch(&batch, category).await {
        Ok(()) => summary.batches_dispatched += 1,
        Err(err) => {
            summary.batches_failed += 1;
            warn!(category = %category, error = %err, "batch dispatch failed, continuing");
        }
    }
}
