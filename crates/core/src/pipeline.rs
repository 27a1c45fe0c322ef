use crate::chunking::split_words;
use crate::error::{GenerationError, ReduceError};
use crate::models::{
    Chunk, ChunkFailure, ChunkSummary, FailurePolicy, FinalSummary, ReductionOptions,
    ReductionReport,
};
use crate::prompts::{PromptTemplate, CHUNK_SUMMARY, MERGE_SUMMARY};
use crate::traits::TextGenerator;
use chrono::Utc;
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

const SUMMARY_SEPARATOR: &str = "\n";

/// Split, summarize each chunk against the query, then merge the chunk
/// summaries into one answer. Generation calls are issued one at a time in
/// chunk order.
pub struct ReductionPipeline<G>
where
    G: TextGenerator,
{
    generator: G,
    options: ReductionOptions,
}

impl<G> ReductionPipeline<G>
where
    G: TextGenerator,
{
    pub fn new(generator: G, options: ReductionOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &ReductionOptions {
        &self.options
    }

    pub fn split(&self, raw_corpus: &str) -> Result<Vec<Chunk>, ReduceError> {
        split_words(raw_corpus, self.options.chunk_words)
    }

    pub async fn summarize_chunk(
        &self,
        chunk: &Chunk,
        query: &str,
    ) -> Result<ChunkSummary, ReduceError> {
        let text = invoke(
            &self.generator,
            &self.options,
            &CHUNK_SUMMARY,
            &[("query", query), ("chunk", chunk.text.as_str())],
        )
        .await
        .map_err(|source| ReduceError::ExternalService {
            chunk_index: Some(chunk.index),
            chunk_id: Some(chunk.chunk_id.clone()),
            source,
        })?;

        Ok(ChunkSummary {
            chunk_index: chunk.index,
            text,
        })
    }

    /// Merges summaries in the order given. The generator alone is
    /// responsible for removing redundancy between them.
    pub async fn merge_summaries(
        &self,
        summaries: &[ChunkSummary],
        query: &str,
    ) -> Result<FinalSummary, ReduceError> {
        if summaries.is_empty() {
            return Err(ReduceError::EmptyInput);
        }

        let combined = summaries
            .iter()
            .map(|summary| summary.text.as_str())
            .collect::<Vec<_>>()
            .join(SUMMARY_SEPARATOR);

        let text = invoke(
            &self.generator,
            &self.options,
            &MERGE_SUMMARY,
            &[("query", query), ("summaries", combined.as_str())],
        )
        .await
        .map_err(|source| ReduceError::ExternalService {
            chunk_index: None,
            chunk_id: None,
            source,
        })?;

        Ok(FinalSummary {
            query: query.to_string(),
            text,
            chunk_count: summaries.len(),
            summarized_chunks: summaries.len(),
        })
    }

    pub async fn reduce(&self, raw_corpus: &str, query: &str) -> Result<ReductionReport, ReduceError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        if raw_corpus.trim().is_empty() {
            warn!(%run_id, "no useful content found, skipping generation");
            return Err(ReduceError::EmptyInput);
        }

        let chunks = self.split(raw_corpus)?;
        if chunks.is_empty() {
            return Err(ReduceError::EmptyInput);
        }
        info!(%run_id, chunk_count = chunks.len(), chunk_words = self.options.chunk_words, "created chunks");

        let total = chunks.len();
        let outcomes = map_chunks(&chunks, self.options.failure_policy, |chunk| {
            info!(%run_id, "summarizing chunk {}/{}", chunk.index + 1, total);
            self.summarize_chunk(chunk, query)
        })
        .await?;

        info!(%run_id, summaries = outcomes.items.len(), "merging chunk summaries");
        let mut summary = self.merge_summaries(&outcomes.items, query).await?;
        summary.chunk_count = total;

        let finished_at = Utc::now();
        info!(
            %run_id,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            failed_chunks = outcomes.failures.len(),
            "reduction completed"
        );

        Ok(ReductionReport {
            run_id,
            query: query.to_string(),
            chunk_words: self.options.chunk_words,
            started_at,
            finished_at,
            summary,
            chunk_summaries: outcomes.items,
            failures: outcomes.failures,
        })
    }
}

/// Runs one reduction with default options and the given chunk size.
pub async fn reduce<G>(
    generator: G,
    raw_corpus: &str,
    query: &str,
    chunk_size: usize,
) -> Result<FinalSummary, ReduceError>
where
    G: TextGenerator,
{
    let options = ReductionOptions {
        chunk_words: chunk_size,
        ..ReductionOptions::default()
    };
    let report = ReductionPipeline::new(generator, options)
        .reduce(raw_corpus, query)
        .await?;
    Ok(report.summary)
}

pub(crate) struct ChunkOutcomes<T> {
    pub items: Vec<T>,
    pub failures: Vec<ChunkFailure>,
}

/// Applies `step` to each chunk in order, awaiting each before starting the
/// next. Under [`FailurePolicy::SkipFailed`] failed chunks are recorded and
/// skipped; the first failure is returned if nothing succeeded.
pub(crate) async fn map_chunks<'a, T, F, Fut>(
    chunks: &'a [Chunk],
    policy: FailurePolicy,
    mut step: F,
) -> Result<ChunkOutcomes<T>, ReduceError>
where
    F: FnMut(&'a Chunk) -> Fut,
    Fut: Future<Output = Result<T, ReduceError>>,
{
    let mut items = Vec::with_capacity(chunks.len());
    let mut failures = Vec::new();
    let mut first_error = None;

    for chunk in chunks {
        match step(chunk).await {
            Ok(item) => items.push(item),
            Err(error) if policy == FailurePolicy::SkipFailed => {
                warn!(chunk_index = chunk.index, %error, "skipping failed chunk");
                failures.push(ChunkFailure {
                    chunk_index: chunk.index,
                    reason: error.to_string(),
                });
                first_error.get_or_insert(error);
            }
            Err(error) => return Err(error),
        }
    }

    if items.is_empty() {
        if let Some(error) = first_error {
            return Err(error);
        }
    }

    Ok(ChunkOutcomes { items, failures })
}

/// One generation call with the configured deadline and attempt budget.
pub(crate) async fn invoke<G>(
    generator: &G,
    options: &ReductionOptions,
    template: &PromptTemplate,
    values: &[(&str, &str)],
) -> Result<String, GenerationError>
where
    G: TextGenerator + ?Sized,
{
    let attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let call = generator.generate(template, values);
        let result = match options.call_timeout {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .unwrap_or(Err(GenerationError::Timeout(deadline))),
            None => call.await,
        };

        match result {
            Ok(text) => return Ok(text),
            Err(error) if attempt < attempts => {
                warn!(template = template.name, attempt, attempts, %error, "generation failed, retrying");
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
