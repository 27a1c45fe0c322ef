pub mod chunking;
pub mod collect;
pub mod error;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod qa;
pub mod traits;

pub use chunking::{normalize_whitespace, split_words};
pub use collect::{
    collect_corpus_best_effort, discover_text_files, read_corpus, CollectionReport, SkippedFile,
};
pub use error::{CollectError, GenerationError, ReduceError};
pub use generation::{GeneratorConfig, OpenAiGenerator, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use models::{
    Chunk, ChunkFailure, ChunkSummary, FailurePolicy, FinalSummary, QaPair, QaReport, RawCorpus,
    ReductionOptions, ReductionOverrides, ReductionReport, DEFAULT_QA_CHUNK_WORDS, DEFAULT_SUMMARY_CHUNK_WORDS,
};
pub use pipeline::{reduce, ReductionPipeline};
pub use prompts::{PromptTemplate, CHUNK_SUMMARY, MERGE_SUMMARY, QA_PAIRS};
pub use qa::{parse_qa_pairs, write_jsonl, QaGenerator};
pub use traits::TextGenerator;
