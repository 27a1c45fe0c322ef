use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Text assembled from upstream collection, kept as the ordered fragments it
/// was built from plus their newline-joined concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCorpus {
    fragments: Vec<String>,
    text: String,
}

impl RawCorpus {
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments: Vec<String> = fragments.into_iter().map(Into::into).collect();
        let text = fragments.join("\n");
        Self { fragments, text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Approximate size in whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl From<String> for RawCorpus {
    fn from(value: String) -> Self {
        Self::from_fragments([value])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub chunk_id: String,
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkSummary {
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalSummary {
    pub query: String,
    pub text: String,
    pub chunk_count: usize,
    pub summarized_chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionReport {
    pub run_id: Uuid,
    pub query: String,
    pub chunk_words: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: FinalSummary,
    pub chunk_summaries: Vec<ChunkSummary>,
    pub failures: Vec<ChunkFailure>,
}

/// One generated question/answer pair, serialized with chat-transcript keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QaPair {
    pub user: String,
    pub assistant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    pub run_id: Uuid,
    pub chunk_words: usize,
    pub pairs: Vec<QaPair>,
    pub failures: Vec<ChunkFailure>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run on the first failed generation call.
    #[default]
    FailFast,
    /// Record failed chunks and continue with the rest.
    SkipFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReductionOptions {
    pub chunk_words: usize,
    pub failure_policy: FailurePolicy,
    pub max_attempts: u32,
    #[serde(with = "optional_secs")]
    pub call_timeout: Option<Duration>,
}

pub const DEFAULT_SUMMARY_CHUNK_WORDS: usize = 1_200;
pub const DEFAULT_QA_CHUNK_WORDS: usize = 200;

impl Default for ReductionOptions {
    fn default() -> Self {
        Self {
            chunk_words: DEFAULT_SUMMARY_CHUNK_WORDS,
            failure_policy: FailurePolicy::FailFast,
            max_attempts: 1,
            call_timeout: None,
        }
    }
}

impl ReductionOptions {
    pub fn for_qa() -> Self {
        Self {
            chunk_words: DEFAULT_QA_CHUNK_WORDS,
            ..Self::default()
        }
    }
}

/// Options read from a file, where every missing field keeps the value of
/// the mode defaults it is applied to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReductionOverrides {
    pub chunk_words: Option<usize>,
    pub failure_policy: Option<FailurePolicy>,
    pub max_attempts: Option<u32>,
    #[serde(with = "optional_secs")]
    pub call_timeout: Option<Duration>,
}

impl ReductionOverrides {
    pub fn apply(self, base: ReductionOptions) -> ReductionOptions {
        ReductionOptions {
            chunk_words: self.chunk_words.unwrap_or(base.chunk_words),
            failure_policy: self.failure_policy.unwrap_or(base.failure_policy),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            call_timeout: self.call_timeout.or(base.call_timeout),
        }
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        match secs {
            Some(value) if value.is_finite() && value > 0.0 => Ok(Some(Duration::from_secs_f64(value))),
            Some(value) => Err(serde::de::Error::custom(format!(
                "call_timeout must be a positive number of seconds, got {value}"
            ))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_joins_fragments_with_newlines() {
        let corpus = RawCorpus::from_fragments(["first page", "second  page"]);
        assert_eq!(corpus.text(), "first page\nsecond  page");
        assert_eq!(corpus.fragments().len(), 2);
        assert_eq!(corpus.word_count(), 4);
        assert!(!corpus.is_blank());
    }

    #[test]
    fn whitespace_only_corpus_is_blank() {
        assert!(RawCorpus::from_fragments(["  ", "\n\t"]).is_blank());
        assert!(RawCorpus::default().is_blank());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ReductionOptions =
            serde_json::from_str(r#"{"chunk_words": 50, "failure_policy": "skip_failed", "call_timeout": 2.5}"#)
                .expect("options should parse");
        assert_eq!(options.chunk_words, 50);
        assert_eq!(options.failure_policy, FailurePolicy::SkipFailed);
        assert_eq!(options.max_attempts, 1);
        assert_eq!(options.call_timeout, Some(Duration::from_millis(2_500)));
    }

    #[test]
    fn empty_overrides_keep_qa_defaults() {
        let overrides: ReductionOverrides = serde_json::from_str("{}").expect("overrides should parse");
        assert_eq!(overrides.apply(ReductionOptions::for_qa()), ReductionOptions::for_qa());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides: ReductionOverrides =
            serde_json::from_str(r#"{"max_attempts": 3, "call_timeout": 1}"#).expect("overrides should parse");
        let options = overrides.apply(ReductionOptions::for_qa());
        assert_eq!(options.chunk_words, DEFAULT_QA_CHUNK_WORDS);
        assert_eq!(options.failure_policy, FailurePolicy::FailFast);
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.call_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn overrides_reject_unknown_fields() {
        let parsed = serde_json::from_str::<ReductionOverrides>(r#"{"chunk_size": 10}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn options_reject_non_positive_timeout() {
        let parsed = serde_json::from_str::<ReductionOptions>(r#"{"call_timeout": 0}"#);
        assert!(parsed.is_err());
    }
}
