use crate::chunking::split_words;
use crate::error::{GenerationError, ReduceError};
use crate::models::{Chunk, QaPair, QaReport, ReductionOptions};
use crate::pipeline::{invoke, map_chunks};
use crate::prompts::QA_PAIRS;
use crate::traits::TextGenerator;
use serde::Deserialize;
use std::io::{self, Write};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct GeneratedPair {
    question: String,
    answer: String,
}

/// Turns a corpus into tutor-style question/answer pairs, three requested
/// per chunk.
pub struct QaGenerator<G>
where
    G: TextGenerator,
{
    generator: G,
    options: ReductionOptions,
}

impl<G> QaGenerator<G>
where
    G: TextGenerator,
{
    pub fn new(generator: G, options: ReductionOptions) -> Self {
        Self { generator, options }
    }

    pub async fn pairs_for_chunk(&self, chunk: &Chunk) -> Result<Vec<QaPair>, ReduceError> {
        invoke(&self.generator, &self.options, &QA_PAIRS, &[("text", chunk.text.as_str())])
            .await
            .and_then(|content| parse_qa_pairs(&content))
            .map_err(|source| ReduceError::ExternalService {
                chunk_index: Some(chunk.index),
                chunk_id: Some(chunk.chunk_id.clone()),
                source,
            })
    }

    pub async fn generate_pairs(&self, raw_corpus: &str) -> Result<QaReport, ReduceError> {
        let run_id = Uuid::new_v4();

        if raw_corpus.trim().is_empty() {
            return Err(ReduceError::EmptyInput);
        }

        let chunks = split_words(raw_corpus, self.options.chunk_words)?;
        if chunks.is_empty() {
            return Err(ReduceError::EmptyInput);
        }

        let total = chunks.len();
        info!(%run_id, chunk_count = total, "generating q&a pairs");

        let outcomes = map_chunks(&chunks, self.options.failure_policy, |chunk| {
            info!(%run_id, "processing chunk {}/{}", chunk.index + 1, total);
            self.pairs_for_chunk(chunk)
        })
        .await?;

        let pairs: Vec<QaPair> = outcomes.items.into_iter().flatten().collect();
        info!(%run_id, pair_count = pairs.len(), failed_chunks = outcomes.failures.len(), "q&a generation completed");

        Ok(QaReport {
            run_id,
            chunk_words: self.options.chunk_words,
            pairs,
            failures: outcomes.failures,
        })
    }
}

/// Parses the model's JSON list of `{question, answer}` objects. A wrapping
/// Markdown code fence is tolerated.
pub fn parse_qa_pairs(content: &str) -> Result<Vec<QaPair>, GenerationError> {
    let body = strip_code_fence(content);
    let generated: Vec<GeneratedPair> = serde_json::from_str(body)
        .map_err(|error| GenerationError::MalformedResponse(format!("q&a list: {error}")))?;

    Ok(generated
        .into_iter()
        .map(|pair| QaPair {
            user: pair.question,
            assistant: pair.answer,
        })
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn write_jsonl<W: Write>(pairs: &[QaPair], mut writer: W) -> io::Result<()> {
    for pair in pairs {
        serde_json::to_writer(&mut writer, pair)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailurePolicy;
    use crate::prompts::PromptTemplate;
    use async_trait::async_trait;

    struct CannedGenerator;

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(
            &self,
            _template: &PromptTemplate,
            values: &[(&str, &str)],
        ) -> Result<String, GenerationError> {
            let text = values
                .iter()
                .find(|(key, _)| *key == "text")
                .map(|(_, value)| *value)
                .unwrap_or_default();
            if text.contains("garbled") {
                return Ok("Sorry, I cannot help with that.".to_string());
            }
            Ok(format!(
                r#"[{{"question": "What is said?", "answer": "{text}"}}]"#
            ))
        }
    }

    fn options(chunk_words: usize, failure_policy: FailurePolicy) -> ReductionOptions {
        ReductionOptions {
            chunk_words,
            failure_policy,
            ..ReductionOptions::for_qa()
        }
    }

    #[test]
    fn parses_plain_json_list() {
        let pairs = parse_qa_pairs(
            r#"[{"question": "Q1", "answer": "A1"}, {"question": "Q2", "answer": "A2"}]"#,
        )
        .unwrap();
        assert_eq!(
            pairs,
            vec![
                QaPair { user: "Q1".to_string(), assistant: "A1".to_string() },
                QaPair { user: "Q2".to_string(), assistant: "A2".to_string() },
            ]
        );
    }

    #[test]
    fn parses_fenced_json_list() {
        let content = "```json\n[{\"question\": \"Q\", \"answer\": \"A\"}]\n```\n";
        let pairs = parse_qa_pairs(content).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].assistant, "A");
    }

    #[test]
    fn prose_is_malformed() {
        let result = parse_qa_pairs("Here are your questions: ...");
        assert!(matches!(result, Err(GenerationError::MalformedResponse(_))));
    }

    #[test]
    fn jsonl_has_one_object_per_line_and_keeps_unicode() {
        let pairs = vec![
            QaPair { user: "Qui?".to_string(), assistant: "Élodie".to_string() },
            QaPair { user: "Où?".to_string(), assistant: "Paris".to_string() },
        ];
        let mut buffer = Vec::new();
        write_jsonl(&pairs, &mut buffer).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"user":"Qui?","assistant":"Élodie"}"#);
        assert_eq!(lines[1], r#"{"user":"Où?","assistant":"Paris"}"#);
    }

    #[tokio::test]
    async fn pairs_follow_chunk_order() {
        let generator = QaGenerator::new(CannedGenerator, options(2, FailurePolicy::FailFast));

        let report = generator.generate_pairs("alpha beta gamma").await.unwrap();

        let answers: Vec<&str> = report.pairs.iter().map(|pair| pair.assistant.as_str()).collect();
        assert_eq!(answers, vec!["alpha beta", "gamma"]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn unparseable_chunk_fails_fast_with_its_index() {
        let generator = QaGenerator::new(CannedGenerator, options(2, FailurePolicy::FailFast));

        let error = generator.generate_pairs("fine words garbled text").await.unwrap_err();

        assert_eq!(error.chunk_index(), Some(1));
    }

    #[tokio::test]
    async fn unparseable_chunk_is_skipped_when_tolerated() {
        let generator = QaGenerator::new(CannedGenerator, options(2, FailurePolicy::SkipFailed));

        let report = generator.generate_pairs("fine words garbled text").await.unwrap();

        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].chunk_index, 1);
    }

    #[tokio::test]
    async fn blank_corpus_is_empty_input() {
        let generator = QaGenerator::new(CannedGenerator, ReductionOptions::for_qa());
        let result = generator.generate_pairs("\n\n").await;
        assert!(matches!(result, Err(ReduceError::EmptyInput)));
    }
}
