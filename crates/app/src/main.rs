use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use text_reduce_core::{
    collect_corpus_best_effort, read_corpus, write_jsonl, FailurePolicy, GeneratorConfig,
    OpenAiGenerator, QaGenerator, RawCorpus, ReductionOptions, ReductionOverrides,
    ReductionPipeline, DEFAULT_BASE_URL, DEFAULT_MODEL,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "text-reduce", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the chat completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Chat model name
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// Completion token limit per call
    #[arg(long, default_value_t = 1024)]
    max_tokens: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a corpus with respect to a query.
    Summarize {
        /// What the summary should answer.
        #[arg(long)]
        query: String,
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        run: RunArgs,
        /// Print the full JSON run report instead of the summary text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Generate question/answer pairs as JSON lines.
    Qa {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Text file to read, or `-` for stdin. Stdin is used when no input is given.
    #[arg(long, conflicts_with = "dir")]
    input: Option<PathBuf>,

    /// Folder whose .txt/.md files are read recursively in path order.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Write the result here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// Maximum words per chunk.
    #[arg(long)]
    chunk_words: Option<usize>,

    /// Skip chunks whose generation call fails instead of aborting.
    #[arg(long, default_value_t = false)]
    skip_failed: bool,

    /// Attempts per generation call.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Deadline per generation call, in seconds.
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// JSON file with reduction options; fields it leaves out keep the
    /// subcommand defaults, and flags override its values.
    #[arg(long)]
    options: Option<PathBuf>,
}

impl RunArgs {
    fn resolve(&self, defaults: ReductionOptions) -> anyhow::Result<ReductionOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("unable to open options file {}", path.display()))?;
                serde_json::from_reader::<_, ReductionOverrides>(file)
                    .with_context(|| format!("invalid options file {}", path.display()))?
                    .apply(defaults)
            }
            None => defaults,
        };

        if let Some(chunk_words) = self.chunk_words {
            options.chunk_words = chunk_words;
        }
        if self.skip_failed {
            options.failure_policy = FailurePolicy::SkipFailed;
        }
        if let Some(max_attempts) = self.max_attempts {
            options.max_attempts = max_attempts;
        }
        if let Some(secs) = self.timeout_secs {
            if !secs.is_finite() || secs <= 0.0 {
                bail!("--timeout-secs must be positive, got {secs}");
            }
            options.call_timeout = Some(Duration::from_secs_f64(secs));
        }

        Ok(options)
    }
}

fn load_corpus(input: &InputArgs) -> anyhow::Result<RawCorpus> {
    if let Some(dir) = &input.dir {
        let report = collect_corpus_best_effort(dir)
            .with_context(|| format!("unable to collect corpus from {}", dir.display()))?;
        for skipped in &report.skipped_files {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
        }
        return Ok(report.corpus);
    }

    match &input.input {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .with_context(|| format!("unable to open {}", path.display()))?;
            Ok(read_corpus(file)?)
        }
        _ => Ok(read_corpus(std::io::stdin().lock())?),
    }
}

async fn emit(output: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, bytes)
                .await
                .with_context(|| format!("unable to write {}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let generator = OpenAiGenerator::new(GeneratorConfig {
        base_url: cli.base_url,
        api_key: cli.api_key,
        model: cli.model,
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
    })?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        endpoint = %generator.endpoint(),
        "text-reduce boot"
    );

    match cli.command {
        Command::Summarize {
            query,
            input,
            run,
            json,
        } => {
            let options = run.resolve(ReductionOptions::default())?;
            let corpus = load_corpus(&input)?;
            info!(
                fragments = corpus.fragments().len(),
                words = corpus.word_count(),
                "corpus loaded"
            );

            let pipeline = ReductionPipeline::new(generator, options);
            let report = pipeline
                .reduce(corpus.text(), &query)
                .await
                .context("summarization failed")?;

            for failure in &report.failures {
                warn!(chunk_index = failure.chunk_index, reason = %failure.reason, "chunk left out of summary");
            }

            let mut rendered = if json {
                serde_json::to_string_pretty(&report)?
            } else {
                report.summary.text.clone()
            };
            rendered.push('\n');
            emit(input.output.as_deref(), rendered.as_bytes()).await?;
        }
        Command::Qa { input, run } => {
            let options = run.resolve(ReductionOptions::for_qa())?;
            let corpus = load_corpus(&input)?;

            let report = QaGenerator::new(generator, options)
                .generate_pairs(corpus.text())
                .await
                .context("q&a generation failed")?;

            for failure in &report.failures {
                warn!(chunk_index = failure.chunk_index, reason = %failure.reason, "chunk produced no pairs");
            }

            let mut buffer = Vec::new();
            write_jsonl(&report.pairs, &mut buffer)?;
            emit(input.output.as_deref(), &buffer).await?;
            info!(pair_count = report.pairs.len(), "q&a pairs saved");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::RunArgs;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;
    use text_reduce_core::{FailurePolicy, ReductionOptions, DEFAULT_QA_CHUNK_WORDS};

    fn run_args(options: Option<std::path::PathBuf>) -> RunArgs {
        RunArgs {
            chunk_words: None,
            skip_failed: false,
            max_attempts: None,
            timeout_secs: None,
            options,
        }
    }

    #[test]
    fn empty_options_file_keeps_qa_chunk_size() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("opts.json");
        fs::write(&path, "{}")?;

        let options = run_args(Some(path)).resolve(ReductionOptions::for_qa())?;

        assert_eq!(options, ReductionOptions::for_qa());
        assert_eq!(options.chunk_words, DEFAULT_QA_CHUNK_WORDS);
        Ok(())
    }

    #[test]
    fn flags_win_over_options_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("opts.json");
        fs::write(&path, r#"{"chunk_words": 500, "max_attempts": 2}"#)?;

        let mut args = run_args(Some(path));
        args.chunk_words = Some(50);
        args.skip_failed = true;
        args.timeout_secs = Some(1.5);
        let options = args.resolve(ReductionOptions::default())?;

        assert_eq!(options.chunk_words, 50);
        assert_eq!(options.max_attempts, 2);
        assert_eq!(options.failure_policy, FailurePolicy::SkipFailed);
        assert_eq!(options.call_timeout, Some(Duration::from_millis(1_500)));
        Ok(())
    }

    #[test]
    fn non_positive_timeout_flag_is_rejected() {
        let mut args = run_args(None);
        args.timeout_secs = Some(0.0);
        assert!(args.resolve(ReductionOptions::default()).is_err());
    }
}
