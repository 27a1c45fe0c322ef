use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no useful content found in corpus")]
    EmptyInput,

    #[error("{} failed: {source}", describe_call(.chunk_index, .chunk_id))]
    ExternalService {
        chunk_index: Option<usize>,
        chunk_id: Option<String>,
        #[source]
        source: GenerationError,
    },
}

impl ReduceError {
    /// Index of the chunk whose generation call failed, if the failure was
    /// tied to a single chunk rather than the merge step.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::ExternalService { chunk_index, .. } => *chunk_index,
            _ => None,
        }
    }
}

fn describe_call(chunk_index: &Option<usize>, chunk_id: &Option<String>) -> String {
    match (chunk_index, chunk_id) {
        (Some(index), Some(id)) => format!("generation for chunk {index} ({})", short_id(id)),
        (Some(index), None) => format!("generation for chunk {index}"),
        _ => "merge generation".to_string(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("backend returned {status}: {body}")]
    BackendResponse { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("call exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no readable input: {0}")]
    NoInput(String),
}
