use crate::error::GenerationError;
use crate::prompts::PromptTemplate;
use async_trait::async_trait;

/// Request/response text generation, supplied by the caller and shared by
/// every step of a run.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        template: &PromptTemplate,
        values: &[(&str, &str)],
    ) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T> TextGenerator for &T
where
    T: TextGenerator + ?Sized,
{
    async fn generate(
        &self,
        template: &PromptTemplate,
        values: &[(&str, &str)],
    ) -> Result<String, GenerationError> {
        (**self).generate(template, values).await
    }
}
