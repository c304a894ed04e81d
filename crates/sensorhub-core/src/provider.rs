use async_trait::async_trait;

use crate::errors::InsightError;

/// A single prompt pair sent to a text-generation provider.
#[derive(Clone, Debug, PartialEq)]
pub struct InsightRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl InsightRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait implemented by each text-generation backend.
///
/// One request, one response. Implementations must not retry.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn generate(&self, request: &InsightRequest) -> Result<String, InsightError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl InsightProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn generate(&self, request: &InsightRequest) -> Result<String, InsightError> {
            Ok(request.user_prompt.clone())
        }
    }

    #[test]
    fn request_defaults() {
        let req = InsightRequest::new("sys", "user");
        assert_eq!(req.system_prompt, "sys");
        assert_eq!(req.user_prompt, "user");
        assert!(req.temperature.is_none());
        assert!(req.max_tokens.is_none());
        assert_eq!(req.with_temperature(0.3).temperature, Some(0.3));
    }

    #[tokio::test]
    async fn provider_is_object_safe() {
        let provider: Box<dyn InsightProvider> = Box::new(Echo);
        let out = provider
            .generate(&InsightRequest::new("sys", "hello"))
            .await
            .unwrap();
        assert_eq!(out, "hello");
        assert_eq!(provider.name(), "echo");
    }
}
