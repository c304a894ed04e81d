use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use sensorhub_core::errors::InsightError;
use sensorhub_core::provider::{InsightProvider, InsightRequest};

/// Provider that replays pre-programmed results in order, for tests without network access.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<String, InsightError>>>,
    call_count: AtomicUsize,
    last_request: Mutex<Option<InsightRequest>>,
}

impl MockProvider {
    pub fn new(responses: Vec<Result<String, InsightError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Convenience: a provider that answers once with `text`.
    pub fn with_text(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The most recent request passed to `generate`.
    pub fn last_request(&self) -> Option<InsightRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl InsightProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, request: &InsightRequest) -> Result<String, InsightError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock() = Some(request.clone());

        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(InsightError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )))
        })
    }
}
