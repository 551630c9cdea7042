//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{FetchTrace, ParsedJob, ScrapingConfig};
use crate::traits::{Extractor, Fetcher};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns scripted responses and records requested URLs.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        _config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("<html><body>default</body></html>".to_string())
            } else {
                responses.remove(0)
            }
        };

        match &next {
            Ok(html) => {
                trace.status = Some(200);
                trace.html_length = Some(html.len());
            }
            Err(e) => {
                trace.error_name = Some(e.kind().to_string());
                trace.error = Some(e.to_string());
            }
        }
        next
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns scripted jobs regardless of the HTML.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<ParsedJob, AppError>>>>,
    candidates: Vec<String>,
}

impl MockExtractor {
    pub fn new(job: ParsedJob) -> Self {
        Self::with_responses(vec![Ok(job)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<ParsedJob, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            candidates: Vec::new(),
        }
    }

    /// Fixed candidate URLs instead of just the job URL.
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }
}

impl Extractor for MockExtractor {
    fn candidate_urls(&self, url: &str) -> Vec<String> {
        if self.candidates.is_empty() {
            vec![url.to_string()]
        } else {
            self.candidates.clone()
        }
    }

    fn extract(&self, url: &str, _html: &str) -> Result<ParsedJob, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ParsedJob {
                title: Some("Default".to_string()),
                ..ParsedJob::minimal(url, "mock")
            })
        } else {
            responses.remove(0)
        }
    }
}
