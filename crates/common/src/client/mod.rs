//! Analysis service client abstraction
//!
//! Provides a unified interface to the batch analysis endpoint plus a mock
//! implementation for tests. One client instance owns the HTTP connection
//! pool shared by all concurrent workers.

use crate::analysis::{Analysis, AnalysisRequest, Document, Sentence};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for batch document analysis
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one batch of documents in a single API call
    ///
    /// The returned analyses echo the request document ids but carry no
    /// ordering guarantee relative to the request.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<Analysis>>;
}

/// HTTP client for the analysis endpoint
pub struct GeneeaClient {
    client: reqwest::Client,
    url: String,
    user_key: String,
    max_retries: u32,
}

impl GeneeaClient {
    pub fn new(url: String, user_key: String, timeout_secs: u64, max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url,
            user_key,
            max_retries,
        }
    }

    /// Make request with retry
    async fn request_with_retry(&self, request: &AnalysisRequest) -> Result<Vec<Analysis>> {
        let mut last_error = None;

        for attempt in 0..self.max_retries.max(1) {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(500 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(request).await {
                Ok(analyses) => return Ok(analyses),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Analysis request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::api("Unknown error after retries")))
    }

    async fn make_request(&self, request: &AnalysisRequest) -> Result<Vec<Analysis>> {
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("user_key {}", self.user_key))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::api(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ApiStatus { status, body });
        }

        let analyses: Vec<Analysis> = response
            .json()
            .await
            .map_err(|e| AppError::api(format!("Failed to parse response: {e}")))?;

        Ok(analyses)
    }
}

#[async_trait]
impl Analyzer for GeneeaClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<Analysis>> {
        self.request_with_retry(request).await
    }
}

type AnalysisFn = dyn Fn(&Document) -> Analysis + Send + Sync;

/// Mock analyzer for testing
///
/// By default echoes every document back as a one-sentence analysis with
/// `used_chars` equal to the document length; `with` installs a custom
/// per-document response factory.
pub struct MockAnalyzer {
    make: Box<AnalysisFn>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            make: Box::new(Self::echo),
        }
    }

    pub fn with(make: impl Fn(&Document) -> Analysis + Send + Sync + 'static) -> Self {
        Self {
            make: Box::new(make),
        }
    }

    /// The default response for one document
    pub fn echo(document: &Document) -> Analysis {
        let body = document.body().to_string();
        let mut analysis = Analysis {
            id: document.id.clone(),
            language: Some("en".to_string()),
            used_chars: body.chars().count() as u64,
            text: None,
            title: None,
            lead: None,
            sentences: vec![Sentence {
                segment: document.segment().to_string(),
                text: body.clone(),
                sentiment: None,
            }],
            entities: Vec::new(),
            relations: Vec::new(),
            sentiment: None,
        };
        match document.segment() {
            "text" => analysis.text = Some(body),
            "title" => analysis.title = Some(body),
            _ => analysis.lead = Some(body),
        }
        analysis
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<Analysis>> {
        Ok(request.documents.iter().map(|d| (self.make)(d)).collect())
    }
}
