//! Wraps calls to the external structured generator (spec.md §4.2).
//!
//! Grounded on `brain-infra::http::HttpClient`'s request wrapping and
//! `brain-cognitive::orchestrator::executor`'s timeout/retry shape.

pub mod mock;

use async_trait::async_trait;
use learning_types::{EngineConfig, EngineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Closed set of generator use cases; routes to the appropriate model and
/// tags call provenance in logs (spec.md §4.2 "Idempotency").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    Lesson,
    Quiz,
    Plan,
    AssessmentGrading,
    Reassessment,
    /// Placement/diagnostic question generation for intake (spec.md §6
    /// `assessment.start` / `assessment.submit_placement`); distinct from
    /// `AssessmentGrading`, which grades a single free-form answer.
    Assessment,
}

impl UseCase {
    pub fn as_str(self) -> &'static str {
        match self {
            UseCase::Lesson => "lesson",
            UseCase::Quiz => "quiz",
            UseCase::Plan => "plan",
            UseCase::AssessmentGrading => "assessment_grading",
            UseCase::Reassessment => "reassessment",
            UseCase::Assessment => "assessment",
        }
    }
}

/// A named JSON schema the generator's output must validate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaId {
    Lesson,
    Quiz,
    Plan,
    AiGrading,
    Assessment,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub use_case: UseCase,
    pub system_prompt: String,
    pub user_prompt: String,
    pub schema: SchemaId,
    pub temperature: f32,
    pub json_mode: bool,
}

impl GenerationRequest {
    pub fn new(use_case: UseCase, schema: SchemaId, system_prompt: String, user_prompt: String) -> Self {
        Self {
            use_case,
            system_prompt,
            user_prompt,
            schema,
            temperature: 0.7,
            json_mode: true,
        }
    }
}

/// Abstraction over an external structured text generator (spec.md §4.2).
#[async_trait]
pub trait GeneratorClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<serde_json::Value>;
}

/// `reqwest`-backed generator client with the retry/timeout contract from
/// spec.md §4.2: first attempt 60s, one retry at 45s; retriable on timeout
/// and transient I/O error; schema-validation failure is never retried.
pub struct HttpGeneratorClient {
    http: reqwest::Client,
    endpoint: String,
    timeout_initial: Duration,
    timeout_retry: Duration,
    retries: u32,
}

impl HttpGeneratorClient {
    pub fn new(endpoint: String, config: &EngineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            timeout_initial: config.generator_timeout_initial(),
            timeout_retry: config.generator_timeout_retry(),
            retries: config.generator_retries,
        }
    }

    async fn attempt(&self, request: &GenerationRequest, timeout: Duration) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "use_case": request.use_case,
            "system_prompt": request.system_prompt,
            "user_prompt": request.user_prompt,
            "temperature": request.temperature,
            "json_mode": request.json_mode,
        });

        let call = self.http.post(&self.endpoint).json(&body).send();
        let response = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| EngineError::Timeout(timeout))?
            .map_err(|e| EngineError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Transient(format!(
                "generator returned status {}",
                response.status()
            )));
        }

        let call = response.json::<serde_json::Value>();
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| EngineError::Timeout(timeout))?
            .map_err(|e| EngineError::GenerationInvalid(e.to_string()))
    }
}

#[async_trait]
impl GeneratorClient for HttpGeneratorClient {
    async fn generate(&self, request: GenerationRequest) -> Result<serde_json::Value> {
        info!(use_case = request.use_case.as_str(), "generator call starting");

        match self.attempt(&request, self.timeout_initial).await {
            Ok(value) => Ok(value),
            Err(err) if is_retriable(&err) && self.retries > 0 => {
                warn!(use_case = request.use_case.as_str(), error = %err, "retrying generator call");
                self.attempt(&request, self.timeout_retry).await
            }
            Err(err) => Err(err),
        }
    }
}

fn is_retriable(err: &EngineError) -> bool {
    matches!(err, EngineError::Timeout(_) | EngineError::Transient(_))
}
