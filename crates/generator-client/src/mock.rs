//! Test double for [`GeneratorClient`], shipped (not `#[cfg(test)]`-gated)
//! so downstream crates' own tests can drive retry and schema-validation
//! paths without a real network endpoint.

use crate::{GenerationRequest, GeneratorClient};
use async_trait::async_trait;
use learning_types::{EngineError, Result};
use std::sync::Mutex;

#[derive(Clone)]
pub enum Canned {
    Value(serde_json::Value),
    Timeout,
    GenerationInvalid(String),
}

/// Returns queued canned responses in order, falling back to the last one
/// once exhausted. Lets tests assert exact retry counts by queuing a
/// failure followed by a success.
pub struct MockGeneratorClient {
    queue: Mutex<Vec<Canned>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl MockGeneratorClient {
    pub fn new(responses: Vec<Canned>) -> Self {
        Self {
            queue: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(value: serde_json::Value) -> Self {
        Self::new(vec![Canned::Value(value)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GeneratorClient for MockGeneratorClient {
    async fn generate(&self, request: GenerationRequest) -> Result<serde_json::Value> {
        self.calls.lock().unwrap().push(request.clone());
        let mut queue = self.queue.lock().unwrap();
        let next = if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue
                .first()
                .cloned()
                .expect("MockGeneratorClient must be seeded with at least one response")
        };
        match next {
            Canned::Value(v) => Ok(v),
            Canned::Timeout => Err(EngineError::Timeout(std::time::Duration::from_secs(60))),
            Canned::GenerationInvalid(msg) => Err(EngineError::GenerationInvalid(msg)),
        }
    }
}
