//! Scripted analysis backend: returns queued outcomes in order and records
//! when each call happened.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use paper_harness::analysis::{
    AnalysisBackend, AnalysisRequest, EndpointFailure, EndpointResponse, FailureKind,
};
use tokio::time::Instant;

pub type Outcome = Result<EndpointResponse, EndpointFailure>;

pub struct ScriptedBackend {
    script: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<(Instant, AnalysisRequest)>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, r)| r.prompt.clone())
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn send(&self, request: &AnalysisRequest) -> Outcome {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EndpointFailure::new(FailureKind::Other, "script exhausted")))
    }
}

pub fn ok(text: &str, input_tokens: u64, output_tokens: u64) -> Outcome {
    Ok(EndpointResponse {
        text_blocks: vec![text.to_string()],
        model: "claude-test".to_string(),
        input_tokens,
        output_tokens,
        stop_reason: Some("end_turn".to_string()),
    })
}

pub fn rate_limited() -> Outcome {
    Err(EndpointFailure::with_status(429, "rate limited"))
}

pub fn status(code: u16) -> Outcome {
    Err(EndpointFailure::with_status(code, format!("status {}", code)))
}
