//! Test doubles for the processor-adapter contract.
//!
//! [`MockAdapter`] records every invocation and can be configured to fail or
//! delay specific keys, which is enough to exercise failure isolation,
//! ordering independence, resume behavior, and configuration validation
//! without any external chemistry tool installed.

use crate::errors::ProcessorError;
use crate::processor::{ProcessOutcome, ProcessRequest, ProcessorAdapter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A processor adapter that records calls and writes `<key>.out` files.
#[derive(Debug, Default)]
pub struct MockAdapter {
    name: String,
    failures: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl MockAdapter {
    /// Creates a mock adapter that succeeds for every key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Makes invocations for `key` fail with `reason`.
    pub fn fail_for(&self, key: impl Into<String>, reason: impl Into<String>) {
        self.failures.lock().insert(key.into(), reason.into());
    }

    /// Delays invocations for `key` before any output is written.
    pub fn delay_for(&self, key: impl Into<String>, delay: Duration) {
        self.delays.lock().insert(key.into(), delay);
    }

    /// Number of `process` invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Keys in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Clears recorded invocations.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl ProcessorAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn expected_outputs(&self, key: &str, output_dir: &Path) -> Vec<PathBuf> {
        vec![output_dir.join(format!("{key}.out"))]
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessOutcome, ProcessorError> {
        self.calls.lock().push(request.key.clone());

        let delay = self.delays.lock().get(&request.key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().get(&request.key).cloned();
        if let Some(reason) = failure {
            return Err(ProcessorError::invalid_input(&self.name, reason));
        }

        let output = request.output_dir.join(format!("{}.out", request.key));
        std::fs::write(&output, format!("processed {}\n", request.key))
            .map_err(|e| ProcessorError::spawn(&self.name, e.to_string()))?;
        Ok(ProcessOutcome::with_outputs([output]))
    }
}
