//! Bounded generate-and-validate loop around a [`TextGenerator`].
//!
//! [`retry_with_validation`] is the generic shell; [`ConstrainedGenerator`]
//! binds it to a text generator, a [`RetryPolicy`] and an optional
//! [`DiagnosticLog`].

pub mod structured;

use crate::config::RetryPolicy;
use crate::error::{OracleError, OracleResult};
use crate::ledger::DiagnosticLog;
use crate::providers::TextGenerator;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of a bounded retry loop.
#[derive(Debug)]
pub enum GenerationOutcome<T> {
    Success {
        value: T,
        attempts: usize,
    },
    Exhausted {
        attempts: usize,
        last_error: Option<OracleError>,
    },
}

impl<T> GenerationOutcome<T> {
    pub fn attempts(&self) -> usize {
        match self {
            Self::Success { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> OracleResult<T> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Exhausted {
                attempts,
                last_error,
            } => Err(OracleError::GenerationFailed {
                attempts,
                reason: last_error
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "no attempts were made".to_string()),
            }),
        }
    }
}

/// One pass through the loop, as seen by observers.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    pub attempt_number: usize,
    pub prompt_text: String,
    pub result_text: Option<String>,
    pub satisfied_constraints: bool,
    pub error: Option<String>,
}

/// Call `generate` up to `max_attempts` times, returning the first output that
/// `validate` accepts. Capability errors and rejections both consume an attempt.
pub async fn retry_with_validation<T, G, Fut, V>(
    max_attempts: usize,
    generate: G,
    validate: V,
) -> GenerationOutcome<T>
where
    G: FnMut(usize) -> Fut,
    Fut: Future<Output = anyhow::Result<String>>,
    V: FnMut(&str) -> OracleResult<T>,
{
    retry_with_history("", max_attempts, generate, validate)
        .await
        .0
}

/// [`retry_with_validation`] that also returns every attempt it made.
pub async fn retry_with_history<T, G, Fut, V>(
    prompt: &str,
    max_attempts: usize,
    mut generate: G,
    mut validate: V,
) -> (GenerationOutcome<T>, Vec<GenerationAttempt>)
where
    G: FnMut(usize) -> Fut,
    Fut: Future<Output = anyhow::Result<String>>,
    V: FnMut(&str) -> OracleResult<T>,
{
    let mut history = Vec::with_capacity(max_attempts);
    let mut last_error = None;

    for attempt_number in 1..=max_attempts {
        let (result_text, err) = match generate(attempt_number).await {
            Ok(text) => match validate(&text) {
                Ok(value) => {
                    debug!(attempt_number, max_attempts, "generation accepted");
                    history.push(GenerationAttempt {
                        attempt_number,
                        prompt_text: prompt.to_string(),
                        result_text: Some(text),
                        satisfied_constraints: true,
                        error: None,
                    });
                    return (
                        GenerationOutcome::Success {
                            value,
                            attempts: attempt_number,
                        },
                        history,
                    );
                }
                Err(err) => (Some(text), err),
            },
            Err(err) => (
                None,
                OracleError::GenerationFailed {
                    attempts: attempt_number,
                    reason: format!("{err:#}"),
                },
            ),
        };

        warn!(attempt_number, max_attempts, error = %err, "generation attempt failed");
        history.push(GenerationAttempt {
            attempt_number,
            prompt_text: prompt.to_string(),
            result_text,
            satisfied_constraints: false,
            error: Some(err.to_string()),
        });
        last_error = Some(err);
    }

    (
        GenerationOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        },
        history,
    )
}

/// Non-empty, and containing at least one of `required` (case-insensitive)
/// when `required` is non-empty.
pub fn check_constraints(text: &str, required: &[String]) -> OracleResult<()> {
    if text.trim().is_empty() {
        return Err(OracleError::ValidationFailed(
            "empty response received".to_string(),
        ));
    }

    if !required.is_empty() {
        let lowered = text.to_lowercase();
        if !required
            .iter()
            .any(|word| lowered.contains(&word.to_lowercase()))
        {
            return Err(OracleError::ValidationFailed(format!(
                "none of the required words found: {}",
                required.join(", ")
            )));
        }
    }

    Ok(())
}

/// Text generator with bounded retries and post-hoc validation.
#[derive(Clone)]
pub struct ConstrainedGenerator {
    generator: Arc<dyn TextGenerator>,
    log: Option<Arc<dyn DiagnosticLog>>,
}

impl ConstrainedGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            log: None,
        }
    }

    /// Record rejected attempts and exhaustion in `log`.
    pub fn with_diagnostics(mut self, log: Arc<dyn DiagnosticLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Free-text generation. `None` once every attempt has failed.
    pub async fn generate_with_retry(&self, prompt: &str, policy: &RetryPolicy) -> Option<String> {
        self.run(prompt, policy, |text| {
            check_constraints(text, &policy.required_substrings).map(|()| text.to_string())
        })
        .await
    }

    /// Structured generation: the text must also satisfy `parse`, which is
    /// expected to reject malformed payloads with [`OracleError::MalformedPayload`].
    pub async fn generate_structured<T, P>(
        &self,
        prompt: &str,
        policy: &RetryPolicy,
        parse: P,
    ) -> Option<T>
    where
        P: Fn(&str) -> OracleResult<T>,
    {
        self.generate_validated(prompt, policy, parse).await
    }

    /// Text that passes the policy's constraints and then `validate`.
    /// Rejections from `validate` consume an attempt.
    pub async fn generate_validated<T, V>(
        &self,
        prompt: &str,
        policy: &RetryPolicy,
        validate: V,
    ) -> Option<T>
    where
        V: Fn(&str) -> OracleResult<T>,
    {
        self.run(prompt, policy, |text| {
            check_constraints(text, &policy.required_substrings)?;
            validate(text)
        })
        .await
    }

    async fn run<T, V>(&self, prompt: &str, policy: &RetryPolicy, validate: V) -> Option<T>
    where
        V: FnMut(&str) -> OracleResult<T>,
    {
        let generator = &self.generator;
        let size = policy.size_class;

        let (outcome, history) = retry_with_history(
            prompt,
            policy.max_attempts,
            |_| generator.generate(prompt, size),
            validate,
        )
        .await;

        if policy.log_attempts {
            self.record(&outcome, &history).await;
        }

        match outcome {
            GenerationOutcome::Success { value, .. } => Some(value),
            GenerationOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                error!(attempts, error = ?last_error, "Failed to generate valid output");
                None
            }
        }
    }

    async fn record<T>(&self, outcome: &GenerationOutcome<T>, history: &[GenerationAttempt]) {
        let Some(log) = &self.log else {
            return;
        };

        for attempt in history.iter().filter(|attempt| !attempt.satisfied_constraints) {
            let content = match (&attempt.error, &attempt.result_text) {
                (Some(err), Some(text)) => format!("{err}\n\nPrediction: {text}"),
                (Some(err), None) => err.clone(),
                (None, _) => continue,
            };
            if let Err(err) = log.append(&content).await {
                warn!(error = %err, "failed to write diagnostic log entry");
            }
        }

        if let GenerationOutcome::Exhausted {
            attempts,
            last_error: Some(err),
        } = outcome
        {
            let content =
                format!("Failed to generate valid prediction after {attempts} attempts due error: {err}");
            if let Err(err) = log.append(&content).await {
                warn!(error = %err, "failed to write diagnostic log entry");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::SizeClass;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted responses in order; repeats the last one forever.
    pub(crate) struct ScriptedGenerator {
        responses: Vec<Result<String, String>>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, _size: SizeClass) -> anyhow::Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let index = call.min(self.responses.len() - 1);
            self.responses[index].clone().map_err(|e| anyhow!(e))
        }
    }

    #[derive(Default)]
    struct MemoryLog {
        entries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DiagnosticLog for MemoryLog {
        async fn append(&self, content: &str) -> OracleResult<()> {
            self.entries.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let stub = Arc::new(ScriptedGenerator::new(vec![
            Ok("no keyword here"),
            Ok(""),
            Ok("verdict: buy"),
        ]));
        let policy = RetryPolicy::default().with_required(["verdict"]);

        let generator = ConstrainedGenerator::new(stub.clone());
        let result = generator.generate_with_retry("prompt", &policy).await;

        assert_eq!(result.as_deref(), Some("verdict: buy"));
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test]
    async fn test_outcome_reports_attempt_count() {
        let calls = AtomicUsize::new(0);
        let outcome = retry_with_validation(
            3,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(anyhow!("capability down"))
                    } else {
                        Ok("fine".to_string())
                    }
                }
            },
            |text| Ok(text.len()),
        )
        .await;

        assert!(matches!(
            outcome,
            GenerationOutcome::Success {
                value: 4,
                attempts: 3
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_substrings_exhausts_attempts() {
        let stub = Arc::new(ScriptedGenerator::new(vec![Ok("nothing useful")]));
        let policy = RetryPolicy::default()
            .with_required(["verdict", "tldr"])
            .with_max_attempts(4);

        let generator = ConstrainedGenerator::new(stub.clone());
        let result = generator.generate_with_retry("prompt", &policy).await;

        assert!(result.is_none());
        assert_eq!(stub.calls(), 4);
    }

    #[tokio::test]
    async fn test_required_substrings_are_case_insensitive() {
        let stub = Arc::new(ScriptedGenerator::new(vec![Ok("TLDR: SELL now")]));
        let policy = RetryPolicy::default().with_required(["tldr"]);

        let result = ConstrainedGenerator::new(stub.clone())
            .generate_with_retry("prompt", &policy)
            .await;

        assert_eq!(result.as_deref(), Some("TLDR: SELL now"));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_capability_errors_count_as_attempts() {
        let stub = Arc::new(ScriptedGenerator::new(vec![Err("timeout")]));
        let policy = RetryPolicy::default();

        let result = ConstrainedGenerator::new(stub.clone())
            .generate_with_retry("prompt", &policy)
            .await;

        assert!(result.is_none());
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_written_to_diagnostic_log() {
        let stub = Arc::new(ScriptedGenerator::new(vec![Ok("plain text")]));
        let log = Arc::new(MemoryLog::default());
        let policy = RetryPolicy::default()
            .with_required(["buy"])
            .with_max_attempts(2);

        let result = ConstrainedGenerator::new(stub)
            .with_diagnostics(log.clone())
            .generate_with_retry("prompt", &policy)
            .await;

        assert!(result.is_none());
        let entries = log.entries.lock().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].contains("Prediction: plain text"));
        assert!(entries[2].starts_with("Failed to generate valid prediction after 2 attempts"));
    }

    #[tokio::test]
    async fn test_logging_disabled_by_policy() {
        let stub = Arc::new(ScriptedGenerator::new(vec![Ok("")]));
        let log = Arc::new(MemoryLog::default());
        let policy = RetryPolicy::builder().log_attempts(false).build().unwrap();

        ConstrainedGenerator::new(stub)
            .with_diagnostics(log.clone())
            .generate_with_retry("prompt", &policy)
            .await;

        assert!(log.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_into_result_maps_exhaustion() {
        let outcome: GenerationOutcome<String> = GenerationOutcome::Exhausted {
            attempts: 3,
            last_error: Some(OracleError::ValidationFailed("empty".to_string())),
        };
        assert_eq!(outcome.attempts(), 3);
        assert!(matches!(
            outcome.into_result(),
            Err(OracleError::GenerationFailed { attempts: 3, .. })
        ));
    }
}
