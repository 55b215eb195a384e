use std::fmt;
use std::sync::Arc;

use crate::models::CandidateRecord;
use crate::schema::SchemaValidator;
use crate::traits::{FormatRequest, Formatter};

/// Default bound on formatting attempts per item.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A record that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedRecord {
    pub record: CandidateRecord,
    /// Number of formatting attempts it took (1-based).
    pub attempts: u32,
}

/// No valid record could be produced within the attempt bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatFailure {
    pub attempts: u32,
    /// Errors of the last attempt.
    pub errors: Vec<String>,
}

impl fmt::Display for FormatFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no valid record after {} attempt(s): {}",
            self.attempts,
            self.errors.join("; ")
        )
    }
}

/// Bounded format → validate → retry cycle.
///
/// Attempt 1 sends the raw text and schema. Every later attempt also sends
/// the validation errors of the previous one as corrections. An invalid
/// candidate is never returned.
#[derive(Clone)]
pub struct ProduceValidateLoop<F: Formatter> {
    formatter: F,
    validator: Arc<SchemaValidator>,
    max_attempts: u32,
}

impl<F: Formatter> ProduceValidateLoop<F> {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(formatter: F, validator: Arc<SchemaValidator>, max_attempts: u32) -> Self {
        Self {
            formatter,
            validator,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn produce_valid(
        &self,
        identifier: &str,
        raw_text: &str,
    ) -> Result<ProducedRecord, FormatFailure> {
        let mut corrections: Vec<String> = Vec::new();
        let mut last_errors: Vec<String> = Vec::new();

        for attempt in 1..=self.max_attempts {
            let request = FormatRequest {
                identifier,
                raw_text,
                schema: self.validator.schema(),
                corrections: &corrections,
                attempt,
            };

            let raw = match self.formatter.format(&request).await {
                Ok(raw) => raw,
                Err(e) if e.is_retryable() => {
                    tracing::warn!(%identifier, attempt, error = %e, "Formatter call failed, retrying");
                    last_errors = vec![format!("formatter error: {e}")];
                    continue;
                }
                Err(e) => {
                    tracing::warn!(%identifier, attempt, error = %e, "Formatter call failed");
                    return Err(FormatFailure {
                        attempts: attempt,
                        errors: vec![format!("formatter error: {e}")],
                    });
                }
            };

            let (outcome, value) = self.validator.check_output(&raw);
            let errors = match (outcome.is_valid, value) {
                (true, Some(value)) => match serde_json::from_value::<CandidateRecord>(value) {
                    Ok(record) => {
                        tracing::debug!(%identifier, attempt, "Candidate passed validation");
                        return Ok(ProducedRecord {
                            record,
                            attempts: attempt,
                        });
                    }
                    Err(e) => vec![format!("record does not fit the listing shape: {e}")],
                },
                _ => outcome.errors,
            };

            tracing::info!(
                %identifier,
                attempt,
                max_attempts = self.max_attempts,
                errors = %errors.join("; "),
                "Candidate failed validation"
            );
            corrections = errors.clone();
            last_errors = errors;
        }

        Err(FormatFailure {
            attempts: self.max_attempts,
            errors: last_errors,
        })
    }
}
