// Error taxonomy for the production orchestrator
// Every failure crossing a component boundary is one of these kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProductionError {
    /// The budget tracker denied a reservation. Never retried.
    #[error("over budget: requested ${requested:.2}, remaining ${remaining:.2}")]
    OverBudget { requested: f64, remaining: f64 },

    /// Network failure, 5xx, or rate limiting. Retried with back-off.
    #[error("transient provider failure: {0}")]
    ProviderTransient(String),

    /// 4xx (non-429), policy violation, or unsupported input. Never retried.
    #[error("permanent provider failure: {0}")]
    ProviderPermanent(String),

    /// API key absent or rejected at validation. The registry falls back to
    /// the mock provider for the affected capability.
    #[error("credentials missing or rejected for provider `{provider}`")]
    CredentialMissing { provider: String },

    /// Job still non-terminal past its deadline. Transient on the first
    /// occurrence, permanent thereafter.
    #[error("job `{job_id}` still pending after {timeout_secs}s")]
    PollTimeout { job_id: String, timeout_secs: u64 },

    /// Schema or range failure in an operation's inputs. Caller error.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// Failure writing the run journal. Fatal for the run, never swallowed.
    #[error("journal write failed: {0}")]
    JournalIo(String),

    /// Explicit cancellation. Terminal but not an error in reports.
    #[error("cancelled")]
    Cancelled,
}

impl ProductionError {
    /// Whether the retry layer may attempt this operation again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProductionError::ProviderTransient(_) | ProductionError::PollTimeout { .. }
        )
    }

    /// Stable kind tag for journal entries and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ProductionError::OverBudget { .. } => "over_budget",
            ProductionError::ProviderTransient(_) => "provider_transient",
            ProductionError::ProviderPermanent(_) => "provider_permanent",
            ProductionError::CredentialMissing { .. } => "credential_missing",
            ProductionError::PollTimeout { .. } => "poll_timeout",
            ProductionError::InputInvalid(_) => "input_invalid",
            ProductionError::JournalIo(_) => "journal_io",
            ProductionError::Cancelled => "cancelled",
        }
    }

    /// Process exit code mapping for the engine binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProductionError::OverBudget { .. } => 2,
            ProductionError::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type ProductionResult<T> = Result<T, ProductionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProductionError::ProviderTransient("503".into()).is_transient());
        assert!(ProductionError::PollTimeout {
            job_id: "j1".into(),
            timeout_secs: 300
        }
        .is_transient());
        assert!(!ProductionError::ProviderPermanent("400".into()).is_transient());
        assert!(!ProductionError::OverBudget {
            requested: 1.0,
            remaining: 0.5
        }
        .is_transient());
    }

    #[test]
    fn exit_codes_follow_process_contract() {
        assert_eq!(
            ProductionError::OverBudget {
                requested: 2.0,
                remaining: 1.0
            }
            .exit_code(),
            2
        );
        assert_eq!(ProductionError::Cancelled.exit_code(), 130);
        assert_eq!(ProductionError::JournalIo("disk full".into()).exit_code(), 1);
    }
}
