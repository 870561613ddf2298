//! Fix validator: judges a candidate fix and reports ordered findings.
//!
//! What "valid" means — syntax checks, simulated test runs, policy lints —
//! is entirely the implementation's business. The workflow only consumes
//! the verdict.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mender_types::{MenderError, Result};

/// Outcome of validating a candidate fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    /// Findings in the order the validator produced them; empty on pass.
    pub errors: Vec<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
        }
    }

    pub fn fail(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            passed: false,
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }
}

/// Judges candidate fix code.
#[async_trait]
pub trait FixValidator: Send + Sync {
    async fn validate(&self, code: &str) -> Result<Verdict>;
}

// ---------------------------------------------------------------------------
// ScriptedValidator
// ---------------------------------------------------------------------------

/// Deterministic double: hands out a queue of canned verdicts. Fails once
/// the script runs dry.
#[derive(Default)]
pub struct ScriptedValidator {
    verdicts: tokio::sync::Mutex<VecDeque<Verdict>>,
    calls: AtomicUsize,
}

impl ScriptedValidator {
    pub fn new(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            verdicts: tokio::sync::Mutex::new(verdicts.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A validator that rejects `failures` times with the given finding,
    /// then passes.
    pub fn failing_then_passing(failures: usize, finding: &str) -> Self {
        let mut verdicts: VecDeque<Verdict> = (0..failures)
            .map(|i| Verdict::fail([format!("{finding} (cycle {})", i + 1)]))
            .collect();
        verdicts.push_back(Verdict::pass());
        Self {
            verdicts: tokio::sync::Mutex::new(verdicts),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FixValidator for ScriptedValidator {
    async fn validate(&self, _code: &str) -> Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdicts
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| MenderError::Collaborator {
                collaborator: "fix_validator".into(),
                message: "scripted verdicts exhausted".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verdicts_come_out_in_order() {
        let validator = ScriptedValidator::new([Verdict::fail(["broken"]), Verdict::pass()]);

        let first = validator.validate("candidate").await.unwrap();
        assert!(!first.passed);
        assert_eq!(first.errors, vec!["broken"]);

        let second = validator.validate("candidate").await.unwrap();
        assert!(second.passed);
        assert!(second.errors.is_empty());
        assert_eq!(validator.calls(), 2);
    }

    #[tokio::test]
    async fn failing_then_passing_shape() {
        let validator = ScriptedValidator::failing_then_passing(2, "tests failed");

        assert!(!validator.validate("x").await.unwrap().passed);
        let second = validator.validate("x").await.unwrap();
        assert!(!second.passed);
        assert_eq!(second.errors, vec!["tests failed (cycle 2)"]);
        assert!(validator.validate("x").await.unwrap().passed);
    }

    #[tokio::test]
    async fn exhausted_script_is_a_collaborator_error() {
        let validator = ScriptedValidator::new([]);
        let err = validator.validate("x").await.unwrap_err();
        assert!(matches!(
            err,
            MenderError::Collaborator { ref collaborator, .. } if collaborator == "fix_validator"
        ));
    }

    #[test]
    fn verdict_serialization() {
        let verdict = Verdict::fail(["a", "b"]);
        let json = serde_json::to_string(&verdict).unwrap();
        let restored: Verdict = serde_json::from_str(&json).unwrap();
        assert!(!restored.passed);
        assert_eq!(restored.errors, vec!["a", "b"]);
    }
}
