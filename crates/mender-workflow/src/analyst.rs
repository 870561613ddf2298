//! Root-cause analyst: turns raw logs into an analysis the mechanic can act
//! on, plus a confidence signal that drives routing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mender_types::{MenderError, Result};

/// What the analyst concluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Human-readable root-cause report.
    pub report: String,
    /// Whether the analyst is confident it found the root cause. Routing
    /// loops the investigation until this is true or the cycle guard trips.
    pub root_cause_identified: bool,
}

/// Derives a root-cause analysis from fetched logs and any validation
/// feedback accumulated by earlier cycles.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(&self, logs: &str, prior_feedback: &[String]) -> Result<Analysis>;
}

// ---------------------------------------------------------------------------
// SignatureAnalyst
// ---------------------------------------------------------------------------

/// Scans logs for known failure signatures. The first matching line becomes
/// the root-cause report; no match means the investigation stays open.
pub struct SignatureAnalyst {
    signatures: Vec<String>,
}

impl SignatureAnalyst {
    pub fn new(signatures: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            signatures: signatures.into_iter().map(Into::into).collect(),
        }
    }

    /// Signatures for the usual production suspects.
    pub fn with_default_signatures() -> Self {
        Self::new([
            "KeyError",
            "AttributeError",
            "TypeError",
            "NullPointerException",
            "panicked at",
            "segmentation fault",
            "Traceback",
        ])
    }
}

impl Default for SignatureAnalyst {
    fn default() -> Self {
        Self::with_default_signatures()
    }
}

#[async_trait]
impl Analyst for SignatureAnalyst {
    async fn analyze(&self, logs: &str, prior_feedback: &[String]) -> Result<Analysis> {
        let lowered_signatures: Vec<String> =
            self.signatures.iter().map(|s| s.to_lowercase()).collect();

        let hit = logs.lines().find_map(|line| {
            let lowered = line.to_lowercase();
            lowered_signatures
                .iter()
                .position(|sig| lowered.contains(sig.as_str()))
                .map(|idx| (self.signatures[idx].clone(), line.trim().to_string()))
        });

        match hit {
            Some((signature, line)) => {
                let mut report =
                    format!("root cause: {signature} failure observed in logs: {line}");
                if !prior_feedback.is_empty() {
                    report.push_str(&format!(
                        "; reconsidered after {} rejected fix attempt(s), latest: {}",
                        prior_feedback.len(),
                        prior_feedback[prior_feedback.len() - 1]
                    ));
                }
                Ok(Analysis {
                    report,
                    root_cause_identified: true,
                })
            }
            None => Ok(Analysis {
                report: "no known failure signature in the fetched logs; more data needed"
                    .to_string(),
                root_cause_identified: false,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedAnalyst
// ---------------------------------------------------------------------------

/// Deterministic double: hands out canned analyses in order.
#[derive(Default)]
pub struct ScriptedAnalyst {
    analyses: tokio::sync::Mutex<VecDeque<Analysis>>,
    calls: AtomicUsize,
}

impl ScriptedAnalyst {
    pub fn new(analyses: impl IntoIterator<Item = Analysis>) -> Self {
        Self {
            analyses: tokio::sync::Mutex::new(analyses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyst for ScriptedAnalyst {
    async fn analyze(&self, _logs: &str, _prior_feedback: &[String]) -> Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.analyses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| MenderError::Collaborator {
                collaborator: "analyst".into(),
                message: "scripted analyses exhausted".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signature_analyst_identifies_known_failure() {
        let analyst = SignatureAnalyst::with_default_signatures();
        let logs = "INFO all fine\nERROR KeyError: 'api_key' at handler.py:42";
        let analysis = analyst.analyze(logs, &[]).await.unwrap();

        assert!(analysis.root_cause_identified);
        assert!(analysis.report.contains("KeyError"));
        assert!(analysis.report.contains("handler.py:42"));
    }

    #[tokio::test]
    async fn signature_match_is_case_insensitive() {
        let analyst = SignatureAnalyst::new(["keyerror"]);
        let analysis = analyst
            .analyze("ERROR KeyError: missing", &[])
            .await
            .unwrap();
        assert!(analysis.root_cause_identified);
    }

    #[tokio::test]
    async fn no_signature_leaves_investigation_open() {
        let analyst = SignatureAnalyst::with_default_signatures();
        let analysis = analyst
            .analyze("INFO nothing suspicious here", &[])
            .await
            .unwrap();
        assert!(!analysis.root_cause_identified);
        assert!(analysis.report.contains("more data needed"));
    }

    #[tokio::test]
    async fn prior_feedback_shows_up_in_the_report() {
        let analyst = SignatureAnalyst::with_default_signatures();
        let feedback = vec!["syntax error at line 3".to_string()];
        let analysis = analyst
            .analyze("ERROR Traceback (most recent call last)", &feedback)
            .await
            .unwrap();
        assert!(analysis.report.contains("1 rejected fix attempt"));
        assert!(analysis.report.contains("syntax error at line 3"));
    }

    #[tokio::test]
    async fn scripted_analyst_pops_in_order_then_errors() {
        let analyst = ScriptedAnalyst::new([
            Analysis {
                report: "unclear".into(),
                root_cause_identified: false,
            },
            Analysis {
                report: "found it".into(),
                root_cause_identified: true,
            },
        ]);

        assert!(!analyst.analyze("", &[]).await.unwrap().root_cause_identified);
        assert!(analyst.analyze("", &[]).await.unwrap().root_cause_identified);
        assert_eq!(analyst.calls(), 2);

        let err = analyst.analyze("", &[]).await.unwrap_err();
        assert!(matches!(err, MenderError::Collaborator { .. }));
    }
}
