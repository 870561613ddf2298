//! The four workflow nodes: investigate, fix, validate, publish.
//!
//! Each node reads the current state snapshot, calls one collaborator, and
//! returns a partial update. Control flow decisions live in
//! [`crate::routing`], not here.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use mender_collab::{
    FixGenerator, FixRequest, FixValidator, LogFilter, LogSource, PublishStatus, Publisher,
};
use mender_graph::{Node, PartialUpdate, State};
use mender_types::Result;

use crate::analyst::Analyst;
use crate::state::{
    ERROR_LOGS, FIX_CODE, FIX_VALIDATED, ITERATION_COUNT, MESSAGES, PR_STATUS, PR_URL,
    ROOT_CAUSE_ANALYSIS, ROOT_CAUSE_IDENTIFIED, VALIDATION_ERRORS,
};

// Node names.
pub const INVESTIGATOR: &str = "investigator";
pub const MECHANIC: &str = "mechanic";
pub const VALIDATOR: &str = "validator";
pub const PUBLISHER: &str = "publisher";

// ---------------------------------------------------------------------------
// InvestigatorNode
// ---------------------------------------------------------------------------

/// Fetches logs and derives a root-cause analysis. This is the retry-entry
/// node of the self-correction loop: each entry is one attempt cycle, and
/// accumulated validation feedback is handed to the analyst so later cycles
/// can reconsider.
pub struct InvestigatorNode {
    logs: Arc<dyn LogSource>,
    analyst: Arc<dyn Analyst>,
    filter: LogFilter,
}

impl InvestigatorNode {
    pub fn new(logs: Arc<dyn LogSource>, analyst: Arc<dyn Analyst>, filter: LogFilter) -> Self {
        Self {
            logs,
            analyst,
            filter,
        }
    }
}

#[async_trait]
impl Node for InvestigatorNode {
    fn name(&self) -> &str {
        INVESTIGATOR
    }

    fn declared_outputs(&self) -> Vec<String> {
        vec![
            MESSAGES.into(),
            ERROR_LOGS.into(),
            ROOT_CAUSE_IDENTIFIED.into(),
            ROOT_CAUSE_ANALYSIS.into(),
        ]
    }

    async fn run(&self, state: &State) -> Result<PartialUpdate> {
        let prior_feedback = state.get_string_seq(VALIDATION_ERRORS);
        let logs = self.logs.fetch(&self.filter).await?;
        let analysis = self.analyst.analyze(&logs, &prior_feedback).await?;

        tracing::info!(
            identified = analysis.root_cause_identified,
            attempt = state.get_u64(ITERATION_COUNT),
            "investigation finished"
        );

        let mut update = PartialUpdate::new()
            .with(MESSAGES, format!("investigation: {}", analysis.report))
            .with(ROOT_CAUSE_IDENTIFIED, analysis.root_cause_identified)
            .with(ROOT_CAUSE_ANALYSIS, analysis.report);
        if !logs.is_empty() {
            update.insert(ERROR_LOGS, logs);
        }
        Ok(update)
    }
}

// ---------------------------------------------------------------------------
// MechanicNode
// ---------------------------------------------------------------------------

/// Asks the fix generator for candidate code, handing it the analysis plus
/// every rejection collected so far, and strips any markdown code fences
/// from the reply.
pub struct MechanicNode {
    generator: Arc<dyn FixGenerator>,
}

impl MechanicNode {
    pub fn new(generator: Arc<dyn FixGenerator>) -> Self {
        Self { generator }
    }
}

/// Extract the body of the first fenced code block, or the trimmed text
/// when no fence is present.
fn strip_code_fences(reply: &str) -> String {
    let fence = regex::Regex::new(r"(?s)```[A-Za-z0-9_+-]*\r?\n(.*?)```").unwrap();
    match fence.captures(reply) {
        Some(caps) => caps[1].trim().to_string(),
        None => reply.trim().to_string(),
    }
}

#[async_trait]
impl Node for MechanicNode {
    fn name(&self) -> &str {
        MECHANIC
    }

    fn declared_outputs(&self) -> Vec<String> {
        vec![MESSAGES.into(), FIX_CODE.into(), FIX_VALIDATED.into()]
    }

    async fn run(&self, state: &State) -> Result<PartialUpdate> {
        let request = FixRequest {
            analysis: state.get_str(ROOT_CAUSE_ANALYSIS, "").to_string(),
            prior_errors: state.get_string_seq(VALIDATION_ERRORS),
            original_code: None,
        };
        let reply = self.generator.generate(&request).await?;
        let code = strip_code_fences(&reply);

        tracing::info!(chars = code.len(), "fix generated");

        Ok(PartialUpdate::new()
            .with(
                MESSAGES,
                format!("mechanic: generated a candidate fix ({} chars)", code.len()),
            )
            .with(FIX_CODE, code)
            // Every fresh candidate starts unvalidated.
            .with(FIX_VALIDATED, false))
    }
}

// ---------------------------------------------------------------------------
// ValidatorNode
// ---------------------------------------------------------------------------

/// Hands the candidate fix to the validator. Findings land on the
/// `append`-policy feedback field so each loop-back cycle sees the full
/// rejection history. An empty candidate fails without bothering the
/// collaborator.
pub struct ValidatorNode {
    validator: Arc<dyn FixValidator>,
}

impl ValidatorNode {
    pub fn new(validator: Arc<dyn FixValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Node for ValidatorNode {
    fn name(&self) -> &str {
        VALIDATOR
    }

    fn declared_outputs(&self) -> Vec<String> {
        vec![
            MESSAGES.into(),
            FIX_VALIDATED.into(),
            VALIDATION_ERRORS.into(),
        ]
    }

    async fn run(&self, state: &State) -> Result<PartialUpdate> {
        let fix = state.get_str(FIX_CODE, "");
        if fix.trim().is_empty() {
            tracing::warn!("no fix code to validate");
            return Ok(PartialUpdate::new()
                .with(MESSAGES, "validation failed: no fix code to validate")
                .with(FIX_VALIDATED, false)
                .with(VALIDATION_ERRORS, "no fix code provided"));
        }

        let verdict = self.validator.validate(fix).await?;
        if verdict.passed {
            tracing::info!("fix validated");
            Ok(PartialUpdate::new()
                .with(MESSAGES, "validation passed")
                .with(FIX_VALIDATED, true))
        } else {
            tracing::info!(findings = verdict.errors.len(), "fix rejected");
            Ok(PartialUpdate::new()
                .with(
                    MESSAGES,
                    format!("validation failed: {}", verdict.errors.join("; ")),
                )
                .with(FIX_VALIDATED, false)
                .with(VALIDATION_ERRORS, json!(verdict.errors)))
        }
    }
}

// ---------------------------------------------------------------------------
// PublisherNode
// ---------------------------------------------------------------------------

/// Ships the validated fix for review. Reached at most once per run, on the
/// terminal-success path only.
pub struct PublisherNode {
    publisher: Arc<dyn Publisher>,
}

impl PublisherNode {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

/// Title capped at 72 chars for clean log display.
fn review_title(analysis: &str) -> String {
    let summary: String = analysis.chars().take(72).collect();
    format!("[automated fix] {summary}")
}

#[async_trait]
impl Node for PublisherNode {
    fn name(&self) -> &str {
        PUBLISHER
    }

    fn declared_outputs(&self) -> Vec<String> {
        vec![MESSAGES.into(), PR_STATUS.into(), PR_URL.into()]
    }

    async fn run(&self, state: &State) -> Result<PartialUpdate> {
        let analysis = state.get_str(ROOT_CAUSE_ANALYSIS, "unknown root cause");
        let cycles = state.get_u64(ITERATION_COUNT).max(1);
        let description = format!(
            "{title}\n\n## root cause\n{analysis}\n\n## validation\n\
             accepted after {cycles} remediation cycle(s)\n\n\
             This change was generated automatically; review carefully before merging.",
            title = review_title(analysis),
        );

        let receipt = self
            .publisher
            .publish(state.get_str(FIX_CODE, ""), &description)
            .await?;

        let status = match receipt.status {
            PublishStatus::Created => "created",
            PublishStatus::Failed => "failed",
        };
        tracing::info!(status, url = %receipt.url, "publish finished");

        Ok(PartialUpdate::new()
            .with(MESSAGES, format!("publisher: {status} {}", receipt.url))
            .with(PR_STATUS, status)
            .with(PR_URL, receipt.url))
    }
}
