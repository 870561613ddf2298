//! State schema of the self-healing workflow.
//!
//! One declared merge policy per field. The transcript (`messages`) and the
//! validation feedback both use `append` so loop-back cycles accumulate
//! context instead of replacing it; everything else is `overwrite`.

use serde_json::json;

use mender_graph::{MergePolicy, PartialUpdate, StateSchema};

// Field names.
pub const MESSAGES: &str = "messages";
pub const ERROR_LOGS: &str = "error_logs";
pub const ROOT_CAUSE_IDENTIFIED: &str = "root_cause_identified";
pub const ROOT_CAUSE_ANALYSIS: &str = "root_cause_analysis";
pub const FIX_CODE: &str = "fix_code";
pub const FIX_VALIDATED: &str = "fix_validated";
pub const VALIDATION_ERRORS: &str = "validation_errors";
pub const PR_STATUS: &str = "pr_status";
pub const PR_URL: &str = "pr_url";
pub const ITERATION_COUNT: &str = "iteration_count";
pub const ERROR_TIMESTAMP: &str = "error_timestamp";

/// The full field set with its merge policies and defaults.
pub fn schema() -> StateSchema {
    StateSchema::builder()
        // Running transcript of what each step did.
        .field(MESSAGES, MergePolicy::Append)
        // Investigation phase.
        .field_with_default(ERROR_LOGS, MergePolicy::Overwrite, json!(""))
        .field_with_default(ROOT_CAUSE_IDENTIFIED, MergePolicy::Overwrite, json!(false))
        .field_with_default(ROOT_CAUSE_ANALYSIS, MergePolicy::Overwrite, json!(""))
        // Fix generation phase.
        .field_with_default(FIX_CODE, MergePolicy::Overwrite, json!(""))
        .field_with_default(FIX_VALIDATED, MergePolicy::Overwrite, json!(false))
        // Feedback accumulates across self-correction cycles.
        .field(VALIDATION_ERRORS, MergePolicy::Append)
        // Publication phase.
        .field_with_default(PR_STATUS, MergePolicy::Overwrite, json!("pending"))
        .field_with_default(PR_URL, MergePolicy::Overwrite, json!(""))
        // Control flow.
        .field_with_default(ITERATION_COUNT, MergePolicy::Overwrite, json!(0))
        .field_with_default(ERROR_TIMESTAMP, MergePolicy::Overwrite, json!(""))
        .build()
}

/// Initial values for a new run: the triggering alert seeds the transcript
/// and the detection time is stamped.
pub fn initial_state(alert: &str) -> PartialUpdate {
    PartialUpdate::new()
        .with(MESSAGES, alert)
        .with(ERROR_TIMESTAMP, chrono::Utc::now().to_rfc3339())
}
