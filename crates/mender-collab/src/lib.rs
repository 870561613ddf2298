//! Collaborator contracts consumed by Mender workflows.
//!
//! The graph engine treats node bodies as opaque; the work they delegate —
//! fetching logs, generating a fix, judging a fix, publishing the result —
//! is specified here as trait boundaries. Real transports (monitoring
//! systems, model providers, forge APIs) live behind these traits and are
//! out of scope; this crate ships file-backed and scripted implementations
//! sufficient for workflows, demos, and tests.

pub mod generator;
pub mod logs;
pub mod publisher;
pub mod validator;

pub use generator::{FixGenerator, FixRequest, ScriptedFixGenerator};
pub use logs::{FileLogSource, LogFilter, LogSeverity, LogSource, StaticLogSource};
pub use publisher::{PublishReceipt, PublishStatus, Publisher, SimulatedPublisher};
pub use validator::{FixValidator, ScriptedValidator, Verdict};
