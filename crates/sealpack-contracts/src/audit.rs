//! Static audit findings and reports.
//!
//! These are produced transiently by one scan and never persisted.

use serde::{Deserialize, Serialize};

/// One rule match in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFinding {
    /// Path of the matching file, relative to the scan root.
    pub file: String,
    /// Human-readable description of the risky pattern.
    pub reason: String,
    /// Identifier of the rule that matched.
    pub rule: String,
    /// Score this finding contributes to the report total.
    pub score: u64,
}

/// All findings from one scan plus their aggregate score.
///
/// `score` is the plain sum of finding scores. It is not clamped or
/// normalized; callers interpret magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
    pub score: u64,
}

impl AuditReport {
    /// Build a report whose score is the sum of `findings`.
    pub fn from_findings(findings: Vec<AuditFinding>) -> Self {
        let score = findings.iter().map(|f| f.score).sum();
        Self { findings, score }
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// The result of the optional AI summarization step.
///
/// Summarization never fails the caller: a missing credential or a service
/// error becomes a `Note`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryOutcome {
    Summary(String),
    Note(String),
}
