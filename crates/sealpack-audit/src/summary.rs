//! Optional AI summary of audit findings.
//!
//! `summarize_findings` is a pure orchestration-boundary function: the
//! scanner never calls it. It never fails; every reason a summary could not
//! be produced becomes a `SummaryOutcome::Note`.

use tracing::{debug, warn};

use sealpack_contracts::audit::{AuditFinding, SummaryOutcome};
use sealpack_core::traits::Summarizer;

/// Summarize `findings` with `summarizer` if a credential is available.
pub fn summarize_findings(
    findings: &[AuditFinding],
    api_key: Option<&str>,
    summarizer: &dyn Summarizer,
) -> SummaryOutcome {
    let Some(key) = api_key.filter(|k| !k.trim().is_empty()) else {
        debug!("no summarizer credential configured");
        return SummaryOutcome::Note(
            "AI summary skipped: no API key configured for the summarizer".to_string(),
        );
    };

    if findings.is_empty() {
        return SummaryOutcome::Note("AI summary skipped: no findings to summarize".to_string());
    }

    match summarizer.summarize(&build_prompt(findings), key) {
        Ok(text) if !text.trim().is_empty() => SummaryOutcome::Summary(text.trim().to_string()),
        Ok(_) => SummaryOutcome::Note("AI summary unavailable: empty response".to_string()),
        Err(e) => {
            warn!(error = %e, "summarizer failed, continuing without summary");
            SummaryOutcome::Note(format!("AI summary unavailable: {}", e))
        }
    }
}

/// Render findings as the user prompt.
pub fn build_prompt(findings: &[AuditFinding]) -> String {
    let total: u64 = findings.iter().map(|f| f.score).sum();
    let mut prompt = format!(
        "Static audit of an npm package produced {} finding(s) with total risk score {}.\n\
         Explain in a short paragraph what these patterns could mean and whether the \
         package looks safe to install.\n\n",
        findings.len(),
        total
    );
    for f in findings {
        prompt.push_str(&format!("- {} [{}] {} (+{})\n", f.file, f.rule, f.reason, f.score));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use sealpack_contracts::error::{SealpackError, SealpackResult};

    use super::*;

    struct MockSummarizer {
        reply: Result<String, String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Summarizer for MockSummarizer {
        fn summarize(&self, prompt: &str, _api_key: &str) -> SealpackResult<String> {
            self.calls.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|reason| SealpackError::ExternalTool {
                tool: "mock".to_string(),
                reason,
            })
        }
    }

    fn finding() -> AuditFinding {
        AuditFinding {
            file: "index.js".to_string(),
            reason: "use of eval".to_string(),
            rule: "eval".to_string(),
            score: 5,
        }
    }

    fn mock(reply: Result<String, String>) -> (MockSummarizer, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(vec![]));
        (
            MockSummarizer {
                reply,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[test]
    fn missing_credential_is_a_note_and_skips_service() {
        let (s, calls) = mock(Ok("summary".to_string()));
        let out = summarize_findings(&[finding()], None, &s);
        assert!(matches!(out, SummaryOutcome::Note(ref n) if n.contains("no API key")));
        assert!(calls.lock().unwrap().is_empty());

        let out = summarize_findings(&[finding()], Some("  "), &s);
        assert!(matches!(out, SummaryOutcome::Note(_)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn service_failure_becomes_note() {
        let (s, calls) = mock(Err("connection refused".to_string()));
        let out = summarize_findings(&[finding()], Some("sk-test"), &s);
        assert!(matches!(out, SummaryOutcome::Note(ref n) if n.contains("connection refused")));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn successful_summary_is_returned_trimmed() {
        let (s, calls) = mock(Ok("  Looks risky.\n".to_string()));
        let out = summarize_findings(&[finding()], Some("sk-test"), &s);
        assert_eq!(out, SummaryOutcome::Summary("Looks risky.".to_string()));
        assert!(calls.lock().unwrap()[0].contains("index.js [eval] use of eval (+5)"));
    }

    #[test]
    fn no_findings_skips_service() {
        let (s, calls) = mock(Ok("x".to_string()));
        let out = summarize_findings(&[], Some("sk-test"), &s);
        assert!(matches!(out, SummaryOutcome::Note(_)));
        assert!(calls.lock().unwrap().is_empty());
    }
}
