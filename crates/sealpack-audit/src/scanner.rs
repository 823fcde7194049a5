//! Directory scanner.
//!
//! Traversal is depth-first with entries sorted by file name, so two scans
//! of the same tree produce findings in the same order. Symbolic links are
//! never followed and, like other non-regular files, are skipped.

use std::{fs, path::Path};

use tracing::{debug, info};
use walkdir::WalkDir;

use sealpack_contracts::{
    audit::{AuditFinding, AuditReport},
    error::{SealpackError, SealpackResult},
};
use sealpack_core::traits::PackageAuditor;

use crate::rule::RuleSet;

/// Static pattern scanner over a file tree.
#[derive(Debug, Clone)]
pub struct Scanner {
    rules: RuleSet,
}

impl Scanner {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Scanner with the embedded default rules.
    pub fn builtin() -> Self {
        Self::new(RuleSet::builtin())
    }

    /// Scan every relevant regular file under `root`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `root` is not a directory; `Io` if any directory or
    /// relevant file cannot be read. A partial report is never returned.
    pub fn scan(&self, root: &Path) -> SealpackResult<AuditReport> {
        if !root.is_dir() {
            return Err(SealpackError::not_found("audit directory", root));
        }

        let mut findings = Vec::new();
        let mut scanned = 0usize;

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| SealpackError::Io {
                path: e
                    .path()
                    .unwrap_or(root)
                    .display()
                    .to_string(),
                reason: e.to_string(),
            })?;

            if !entry.file_type().is_file() {
                if entry.path_is_symlink() {
                    debug!(path = %entry.path().display(), "skipping symlink");
                }
                continue;
            }
            if !self.rules.is_relevant(entry.path()) {
                continue;
            }

            let bytes = fs::read(entry.path()).map_err(|e| SealpackError::io(entry.path(), e))?;
            let text = String::from_utf8_lossy(&bytes);
            let relative = display_relative(root, entry.path());
            scanned += 1;

            for compiled in self.rules.rules() {
                if compiled.regex.is_match(&text) {
                    debug!(file = %relative, rule_id = %compiled.rule.id, "audit rule matched");
                    findings.push(AuditFinding {
                        file: relative.clone(),
                        reason: compiled.rule.reason.clone(),
                        rule: compiled.rule.id.clone(),
                        score: compiled.rule.score,
                    });
                }
            }
        }

        let report = AuditReport::from_findings(findings);
        info!(
            root = %root.display(),
            files_scanned = scanned,
            findings = report.findings.len(),
            score = report.score,
            "audit scan complete"
        );
        Ok(report)
    }
}

impl PackageAuditor for Scanner {
    fn scan(&self, root: &Path) -> SealpackResult<AuditReport> {
        Scanner::scan(self, root)
    }
}

/// `root`-relative path with `/` separators.
fn display_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
