//! Subcommand implementations.
//!
//! Each function wires concrete capabilities from config, calls into the
//! library crates, and prints a human-readable result. Errors are returned
//! to `main`, which maps them to the command's exit code.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use sealpack_audit::{summarize_findings, ChatSummarizer, RuleSet, Scanner};
use sealpack_contracts::{
    audit::{AuditReport, SummaryOutcome},
    digest::Digest,
    error::{SealpackError, SealpackResult},
    install::{InstallOptions, InstallRequest, SignatureCheck, SignatureMaterial},
    log::{Action, LogEntry},
};
use sealpack_core::{
    config::{SealpackConfig, SignerBackend},
    digest::digest_file,
    traits::Extractor,
    InstallPipeline,
};
use sealpack_log::TransparencyLog;
use sealpack_sandbox::{orchestrator::TARGET_DIR, DockerRuntime, SandboxOrchestrator};
use sealpack_sign::{ed25519, signature_path};

use crate::source;

// ── keygen ───────────────────────────────────────────────────────────────────

pub fn keygen(cfg: &SealpackConfig, dir: Option<PathBuf>) -> SealpackResult<()> {
    let dir = dir.unwrap_or_else(|| cfg.keys.dir.clone());
    let signer = sealpack_sign::from_settings(&cfg.signer);
    let keys = signer.generate_keypair(&dir)?;

    let (_, root) = open_log(cfg).append(
        LogEntry::new(Action::Keygen)
            .with_note(format!("{} public key {}", signer.name(), keys.public_key.display())),
    )?;

    println!("Private key: {}", keys.private_key.display());
    println!("Public key:  {}", keys.public_key.display());
    println!("Merkle root: {}", root);
    Ok(())
}

// ── sign ─────────────────────────────────────────────────────────────────────

pub fn sign(cfg: &SealpackConfig, tarball: &Path, key: Option<PathBuf>) -> SealpackResult<()> {
    let key = key.unwrap_or_else(|| default_private_key(cfg));
    let signer = sealpack_sign::from_settings(&cfg.signer);

    let signature = signer.sign(tarball, &key)?;
    let hash = digest_file(tarball)?;

    let (_, root) = open_log(cfg).append(
        LogEntry::new(Action::Sign)
            .with_artifact(file_name(tarball))
            .with_hash(hash.clone())
            .with_signature(signature.display().to_string()),
    )?;

    println!("Signed {} ({})", tarball.display(), hash);
    println!("Signature:   {}", signature.display());
    println!("Merkle root: {}", root);
    Ok(())
}

// ── verify ───────────────────────────────────────────────────────────────────

pub fn verify(
    cfg: &SealpackConfig,
    tarball: &Path,
    signature: Option<PathBuf>,
    public_key: Option<PathBuf>,
) -> SealpackResult<()> {
    let signature = signature.unwrap_or_else(|| signature_path(tarball));
    let public_key = public_key.unwrap_or_else(|| default_public_key(cfg));
    let signer = sealpack_sign::from_settings(&cfg.signer);

    if !signer.verify(tarball, &signature, &public_key)? {
        return Err(SealpackError::SignatureVerification {
            artifact: tarball.display().to_string(),
            reason: format!(
                "signature '{}' does not verify against '{}'",
                signature.display(),
                public_key.display()
            ),
        });
    }
    let hash = digest_file(tarball)?;

    let (_, root) = open_log(cfg).append(
        LogEntry::new(Action::Verify)
            .with_artifact(file_name(tarball))
            .with_hash(hash.clone())
            .with_signature(signature.display().to_string()),
    )?;

    println!("Verification OK for {} ({})", tarball.display(), hash);
    println!("Merkle root: {}", root);
    Ok(())
}

// ── install ──────────────────────────────────────────────────────────────────

pub struct InstallArgs {
    pub spec: String,
    pub sha256: Option<Digest>,
    pub out: PathBuf,
    pub verify: bool,
    pub signature: Option<PathBuf>,
    pub public_key: Option<PathBuf>,
    pub max_risk: Option<u64>,
}

pub fn install(cfg: &SealpackConfig, args: InstallArgs) -> SealpackResult<()> {
    let workdir = tempfile::tempdir().map_err(|e| SealpackError::io(std::env::temp_dir(), e))?;
    let artifact = source::for_spec(&args.spec, &cfg.source).resolve(&args.spec, workdir.path())?;

    let signature = if args.verify {
        Some(SignatureMaterial {
            signature: args.signature.unwrap_or_else(|| signature_path(&artifact)),
            public_key: args.public_key.unwrap_or_else(|| default_public_key(cfg)),
        })
    } else {
        None
    };

    let request = InstallRequest {
        artifact,
        expected_digest: args.sha256,
        output_dir: args.out,
        options: InstallOptions {
            signature,
            max_risk_score: args.max_risk.or(cfg.audit.max_risk_score),
            sandbox: cfg.sandbox.clone(),
        },
    };

    let pipeline = InstallPipeline::new(
        sealpack_sign::from_settings(&cfg.signer),
        extractor(),
        Box::new(scanner(cfg)?),
        Box::new(open_log(cfg)),
    );
    let report = pipeline.install(&request)?;

    println!("Installed {}", report.artifact.display());
    println!("  state:       {}", report.state);
    println!("  sha256:      {}", report.digest);
    println!(
        "  signature:   {}",
        match report.signature {
            SignatureCheck::Verified => "verified",
            SignatureCheck::Skipped => "NOT CHECKED (run with --verify to check)",
        }
    );
    println!("  output:      {}", report.output_dir.join(TARGET_DIR).display());
    if let Some(audit) = &report.audit {
        println!("  risk score:  {}/100 ({} findings)", audit.score, audit.findings.len());
    }
    println!("  merkle root: {}", report.merkle_root);
    if !report.stdout.trim().is_empty() {
        println!("{}", report.stdout.trim_end());
    }
    Ok(())
}

// ── audit ────────────────────────────────────────────────────────────────────

pub fn audit(
    cfg: &SealpackConfig,
    package: &str,
    fail_above: Option<u64>,
    json: bool,
) -> SealpackResult<()> {
    let scanner = scanner(cfg)?;

    // A directory is scanned in place; anything else is fetched and
    // extracted into a scratch sandbox output first.
    let scratch = tempfile::tempdir().map_err(|e| SealpackError::io(std::env::temp_dir(), e))?;
    let root = if Path::new(package).is_dir() {
        PathBuf::from(package)
    } else {
        let tarball = source::for_spec(package, &cfg.source)
            .resolve(package, &scratch.path().join("fetch"))?;
        let out = scratch.path().join("out");
        let extractor = extractor();
        let (_, output) = extractor.extract(&tarball, &out, &cfg.sandbox)?;
        if !output.success() {
            return Err(SealpackError::Extraction {
                artifact: tarball.display().to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        extractor.extracted_root(&out)
    };

    debug!(root = %root.display(), "auditing package tree");
    let report = scanner.scan(&root)?;
    let summary = summarize(cfg, &report);

    if json {
        let doc = serde_json::json!({
            "findings": report.findings,
            "score": report.score,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
    } else {
        print_report(&report);
        match &summary {
            SummaryOutcome::Summary(text) => println!("\nAI summary:\n{}", text),
            SummaryOutcome::Note(note) => println!("\n{}", note),
        }
    }

    match fail_above {
        Some(threshold) if report.score > threshold => Err(SealpackError::RiskThresholdExceeded {
            score: report.score,
            threshold,
        }),
        _ => Ok(()),
    }
}

fn print_report(report: &AuditReport) {
    if report.is_clean() {
        println!("No risky patterns found. Risk score: 0/100");
        return;
    }
    println!("Findings:");
    for f in &report.findings {
        println!("  {:<40} {:<22} +{:<3} {}", f.file, f.rule, f.score, f.reason);
    }
    // The score is an unclamped sum; "/100" is presentation only.
    println!("Risk score: {}/100", report.score);
}

fn summarize(cfg: &SealpackConfig, report: &AuditReport) -> SummaryOutcome {
    let settings = &cfg.summarizer;
    let api_key = settings.api_key();
    let summarizer = match ChatSummarizer::new(
        settings.endpoint.clone(),
        settings.model.clone(),
        Duration::from_secs(settings.timeout_secs),
    ) {
        Ok(s) => s,
        Err(e) => return SummaryOutcome::Note(format!("AI summary unavailable: {}", e)),
    };
    summarize_findings(&report.findings, api_key.as_deref(), &summarizer)
}

// ── log view ─────────────────────────────────────────────────────────────────

pub fn log_view(cfg: &SealpackConfig, json: bool) -> SealpackResult<()> {
    let log = open_log(cfg);
    // Malformed or altered logs are errors here, never an empty listing.
    let Some(state) = log.read_strict()? else {
        println!("No transparency log at {}", log.path().display());
        return Ok(());
    };
    info!(entries = state.entries.len(), "transparency log verified");

    if json {
        println!("{}", serde_json::to_string_pretty(&state).unwrap_or_default());
        return Ok(());
    }
    for (i, e) in state.entries.iter().enumerate() {
        println!(
            "{:>4}  {}  {:<7}  {}  {}",
            i,
            e.timestamp,
            e.action.as_str(),
            e.artifact.as_deref().unwrap_or("-"),
            e.hash.as_ref().map(Digest::as_str).unwrap_or("-"),
        );
    }
    match &state.merkle_root {
        Some(root) => println!("Merkle root: {}", root),
        None => println!("Merkle root: (none, log is empty)"),
    }
    println!("Integrity: OK ({} entries)", state.entries.len());
    Ok(())
}

// ── doctor ───────────────────────────────────────────────────────────────────

/// Check the environment. Prints one line per check and fails if any
/// required check fails.
pub fn doctor(cfg: &SealpackConfig) -> SealpackResult<()> {
    let mut failed: Vec<&str> = Vec::new();
    let mut check = |name: &'static str, required: bool, result: Result<String, String>| {
        match result {
            Ok(detail) => println!("[ ok ] {:<12} {}", name, detail),
            Err(detail) if required => {
                println!("[FAIL] {:<12} {}", name, detail);
                failed.push(name);
            }
            Err(detail) => println!("[warn] {:<12} {}", name, detail),
        }
    };

    check(
        "docker",
        true,
        DockerRuntime::default()
            .probe()
            .map(|v| format!("server {}", v))
            .map_err(|e| e.to_string()),
    );

    check(
        "signer",
        true,
        match cfg.signer.backend {
            SignerBackend::Ed25519 => Ok("ed25519 (in-process)".to_string()),
            SignerBackend::Command => which(&cfg.signer.program),
        },
    );

    let private = default_private_key(cfg);
    let public = default_public_key(cfg);
    check(
        "keys",
        false,
        if private.is_file() && public.is_file() {
            Ok(format!("{}", cfg.keys.dir.display()))
        } else {
            Err(format!("no key pair in {} (run `sealpack keygen`)", cfg.keys.dir.display()))
        },
    );

    let log = open_log(cfg);
    check(
        "log",
        true,
        match log.read_strict() {
            Ok(None) => Ok(format!("{} (not created yet)", log.path().display())),
            Ok(Some(state)) => Ok(format!(
                "{} ({} entries, root verified)",
                log.path().display(),
                state.entries.len()
            )),
            Err(e) => Err(e.to_string()),
        },
    );

    check(
        "audit rules",
        true,
        scanner(cfg)
            .map(|_| match &cfg.audit.rules_path {
                Some(p) => format!("{}", p.display()),
                None => "built-in".to_string(),
            })
            .map_err(|e| e.to_string()),
    );

    check("npm", false, which(&cfg.source.npm_program));

    check(
        "summarizer",
        false,
        match cfg.summarizer.api_key() {
            Some(_) => Ok(format!("{} via {}", cfg.summarizer.model, cfg.summarizer.endpoint)),
            None => Err(format!("${} not set; AI summaries disabled", cfg.summarizer.api_key_env)),
        },
    );

    if failed.is_empty() {
        Ok(())
    } else {
        Err(SealpackError::ExternalTool {
            tool: "doctor".to_string(),
            reason: format!("failed checks: {}", failed.join(", ")),
        })
    }
}

fn which(program: &str) -> Result<String, String> {
    let args = vec!["--version".to_string()];
    match sealpack_core::process::run_with_timeout(
        program,
        &args,
        Duration::from_secs(10),
        "version probe",
    ) {
        Ok(out) if out.success() => Ok(format!("{} {}", program, out.stdout.trim())),
        Ok(out) => Err(format!("{} exited with code {}", program, out.exit_code)),
        Err(e) => Err(e.to_string()),
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────────

fn open_log(cfg: &SealpackConfig) -> TransparencyLog {
    TransparencyLog::new(cfg.log.path.clone())
}

fn extractor() -> Box<dyn Extractor> {
    Box::new(SandboxOrchestrator::new(Box::new(DockerRuntime::default())))
}

fn scanner(cfg: &SealpackConfig) -> SealpackResult<Scanner> {
    let rules = match &cfg.audit.rules_path {
        Some(path) => RuleSet::from_file(path)?,
        None => RuleSet::builtin(),
    };
    Ok(Scanner::new(rules))
}

fn default_private_key(cfg: &SealpackConfig) -> PathBuf {
    match cfg.signer.backend {
        SignerBackend::Ed25519 => cfg.keys.dir.join(ed25519::PRIVATE_KEY_FILE),
        SignerBackend::Command => cfg.keys.dir.join(&cfg.signer.private_key_file),
    }
}

fn default_public_key(cfg: &SealpackConfig) -> PathBuf {
    match cfg.signer.backend {
        SignerBackend::Ed25519 => cfg.keys.dir.join(ed25519::PUBLIC_KEY_FILE),
        SignerBackend::Command => cfg.keys.dir.join(&cfg.signer.public_key_file),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
