//! sealpack — supply-chain-secure package installer.
//!
//! Hashes, optionally verifies, and extracts npm package tarballs inside a
//! locked-down sandbox, audits package source for risky patterns, and keeps
//! a Merkle-rooted transparency log of every key, signature, verification,
//! and install.
//!
//! Usage:
//!   sealpack keygen
//!   sealpack sign left-pad-1.3.0.tgz
//!   sealpack verify left-pad-1.3.0.tgz
//!   sealpack install left-pad@1.3.0 --sha256 <hex> --verify
//!   sealpack audit ./node_modules/left-pad
//!   sealpack log view
//!   sealpack doctor

mod commands;
mod source;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sealpack_contracts::{digest::Digest, error::SealpackError};
use sealpack_core::config::SealpackConfig;

use commands::InstallArgs;

// ── CLI definition ────────────────────────────────────────────────────────────

/// sealpack — hash, verify, audit, and sandbox-install packages.
#[derive(Parser)]
#[command(
    name = "sealpack",
    version,
    about = "Supply-chain-secure package installer",
    long_about = "Hashes, verifies, audits, and extracts packages inside a network-isolated,\n\
                  read-only sandbox. Every signing, verification, and install is appended to\n\
                  a Merkle-rooted transparency log."
)]
struct Cli {
    /// Config file. Defaults to ./sealpack.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a signing key pair.
    Keygen {
        /// Output directory (default: [keys] dir).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Sign a tarball, writing <tarball>.sig.
    Sign {
        tarball: PathBuf,
        /// Private key (default: from [keys] dir).
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Verify a tarball's detached signature.
    Verify {
        tarball: PathBuf,
        /// Signature file (default: <tarball>.sig).
        #[arg(long)]
        sig: Option<PathBuf>,
        /// Public key (default: from [keys] dir).
        #[arg(long = "pub")]
        public_key: Option<PathBuf>,
    },
    /// Fetch, check, and extract a package inside the sandbox.
    Install {
        /// Local tarball path or registry spec (name[@version]).
        spec: String,
        /// Expected SHA-256 of the tarball. Install aborts on mismatch.
        #[arg(long)]
        sha256: Option<Digest>,
        /// Extraction output directory. Its `package/` must be absent or empty.
        #[arg(long, default_value = "sealpack-out")]
        out: PathBuf,
        /// Verify the tarball's signature before extracting.
        #[arg(long)]
        verify: bool,
        /// Signature file (default: <tarball>.sig).
        #[arg(long, requires = "verify")]
        sig: Option<PathBuf>,
        /// Public key (default: from [keys] dir).
        #[arg(long = "pub", requires = "verify")]
        public_key: Option<PathBuf>,
        /// Audit the extracted tree and abort above this score.
        #[arg(long)]
        max_risk: Option<u64>,
    },
    /// Statically scan a package for risky patterns.
    Audit {
        /// Directory, local tarball, or registry spec.
        package: String,
        /// Exit non-zero when the score exceeds this value.
        #[arg(long)]
        fail_above: Option<u64>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect the transparency log.
    Log {
        #[command(subcommand)]
        command: LogCommand,
    },
    /// Check that docker, signer, keys, log, and rules are usable.
    Doctor,
}

#[derive(Subcommand)]
enum LogCommand {
    /// Print entries and check the Merkle root.
    View {
        /// Print the raw log document.
        #[arg(long)]
        json: bool,
    },
}

// ── Exit codes ────────────────────────────────────────────────────────────────

/// Invalid configuration or arguments, for every command.
const EXIT_CONFIG: i32 = 64;

impl Command {
    /// Distinct failure code per command, so scripts can branch on it.
    fn exit_code(&self) -> i32 {
        match self {
            Command::Keygen { .. } => 1,
            Command::Sign { .. } => 2,
            Command::Verify { .. } => 3,
            Command::Install { .. } => 4,
            Command::Audit { .. } => 5,
            Command::Log { .. } => 6,
            Command::Doctor => 7,
        }
    }
}

fn exit_code_for(command: &Command, err: &SealpackError) -> i32 {
    match err {
        SealpackError::Config { .. } => EXIT_CONFIG,
        _ => command.exit_code(),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for step-by-step pipeline output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let cfg = match SealpackConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("sealpack: {}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(e) = run(&cfg, &cli.command) {
        eprintln!("sealpack: {}", e);
        std::process::exit(exit_code_for(&cli.command, &e));
    }
}

fn run(cfg: &SealpackConfig, command: &Command) -> sealpack_contracts::error::SealpackResult<()> {
    match command {
        Command::Keygen { dir } => commands::keygen(cfg, dir.clone()),
        Command::Sign { tarball, key } => commands::sign(cfg, tarball, key.clone()),
        Command::Verify {
            tarball,
            sig,
            public_key,
        } => commands::verify(cfg, tarball, sig.clone(), public_key.clone()),
        Command::Install {
            spec,
            sha256,
            out,
            verify,
            sig,
            public_key,
            max_risk,
        } => commands::install(
            cfg,
            InstallArgs {
                spec: spec.clone(),
                sha256: sha256.clone(),
                out: out.clone(),
                verify: *verify,
                signature: sig.clone(),
                public_key: public_key.clone(),
                max_risk: *max_risk,
            },
        ),
        Command::Audit {
            package,
            fail_above,
            json,
        } => commands::audit(cfg, package, *fail_above, *json),
        Command::Log {
            command: LogCommand::View { json },
        } => commands::log_view(cfg, *json),
        Command::Doctor => commands::doctor(cfg),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_codes_are_distinct_per_command() {
        let cli = Cli::try_parse_from(["sealpack", "install", "pkg.tgz"]).unwrap();
        let io = SealpackError::Io {
            path: "x".to_string(),
            reason: "y".to_string(),
        };
        assert_eq!(exit_code_for(&cli.command, &io), 4);

        let cfg_err = SealpackError::Config {
            reason: "bad".to_string(),
        };
        assert_eq!(exit_code_for(&cli.command, &cfg_err), EXIT_CONFIG);

        let codes: Vec<i32> = [
            vec!["sealpack", "keygen"],
            vec!["sealpack", "sign", "a.tgz"],
            vec!["sealpack", "verify", "a.tgz"],
            vec!["sealpack", "install", "a.tgz"],
            vec!["sealpack", "audit", "."],
            vec!["sealpack", "log", "view"],
            vec!["sealpack", "doctor"],
        ]
        .into_iter()
        .map(|argv| Cli::try_parse_from(argv).unwrap().command.exit_code())
        .collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn sha256_flag_rejects_malformed_digests() {
        assert!(Cli::try_parse_from(["sealpack", "install", "a.tgz", "--sha256", "abc"]).is_err());

        let hex = "A".repeat(64);
        let cli =
            Cli::try_parse_from(["sealpack", "install", "a.tgz", "--sha256", hex.as_str()]).unwrap();
        match cli.command {
            Command::Install { sha256, .. } => {
                assert_eq!(sha256.unwrap().as_str(), "a".repeat(64));
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn signature_flags_require_verify() {
        assert!(Cli::try_parse_from(["sealpack", "install", "a.tgz", "--sig", "a.sig"]).is_err());
        assert!(Cli::try_parse_from([
            "sealpack", "install", "a.tgz", "--verify", "--sig", "a.sig"
        ])
        .is_ok());
    }
}
