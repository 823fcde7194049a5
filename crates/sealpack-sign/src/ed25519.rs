//! In-process Ed25519 signer.
//!
//! Keys are PKCS#8 / SPKI PEM files. The signed payload is the raw 32-byte
//! SHA-256 digest of the artifact, not the artifact bytes, so signing cost
//! does not grow with the artifact. Signatures are the bare 64-byte
//! Ed25519 encoding written next to the artifact as `<artifact>.sig`.
//!
//! Verification also accepts RSA-PSS and ECDSA P-256 public keys over the
//! same digest; see `public_key`.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use ed25519_dalek::{
    pkcs8::{spki::der::pem::LineEnding, DecodePrivateKey, EncodePrivateKey, EncodePublicKey},
    Signer as _, SigningKey,
};
use rand::rngs::OsRng;
use tracing::{debug, info};

use sealpack_contracts::error::{SealpackError, SealpackResult};
use sealpack_core::{
    digest::sha256_file,
    traits::{KeyPairPaths, Signer},
};

use crate::{public_key::PublicKey, signature_path};

pub const PRIVATE_KEY_FILE: &str = "signing-key.pem";
pub const PUBLIC_KEY_FILE: &str = "signing-key.pub.pem";

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    pub fn new() -> Self {
        Self
    }
}

impl Signer for Ed25519Signer {
    fn name(&self) -> &str {
        "ed25519"
    }

    /// Write a fresh key pair into `dir`. Refuses to replace an existing
    /// private key.
    fn generate_keypair(&self, dir: &Path) -> SealpackResult<KeyPairPaths> {
        fs::create_dir_all(dir).map_err(|e| SealpackError::io(dir, e))?;
        let paths = KeyPairPaths {
            private_key: dir.join(PRIVATE_KEY_FILE),
            public_key: dir.join(PUBLIC_KEY_FILE),
        };
        if paths.private_key.exists() {
            return Err(SealpackError::Io {
                path: paths.private_key.display().to_string(),
                reason: "refusing to overwrite existing private key".to_string(),
            });
        }

        let signing_key = SigningKey::generate(&mut OsRng);
        let private_pem = signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| key_error(&paths.private_key, e))?;
        let public_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| key_error(&paths.public_key, e))?;

        write_private(&paths.private_key, private_pem.as_bytes())?;
        fs::write(&paths.public_key, public_pem.as_bytes())
            .map_err(|e| SealpackError::io(&paths.public_key, e))?;

        info!(
            private_key = %paths.private_key.display(),
            public_key = %paths.public_key.display(),
            "generated ed25519 key pair"
        );
        Ok(paths)
    }

    fn sign(&self, artifact: &Path, key: &Path) -> SealpackResult<PathBuf> {
        let payload = sha256_file(artifact)?;
        let pem = read_required(key, "private key")?;
        let signing_key = SigningKey::from_pkcs8_pem(&pem).map_err(|e| key_error(key, e))?;

        let signature = signing_key.sign(&payload);
        let out = signature_path(artifact);
        fs::write(&out, signature.to_bytes()).map_err(|e| SealpackError::io(&out, e))?;

        debug!(artifact = %artifact.display(), signature = %out.display(), "signed artifact");
        Ok(out)
    }

    fn verify(&self, artifact: &Path, signature: &Path, public_key: &Path) -> SealpackResult<bool> {
        let payload = sha256_file(artifact)?;
        let pem = read_required(public_key, "public key")?;
        let key = PublicKey::from_pem(&pem).ok_or_else(|| {
            key_error(public_key, "not an Ed25519, RSA, or P-256 public key")
        })?;

        let raw = fs::read(signature).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SealpackError::not_found("signature", signature),
            _ => SealpackError::io(signature, e),
        })?;

        let valid = key.verify_digest(&payload, &raw);
        debug!(
            artifact = %artifact.display(),
            algorithm = key.algorithm(),
            valid,
            "checked detached signature"
        );
        Ok(valid)
    }
}

fn read_required(path: &Path, what: &str) -> SealpackResult<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SealpackError::not_found(what, path),
        _ => SealpackError::io(path, e),
    })
}

fn key_error(path: &Path, err: impl std::fmt::Display) -> SealpackError {
    SealpackError::Config {
        reason: format!("invalid key '{}': {}", path.display(), err),
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> SealpackResult<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| SealpackError::io(path, e))?;
    file.write_all(contents).map_err(|e| SealpackError::io(path, e))
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> SealpackResult<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| SealpackError::io(path, e))?;
    file.write_all(contents).map_err(|e| SealpackError::io(path, e))
}
