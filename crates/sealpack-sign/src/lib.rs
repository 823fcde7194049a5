//! # sealpack-sign
//!
//! `Signer` implementations.
//!
//! - `Ed25519Signer`: in-process, PKCS#8 PEM keys, signs the SHA-256 digest
//!   of the artifact. Verifies Ed25519, RSA-PSS, and ECDSA P-256 signatures
//!   over that digest.
//! - `CommandSigner`: drives an external binary (`cosign` by default)
//!   through argument templates from `[signer]` config.
//!
//! Both write detached signatures to `<artifact>.sig`.

use std::path::{Path, PathBuf};

use sealpack_core::{
    config::{SignerBackend, SignerSettings},
    traits::Signer,
};

pub mod command;
pub mod ed25519;
pub mod public_key;

pub use command::CommandSigner;
pub use ed25519::Ed25519Signer;
pub use public_key::PublicKey;

pub const SIGNATURE_EXTENSION: &str = "sig";

/// `<artifact>.sig`, keeping the artifact's full file name.
pub fn signature_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".");
    name.push(SIGNATURE_EXTENSION);
    PathBuf::from(name)
}

/// Build the signer selected by `settings.backend`.
pub fn from_settings(settings: &SignerSettings) -> Box<dyn Signer> {
    match settings.backend {
        SignerBackend::Ed25519 => Box::new(Ed25519Signer::new()),
        SignerBackend::Command => Box::new(CommandSigner::new(settings.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_path_appends_extension() {
        assert_eq!(
            signature_path(Path::new("/a/pkg-1.2.3.tgz")),
            PathBuf::from("/a/pkg-1.2.3.tgz.sig")
        );
    }

    #[test]
    fn backend_selects_implementation() {
        let ed = from_settings(&SignerSettings::default());
        assert_eq!(ed.name(), "ed25519");

        let cmd = from_settings(&SignerSettings {
            backend: SignerBackend::Command,
            ..Default::default()
        });
        assert_eq!(cmd.name(), "cosign");
    }
}
