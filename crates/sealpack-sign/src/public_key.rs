//! Public keys accepted when verifying detached signatures.
//!
//! Every scheme covers the raw 32-byte SHA-256 digest of the artifact.
//! Ed25519 signs the digest as its message. RSA-PSS (MGF1-SHA256, maximum
//! salt length) and ECDSA P-256 treat it as a prehashed SHA-256 value, so
//! signatures produced with those keys by other tooling over the same
//! digest verify here too.
//!
//! The key type is taken from the SPKI algorithm of the PEM document.

use ed25519_dalek::pkcs8::DecodePublicKey as _;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::pkcs8::DecodePublicKey as _;
use rsa::pkcs8::DecodePublicKey as _;
use rsa::{traits::PublicKeyParts, Pss, RsaPublicKey};
use sha2::{Digest as _, Sha256};
use tracing::warn;

/// A parsed verification key.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    RsaPss(RsaPublicKey),
    EcdsaP256(p256::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Parse an SPKI (`BEGIN PUBLIC KEY`) PEM document.
    ///
    /// Returns `None` when the key is not Ed25519, RSA, or P-256.
    pub fn from_pem(pem: &str) -> Option<Self> {
        if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_pem(pem) {
            return Some(Self::Ed25519(key));
        }
        if let Ok(key) = RsaPublicKey::from_public_key_pem(pem) {
            return Some(Self::RsaPss(key));
        }
        p256::ecdsa::VerifyingKey::from_public_key_pem(pem)
            .ok()
            .map(Self::EcdsaP256)
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => "ed25519",
            Self::RsaPss(_) => "rsa-pss-sha256",
            Self::EcdsaP256(_) => "ecdsa-p256-sha256",
        }
    }

    /// Check `signature` over `digest`. Malformed signatures are `false`.
    pub fn verify_digest(&self, digest: &[u8; 32], signature: &[u8]) -> bool {
        match self {
            Self::Ed25519(key) => match ed25519_dalek::Signature::from_slice(signature) {
                Ok(sig) => key.verify_strict(digest, &sig).is_ok(),
                Err(_) => {
                    warn!(len = signature.len(), "not a 64-byte ed25519 signature");
                    false
                }
            },
            Self::RsaPss(key) => key
                .verify(
                    Pss::new_with_salt::<Sha256>(pss_max_salt_len(key)),
                    digest,
                    signature,
                )
                .is_ok(),
            Self::EcdsaP256(key) => {
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .or_else(|_| p256::ecdsa::Signature::from_slice(signature));
                match sig {
                    Ok(sig) => key.verify_prehash(digest, &sig).is_ok(),
                    Err(_) => {
                        warn!(len = signature.len(), "not a DER or fixed-size P-256 signature");
                        false
                    }
                }
            }
        }
    }
}

/// Salt length a PSS signer picks for "maximum": `emLen - hLen - 2`.
pub(crate) fn pss_max_salt_len(key: &RsaPublicKey) -> usize {
    let em_len = (key.n().bits() - 1).div_ceil(8);
    em_len.saturating_sub(Sha256::output_size() + 2)
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
    use p256::ecdsa::signature::hazmat::PrehashSigner;
    use p256::pkcs8::EncodePublicKey as _;
    use rand::rngs::OsRng;
    use rsa::pkcs8::EncodePublicKey as _;
    use rsa::RsaPrivateKey;

    use super::*;

    fn digest_of(bytes: &[u8]) -> [u8; 32] {
        Sha256::digest(bytes).into()
    }

    #[test]
    fn rsa_pss_max_salt_signature_over_digest_verifies() {
        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public = RsaPublicKey::from(&private);
        let digest = digest_of(b"tarball bytes");
        let salt = pss_max_salt_len(&public);
        let sig = private
            .sign_with_rng(&mut OsRng, Pss::new_with_salt::<Sha256>(salt), &digest)
            .unwrap();

        let pem = public.to_public_key_pem(LineEnding::LF).unwrap();
        let key = PublicKey::from_pem(&pem).unwrap();
        assert_eq!(key.algorithm(), "rsa-pss-sha256");
        assert!(key.verify_digest(&digest, &sig));
        assert!(!key.verify_digest(&digest_of(b"other bytes"), &sig));
        assert!(!key.verify_digest(&digest, &sig[..10]));
    }

    #[test]
    fn ecdsa_p256_der_signature_over_digest_verifies() {
        let signing = p256::ecdsa::SigningKey::random(&mut OsRng);
        let digest = digest_of(b"tarball bytes");
        let sig: p256::ecdsa::Signature = signing.sign_prehash(&digest).unwrap();
        let der = sig.to_der();

        let pem = signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let key = PublicKey::from_pem(&pem).unwrap();
        assert_eq!(key.algorithm(), "ecdsa-p256-sha256");
        assert!(key.verify_digest(&digest, der.as_bytes()));
        assert!(key.verify_digest(&digest, &sig.to_bytes()));
        assert!(!key.verify_digest(&digest_of(b"other bytes"), der.as_bytes()));
        assert!(!key.verify_digest(&digest, b"garbage"));
    }

    #[test]
    fn unsupported_or_garbage_pem_is_none() {
        assert!(PublicKey::from_pem("not a key").is_none());
    }
}
