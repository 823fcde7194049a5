//! Streaming SHA-256 hasher.
//!
//! Files are read in fixed 64 KiB chunks so memory use does not depend on
//! artifact size. A read error aborts the digest; no partial value is ever
//! returned.

use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use sha2::{Digest as _, Sha256};

use sealpack_contracts::{
    digest::Digest,
    error::{SealpackError, SealpackResult},
};

const CHUNK_SIZE: usize = 64 * 1024;

/// What to hash.
#[derive(Debug, Clone, Copy)]
pub enum DigestSource<'a> {
    File(&'a Path),
    Bytes(&'a [u8]),
}

/// Compute the SHA-256 digest of `source`.
///
/// # Errors
///
/// `NotFound` if a file source does not exist, `Io` for any other open or
/// read failure.
pub fn digest(source: DigestSource<'_>) -> SealpackResult<Digest> {
    match source {
        DigestSource::Bytes(bytes) => Ok(digest_bytes(bytes)),
        DigestSource::File(path) => digest_file(path),
    }
}

/// Digest an in-memory buffer. Infallible.
pub fn digest_bytes(bytes: &[u8]) -> Digest {
    Digest::from_hex_unchecked(hex::encode(Sha256::digest(bytes)))
}

/// Digest a file by streaming its content.
pub fn digest_file(path: &Path) -> SealpackResult<Digest> {
    let raw = sha256_file(path)?;
    Ok(Digest::from_hex_unchecked(hex::encode(raw)))
}

/// Raw 32-byte SHA-256 of a file; used as the signing payload.
pub fn sha256_file(path: &Path) -> SealpackResult<[u8; 32]> {
    stream(path, |_| Ok(()))
}

/// Copy `source` into `dir` under the same file name, hashing the bytes as
/// they are written.
///
/// The digest describes exactly the bytes of the staged copy, so later
/// steps that read the copy see what was hashed even if `source` changes.
///
/// # Errors
///
/// `NotFound` if `source` does not exist or has no file name, `Io` for any
/// read or write failure, including an existing file at the destination.
pub fn stage_file(source: &Path, dir: &Path) -> SealpackResult<(PathBuf, Digest)> {
    let name = source
        .file_name()
        .ok_or_else(|| SealpackError::not_found("artifact", source))?;
    let staged = dir.join(name);
    if !source.is_file() {
        return Err(SealpackError::not_found("artifact", source));
    }

    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staged)
        .map_err(|e| SealpackError::io(&staged, e))?;
    let raw = stream(source, |chunk| {
        out.write_all(chunk).map_err(|e| SealpackError::io(&staged, e))
    })?;
    out.sync_all().map_err(|e| SealpackError::io(&staged, e))?;

    Ok((staged, Digest::from_hex_unchecked(hex::encode(raw))))
}

/// Hash `path` chunk by chunk, handing each chunk to `sink` as well.
fn stream(
    path: &Path,
    mut sink: impl FnMut(&[u8]) -> SealpackResult<()>,
) -> SealpackResult<[u8; 32]> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SealpackError::not_found("artifact", path),
        _ => SealpackError::io(path, e),
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(SealpackError::io(path, e)),
        };
        hasher.update(&buf[..n]);
        sink(&buf[..n])?;
    }
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // SHA-256("abc")
    const ABC_DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn bytes_digest_matches_known_vector() {
        let d = digest(DigestSource::Bytes(b"abc")).unwrap();
        assert_eq!(d.as_str(), ABC_DIGEST);
    }

    #[test]
    fn file_digest_equals_bytes_digest() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"abc").unwrap();
        let d = digest(DigestSource::File(f.path())).unwrap();
        assert_eq!(d.as_str(), ABC_DIGEST);
    }

    #[test]
    fn file_larger_than_one_chunk_is_hashed_fully() {
        let data = vec![7u8; CHUNK_SIZE * 3 + 17];
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&data).unwrap();
        assert_eq!(digest_file(f.path()).unwrap(), digest_bytes(&data));
    }

    #[test]
    fn staged_copy_matches_its_digest_after_source_changes() {
        let src = tempfile::tempdir().unwrap();
        let stage = tempfile::tempdir().unwrap();
        let data = vec![3u8; CHUNK_SIZE + 5];
        let artifact = src.path().join("pkg-1.0.0.tgz");
        std::fs::write(&artifact, &data).unwrap();

        let (staged, d) = stage_file(&artifact, stage.path()).unwrap();
        std::fs::write(&artifact, b"swapped").unwrap();

        assert_eq!(staged, stage.path().join("pkg-1.0.0.tgz"));
        assert_eq!(d, digest_bytes(&data));
        assert_eq!(std::fs::read(&staged).unwrap(), data);
    }

    #[test]
    fn staging_a_missing_file_is_not_found() {
        let stage = tempfile::tempdir().unwrap();
        let err = stage_file(&stage.path().join("absent.tgz"), stage.path()).unwrap_err();
        assert!(matches!(err, SealpackError::NotFound { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_file(&dir.path().join("nope.tgz")).unwrap_err();
        assert!(matches!(err, SealpackError::NotFound { .. }));
    }
}
