//! `PackageSource` implementations used by `install` and `audit`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use sealpack_contracts::error::{SealpackError, SealpackResult};
use sealpack_core::{config::SourceSettings, process::run_with_timeout, traits::PackageSource};

/// A tarball already on disk.
pub struct LocalSource;

impl PackageSource for LocalSource {
    fn resolve(&self, spec: &str, _workdir: &Path) -> SealpackResult<PathBuf> {
        let path = PathBuf::from(spec);
        if path.is_file() {
            Ok(path)
        } else {
            Err(SealpackError::not_found("package tarball", &path))
        }
    }
}

/// Fetches a registry spec (`left-pad`, `left-pad@1.3.0`) with `npm pack`.
///
/// Lifecycle scripts are disabled; `npm` only downloads the tarball.
pub struct NpmSource {
    program: String,
    timeout: Duration,
}

impl NpmSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            program: settings.npm_program.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

impl PackageSource for NpmSource {
    fn resolve(&self, spec: &str, workdir: &Path) -> SealpackResult<PathBuf> {
        std::fs::create_dir_all(workdir).map_err(|e| SealpackError::io(workdir, e))?;
        let args = vec![
            "pack".to_string(),
            spec.to_string(),
            "--ignore-scripts".to_string(),
            "--pack-destination".to_string(),
            workdir.display().to_string(),
        ];
        let output = run_with_timeout(&self.program, &args, self.timeout, "npm pack")?;
        if !output.success() {
            return Err(SealpackError::ExternalTool {
                tool: self.program.clone(),
                reason: format!("npm pack {} failed: {}", spec, output.stderr.trim()),
            });
        }

        // `npm pack` prints the tarball file name as its last stdout line.
        let name = output
            .stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .ok_or_else(|| SealpackError::ExternalTool {
                tool: self.program.clone(),
                reason: "npm pack printed no tarball name".to_string(),
            })?;
        let tarball = workdir.join(name);
        if !tarball.is_file() {
            return Err(SealpackError::not_found("packed tarball", &tarball));
        }
        debug!(spec, tarball = %tarball.display(), "resolved registry package");
        info!(spec, "fetched package from registry");
        Ok(tarball)
    }
}

/// Existing paths are local tarballs; anything else is a registry spec.
pub fn for_spec(spec: &str, settings: &SourceSettings) -> Box<dyn PackageSource> {
    if Path::new(spec).exists() {
        Box::new(LocalSource)
    } else {
        Box::new(NpmSource::new(settings))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn local_source_returns_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("pkg-1.0.0.tgz");
        fs::write(&tarball, b"tgz").unwrap();

        let spec = tarball.display().to_string();
        assert_eq!(LocalSource.resolve(&spec, dir.path()).unwrap(), tarball);
    }

    #[test]
    fn local_source_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().display().to_string();
        assert!(matches!(
            LocalSource.resolve(&spec, dir.path()),
            Err(SealpackError::NotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn npm_source_takes_last_stdout_line_as_tarball() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("left-pad-1.3.0.tgz"), b"tgz").unwrap();

        // Stand-in for npm: a notice line, then the tarball name.
        let script = dir.path().join("fake-npm");
        fs::write(&script, "#!/bin/sh\necho 'npm notice'\necho left-pad-1.3.0.tgz\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let source = NpmSource::new(&SourceSettings {
            npm_program: script.display().to_string(),
            timeout_secs: 10,
        });
        let tarball = source.resolve("left-pad@1.3.0", dir.path()).unwrap();
        assert_eq!(tarball, dir.path().join("left-pad-1.3.0.tgz"));
    }
}
