//! Fingerprint generation.
//!
//! The system never extracts fingerprints itself; it shells out to
//! Chromaprint's `fpcalc` (or anything else implementing
//! [`FingerprintGenerator`]).

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::instrument;

/// An externally computed fingerprint, still in its encoded form.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    /// Encoded fingerprint (comma-separated or compressed base64).
    pub raw: String,
    /// Duration of the audio the fingerprint covers, in seconds.
    pub duration: f64,
}

/// Capability to compute a fingerprint for a file on disk.
#[async_trait]
pub trait FingerprintGenerator: Send + Sync {
    /// Name used for logging only.
    fn name(&self) -> &str;

    /// Compute the fingerprint for `path`.
    async fn generate(&self, path: &Path) -> Result<Fingerprint>;
}

/// Run `generator` against `path`, failing with [`ErrorKind::Timeout`] if it
/// takes longer than `timeout`.
///
/// Exceeding the ceiling is a per-file failure; the generator's future is
/// dropped, which for [`FpcalcGenerator`] also kills the child process.
pub async fn generate_with_timeout(
    generator: &dyn FingerprintGenerator,
    path: &Path,
    timeout: Duration,
) -> Result<Fingerprint> {
    match tokio::time::timeout(timeout, generator.generate(path)).await {
        Ok(result) => result,
        Err(_elapsed) => {
            tracing::warn!(generator = generator.name(), path = %path.display(), ?timeout, "Fingerprint generation timed out");
            exn::bail!(ErrorKind::Timeout(path.to_path_buf()))
        },
    }
}

/// Generates fingerprints by running Chromaprint's `fpcalc -raw`.
#[derive(Debug, Clone)]
pub struct FpcalcGenerator {
    binary: PathBuf,
}

impl FpcalcGenerator {
    /// Use a specific `fpcalc` executable.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Locate `fpcalc` on `$PATH`.
    pub fn discover() -> Result<Self> {
        let binary = which::which("fpcalc").or_raise(|| ErrorKind::Unavailable("fpcalc not found on $PATH".to_string()))?;
        tracing::debug!(binary = %binary.display(), "Discovered fpcalc");
        Ok(Self::new(binary))
    }

    /// Pull `DURATION=` and `FINGERPRINT=` out of `fpcalc` output.
    fn parse_output(path: &Path, stdout: &str) -> Result<Fingerprint> {
        let mut duration = None;
        let mut raw = None;
        for line in stdout.lines() {
            if let Some(value) = line.strip_prefix("DURATION=") {
                duration = value.trim().parse::<f64>().ok();
            } else if let Some(value) = line.strip_prefix("FINGERPRINT=") {
                raw = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
        }
        let raw = raw.ok_or_raise(|| ErrorKind::Generation(path.to_path_buf(), "no FINGERPRINT line".to_string()))?;
        let duration =
            duration.ok_or_raise(|| ErrorKind::Generation(path.to_path_buf(), "no DURATION line".to_string()))?;
        Ok(Fingerprint { raw, duration })
    }
}

#[async_trait]
impl FingerprintGenerator for FpcalcGenerator {
    fn name(&self) -> &str {
        "fpcalc"
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn generate(&self, path: &Path) -> Result<Fingerprint> {
        let output = Command::new(&self.binary)
            .arg("-raw")
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ErrorKind::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            exn::bail!(ErrorKind::Generation(path.to_path_buf(), format!("{}: {stderr}", output.status)));
        }
        Self::parse_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}
