//! Import of the legacy token file.
//!
//! Older deployments kept device tokens in a flat file, one encoded token per
//! line. Each line is decoded through a [`TokenDecoder`] and registered in the
//! [`Directory`] (and therefore written through to the mirror).

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use frostwatch_core::DeviceToken;

use crate::directory::{Directory, RegisterOutcome};

/// Decodes one line of the legacy file into a device token.
///
/// The legacy file is encrypted at rest; deployments plug in a decoder that
/// holds the key. [`PlainTokens`] handles unencrypted files.
pub trait TokenDecoder: Send + Sync {
    /// # Errors
    /// Returns an error when the record cannot be decoded.
    fn decode(&self, record: &str) -> Result<DeviceToken>;
}

/// Decoder for files holding one plain token per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTokens;

impl TokenDecoder for PlainTokens {
    fn decode(&self, record: &str) -> Result<DeviceToken> {
        let token = DeviceToken::new(record.trim());
        if token.is_blank() {
            anyhow::bail!("empty token record");
        }
        Ok(token)
    }
}

/// Result of a legacy import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Tokens newly registered.
    pub imported: usize,
    /// Tokens already registered or repeated in the file.
    pub skipped: usize,
    /// Records that could not be decoded or registered.
    pub failed: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.imported + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Legacy import complete: {} imported, {} skipped, {} failed (total: {})",
            self.imported,
            self.skipped,
            self.failed,
            self.total()
        )
    }
}

/// Register every token found in the legacy file at `path`.
///
/// A missing file yields an empty report. Duplicate records are skipped.
///
/// # Errors
/// Returns an error only if an existing file cannot be read.
pub async fn import_legacy_tokens<P: AsRef<Path>>(
    path: P,
    decoder: &dyn TokenDecoder,
    directory: &Directory,
) -> Result<ImportReport> {
    let path = path.as_ref();
    let mut report = ImportReport::default();

    if !path.exists() {
        tracing::info!("No legacy token file at {}", path.display());
        return Ok(report);
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read legacy token file {}", path.display()))?;

    let mut seen = HashSet::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let token = match decoder.decode(line) {
            Ok(token) => token,
            Err(e) => {
                let error_msg = format!("Line {}: {}", index + 1, e);
                tracing::warn!("{}", error_msg);
                report.errors.push(error_msg);
                report.failed += 1;
                continue;
            }
        };

        if !seen.insert(token.clone()) {
            report.skipped += 1;
            continue;
        }

        match directory.register(&token).await {
            Ok(RegisterOutcome::Registered) => report.imported += 1,
            Ok(RegisterOutcome::AlreadyExists) => report.skipped += 1,
            Err(e) => {
                let error_msg = format!("Failed to register token {}: {}", token, e);
                tracing::warn!("{}", error_msg);
                report.errors.push(error_msg);
                report.failed += 1;
            }
        }
    }

    tracing::info!("{}", report);
    Ok(report)
}
