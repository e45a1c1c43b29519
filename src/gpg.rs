//! GPG subprocess integration for decrypting and re-encrypting entries.
//!
//! All cryptography is delegated to an external `gpg` binary invoked in
//! batch (non-interactive) mode. This module owns the invocation protocol
//! and the plain-text parsing of its output; it never interprets key
//! material itself.

use crate::error::{Result, StoreError};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Prefix of tool status lines in combined decrypt output.
const STATUS_PREFIX: &str = "gpg:";

/// Informational substrings stripped from decrypted output. Cosmetic
/// cleanup only, not a content-integrity guarantee.
const NOISE_MARKERS: &[&str] = &["encrypted with", "created"];

/// Label preceding the key identifier in `--list-packets` output.
const KEYID_LABEL: &str = "keyid";

/// Length of the key identifier token taken after the label.
const KEYID_LEN: usize = 16;

/// Result of one gpg invocation: exit status plus combined stdout+stderr.
/// The combined text doubles as plaintext on success and as the verbatim
/// diagnostic payload on failure.
#[derive(Debug)]
pub struct GpgRun {
    pub success: bool,
    pub combined_output: String,
}

/// Client for the external encryption tool.
#[derive(Debug, Clone)]
pub struct GpgClient {
    program: PathBuf,
}

impl Default for GpgClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GpgClient {
    /// Client for the system `gpg` binary. `PASSVIEW_GPG` overrides the
    /// binary path.
    pub fn new() -> Self {
        let program = std::env::var_os("PASSVIEW_GPG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("gpg"));
        Self { program }
    }

    /// Client for a specific tool binary. Used by tests and by callers
    /// that configure a non-default gpg path.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that the tool can be invoked at all.
    pub fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|e| {
                StoreError::Other(format!("GPG not found: {e}. Please install GPG."))
            })?;

        if !output.status.success() {
            return Err(StoreError::Other("GPG command failed".to_string()));
        }

        Ok(())
    }

    /// Decrypt `path` in batch mode. Without a passphrase the invocation
    /// relies on a running agent; with one, the passphrase is handed to
    /// gpg on the command line and never written to disk.
    pub fn decrypt(&self, path: &Path, passphrase: Option<&str>) -> Result<GpgRun> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--batch");
        if let Some(passphrase) = passphrase {
            cmd.arg("--passphrase").arg(passphrase);
        }
        cmd.arg("--decrypt").arg(path);
        self.run(cmd)
    }

    /// Inspect `path`'s packet metadata without decrypting.
    pub fn list_packets(&self, path: &Path) -> Result<GpgRun> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--batch").arg("--list-packets").arg(path);
        self.run(cmd)
    }

    /// Encrypt `source` to `recipient`, writing over `target`. gpg only
    /// replaces the target on success, so a failed run leaves it intact.
    pub fn encrypt(&self, source: &Path, recipient: &str, target: &Path) -> Result<GpgRun> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--batch")
            .arg("--yes")
            .arg("--recipient")
            .arg(recipient)
            .arg("--output")
            .arg(target)
            .arg("--encrypt")
            .arg(source);
        self.run(cmd)
    }

    fn run(&self, mut cmd: Command) -> Result<GpgRun> {
        let output = cmd
            .output()
            .map_err(|e| StoreError::Other(format!("Failed to run GPG: {e}")))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(GpgRun {
            success: output.status.success(),
            combined_output: combined,
        })
    }
}

/// Strip tool status and informational lines from decrypted output.
///
/// Drops lines starting with the status prefix, lines containing the known
/// informational substrings, and lines containing any of `extra_markers`
/// (caller-configured, e.g. a key identity string). Best-effort text
/// cleanup for presentation; may under- or over-strip in edge cases.
pub fn filter_status_lines(output: &str, extra_markers: &[String]) -> String {
    output
        .lines()
        .filter(|line| {
            !(line.starts_with(STATUS_PREFIX)
                || NOISE_MARKERS.iter().any(|m| line.contains(m))
                || extra_markers.iter().any(|m| !m.is_empty() && line.contains(m.as_str())))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the recipient key identifier from `--list-packets` output.
///
/// Looks for the first line carrying the keyid label and takes the fixed
/// 16-character token after it. The token is used at face value, with no
/// validation against known keys.
pub fn parse_recipient_keyid(output: &str) -> Option<String> {
    for line in output.lines() {
        if let Some(idx) = line.find(KEYID_LABEL) {
            let token = line[idx + KEYID_LABEL.len()..].trim();
            if let Some(keyid) = token.get(..KEYID_LEN) {
                return Some(keyid.to_string());
            }
        }
    }
    None
}
