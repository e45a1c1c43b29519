//! Decrypt-edit-reencrypt workflow for a single store entry.
//!
//! One [`EditSession`] covers one edit of one encrypted file: decrypt it
//! (falling back to a caller-supplied passphrase once), hand the filtered
//! plaintext to the caller, then re-encrypt the edited text to the
//! original recipient, auto-detected from the file's packet metadata.
//!
//! The session makes blocking subprocess calls and assumes nothing about
//! threading; a caller that must stay responsive runs the whole session on
//! a worker. Concurrent sessions against the same target are not
//! arbitrated here and are the caller's responsibility.

use crate::error::{Result, StoreError};
use crate::gpg::{filter_status_lines, parse_recipient_keyid, GpgClient};
use crate::secure_temp::ScratchFile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Targets with a live session, keyed by canonical path. One session per
/// target at a time; concurrent edits of the same file are rejected at
/// session creation instead of racing at encrypt time.
static ACTIVE_SESSIONS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn active_sessions() -> std::sync::MutexGuard<'static, HashSet<PathBuf>> {
    let lock = ACTIVE_SESSIONS.get_or_init(|| Mutex::new(HashSet::new()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Decrypting,
    AwaitingPassphrase,
    Editing,
    ResolvingRecipient,
    Encrypting,
    Done,
    Failed,
}

/// Outcome of the first, agent-backed decrypt attempt.
#[derive(Debug)]
pub enum DecryptOutcome {
    /// Decryption succeeded; filtered plaintext is ready for editing.
    Plaintext(String),
    /// The agent could not satisfy the request; supply a passphrase via
    /// [`EditSession::decrypt_with_passphrase`], exactly once.
    NeedsPassphrase,
}

/// Outcome of a save request.
#[derive(Debug)]
pub enum SaveOutcome {
    /// The entry was re-encrypted in place.
    Saved,
    /// Recipient auto-detection found nothing; supply one via
    /// [`EditSession::save_with_recipient`]. `suggested` carries the
    /// configured default recipient, if any, for prefilling a prompt.
    NeedsRecipient { suggested: Option<String> },
}

/// One decrypt-edit-reencrypt cycle against a single encrypted file.
///
/// Ephemeral: exists in memory for one edit action. Dropping the session
/// at any point abandons it; any scratch file is cleaned up on drop.
#[derive(Debug)]
pub struct EditSession {
    gpg: GpgClient,
    target: PathBuf,
    session_key: PathBuf,
    phase: Phase,
    default_recipient: Option<String>,
    filter_markers: Vec<String>,
    plaintext: Option<String>,
}

impl EditSession {
    /// Start a session for `target`. The default recipient hint is threaded
    /// in explicitly so each session carries its own configuration.
    ///
    /// Fails with [`StoreError::SessionActive`] when another live session
    /// already holds the same target.
    pub fn new(
        gpg: GpgClient,
        target: impl Into<PathBuf>,
        default_recipient: Option<String>,
    ) -> Result<Self> {
        let target = target.into();
        let session_key = std::fs::canonicalize(&target).unwrap_or_else(|_| target.clone());

        let mut active = active_sessions();
        if !active.insert(session_key.clone()) {
            return Err(StoreError::SessionActive(target));
        }
        drop(active);

        Ok(Self {
            gpg,
            target,
            session_key,
            phase: Phase::Decrypting,
            default_recipient,
            filter_markers: Vec::new(),
            plaintext: None,
        })
    }

    /// Additional substrings to strip from decrypted output, on top of the
    /// built-in tool status patterns.
    pub fn with_filter_markers(mut self, markers: Vec<String>) -> Self {
        self.filter_markers = markers;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Filtered plaintext, available once the session reached `Editing`.
    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    /// First decrypt attempt, with no passphrase supplied (agent-backed).
    ///
    /// On failure the session moves to `AwaitingPassphrase` rather than
    /// failing: the caller collects a passphrase and retries once.
    pub fn decrypt(&mut self) -> Result<DecryptOutcome> {
        self.expect_phase(Phase::Decrypting, "decrypt")?;

        let run = self.gpg.decrypt(&self.target, None)?;
        if run.success {
            Ok(DecryptOutcome::Plaintext(
                self.finish_decrypt(&run.combined_output),
            ))
        } else {
            self.phase = Phase::AwaitingPassphrase;
            Ok(DecryptOutcome::NeedsPassphrase)
        }
    }

    /// Single passphrase retry. A failure here is terminal: the session
    /// fails with the subprocess diagnostic attached, no third attempt.
    ///
    /// The passphrase is only handed to the subprocess; the session does
    /// not retain it.
    pub fn decrypt_with_passphrase(&mut self, passphrase: &str) -> Result<String> {
        self.expect_phase(Phase::AwaitingPassphrase, "decrypt_with_passphrase")?;

        let run = self.gpg.decrypt(&self.target, Some(passphrase))?;
        if run.success {
            Ok(self.finish_decrypt(&run.combined_output))
        } else {
            self.phase = Phase::Failed;
            Err(StoreError::DecryptFailed {
                diagnostic: run.combined_output,
            })
        }
    }

    fn finish_decrypt(&mut self, output: &str) -> String {
        let filtered = filter_status_lines(output, &self.filter_markers);
        self.plaintext = Some(filtered.clone());
        self.phase = Phase::Editing;
        filtered
    }

    /// Save edited text back to the target, re-encrypting to the recipient
    /// detected from the original file's packet metadata.
    ///
    /// When no recipient can be detected, returns
    /// [`SaveOutcome::NeedsRecipient`] and waits for
    /// [`EditSession::save_with_recipient`]; the scratch file written for
    /// this attempt is cleaned up before returning.
    pub fn save(&mut self, edited: &str) -> Result<SaveOutcome> {
        self.expect_phase(Phase::Editing, "save")?;
        self.phase = Phase::ResolvingRecipient;

        let mut scratch = match ScratchFile::with_content(edited) {
            Ok(scratch) => scratch,
            Err(e) => {
                self.phase = Phase::Failed;
                return Err(e);
            }
        };

        let run = match self.gpg.list_packets(&self.target) {
            Ok(run) => run,
            Err(e) => {
                self.phase = Phase::Failed;
                return Err(e);
            }
        };
        if !run.success {
            self.phase = Phase::Failed;
            return Err(StoreError::Other(format!(
                "Failed to get recipient info:\n{}",
                run.combined_output
            )));
        }

        match parse_recipient_keyid(&run.combined_output) {
            Some(keyid) => {
                self.encrypt_scratch(scratch, &keyid)?;
                Ok(SaveOutcome::Saved)
            }
            None => {
                let _ = scratch.cleanup();
                Ok(SaveOutcome::NeedsRecipient {
                    suggested: self.default_recipient.clone(),
                })
            }
        }
    }

    /// Save with a caller-supplied recipient, after auto-detection came up
    /// empty. A blank recipient aborts the save: the target file is left
    /// untouched and no subprocess is invoked.
    pub fn save_with_recipient(&mut self, edited: &str, recipient: &str) -> Result<()> {
        self.expect_phase(Phase::ResolvingRecipient, "save_with_recipient")?;

        let recipient = recipient.trim();
        if recipient.is_empty() {
            self.phase = Phase::Failed;
            return Err(StoreError::RecipientRequired);
        }

        let scratch = match ScratchFile::with_content(edited) {
            Ok(scratch) => scratch,
            Err(e) => {
                self.phase = Phase::Failed;
                return Err(e);
            }
        };

        self.encrypt_scratch(scratch, recipient)
    }

    /// Run the encrypt subprocess against the scratch file. The scratch is
    /// deleted once the subprocess returns, success or failure; on failure
    /// gpg leaves the target unmodified.
    fn encrypt_scratch(&mut self, mut scratch: ScratchFile, recipient: &str) -> Result<()> {
        self.phase = Phase::Encrypting;

        let run = self.gpg.encrypt(scratch.path(), recipient, &self.target);
        let _ = scratch.cleanup();

        let run = run?;
        if run.success {
            self.phase = Phase::Done;
            Ok(())
        } else {
            self.phase = Phase::Failed;
            Err(StoreError::EncryptFailed {
                diagnostic: run.combined_output,
            })
        }
    }

    fn expect_phase(&self, expected: Phase, operation: &str) -> Result<()> {
        if self.phase != expected {
            return Err(StoreError::Other(format!(
                "{operation} called in {:?} phase",
                self.phase
            )));
        }
        Ok(())
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        active_sessions().remove(&self.session_key);
    }
}
