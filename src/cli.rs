//! Command-line interface implementation.
//!
//! The CLI is the front end the core was designed against: it resolves
//! entry names through the store index, runs edit sessions, and supplies
//! the passphrase/recipient input the workflow asks for.

use crate::error::{Result, StoreError};
use crate::git;
use crate::gpg::GpgClient;
use crate::index::{self, StoreIndex, ENTRY_EXTENSION};
use crate::secure_temp::ScratchFile;
use crate::settings::Settings;
use crate::utils::{success, warning};
use crate::workflow::{DecryptOutcome, EditSession, SaveOutcome};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Browse and edit a GPG password store.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Password store root
    #[arg(
        short = 's',
        long,
        global = true,
        env = "PASSWORD_STORE_DIR",
        help = "Password store root (default: configured path or ~/.password-store)"
    )]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the store as a tree
    List,

    /// Decrypt and display an entry
    Show {
        /// Entry name or relative path (e.g. finance/bank)
        entry: String,
    },

    /// Decrypt an entry, edit it in $EDITOR, and re-encrypt it
    Edit {
        /// Entry name or relative path
        entry: String,
    },

    /// Search entries by name or path
    Search {
        /// Search query
        query: String,
    },

    /// Commit pending store changes
    Commit,

    /// Synchronize the store with its git remote
    Sync,

    /// Show or change configuration
    Config {
        /// Set the password store root
        #[arg(long)]
        store_path: Option<String>,

        /// Set the default recipient hint
        #[arg(long)]
        recipient: Option<String>,

        /// Enable or disable auto-commit after saving
        #[arg(long)]
        auto_commit: Option<bool>,

        /// Set the display theme
        #[arg(long)]
        theme: Option<String>,
    },
}

impl Cli {
    /// Execute the CLI command.
    pub fn execute(&self) -> Result<()> {
        let settings = Settings::load()?;
        let root = match &self.store {
            Some(path) => path.clone(),
            None => settings.store_root()?,
        };

        match &self.command {
            Commands::List => self.list_store(&root),
            Commands::Show { entry } => self.show_entry(&root, &settings, entry),
            Commands::Edit { entry } => self.edit_entry(&root, &settings, entry),
            Commands::Search { query } => self.search_store(&root, query),
            Commands::Commit => self.commit_store(&root),
            Commands::Sync => self.sync_store(&root),
            Commands::Config {
                store_path,
                recipient,
                auto_commit,
                theme,
            } => self.configure(
                settings,
                store_path.clone(),
                recipient.clone(),
                *auto_commit,
                theme.clone(),
            ),
        }
    }

    /// Print the store as an indented tree.
    fn list_store(&self, root: &Path) -> Result<()> {
        let index = index::build_index(root)?;

        println!("{}", root.display().to_string().bold());
        for entry in &index.root_entries {
            println!("  {entry}");
        }
        for dir in &index.directories {
            print_directory(&index, dir, 1);
        }

        Ok(())
    }

    fn show_entry(&self, root: &Path, settings: &Settings, entry: &str) -> Result<()> {
        let path = resolve_entry(root, entry)?;
        let mut session = new_session(path, settings)?;

        let plaintext = decrypt_interactive(&mut session, entry)?;
        println!("{plaintext}");
        Ok(())
    }

    fn edit_entry(&self, root: &Path, settings: &Settings, entry: &str) -> Result<()> {
        let path = resolve_entry(root, entry)?;
        let mut session = new_session(path, settings)?;

        let plaintext = decrypt_interactive(&mut session, entry)?;

        // Present for editing via $EDITOR on a scratch file
        let mut editor_file = ScratchFile::with_content(&plaintext)?;
        let edited = editor_file.edit_with_editor()?;
        editor_file.cleanup()?;

        if edited == plaintext {
            println!("No changes made to '{entry}'.");
            return Ok(());
        }

        match session.save(&edited)? {
            SaveOutcome::Saved => {}
            SaveOutcome::NeedsRecipient { suggested } => {
                let recipient = prompt_recipient(suggested)?;
                session.save_with_recipient(&edited, &recipient)?;
            }
        }
        success(&format!("Saved '{entry}'."));

        if settings.auto_commit {
            match git::commit_all(root) {
                Ok(git::SyncReport::Committed) => success("Committed store changes."),
                Ok(git::SyncReport::NoChanges) => {}
                Err(e) => warning(&format!("Auto-commit failed: {e}")),
            }
        }

        Ok(())
    }

    fn search_store(&self, root: &Path, query: &str) -> Result<()> {
        let index = index::build_index(root)?;
        let results = index.search(query);

        if results.is_empty() {
            println!("No entries matching '{query}'.");
            return Ok(());
        }

        for rel in &results {
            println!("{rel}");
        }
        println!("{}", format!("{} matching entries", results.len()).dimmed());
        Ok(())
    }

    fn commit_store(&self, root: &Path) -> Result<()> {
        match git::commit_all(root)? {
            git::SyncReport::NoChanges => println!("No changes to commit."),
            git::SyncReport::Committed => success("Changes committed."),
        }
        Ok(())
    }

    fn sync_store(&self, root: &Path) -> Result<()> {
        let bar = ProgressBar::new(git::SYNC_STEPS.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let report = git::sync(root, |step| {
            bar.set_message(step.to_string());
            bar.inc(1);
        });
        bar.finish_and_clear();

        match report? {
            git::SyncReport::Committed => {
                success("Committed and pushed changes to remote repository.")
            }
            git::SyncReport::NoChanges => {
                success("Synchronized with remote repository (no local changes).")
            }
        }
        Ok(())
    }

    fn configure(
        &self,
        mut settings: Settings,
        store_path: Option<String>,
        recipient: Option<String>,
        auto_commit: Option<bool>,
        theme: Option<String>,
    ) -> Result<()> {
        let changed = store_path.is_some()
            || recipient.is_some()
            || auto_commit.is_some()
            || theme.is_some();

        if !changed {
            let data = serde_json::to_string_pretty(&settings)
                .map_err(|e| StoreError::Settings(e.to_string()))?;
            println!("{data}");
            return Ok(());
        }

        if let Some(path) = store_path {
            settings.password_store_path = path;
        }
        if let Some(recipient) = recipient {
            settings.default_recipient = recipient;
        }
        if let Some(auto_commit) = auto_commit {
            settings.auto_commit = auto_commit;
        }
        if let Some(theme) = theme {
            settings.theme = theme;
        }

        settings.save()?;
        success("Settings updated.");
        Ok(())
    }
}

fn new_session(path: PathBuf, settings: &Settings) -> Result<EditSession> {
    Ok(
        EditSession::new(GpgClient::new(), path, settings.default_recipient_hint())?
            .with_filter_markers(settings.filter_markers.clone()),
    )
}

/// Resolve an entry argument to an absolute file path.
///
/// A relative path like `finance/bank` must resolve directly under the
/// root; a bare name goes through the index lookup table, with the
/// index-free recursive search as a fallback for stale index state.
fn resolve_entry(root: &Path, entry: &str) -> Result<PathBuf> {
    if entry.contains('/') {
        let path = root.join(format!("{entry}{ENTRY_EXTENSION}"));
        if path.is_file() {
            return Ok(path);
        }
        // A qualified path names one exact file; never fall back to a
        // same-named entry elsewhere in the store.
        return Err(StoreError::EntryNotFound(entry.to_string()));
    }

    let index = index::build_index(root)?;
    if let Some(path) = index.entry_path(entry) {
        return Ok(path.clone());
    }

    index::find_entry_path(root, entry)
        .ok_or_else(|| StoreError::EntryNotFound(entry.to_string()))
}

/// Drive a session to plaintext, prompting for a passphrase when the
/// agent-backed attempt fails.
fn decrypt_interactive(session: &mut EditSession, entry: &str) -> Result<String> {
    match session.decrypt()? {
        DecryptOutcome::Plaintext(text) => Ok(text),
        DecryptOutcome::NeedsPassphrase => {
            if !atty::is(atty::Stream::Stdin) {
                return Err(StoreError::Other(
                    "GPG agent requires a passphrase, but stdin is not interactive".to_string(),
                ));
            }

            let passphrase = Zeroizing::new(
                rpassword::prompt_password(format!("Passphrase for '{entry}': "))
                    .map_err(StoreError::Io)?,
            );
            if passphrase.is_empty() {
                return Err(StoreError::Cancelled);
            }

            session.decrypt_with_passphrase(&passphrase)
        }
    }
}

/// Ask for a recipient when auto-detection failed, prefilled with the
/// configured default when one exists.
fn prompt_recipient(suggested: Option<String>) -> Result<String> {
    if !atty::is(atty::Stream::Stdin) {
        return suggested.ok_or(StoreError::RecipientRequired);
    }

    let mut input = Input::<String>::new()
        .with_prompt("Could not detect recipient. GPG recipient (email or key ID)")
        .allow_empty(true);
    if let Some(default) = suggested {
        input = input.default(default);
    }

    input
        .interact_text()
        .map_err(|e| StoreError::Other(format!("Failed to read recipient: {e}")))
}

fn print_directory(index: &StoreIndex, relative_path: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    println!("{indent}{}/", name.blue().bold());

    let child_indent = "  ".repeat(depth + 1);
    if let Some(entries) = index.contents_by_path.get(relative_path) {
        for entry in entries {
            println!("{child_indent}{entry}");
        }
    }
    if let Some(subdirs) = index.subdirs_by_path.get(relative_path) {
        for subdir in subdirs {
            print_directory(index, &format!("{relative_path}/{subdir}"), depth + 1);
        }
    }
}
