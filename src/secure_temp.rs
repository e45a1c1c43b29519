//! Secure scratch file handling for decrypted entry content.
//!
//! A scratch file holds plaintext only between decrypt and re-encrypt. It
//! lives in a mode-0700 directory, is created mode 0600, and is wiped and
//! removed on every exit path; `Drop` backstops explicit cleanup.

use crate::error::{Result, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use zeroize::Zeroize;

/// Prefix for passview scratch files
const SCRATCH_FILE_PREFIX: &str = "passview-edit-";

/// Get the secure temp directory for passview
fn secure_temp_dir() -> std::io::Result<PathBuf> {
    let dir = std::env::temp_dir().join("passview-secure");
    fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }

    Ok(dir)
}

/// Overwrite a file's content in place, first with zeros, then with random
/// bytes of the same length. Best effort; the caller removes the file.
fn wipe_file(path: &Path) {
    if let Ok(mut content) = fs::read(path) {
        let len = content.len();
        content.zeroize();
        let _ = fs::write(path, &content);

        let random_data: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
        let _ = fs::write(path, &random_data);
    }
}

/// Clean up any leftover scratch files from previous sessions
pub fn cleanup_old_scratch_files() -> Result<()> {
    let dir = secure_temp_dir()?;

    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let leftover = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(SCRATCH_FILE_PREFIX));
        if leftover {
            wipe_file(&path);
            let _ = fs::remove_file(&path);
        }
    }

    Ok(())
}

/// Scratch file for plaintext between decrypt and re-encrypt.
pub struct ScratchFile {
    path: PathBuf,
    cleaned: bool,
}

impl ScratchFile {
    /// Create a new empty scratch file.
    pub fn new() -> Result<Self> {
        let dir = secure_temp_dir().map_err(|e| StoreError::TempFile(e.to_string()))?;

        let temp_file = tempfile::Builder::new()
            .prefix(SCRATCH_FILE_PREFIX)
            .suffix(".txt")
            .tempfile_in(&dir)
            .map_err(|e| StoreError::TempFile(e.to_string()))?;

        // Keep the file; lifetime is managed here, not by tempfile
        let (_file, path) = temp_file
            .keep()
            .map_err(|e| StoreError::TempFile(format!("Failed to persist scratch file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self {
            path,
            cleaned: false,
        })
    }

    /// Create a scratch file already holding `content`.
    pub fn with_content(content: &str) -> Result<Self> {
        let scratch = Self::new()?;
        scratch.write(content)?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content).map_err(|e| StoreError::TempFile(e.to_string()))?;
        Ok(())
    }

    /// Open the file in the user's editor and return the edited content.
    pub fn edit_with_editor(&self) -> Result<String> {
        let editor = std::env::var("EDITOR")
            .or_else(|_| std::env::var("VISUAL"))
            .unwrap_or_else(|_| default_editor().to_string());

        let status = Command::new(&editor)
            .arg(&self.path)
            .status()
            .map_err(|e| StoreError::Other(format!("Failed to launch editor '{editor}': {e}")))?;
        if !status.success() {
            return Err(StoreError::EditorFailed);
        }

        Ok(fs::read_to_string(&self.path)?)
    }

    /// Wipe and remove the scratch file.
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.cleaned && self.path.exists() {
            wipe_file(&self.path);
            fs::remove_file(&self.path)?;
            self.cleaned = true;
        }
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // Best effort cleanup in destructor
        let _ = self.cleanup();
    }
}

fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_scratch_file_lifecycle() {
        let mut scratch = ScratchFile::with_content("secret text").unwrap();
        let path = scratch.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "secret text");

        scratch.cleanup().unwrap();
        assert!(!path.exists());

        // Second cleanup is a no-op
        scratch.cleanup().unwrap();
    }

    #[test]
    #[serial]
    fn test_scratch_file_removed_on_drop() {
        let path = {
            let scratch = ScratchFile::with_content("ephemeral").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_scratch_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = ScratchFile::new().unwrap();
        let mode = fs::metadata(scratch.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
