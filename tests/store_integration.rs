// Integration tests for the store indexer and the edit workflow, driven
// through the public library API against a fixture store on disk.

use passview::{build_index, find_entry_path, StoreError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn make_store(layout: &[(&str, &[&str])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (subdir, files) in layout {
        let dir_path = if subdir.is_empty() {
            dir.path().to_path_buf()
        } else {
            let p = dir.path().join(subdir);
            fs::create_dir_all(&p).unwrap();
            p
        };
        for file in *files {
            fs::write(dir_path.join(format!("{file}.gpg")), b"ciphertext").unwrap();
        }
    }
    dir
}

#[test]
fn test_index_round_trip() {
    let store = make_store(&[
        ("", &["root1", "root2"]),
        ("dir1", &["file1", "file2"]),
        ("dir1/subdir1", &["subfile1"]),
        ("dir2", &["file3"]),
        ("dir2/subdir2/nested", &["nestedfile"]),
        ("empty_dir", &[]),
    ]);

    let index = build_index(store.path()).unwrap();

    assert_eq!(index.root_entries, vec!["root1", "root2"]);
    assert_eq!(index.directories, vec!["dir1", "dir2"]);
    assert_eq!(index.contents_by_path["dir1"], vec!["file1", "file2"]);
    assert_eq!(index.subdirs_by_path["dir1"], vec!["subdir1"]);
    assert_eq!(index.contents_by_path["dir1/subdir1"], vec!["subfile1"]);
    assert_eq!(
        index.path_by_entry_name["nestedfile"],
        store
            .path()
            .join("dir2")
            .join("subdir2")
            .join("nested")
            .join("nestedfile.gpg")
    );

    // The index-free resolver agrees with the lookup table
    assert_eq!(
        find_entry_path(store.path(), "nestedfile").as_ref(),
        Some(&index.path_by_entry_name["nestedfile"])
    );
}

#[test]
fn test_index_unreadable_root() {
    let result = build_index(Path::new("/definitely/not/a/store"));
    assert!(matches!(result, Err(StoreError::RootUnreadable { .. })));
}

#[cfg(unix)]
mod workflow {
    use super::*;
    use passview::secure_temp;
    use passview::workflow::{DecryptOutcome, EditSession, Phase, SaveOutcome};
    use passview::GpgClient;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// A fake gpg that decrypts by prefixing, detects a fixed keyid, and
    /// encrypts by wrapping the scratch content.
    fn fake_gpg(dir: &Path) -> PathBuf {
        let path = dir.join("fake-gpg.sh");
        let body = r#"#!/bin/sh
case "$*" in
  *--list-packets*) printf ':pubkey enc packet: version 3, algo 1, keyid 1122334455667788\n'; exit 0 ;;
  *--encrypt*)
    out=""; src=""
    while [ $# -gt 0 ]; do
      case "$1" in
        --output) out="$2"; shift ;;
        --encrypt) src="$2"; shift ;;
      esac
      shift
    done
    printf 'ENC[%s]' "$(cat "$src")" > "$out"
    exit 0 ;;
  *--decrypt*)
    for arg in "$@"; do last="$arg"; done
    printf 'gpg: encrypted with 1 key\n'
    cat "$last"
    exit 0 ;;
esac
exit 1
"#;
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_end_to_end_edit_cycle() {
        let store = make_store(&[("finance", &["bank"])]);
        let tool = fake_gpg(store.path());

        let index = build_index(store.path()).unwrap();
        let target = index.path_by_entry_name["bank"].clone();
        fs::write(&target, "old secret").unwrap();

        let mut session = EditSession::new(GpgClient::with_program(&tool), &target, None).unwrap();

        let plaintext = match session.decrypt().unwrap() {
            DecryptOutcome::Plaintext(text) => text,
            other => panic!("expected plaintext, got {other:?}"),
        };
        // Status line is filtered out, ciphertext payload comes through
        assert_eq!(plaintext, "old secret");
        assert_eq!(session.phase(), Phase::Editing);

        assert!(matches!(
            session.save("new secret").unwrap(),
            SaveOutcome::Saved
        ));
        assert_eq!(session.phase(), Phase::Done);
        assert_eq!(fs::read_to_string(&target).unwrap(), "ENC[new secret]");
    }

    #[test]
    #[serial]
    fn test_cleanup_removes_leftover_scratch_files() {
        // Simulate a crashed session by leaving a scratch file behind
        let leftover = {
            let scratch = secure_temp::ScratchFile::with_content("leftover").unwrap();
            let path = scratch.path().to_path_buf();
            std::mem::forget(scratch);
            path
        };
        assert!(leftover.exists());

        secure_temp::cleanup_old_scratch_files().unwrap();
        assert!(!leftover.exists());
    }
}
