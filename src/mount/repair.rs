//! Host-side permission repair for sensitive bind-mount sources.
//!
//! Editors that install a server into a mounted home directory (`.vscode-server`)
//! need its binaries to stay executable once seen through the VM's mount, and
//! the tree must be traversable by the container user.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TranslateError};

/// Mode for directories created on the way to the mount source.
pub const CREATE_DIR_MODE: u32 = 0o777;
/// Mode for existing directories and executable files.
pub const DIR_MODE: u32 = 0o755;
pub const EXEC_FILE_MODE: u32 = 0o755;
/// Mode for plain files.
pub const FILE_MODE: u32 = 0o644;

fn repair_err(path: &Path) -> impl FnOnce(io::Error) -> TranslateError + '_ {
    move |source| TranslateError::MountRepair {
        path: path.to_path_buf(),
        source,
    }
}

/// Make sure `source` exists and every entry below it carries the mode its
/// kind requires. The parent of `source` is repaired as a directory too.
///
/// The first failing filesystem operation aborts the repair.
pub fn repair_tree(source: &Path) -> Result<()> {
    info!(source = %source.display(), "repairing permissions of mount source");

    if let Some(base) = source.parent().and_then(Path::parent) {
        if !base.as_os_str().is_empty() {
            create_dir_all(base)?;
        }
    }
    create_dir_all(source)?;

    let mut visited = 0usize;
    let mut stack: Vec<PathBuf> = vec![source.to_path_buf()];
    while let Some(path) = stack.pop() {
        let meta = fs::symlink_metadata(&path).map_err(repair_err(&path))?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            set_mode(&path, DIR_MODE)?;
            for entry in fs::read_dir(&path).map_err(repair_err(&path))? {
                let entry = entry.map_err(repair_err(&path))?;
                stack.push(entry.path());
            }
        } else {
            set_mode(&path, file_mode(&meta))?;
        }
        visited += 1;
    }

    if let Some(parent) = source.parent() {
        if !parent.as_os_str().is_empty() {
            set_mode(parent, DIR_MODE)?;
        }
    }

    debug!(source = %source.display(), entries = visited, "mount source permissions repaired");
    Ok(())
}

#[cfg(unix)]
fn create_dir_all(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(CREATE_DIR_MODE)
        .create(path)
        .map_err(repair_err(path))
}

#[cfg(not(unix))]
fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(repair_err(path))
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if meta.permissions().mode() & 0o111 != 0 {
        EXEC_FILE_MODE
    } else {
        FILE_MODE
    }
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    FILE_MODE
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(repair_err(path))
}

// Without POSIX modes the closest repair is clearing the read-only bit.
#[cfg(not(unix))]
fn set_mode(path: &Path, _mode: u32) -> Result<()> {
    let mut perms = fs::metadata(path).map_err(repair_err(path))?.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        fs::set_permissions(path, perms).map_err(repair_err(path))?;
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_repair_creates_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("home/vscode/.vscode-server");

        repair_tree(&source).unwrap();

        assert!(source.is_dir());
        assert_eq!(mode_of(&source), DIR_MODE);
        assert_eq!(mode_of(source.parent().unwrap()), DIR_MODE);
    }

    #[test]
    fn test_repair_sets_modes_by_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("u/.vscode-server");
        let bin = source.join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o700)).unwrap();

        let node = bin.join("node");
        fs::write(&node, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&node, fs::Permissions::from_mode(0o700)).unwrap();

        let data = source.join("data.json");
        fs::write(&data, b"{}").unwrap();
        fs::set_permissions(&data, fs::Permissions::from_mode(0o600)).unwrap();

        repair_tree(&source).unwrap();

        assert_eq!(mode_of(&bin), DIR_MODE);
        assert_eq!(mode_of(&node), EXEC_FILE_MODE);
        assert_eq!(mode_of(&data), FILE_MODE);
    }

    #[test]
    fn test_repair_skips_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tmp.path().join("outside.txt");
        fs::write(&outside, b"x").unwrap();
        fs::set_permissions(&outside, fs::Permissions::from_mode(0o600)).unwrap();

        let source = tmp.path().join("u/.vscode-server");
        fs::create_dir_all(&source).unwrap();
        std::os::unix::fs::symlink(&outside, source.join("link")).unwrap();

        repair_tree(&source).unwrap();

        assert_eq!(mode_of(&outside), 0o600);
    }

    #[test]
    fn test_repair_fails_when_source_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("u/.vscode-server");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"not a dir").unwrap();

        let err = repair_tree(&source).unwrap_err();
        assert!(matches!(err, TranslateError::MountRepair { .. }));
    }
}
