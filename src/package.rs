//! Directory-to-archive packaging
//!
//! A conversion writer may produce a directory tree. Cached artifacts are
//! single files, so the tree is normalized into one ZIP archive that
//! preserves every entry's relative path. The archive is written under a
//! temporary sibling name, the source directory is removed, and the archive
//! is renamed into the directory's canonical location, so a cache lock on
//! the key never observes a half-written archive.

use crate::error::{PackageError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::FileOptions;

/// Replace the directory at `dir` with a ZIP archive of its contents
///
/// Every file lands in the archive under its path relative to `dir`; empty
/// directories are preserved as directory entries. On failure the staging
/// archive is removed and the source directory is left untouched.
pub fn archive_directory(dir: &Path) -> Result<()> {
    let staging = staging_path(dir);
    debug!(directory = %dir.display(), staging = %staging.display(), "packaging directory");

    if let Err(err) = write_archive(dir, &staging) {
        // Leave no stray staging file behind
        let _ = fs::remove_file(&staging);
        return Err(err);
    }

    fs::remove_dir_all(dir).map_err(|e| PackageError::ReplaceFailed {
        path: dir.to_path_buf(),
        reason: format!("failed to remove source directory: {e}"),
    })?;
    fs::rename(&staging, dir).map_err(|e| PackageError::ReplaceFailed {
        path: dir.to_path_buf(),
        reason: format!("failed to rename archive into place: {e}"),
    })?;
    Ok(())
}

fn staging_path(dir: &Path) -> PathBuf {
    let mut name = dir.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}

fn write_archive(root: &Path, archive: &Path) -> Result<()> {
    let file = File::create(archive).map_err(|e| PackageError::ArchiveWrite {
        archive: archive.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default();

    // Iterative traversal; entry order is made deterministic by name so the
    // same tree always produces the same archive layout.
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| PackageError::ArchiveWrite {
            archive: archive.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.path() == root {
            continue;
        }
        let relative =
            entry
                .path()
                .strip_prefix(root)
                .map_err(|_| PackageError::EntryOutsideRoot {
                    entry: entry.path().to_path_buf(),
                    root: root.to_path_buf(),
                })?;
        let name = archive_entry_name(relative);

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)
                .map_err(|e| PackageError::ArchiveWrite {
                    archive: archive.to_path_buf(),
                    reason: e.to_string(),
                })?;
        } else {
            zip.start_file(name, options)
                .map_err(|e| PackageError::ArchiveWrite {
                    archive: archive.to_path_buf(),
                    reason: e.to_string(),
                })?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut zip)?;
        }
    }

    zip.finish().map_err(|e| PackageError::ArchiveWrite {
        archive: archive.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Relative path rendered with forward slashes, as archive entry names use
fn archive_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Read;
    use tempfile::TempDir;

    fn read_archive(path: &Path) -> HashMap<String, Vec<u8>> {
        let file = File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entries = HashMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            entries.insert(entry.name().to_owned(), content);
        }
        entries
    }

    #[test]
    fn archive_preserves_relative_paths_and_bytes() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("result");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a.txt"), b"alpha").unwrap();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub").join("b.txt"), b"beta").unwrap();

        archive_directory(&dir).unwrap();

        // The canonical location now holds a single archive file
        assert!(dir.is_file());
        assert!(!staging_path(&dir).exists());

        let entries = read_archive(&dir);
        assert_eq!(entries.get("a.txt").map(Vec::as_slice), Some(&b"alpha"[..]));
        assert_eq!(
            entries.get("sub/b.txt").map(Vec::as_slice),
            Some(&b"beta"[..])
        );
    }

    #[test]
    fn archive_keeps_empty_directories() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("result");
        fs::create_dir_all(dir.join("empty")).unwrap();
        fs::write(dir.join("data.csv"), b"a,b\n1,2\n").unwrap();

        archive_directory(&dir).unwrap();

        let entries = read_archive(&dir);
        assert!(entries.keys().any(|name| name.starts_with("empty/")));
        assert!(entries.contains_key("data.csv"));
    }

    #[test]
    fn archive_handles_deep_nesting() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("result");
        let mut deep = dir.clone();
        for level in 0..40 {
            deep = deep.join(format!("level{level}"));
        }
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("leaf.txt"), b"bottom").unwrap();

        archive_directory(&dir).unwrap();

        let entries = read_archive(&dir);
        let leaf = entries
            .keys()
            .find(|name| name.ends_with("leaf.txt"))
            .unwrap();
        assert_eq!(leaf.matches('/').count(), 40);
    }

    #[test]
    fn failed_archive_leaves_source_untouched() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("result");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a.txt"), b"alpha").unwrap();
        // Occupy the staging name with a directory so File::create fails
        fs::create_dir(staging_path(&dir)).unwrap();

        assert!(archive_directory(&dir).is_err());
        assert!(dir.is_dir());
        assert!(dir.join("a.txt").is_file());
    }

    #[test]
    fn entry_names_use_forward_slashes() {
        let relative = Path::new("sub").join("inner").join("file.txt");
        assert_eq!(archive_entry_name(&relative), "sub/inner/file.txt");
    }
}
