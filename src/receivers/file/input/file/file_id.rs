// SPDX-License-Identifier: Apache-2.0

//! File identity and checkpoint keys.
//!
//! A checkpoint key combines the absolute path with the inode so that a file
//! deleted and recreated at the same path gets a fresh key. Platforms without
//! inode numbers fall back to the path alone, where rotation cannot be told
//! apart from growth.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Separator between the path and the inode in a checkpoint key
pub const KEY_SEPARATOR: &str = "::";

/// A platform identifier for one physical file.
///
/// On Unix systems, this is the device ID + inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    /// Device ID
    dev: u64,
    /// Inode number
    ino: u64,
}

impl FileId {
    /// Create a FileId from raw device and inode values.
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Create a FileId from an open file handle.
    ///
    /// Returns `Ok(None)` where the platform exposes no inode.
    #[cfg(unix)]
    pub fn from_file(file: &File) -> io::Result<Option<Self>> {
        use std::os::unix::fs::MetadataExt;

        let metadata = file.metadata()?;
        Ok(Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }))
    }

    #[cfg(not(unix))]
    pub fn from_file(file: &File) -> io::Result<Option<Self>> {
        file.metadata()?;
        Ok(None)
    }

    /// Create a FileId from a path by opening the file.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Option<Self>> {
        let file = File::open(path)?;
        Self::from_file(&file)
    }

    pub fn dev(&self) -> u64 {
        self.dev
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

/// Absolute form of `path`, without resolving symlinks.
pub fn absolute_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

/// Build the checkpoint key for a path and its identity.
pub fn key_for(path: &Path, id: Option<FileId>) -> String {
    match id {
        Some(id) => format!("{}{}{}", path.display(), KEY_SEPARATOR, id.ino()),
        None => path.display().to_string(),
    }
}

/// Checkpoint key for the file currently at `path`.
pub fn file_key(path: impl AsRef<Path>) -> io::Result<String> {
    let path = absolute_path(path)?;
    let id = FileId::from_path(&path)?;
    Ok(key_for(&path, id))
}

/// Path portion of a checkpoint key (everything before the first separator).
pub fn key_path(key: &str) -> &str {
    match key.split_once(KEY_SEPARATOR) {
        Some((path, _)) => path,
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_key_for_with_inode() {
        let key = key_for(Path::new("/var/log/app.log"), Some(FileId::new(1, 98765)));
        assert_eq!(key, "/var/log/app.log::98765");
    }

    #[test]
    fn test_key_for_without_inode() {
        assert_eq!(key_for(Path::new("/var/log/app.log"), None), "/var/log/app.log");
    }

    #[test]
    fn test_key_path() {
        assert_eq!(key_path("/var/log/app.log::98765"), "/var/log/app.log");
        assert_eq!(key_path("/var/log/app.log"), "/var/log/app.log");
        assert_eq!(key_path("/var/log/a::b::1"), "/var/log/a");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_key_stable_across_appends() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"test content").unwrap();
        file.flush().unwrap();

        let key1 = file_key(file.path()).unwrap();
        file.write_all(b" more content").unwrap();
        file.flush().unwrap();
        let key2 = file_key(file.path()).unwrap();

        assert_eq!(key1, key2);
        assert_eq!(key_path(&key1), file.path().to_str().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_key_changes_on_recreate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        std::fs::write(&path, b"first").unwrap();
        // Keep the first inode alive so it cannot be reused.
        let _held = File::open(&path).unwrap();
        let key1 = file_key(&path).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, b"second").unwrap();
        let key2 = file_key(&path).unwrap();

        assert_ne!(key1, key2);
        assert_eq!(key_path(&key1), key_path(&key2));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_id_different_files() {
        let file1 = NamedTempFile::new().unwrap();
        let file2 = NamedTempFile::new().unwrap();

        let id1 = FileId::from_path(file1.path()).unwrap();
        let id2 = FileId::from_path(file2.path()).unwrap();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_file_id_display() {
        let id = FileId { dev: 123, ino: 456 };
        assert_eq!(format!("{}", id), "123:456");
    }
}
