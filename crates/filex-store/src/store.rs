use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Names currently held by a [`FileStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// The storage root holds no entries.
    Empty,
    /// Entry names in ascending byte order.
    Names(Vec<String>),
}

impl Listing {
    /// Entry names; empty for [`Listing::Empty`].
    pub fn names(&self) -> &[String] {
        match self {
            Listing::Empty => &[],
            Listing::Names(names) => names,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Listing::Empty)
    }
}

/// Directory-backed store of named byte blobs.
///
/// Cheap to share: every operation goes straight to the filesystem, so a
/// `FileStore` can sit behind an `Arc` and be used from many sessions.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open an existing storage root.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let metadata = fs::metadata(&root).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotADirectory { path: root.clone() },
            _ => StoreError::Root {
                path: root.clone(),
                source,
            },
        })?;
        if !metadata.is_dir() {
            return Err(StoreError::NotADirectory { path: root });
        }

        info!(root = %root.display(), "file store opened");
        Ok(Self { root })
    }

    /// Open a storage root, creating it (and its parents) if missing.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Root {
            path: root.clone(),
            source,
        })?;
        Self::open(root)
    }

    /// The storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create or truncate `name` and write `bytes` to it.
    ///
    /// `name` is joined to the root as given. A name containing separators or
    /// `..` resolves outside a flat namespace; callers that accept untrusted
    /// names get exactly that behaviour.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.path_for(name), bytes).map_err(|source| StoreError::Io {
            name: name.to_string(),
            source,
        })?;
        debug!(name, size = bytes.len(), "stored file");
        Ok(())
    }

    /// Read the full contents of `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        fs::read(self.path_for(name)).map_err(|source| StoreError::io(name, source))
    }

    /// Open `name` for streaming reads. Anything but a regular file is `NotFound`.
    pub fn open_read(&self, name: &str) -> Result<File> {
        let file = File::open(self.path_for(name)).map_err(|source| StoreError::io(name, source))?;
        let metadata = file
            .metadata()
            .map_err(|source| StoreError::io(name, source))?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(file)
    }

    /// True if a regular file named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Enumerate the names in the store.
    pub fn list(&self) -> Result<Listing> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::Root {
            path: self.root.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Root {
                path: self.root.clone(),
                source,
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        if names.is_empty() {
            return Ok(Listing::Empty);
        }
        names.sort();
        Ok(Listing::Names(names))
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "filex-store-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn write_then_read() {
        let root = unique_root("rw");
        let store = FileStore::create(&root).unwrap();

        store.write("report.pdf", &[0x25; 1500]).unwrap();
        let bytes = store.read("report.pdf").unwrap();
        assert_eq!(bytes.len(), 1500);
        assert_eq!(std::fs::read(root.join("report.pdf")).unwrap(), bytes);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn write_truncates_existing() {
        let root = unique_root("trunc");
        let store = FileStore::create(&root).unwrap();

        store.write("a.txt", b"a much longer first version").unwrap();
        store.write("a.txt", b"short").unwrap();
        assert_eq!(store.read("a.txt").unwrap(), b"short");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn read_missing_is_not_found() {
        let root = unique_root("missing");
        let store = FileStore::create(&root).unwrap();

        let err = store.read("ghost.bin").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { ref name } if name == "ghost.bin"));
        assert!(matches!(
            store.open_read("ghost.bin").unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(!store.contains("ghost.bin"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn write_into_missing_subdirectory_is_io_error() {
        let root = unique_root("subdir");
        let store = FileStore::create(&root).unwrap();

        let err = store.write("nested/x.txt", b"x").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn list_empty_store() {
        let root = unique_root("empty");
        let store = FileStore::create(&root).unwrap();

        let listing = store.list().unwrap();
        assert_eq!(listing, Listing::Empty);
        assert!(listing.names().is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn list_returns_exactly_stored_names() {
        let root = unique_root("list");
        let store = FileStore::create(&root).unwrap();

        store.write("b.txt", b"b").unwrap();
        store.write("a.txt", b"a").unwrap();

        let listing = store.list().unwrap();
        assert_eq!(
            listing,
            Listing::Names(vec!["a.txt".to_string(), "b.txt".to_string()])
        );
        assert!(store.contains("a.txt"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn open_requires_directory() {
        let root = unique_root("notdir");
        assert!(matches!(
            FileStore::open(&root).unwrap_err(),
            StoreError::NotADirectory { .. }
        ));

        std::fs::write(&root, b"plain file").unwrap();
        assert!(matches!(
            FileStore::open(&root).unwrap_err(),
            StoreError::NotADirectory { .. }
        ));

        let _ = std::fs::remove_file(&root);
    }

    #[test]
    fn open_read_streams_contents() {
        use std::io::Read;

        let root = unique_root("stream");
        let store = FileStore::create(&root).unwrap();
        store.write("s.bin", b"streamed").unwrap();

        let mut out = Vec::new();
        store.open_read("s.bin").unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"streamed");
        assert_eq!(store.root(), root.as_path());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn open_read_of_directory_is_not_found() {
        let root = unique_root("opendir");
        let store = FileStore::create(&root).unwrap();
        std::fs::create_dir(root.join("nested")).unwrap();

        assert!(matches!(
            store.open_read("nested").unwrap_err(),
            StoreError::NotFound { ref name } if name == "nested"
        ));

        let _ = std::fs::remove_dir_all(&root);
    }
}
