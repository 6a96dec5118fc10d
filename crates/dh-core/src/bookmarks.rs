//! Bookmark operations
//!
//! `Bookmarks` maps the four user commands onto store transactions. All
//! bookmarks live in a single bucket, created the first time the store is
//! opened for writing.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::models::Bookmark;
use crate::storage::{Access, Db, Options, ReadTx, StoreError};

/// Bucket holding every bookmark
pub const BUCKET: &str = "dirs";

/// Errors from bookmark operations
#[derive(Error, Debug)]
pub enum BookmarkError {
    /// No bookmark under this key
    #[error("key {key} dir not found")]
    NotFound { key: String },

    #[error("Bookmark key must not be empty")]
    KeyEmpty,

    #[error("Bookmark path must be absolute: {path:?}")]
    RelativePath { path: PathBuf },

    #[error("Bookmark path is not valid UTF-8: {path:?}")]
    NonUtf8Path { path: PathBuf },

    /// Stored value could not be read back as a path
    #[error("Stored path for key {key} is not valid UTF-8")]
    InvalidValue { key: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookmarkError {
    /// Whether this is an expected "no such bookmark" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, BookmarkError::NotFound { .. })
    }
}

/// Result type for bookmark operations
pub type BookmarkResult<T> = Result<T, BookmarkError>;

/// The bookmark store
#[derive(Debug)]
pub struct Bookmarks {
    db: Db,
}

impl Bookmarks {
    /// Open the configured store for reading and writing
    ///
    /// Creates the store file and the bookmark bucket if needed.
    pub fn open(config: &Config) -> BookmarkResult<Self> {
        let options = Options {
            lock_timeout: config.lock_timeout(),
            access: Access::ReadWrite,
        };
        Self::from_db(Db::open(&config.store_path, options)?)
    }

    /// Open the configured store with a shared lock
    ///
    /// Other read-only handles may be open at the same time. The store file
    /// must already exist.
    pub fn open_read_only(config: &Config) -> BookmarkResult<Self> {
        let options = Options {
            lock_timeout: config.lock_timeout(),
            access: Access::ReadOnly,
        };
        Self::from_db(Db::open(&config.store_path, options)?)
    }

    /// Wrap an open store, ensuring the bucket exists if it is writable
    pub fn from_db(mut db: Db) -> BookmarkResult<Self> {
        if !db.is_read_only() {
            db.update(|tx| tx.create_bucket_if_not_exists(BUCKET))?;
        }
        Ok(Self { db })
    }

    /// Bookmark `path` under `key`, replacing any existing bookmark
    pub fn add(&mut self, key: &str, path: &Path) -> BookmarkResult<Bookmark> {
        check_key(key)?;
        if !path.is_absolute() {
            return Err(BookmarkError::RelativePath {
                path: path.to_path_buf(),
            });
        }
        let value = encode_path(path)?;

        self.db.update(|tx| tx.put(BUCKET, key, value))?;
        debug!("Bookmarked {} -> {}", key, path.display());
        Ok(Bookmark::new(key, path))
    }

    /// Look up the bookmark for `key`
    pub fn get(&self, key: &str) -> BookmarkResult<Bookmark> {
        check_key(key)?;
        let tx = self.db.begin_read();
        lookup(&tx, key)?.ok_or_else(|| not_found(key))
    }

    /// All bookmarks, ordered by key
    pub fn list(&self) -> BookmarkResult<Vec<Bookmark>> {
        let tx = self.db.begin_read();
        if !tx.bucket_exists(BUCKET) {
            return Ok(Vec::new());
        }

        let bookmarks = tx
            .iter(BUCKET)?
            .map(|(key, value)| {
                let key = String::from_utf8_lossy(key).into_owned();
                let path = decode_path(&key, value)?;
                Ok::<_, BookmarkError>(Bookmark { key, path })
            })
            .collect::<BookmarkResult<Vec<_>>>()?;
        Ok(bookmarks)
    }

    /// Remove the bookmark for `key`, returning what was removed
    pub fn delete(&mut self, key: &str) -> BookmarkResult<Bookmark> {
        check_key(key)?;
        if self.db.is_read_only() {
            return Err(StoreError::ReadOnly.into());
        }

        let removed = self.db.update(|tx| {
            let value = tx.get(BUCKET, key)?.map(<[u8]>::to_vec);
            let value = value.ok_or_else(|| not_found(key))?;
            let path = decode_path(key, &value)?;
            tx.delete(BUCKET, key)?;
            Ok::<_, BookmarkError>(Bookmark::new(key, path))
        })?;

        debug!("Deleted bookmark {}", key);
        Ok(removed)
    }

    /// Release the store lock
    pub fn close(self) -> BookmarkResult<()> {
        self.db.close()?;
        Ok(())
    }
}

fn lookup(tx: &ReadTx, key: &str) -> BookmarkResult<Option<Bookmark>> {
    if !tx.bucket_exists(BUCKET) {
        return Ok(None);
    }
    match tx.get(BUCKET, key)? {
        Some(value) => Ok(Some(Bookmark::new(key, decode_path(key, value)?))),
        None => Ok(None),
    }
}

fn check_key(key: &str) -> BookmarkResult<()> {
    if key.is_empty() {
        return Err(BookmarkError::KeyEmpty);
    }
    Ok(())
}

/// Paths are stored as their raw bytes, so any directory can be bookmarked
#[cfg(unix)]
fn encode_path(path: &Path) -> BookmarkResult<&[u8]> {
    use std::os::unix::ffi::OsStrExt;
    Ok(path.as_os_str().as_bytes())
}

#[cfg(unix)]
fn decode_path(_key: &str, value: &[u8]) -> BookmarkResult<PathBuf> {
    use std::os::unix::ffi::OsStrExt;
    Ok(PathBuf::from(std::ffi::OsStr::from_bytes(value)))
}

#[cfg(not(unix))]
fn encode_path(path: &Path) -> BookmarkResult<&[u8]> {
    path.to_str()
        .map(str::as_bytes)
        .ok_or_else(|| BookmarkError::NonUtf8Path {
            path: path.to_path_buf(),
        })
}

#[cfg(not(unix))]
fn decode_path(key: &str, value: &[u8]) -> BookmarkResult<PathBuf> {
    std::str::from_utf8(value)
        .map(PathBuf::from)
        .map_err(|_| BookmarkError::InvalidValue {
            key: key.to_string(),
        })
}

fn not_found(key: &str) -> BookmarkError {
    BookmarkError::NotFound {
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            store_path: temp_dir.path().join("dh.db"),
            lock_timeout_ms: 100,
            log_level: "warn".to_string(),
        }
    }

    #[test]
    fn test_bookmark_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let mut bookmarks = Bookmarks::open(&config).unwrap();
        let project = Path::new("/home/alice/project");

        bookmarks.add("home", project).unwrap();

        let found = bookmarks.get("home").unwrap();
        assert_eq!(found.path, project);

        let all = bookmarks.list().unwrap();
        assert_eq!(all, vec![Bookmark::new("home", project)]);

        let removed = bookmarks.delete("home").unwrap();
        assert_eq!(removed.path, project);

        let err = bookmarks.get("home").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "key home dir not found");
    }

    #[test]
    fn test_add_silently_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let mut bookmarks = Bookmarks::open(&test_config(&temp_dir)).unwrap();

        bookmarks.add("work", Path::new("/srv/old")).unwrap();
        bookmarks.add("work", Path::new("/srv/new")).unwrap();

        assert_eq!(bookmarks.get("work").unwrap().path, Path::new("/srv/new"));
        assert_eq!(bookmarks.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_is_sorted_by_key() {
        let temp_dir = TempDir::new().unwrap();
        let mut bookmarks = Bookmarks::open(&test_config(&temp_dir)).unwrap();

        for key in ["b", "a", "c"] {
            bookmarks.add(key, Path::new("/tmp")).unwrap();
        }

        let keys: Vec<String> = bookmarks.list().unwrap().into_iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let mut bookmarks = Bookmarks::open(&test_config(&temp_dir)).unwrap();

        let err = bookmarks.delete("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rejects_bad_input() {
        let temp_dir = TempDir::new().unwrap();
        let mut bookmarks = Bookmarks::open(&test_config(&temp_dir)).unwrap();

        assert!(matches!(
            bookmarks.add("", Path::new("/tmp")),
            Err(BookmarkError::KeyEmpty)
        ));
        assert!(matches!(
            bookmarks.add("rel", Path::new("relative/dir")),
            Err(BookmarkError::RelativePath { .. })
        ));
        assert!(matches!(bookmarks.get(""), Err(BookmarkError::KeyEmpty)));
        assert!(bookmarks.list().unwrap().is_empty());
    }

    #[test]
    fn test_bookmarks_persist_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let mut bookmarks = Bookmarks::open(&config).unwrap();
        bookmarks.add("logs", Path::new("/var/log")).unwrap();
        bookmarks.close().unwrap();

        let bookmarks = Bookmarks::open_read_only(&config).unwrap();
        assert_eq!(bookmarks.get("logs").unwrap().path, Path::new("/var/log"));
    }

    #[test]
    fn test_read_only_store_without_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        Db::open(&config.store_path, Options::default())
            .unwrap()
            .close()
            .unwrap();

        let mut bookmarks = Bookmarks::open_read_only(&config).unwrap();
        assert!(bookmarks.list().unwrap().is_empty());
        assert!(bookmarks.get("home").unwrap_err().is_not_found());
        assert!(matches!(
            bookmarks.add("home", Path::new("/home")),
            Err(BookmarkError::Store(StoreError::ReadOnly))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_directory() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let dir = Path::new(OsStr::from_bytes(b"/tmp/caf\xe9"));

        let mut bookmarks = Bookmarks::open(&config).unwrap();
        bookmarks.add("latin1", dir).unwrap();
        bookmarks.close().unwrap();

        let mut bookmarks = Bookmarks::open(&config).unwrap();
        assert_eq!(bookmarks.get("latin1").unwrap().path, dir);
        assert_eq!(bookmarks.list().unwrap()[0].path, dir);
        assert_eq!(bookmarks.delete("latin1").unwrap().path, dir);
    }

    #[test]
    fn test_second_writer_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let _first = Bookmarks::open(&config).unwrap();

        let err = Bookmarks::open(&config).unwrap_err();
        assert!(matches!(
            err,
            BookmarkError::Store(StoreError::LockTimeout { .. })
        ));
    }
}
