//! Store handle
//!
//! A `Db` owns the store file and the lock on it for as long as it lives.
//! Opening replays the commit log into memory; every successful write
//! transaction appends one frame and syncs it before publishing the new
//! state.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use super::error::{StoreError, StoreResult};
use super::format::{self, Commit, Op, HEADER_LEN};
use super::lock::{self, LockMode};
use super::state::State;
use super::tx::{ReadTx, WriteTx};

/// Default bound on waiting for another process's lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Whether a handle may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Exclusive lock; the file is created if missing
    #[default]
    ReadWrite,
    /// Shared lock; the file must already exist
    ReadOnly,
}

/// Options for [`Db::open`]
#[derive(Debug, Clone)]
pub struct Options {
    /// How long to wait for a lock held by another process
    pub lock_timeout: Duration,
    pub access: Access,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            access: Access::ReadWrite,
        }
    }
}

/// An open store file
pub struct Db {
    path: PathBuf,
    file: File,
    access: Access,
    state: Arc<State>,
    last_txid: u64,
    /// End of the last committed frame
    end: u64,
    #[cfg(test)]
    fail_appends: bool,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("path", &self.path)
            .field("access", &self.access)
            .field("last_txid", &self.last_txid)
            .finish()
    }
}

impl Db {
    /// Open the store at `path`, creating it if needed
    ///
    /// Blocks for up to `options.lock_timeout` while another process holds
    /// a conflicting lock, then fails with [`StoreError::LockTimeout`].
    pub fn open(path: impl AsRef<Path>, options: Options) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writable = options.access == Access::ReadWrite;

        let mut file = OpenOptions::new()
            .read(true)
            .write(writable)
            .create(writable)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::open_failed(e, path.clone()))?;

        let mode = if writable {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        };
        lock::acquire(&file, &path, mode, options.lock_timeout)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| StoreError::Read {
                path: path.clone(),
                source: e,
            })?;

        if is_uninitialized(&bytes) {
            if writable {
                bytes = initialize(&mut file, &path)?;
            } else {
                // A writer created the file but has not written the header yet
                debug!("Store {:?} is not initialized yet, reading it as empty", path);
                bytes = format::encode_header().to_vec();
            }
        }

        format::check_header(&bytes).map_err(|details| StoreError::InvalidFormat {
            path: path.clone(),
            details,
        })?;

        let replay = format::read_frames(&bytes[HEADER_LEN..], HEADER_LEN as u64).map_err(|e| {
            StoreError::Corrupt {
                path: path.clone(),
                offset: e.offset,
                details: e.details,
            }
        })?;

        let mut state = State::default();
        for (commit, offset) in replay.commits.iter().zip(&replay.offsets) {
            for op in &commit.ops {
                state.apply(op).map_err(|details| StoreError::Corrupt {
                    path: path.clone(),
                    offset: *offset,
                    details,
                })?;
            }
        }

        if replay.torn {
            let discarded = bytes.len() as u64 - replay.valid_len;
            warn!(
                "Discarding {} byte(s) of an interrupted commit at the end of {:?}",
                discarded, path
            );
            if writable {
                file.set_len(replay.valid_len)
                    .and_then(|_| file.sync_all())
                    .map_err(|e| StoreError::from_io(e, path.clone()))?;
            }
        }

        let last_txid = replay.commits.last().map(|c| c.txid).unwrap_or(0);
        debug!(
            "Opened {:?} ({:?}, {} commit(s), last txid {})",
            path,
            options.access,
            replay.commits.len(),
            last_txid
        );

        Ok(Self {
            path,
            file,
            access: options.access,
            state: Arc::new(state),
            last_txid,
            end: replay.valid_len,
            #[cfg(test)]
            fail_appends: false,
        })
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.access == Access::ReadOnly
    }

    /// Id of the most recent committed transaction (0 for a fresh store)
    pub fn last_txid(&self) -> u64 {
        self.last_txid
    }

    /// Start a read-only transaction on the current committed state
    pub fn begin_read(&self) -> ReadTx {
        ReadTx::new(Arc::clone(&self.state))
    }

    /// Start a read-write transaction
    pub fn begin_write(&mut self) -> StoreResult<WriteTx<'_>> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        let base = Arc::clone(&self.state);
        Ok(WriteTx::new(self, &base))
    }

    /// Run `f` inside a read-only transaction
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTx) -> Result<T, E>,
    {
        let tx = self.begin_read();
        f(&tx)
    }

    /// Run `f` inside a read-write transaction
    ///
    /// Commits if `f` returns `Ok`, rolls back if it returns `Err`.
    pub fn update<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tx = self.begin_write()?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Release the lock and close the file
    pub fn close(self) -> StoreResult<()> {
        lock::release(&self.file).map_err(|e| StoreError::from_io(e, self.path.clone()))?;
        debug!("Closed {:?}", self.path);
        Ok(())
    }

    /// Durably append a commit frame, returning its transaction id
    ///
    /// On failure the file is cut back to its previous length.
    pub(crate) fn append_commit(&mut self, ops: Vec<Op>) -> StoreResult<u64> {
        let commit = Commit {
            txid: self.last_txid + 1,
            committed_at: Utc::now(),
            ops,
        };
        let frame = format::encode_frame(&commit).map_err(StoreError::Encode)?;

        if let Err(e) = self.write_frame(&frame) {
            if let Err(trunc) = self.file.set_len(self.end).and_then(|_| self.file.sync_all()) {
                warn!(
                    "Failed to discard partial commit in {:?}: {}",
                    self.path, trunc
                );
            }
            return Err(StoreError::from_io(e, self.path.clone()));
        }

        self.end += frame.len() as u64;
        self.last_txid = commit.txid;
        Ok(commit.txid)
    }

    pub(crate) fn publish(&mut self, state: State) {
        self.state = Arc::new(state);
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.end))?;

        #[cfg(test)]
        if self.fail_appends {
            self.file.write_all(&frame[..frame.len() / 2])?;
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }

        self.file.write_all(frame)?;
        self.file.sync_data()
    }

    #[cfg(test)]
    pub(crate) fn fail_appends(&mut self, fail: bool) {
        self.fail_appends = fail;
    }
}

/// An empty file, or one whose creation stopped partway through the header
fn is_uninitialized(bytes: &[u8]) -> bool {
    bytes.len() < HEADER_LEN && format::encode_header().starts_with(bytes)
}

fn initialize(file: &mut File, path: &Path) -> StoreResult<Vec<u8>> {
    let header = format::encode_header();
    file.set_len(0)
        .and_then(|_| file.seek(SeekFrom::Start(0)))
        .and_then(|_| file.write_all(&header))
        .and_then(|_| file.sync_all())
        .map_err(|e| StoreError::from_io(e, path.to_path_buf()))?;
    debug!("Initialized new store at {:?}", path);
    Ok(header.to_vec())
}
