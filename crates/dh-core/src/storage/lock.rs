//! Advisory file locking with a bounded wait
//!
//! Locks are taken on the store file itself with `flock`-style semantics
//! (via `fs2`), so they are released when the handle is closed or the
//! process exits.

use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use super::error::{StoreError, StoreResult};

/// How often a contended lock is retried
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Kind of lock held on the store file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Held by writers; excludes every other handle
    Exclusive,
    /// Held by read-only handles; excludes writers only
    Shared,
}

/// Acquire `mode` on `file`, retrying until `timeout` has elapsed
///
/// A zero timeout makes a single attempt.
pub fn acquire(file: &File, path: &Path, mode: LockMode, timeout: Duration) -> StoreResult<()> {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        let result = match mode {
            LockMode::Exclusive => FileExt::try_lock_exclusive(file),
            LockMode::Shared => FileExt::try_lock_shared(file),
        };

        match result {
            Ok(()) => {
                if attempts > 0 {
                    debug!(
                        "Acquired {:?} lock on {:?} after {:?}",
                        mode,
                        path,
                        started.elapsed()
                    );
                }
                return Ok(());
            }
            Err(e) if is_contended(&e) => {}
            Err(e) => return Err(StoreError::open_failed(e, path.to_path_buf())),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(StoreError::LockTimeout {
                path: path.to_path_buf(),
                timeout,
            });
        }

        if attempts == 0 {
            debug!("Store {:?} is locked by another process, waiting", path);
        }
        attempts += 1;
        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

/// Release whatever lock `file` holds
pub fn release(file: &File) -> std::io::Result<()> {
    FileExt::unlock(file)
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
