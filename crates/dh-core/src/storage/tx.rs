//! Read-only and read-write transactions
//!
//! A [`ReadTx`] owns a snapshot of the committed state taken when it began;
//! commits made afterwards are invisible to it. A [`WriteTx`] stages its
//! changes on a private copy of the state and publishes them in one step
//! when [`WriteTx::commit`] succeeds.

use std::mem;
use std::sync::Arc;

use tracing::debug;

use super::db::Db;
use super::error::{StoreError, StoreResult};
use super::format::Op;
use super::state::{Iter, State};

/// Lifecycle of a read-write transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Accepting reads and writes
    Active,
    /// Changes are durable and visible to later transactions
    Committed,
    /// Changes were discarded
    Aborted,
}

/// A consistent, read-only view of the store
#[derive(Debug, Clone)]
pub struct ReadTx {
    snapshot: Arc<State>,
}

impl ReadTx {
    pub(crate) fn new(snapshot: Arc<State>) -> Self {
        Self { snapshot }
    }

    /// Look up `key` in `bucket`
    pub fn get(&self, bucket: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> StoreResult<Option<&[u8]>> {
        lookup(&self.snapshot, bucket.as_ref(), key.as_ref())
    }

    /// Iterate over a bucket's entries in key order
    pub fn iter(&self, bucket: impl AsRef<[u8]>) -> StoreResult<Iter<'_>> {
        scan(&self.snapshot, bucket.as_ref())
    }

    pub fn bucket_exists(&self, bucket: impl AsRef<[u8]>) -> bool {
        self.snapshot.has_bucket(bucket.as_ref())
    }

    pub fn bucket_names(&self) -> Vec<Vec<u8>> {
        self.snapshot.bucket_names().map(<[u8]>::to_vec).collect()
    }
}

/// A read-write transaction
///
/// Only one can exist per [`Db`] at a time, and only a handle holding the
/// exclusive file lock can start one. Dropping an uncommitted transaction
/// rolls it back. Any failed mutation aborts the transaction; every later
/// call then fails with [`StoreError::TxClosed`].
pub struct WriteTx<'db> {
    db: &'db mut Db,
    staged: State,
    ops: Vec<Op>,
    status: TxStatus,
}

impl<'db> WriteTx<'db> {
    pub(crate) fn new(db: &'db mut Db, base: &State) -> Self {
        Self {
            db,
            staged: base.clone(),
            ops: Vec::new(),
            status: TxStatus::Active,
        }
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Create `bucket` unless it already exists
    pub fn create_bucket_if_not_exists(&mut self, bucket: impl AsRef<[u8]>) -> StoreResult<()> {
        self.ensure_active()?;
        let bucket = bucket.as_ref();
        if bucket.is_empty() {
            return self.fail(StoreError::BucketNameEmpty);
        }
        if self.staged.has_bucket(bucket) {
            return Ok(());
        }
        self.record(Op::CreateBucket {
            bucket: bucket.to_vec(),
        })
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn put(
        &mut self,
        bucket: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> StoreResult<()> {
        self.ensure_active()?;
        let (bucket, key) = (bucket.as_ref(), key.as_ref());
        self.check_target(bucket, key)?;
        self.record(Op::Put {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
            value: value.as_ref().to_vec(),
        })
    }

    /// Remove `key`; removing an absent key succeeds without effect
    pub fn delete(&mut self, bucket: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> StoreResult<()> {
        self.ensure_active()?;
        let (bucket, key) = (bucket.as_ref(), key.as_ref());
        self.check_target(bucket, key)?;
        if matches!(self.staged.get(bucket, key), Some(None)) {
            return Ok(());
        }
        self.record(Op::Delete {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
        })
    }

    /// Look up `key`, including this transaction's uncommitted writes
    pub fn get(&self, bucket: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> StoreResult<Option<&[u8]>> {
        self.ensure_active()?;
        lookup(&self.staged, bucket.as_ref(), key.as_ref())
    }

    /// Iterate over a bucket in key order, including uncommitted writes
    pub fn iter(&self, bucket: impl AsRef<[u8]>) -> StoreResult<Iter<'_>> {
        self.ensure_active()?;
        scan(&self.staged, bucket.as_ref())
    }

    pub fn bucket_exists(&self, bucket: impl AsRef<[u8]>) -> bool {
        self.staged.has_bucket(bucket.as_ref())
    }

    pub fn bucket_names(&self) -> Vec<Vec<u8>> {
        self.staged.bucket_names().map(<[u8]>::to_vec).collect()
    }

    /// Make every staged change durable and visible, all at once
    ///
    /// On failure nothing is published and the file is left as it was
    /// before the commit started.
    pub fn commit(mut self) -> StoreResult<()> {
        self.ensure_active()?;
        let ops = mem::take(&mut self.ops);
        if ops.is_empty() {
            self.status = TxStatus::Committed;
            return Ok(());
        }

        match self.db.append_commit(ops) {
            Ok(txid) => {
                let staged = mem::take(&mut self.staged);
                self.db.publish(staged);
                self.status = TxStatus::Committed;
                debug!("Committed transaction {}", txid);
                Ok(())
            }
            Err(e) => {
                self.status = TxStatus::Aborted;
                Err(e)
            }
        }
    }

    /// Discard all staged changes
    pub fn rollback(mut self) {
        self.abort();
    }

    fn ensure_active(&self) -> StoreResult<()> {
        match self.status {
            TxStatus::Active => Ok(()),
            TxStatus::Committed | TxStatus::Aborted => Err(StoreError::TxClosed),
        }
    }

    fn check_target(&mut self, bucket: &[u8], key: &[u8]) -> StoreResult<()> {
        if bucket.is_empty() {
            return self.fail(StoreError::BucketNameEmpty);
        }
        if !self.staged.has_bucket(bucket) {
            return self.fail(StoreError::BucketNotFound {
                name: String::from_utf8_lossy(bucket).into_owned(),
            });
        }
        if key.is_empty() {
            return self.fail(StoreError::KeyEmpty);
        }
        Ok(())
    }

    fn record(&mut self, op: Op) -> StoreResult<()> {
        if self.staged.apply(&op).is_err() {
            let missing = bucket_not_found(op.bucket());
            return self.fail(missing);
        }
        self.ops.push(op);
        Ok(())
    }

    fn fail(&mut self, error: StoreError) -> StoreResult<()> {
        self.abort();
        Err(error)
    }

    fn abort(&mut self) {
        if self.status == TxStatus::Active && !self.ops.is_empty() {
            debug!("Rolling back {} staged operation(s)", self.ops.len());
        }
        self.ops.clear();
        self.staged = State::default();
        self.status = TxStatus::Aborted;
    }
}

impl Drop for WriteTx<'_> {
    fn drop(&mut self) {
        if self.status == TxStatus::Active {
            self.abort();
        }
    }
}

fn lookup<'s>(state: &'s State, bucket: &[u8], key: &[u8]) -> StoreResult<Option<&'s [u8]>> {
    state.get(bucket, key).ok_or_else(|| bucket_not_found(bucket))
}

fn scan<'s>(state: &'s State, bucket: &[u8]) -> StoreResult<Iter<'s>> {
    state.iter(bucket).ok_or_else(|| bucket_not_found(bucket))
}

fn bucket_not_found(bucket: &[u8]) -> StoreError {
    StoreError::BucketNotFound {
        name: String::from_utf8_lossy(bucket).into_owned(),
    }
}
