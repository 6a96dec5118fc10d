//! Storage layer
//!
//! A single-file, append-only transactional key-value store.
//!
//! ## Architecture
//!
//! - **File lock**: one writer per file (exclusive), or any number of
//!   read-only handles (shared)
//! - **Commit log**: every read-write transaction appends one checksummed
//!   frame, synced before the transaction reports success
//! - **Snapshots**: the log is replayed into an in-memory map of buckets;
//!   read transactions hold an immutable copy of it
//!
//! ## Usage
//!
//! ```ignore
//! let mut db = Db::open("dh.db", Options::default())?;
//! db.update(|tx| {
//!     tx.create_bucket_if_not_exists("dirs")?;
//!     tx.put("dirs", "home", "/home/alice")
//! })?;
//!
//! let tx = db.begin_read();
//! for (key, value) in tx.iter("dirs")? {
//!     // ...
//! }
//! ```

pub mod db;
pub mod error;
pub mod format;
pub mod lock;
pub mod state;
pub mod tx;

pub use db::{Access, Db, Options, DEFAULT_LOCK_TIMEOUT};
pub use error::{StoreError, StoreResult};
pub use state::Iter;
pub use tx::{ReadTx, TxStatus, WriteTx};
