//! dh Core Library
//!
//! This crate provides the core functionality for dh, a tool that bookmarks
//! directories under short names and prints them back on request.
//!
//! # Architecture
//!
//! - **Storage**: a single-file transactional key-value store with one
//!   writer at a time, snapshot reads and crash-safe commits
//! - **Bookmarks**: the `add`/`list`/`goto`/`delete` operations, expressed
//!   as transactions against one bucket
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut bookmarks = Bookmarks::open(&config)?;
//!
//! bookmarks.add("home", Path::new("/home/alice/project"))?;
//! let bookmark = bookmarks.get("home")?;
//! ```
//!
//! # Modules
//!
//! - `bookmarks`: Bookmark operations (main entry point)
//! - `models`: The `Bookmark` type
//! - `storage`: The transactional store
//! - `config`: Application configuration

pub mod bookmarks;
pub mod config;
pub mod models;
pub mod storage;

pub use bookmarks::{BookmarkError, BookmarkResult, Bookmarks, BUCKET};
pub use config::Config;
pub use models::Bookmark;
pub use storage::{Access, Db, Options, ReadTx, StoreError, StoreResult, TxStatus, WriteTx};
