//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::io::{self, Write};
use std::path::Path;

use dh_core::Bookmark;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print every bookmark, one per line
    pub fn print_bookmarks(&self, bookmarks: &[Bookmark]) {
        match self.format {
            OutputFormat::Human => {
                for bookmark in bookmarks {
                    println!("{}", list_line(bookmark));
                }
            }
            OutputFormat::Json => print_json(&bookmarks),
            OutputFormat::Quiet => {
                for bookmark in bookmarks {
                    println!("{}", bookmark.key);
                }
            }
        }
    }

    /// Print the directory a bookmark points to
    ///
    /// Quiet mode still prints the path, since that is the whole point of `goto`.
    pub fn print_path(&self, bookmark: &Bookmark) {
        match self.format {
            OutputFormat::Json => print_json(bookmark),
            OutputFormat::Human | OutputFormat::Quiet => print_raw_path(&bookmark.path),
        }
    }

    /// Report a newly added bookmark
    ///
    /// Human output stays silent so `add` can be used in shell functions.
    pub fn added(&self, bookmark: &Bookmark) {
        if self.format == OutputFormat::Json {
            print_json(&serde_json::json!({
                "status": "success",
                "key": bookmark.key,
                "path": bookmark.path,
            }));
        }
    }

    /// Report a removed bookmark
    pub fn deleted(&self, bookmark: &Bookmark) {
        match self.format {
            OutputFormat::Human => println!("{}", deleted_message(bookmark)),
            OutputFormat::Json => print_json(&serde_json::json!({
                "status": "deleted",
                "key": bookmark.key,
                "path": bookmark.path,
            })),
            OutputFormat::Quiet => {}
        }
    }
}

/// `list` line for one bookmark
fn list_line(bookmark: &Bookmark) -> String {
    format!("key={}, value={}", bookmark.key, bookmark.path.display())
}

fn deleted_message(bookmark: &Bookmark) -> String {
    format!(
        "Successfully deleted {} from the bookmark",
        bookmark.path.display()
    )
}

/// Print a path exactly as stored, even if it is not valid UTF-8
#[cfg(unix)]
fn print_raw_path(path: &Path) {
    use std::os::unix::ffi::OsStrExt;

    let mut line = path.as_os_str().as_bytes().to_vec();
    line.push(b'\n');
    if let Err(e) = io::stdout().lock().write_all(&line) {
        eprintln!("Failed to write path: {}", e);
    }
}

#[cfg(not(unix))]
fn print_raw_path(path: &Path) {
    println!("{}", path.display());
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to format output as JSON: {}", e),
    }
}
