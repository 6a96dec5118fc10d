//! Command dispatch
//!
//! The parser produces a [`Command`] once; everything after that works from
//! this value alone.

pub mod bookmark;

use anyhow::{bail, Context, Result};

use dh_core::Bookmarks;

use crate::output::Output;

/// A parsed command and its key argument, if one was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { key: Option<String> },
    List,
    Goto { key: Option<String> },
    Delete { key: Option<String> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Add { .. } => "add",
            Command::List => "list",
            Command::Goto { .. } => "goto",
            Command::Delete { .. } => "delete",
        }
    }

    /// Whether the command only reads from the store
    pub fn is_read_only(&self) -> bool {
        matches!(self, Command::List | Command::Goto { .. })
    }

    /// Check arguments before the store is touched
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::List => Ok(()),
            Command::Add { key } | Command::Goto { key } | Command::Delete { key } => {
                required_key(self.name(), key.as_deref()).map(|_| ())
            }
        }
    }
}

/// Execute `command` against an open store
pub fn run(command: Command, bookmarks: &mut Bookmarks, output: &Output) -> Result<()> {
    let name = command.name();
    match command {
        Command::Add { key } => {
            let key = required_key(name, key.as_deref())?;
            let cwd = std::env::current_dir().context("error getting working dir")?;
            bookmark::add(bookmarks, key, &cwd, output)
        }
        Command::List => bookmark::list(bookmarks, output),
        Command::Goto { key } => bookmark::goto(bookmarks, required_key(name, key.as_deref())?, output),
        Command::Delete { key } => {
            bookmark::delete(bookmarks, required_key(name, key.as_deref())?, output)
        }
    }
}

fn required_key<'a>(command: &str, key: Option<&'a str>) -> Result<&'a str> {
    match key {
        Some(key) if !key.is_empty() => Ok(key),
        _ => bail!("dir key is required when using command `{}`", command),
    }
}
