//! Bookmark command handlers

use std::path::Path;

use anyhow::{Context, Result};

use dh_core::Bookmarks;

use crate::output::Output;

/// Bookmark the working directory under `key`
pub fn add(bookmarks: &mut Bookmarks, key: &str, cwd: &Path, output: &Output) -> Result<()> {
    let bookmark = bookmarks
        .add(key, cwd)
        .with_context(|| format!("Failed to bookmark {} as {}", cwd.display(), key))?;
    output.added(&bookmark);
    Ok(())
}

/// List all bookmarks in key order
pub fn list(bookmarks: &Bookmarks, output: &Output) -> Result<()> {
    let all = bookmarks.list()?;
    output.print_bookmarks(&all);
    Ok(())
}

/// Print the directory bookmarked under `key`
pub fn goto(bookmarks: &Bookmarks, key: &str, output: &Output) -> Result<()> {
    let bookmark = bookmarks.get(key)?;
    output.print_path(&bookmark);
    Ok(())
}

/// Remove the bookmark under `key`
pub fn delete(bookmarks: &mut Bookmarks, key: &str, output: &Output) -> Result<()> {
    let removed = bookmarks.delete(key)?;
    output.deleted(&removed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dh_core::{BookmarkError, Config};
    use tempfile::TempDir;

    use crate::output::OutputFormat;

    fn open(temp_dir: &TempDir) -> Bookmarks {
        let config = Config {
            store_path: temp_dir.path().join("dh.db"),
            ..Config::default()
        };
        Bookmarks::open(&config).unwrap()
    }

    #[test]
    fn test_handlers_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut bookmarks = open(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);
        let project = temp_dir.path().join("project");

        add(&mut bookmarks, "proj", &project, &output).unwrap();
        goto(&bookmarks, "proj", &output).unwrap();
        list(&bookmarks, &output).unwrap();
        delete(&mut bookmarks, "proj", &output).unwrap();

        let err = goto(&bookmarks, "proj", &output).unwrap_err();
        let cause = err.downcast_ref::<BookmarkError>().unwrap();
        assert!(cause.is_not_found());
    }

    #[test]
    fn test_delete_missing_reports_key() {
        let temp_dir = TempDir::new().unwrap();
        let mut bookmarks = open(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        let err = delete(&mut bookmarks, "ghost", &output).unwrap_err();
        assert_eq!(err.to_string(), "key ghost dir not found");
    }
}
