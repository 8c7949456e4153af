//! Human-readable record of the edits one apply pass made to game files

use crate::error::ModResult;
use chrono::Local;
use std::path::{Path, PathBuf};

/// Collects timestamped lines in memory and writes them out when the pass ends.
///
/// Each session replaces the previous file so it only ever describes the
/// most recent apply.
#[derive(Debug, Clone)]
pub struct FileChangeLog {
    path: PathBuf,
    lines: Vec<String>,
}

impl FileChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begin a new session, discarding anything recorded so far
    pub fn start(&mut self) {
        self.lines.clear();
    }

    pub fn record(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!("{}", message);
        self.lines.push(format!(
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        ));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Write the session to disk
    pub fn end(&self) -> ModResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut content = self.lines.join("\n");
        content.push('\n');
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/filechanges.log");
        let mut log = FileChangeLog::new(&path);

        log.start();
        log.record("first pass");
        log.end().unwrap();

        log.start();
        log.record("second pass");
        log.end().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("first pass"));
        assert!(content.trim_end().ends_with("] second pass"));
        assert!(content.starts_with('['));
    }
}
