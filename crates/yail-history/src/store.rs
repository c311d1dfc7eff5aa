//! Collaborators the history works through

use std::io;
use std::path::Path;

use yail_blocks::Workspace;

use crate::error::Result;

/// Something whose whole state can be captured as a string and put back.
pub trait WorkspaceStore {
    fn snapshot(&self) -> Result<String>;
    fn restore(&mut self, state: &str) -> Result<()>;
}

impl WorkspaceStore for Workspace {
    fn snapshot(&self) -> Result<String> {
        Ok(self.to_json()?)
    }

    fn restore(&mut self, state: &str) -> Result<()> {
        *self = Workspace::from_json(state)?;
        Ok(())
    }
}

/// Persists saved projects.
pub trait SaveSink {
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Writes straight to the file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSaveSink;

impl SaveSink for FileSaveSink {
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }
}

/// Receives the designer's property JSON again after undo or redo, so a
/// live session can catch up with the restored workspace.
pub trait PropertyContextSink {
    fn reissue(&mut self, properties: &str);
}

/// Ignores property context.
impl PropertyContextSink for () {
    fn reissue(&mut self, _properties: &str) {}
}
