use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use mongrate_common::{Error, Result};
use tracing::warn;

/// Where migration scripts come from.
pub trait ScriptSource: Send + Sync {
    /// Names of every non-directory entry, in no particular order.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Open a script for streaming.
    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>>;

    fn read_to_string(&self, name: &str) -> Result<String>;
}

/// Scripts stored as files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalScriptDir {
    root: PathBuf,
}

impl LocalScriptDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ScriptSource for LocalScriptDir {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            // file_type() does not follow symlinks, so a link to a directory
            // is listed like any other file.
            if entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => warn!("skipping script with non UTF-8 name: {raw:?}"),
            }
        }
        Ok(names)
    }

    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let file = File::open(self.path_of(name))?;
        Ok(Box::new(file))
    }

    fn read_to_string(&self, name: &str) -> Result<String> {
        std::fs::read_to_string(self.path_of(name)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(name.to_string()),
            _ => Error::Io(e),
        })
    }
}
