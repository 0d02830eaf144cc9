//! Scratch file cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Removes a job's scratch files when dropped, whatever the job's outcome.
#[derive(Debug)]
pub struct ScratchGuard {
    paths: Vec<PathBuf>,
}

impl ScratchGuard {
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        Self {
            paths: paths.into_iter().map(Path::to_path_buf).collect(),
        }
    }

    /// Removes every tracked file that exists. Missing files are not an error.
    pub fn cleanup(&self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}
