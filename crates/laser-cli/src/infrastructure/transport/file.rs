//! File-backed device channel.
//!
//! Writes go straight to a device node (e.g. `/dev/ttyUSB0`) or a regular
//! file.  Line speed and control lines are left to the OS setup of the node;
//! control-line requests are only logged.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DeviceChannel, TransportError};

#[derive(Debug)]
pub struct FileChannel {
    path: PathBuf,
    file: File,
}

impl FileChannel {
    /// Opens an existing device node or file for writing.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] when the path does not exist or is not
    /// writable.
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl DeviceChannel for FileChannel {
    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), TransportError> {
        debug!(path = %self.path.display(), dtr, rts, "control lines not driven by file channel");
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.file.write_all(bytes).map_err(TransportError::Write)?;
        self.file.flush().map_err(TransportError::Write)
    }
}
