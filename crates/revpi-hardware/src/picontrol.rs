//! The real piControl device node.

use crate::traits::ControlDevice;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read/write handle on `/dev/piControl0`.
///
/// Process-image transfers use `pread`/`pwrite`, so the file cursor is never
/// touched and concurrent transfers at disjoint offsets are safe.
#[derive(Debug)]
pub struct PiControlFile {
    path: PathBuf,
    file: File,
}

impl PiControlFile {
    /// Open the device node for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the node is missing or not accessible.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        debug!(path = %path.display(), "Opened piControl device");
        Ok(Self { path, file })
    }

    /// Path the handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlDevice for PiControlFile {
    fn control(&self, code: u32, arg: Option<&mut [u8]>) -> io::Result<i32> {
        let ptr = arg.map_or(std::ptr::null_mut(), |buf| buf.as_mut_ptr());
        // SAFETY: the descriptor is open for the lifetime of `self`, and `ptr`
        // is either null or points at a caller-owned buffer sized for `code`.
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), code as _, ptr) };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(result)
        }
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(&self.file, buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        FileExt::write_at(&self.file, buf, offset)
    }

    fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: ownership of `fd` was transferred by `into_raw_fd`, so it is
        // closed exactly once here.
        let result = unsafe { libc::close(fd) };

        if result == 0 {
            debug!(path = %self.path.display(), "Closed piControl device");
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_node() {
        let error = PiControlFile::open("/nonexistent/piControl0").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }
}
