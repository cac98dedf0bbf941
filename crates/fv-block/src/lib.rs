#![forbid(unsafe_code)]
//! Raw device access for extent verification.
//!
//! Provides the `ByteDevice` trait for absolute-offset reads (pread
//! semantics), a file-backed implementation for loop and block devices, an
//! in-memory implementation for synthetic images, and [`ExtentReader`],
//! which reconstructs the head or tail of a file from its physical extents.

mod reader;

pub use reader::{ExtentReader, total_span_bytes};

use fv_error::{FvError, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Byte-addressed device for fixed-offset reads.
pub trait ByteDevice: Send + Sync {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

fn checked_range(offset: u64, len: usize, device_len: u64, op: &str) -> Result<u64> {
    let end = offset
        .checked_add(
            u64::try_from(len)
                .map_err(|_| FvError::Format(format!("{op} length overflows u64")))?,
        )
        .ok_or_else(|| FvError::Format(format!("{op} range overflows u64")))?;
    if end > device_len {
        return Err(FvError::Format(format!(
            "{op} out of bounds: offset={offset} len={len} device_len={device_len}"
        )));
    }
    Ok(end)
}

/// Read-only, file-backed byte device.
///
/// Works for regular image files and for block device nodes such as
/// `/dev/loop3p1`. Uses `std::os::unix::fs::FileExt`, so every read is
/// positioned absolutely and no shared seek cursor exists. The handle is
/// closed when the device is dropped.
#[derive(Debug)]
pub struct FileByteDevice {
    file: File,
    path: PathBuf,
    len: u64,
}

impl FileByteDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = device_len(&file)?;
        debug!(device = %path.display(), len, "opened raw device");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Length of a regular file or block device.
///
/// Block device nodes report a metadata length of zero, so the end offset
/// is found by seeking instead.
fn device_len(file: &File) -> Result<u64> {
    use std::io::{Seek, SeekFrom};

    let meta_len = file.metadata()?.len();
    if meta_len > 0 {
        return Ok(meta_len);
    }
    let mut handle = file;
    let end = handle.seek(SeekFrom::End(0))?;
    handle.seek(SeekFrom::Start(0))?;
    Ok(end)
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        checked_range(offset, buf.len(), self.len, "read")?;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }
}

/// In-memory byte device for synthetic images.
#[derive(Debug)]
pub struct MemoryByteDevice {
    bytes: Mutex<Vec<u8>>,
}

impl MemoryByteDevice {
    /// Zero-filled device of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0_u8; len]),
        }
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(bytes),
        }
    }

    /// Overwrite bytes starting at `offset`.
    pub fn write_all_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.lock();
        let device_len = u64::try_from(bytes.len())
            .map_err(|_| FvError::Format("device length overflows u64".to_owned()))?;
        checked_range(offset, buf.len(), device_len, "write")?;
        let start = usize::try_from(offset)
            .map_err(|_| FvError::Format("offset does not fit usize".to_owned()))?;
        bytes[start..start + buf.len()].copy_from_slice(buf);
        drop(bytes);
        Ok(())
    }
}

impl ByteDevice for MemoryByteDevice {
    fn len_bytes(&self) -> u64 {
        u64::try_from(self.bytes.lock().len()).unwrap_or(u64::MAX)
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.lock();
        let device_len = u64::try_from(bytes.len())
            .map_err(|_| FvError::Format("device length overflows u64".to_owned()))?;
        checked_range(offset, buf.len(), device_len, "read")?;
        let start = usize::try_from(offset)
            .map_err(|_| FvError::Format("offset does not fit usize".to_owned()))?;
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        drop(bytes);
        Ok(())
    }
}
