//! Capture of trial inputs that require the filesystem to be mounted, and
//! of the partition size.

use crate::exec::CommandExecutor;
use crate::verify::ExpectedBytes;
use fv_error::{FvError, Result};
use fv_types::PartitionBounds;
use std::fs;
use std::os::unix::fs::FileExt;
use std::path::Path;
use tracing::debug;

/// Run the extent reporting tool on `file`, in 512-byte units.
pub fn acquire_report(exec: &dyn CommandExecutor, tool: &str, file: &Path) -> Result<String> {
    let args = [
        "-b512".to_owned(),
        "-e".to_owned(),
        "-s".to_owned(),
        file.display().to_string(),
    ];
    exec.run_checked(tool, &args)
}

/// Read the first and last `compare_bytes` of `file` through the filesystem.
///
/// Returns `None` when the file is not suitable for validation: not a
/// regular file, or not larger than `compare_bytes`.
pub fn capture_expected(file: &Path, compare_bytes: usize) -> Result<Option<ExpectedBytes>> {
    let meta = fs::metadata(file)?;
    let size = meta.len();
    let compare = u64::try_from(compare_bytes)
        .map_err(|_| FvError::Format("compare size overflows u64".to_owned()))?;
    if !meta.is_file() || size <= compare {
        debug!(file = %file.display(), size, compare_bytes, "file not suitable");
        return Ok(None);
    }

    let handle = fs::File::open(file)?;
    let mut head = vec![0_u8; compare_bytes];
    handle.read_exact_at(&mut head, 0)?;
    let mut tail = vec![0_u8; compare_bytes];
    handle.read_exact_at(&mut tail, size - compare)?;
    Ok(Some(ExpectedBytes { head, tail }))
}

/// Size of the partition behind `device`, in 512-byte sectors.
///
/// Reads `<sysfs_root>/<device-name>/size`; when that entry does not exist
/// (e.g. `device` is an image file) falls back to `blockdev --getsz`.
pub fn partition_size_sectors(
    exec: &dyn CommandExecutor,
    sysfs_root: &Path,
    device: &Path,
) -> Result<PartitionBounds> {
    let sysfs_size = device
        .file_name()
        .map(|name| sysfs_root.join(name).join("size"))
        .filter(|path| path.is_file());

    let text = match sysfs_size {
        Some(path) => {
            debug!(path = %path.display(), "reading partition size from sysfs");
            fs::read_to_string(&path)?
        }
        None => exec.run_checked(
            "blockdev",
            &["--getsz".to_owned(), device.display().to_string()],
        )?,
    };

    let trimmed = text.trim();
    let sectors: u64 = trimmed
        .parse()
        .map_err(|_| FvError::Parse(format!("invalid partition size {trimmed:?}")))?;
    PartitionBounds::new(sectors).map_err(|err| FvError::Parse(err.to_string()))
}
