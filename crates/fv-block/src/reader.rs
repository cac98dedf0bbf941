use crate::ByteDevice;
use fv_error::{FvError, Result};
use fv_types::{ByteOffset, Extent, ReadDirection, SECTOR_SIZE};
use tracing::debug;

/// Total bytes covered by `extents`, saturating on overflow.
#[must_use]
pub fn total_span_bytes(extents: &[Extent]) -> u64 {
    extents.iter().fold(0_u64, |acc, e| {
        acc.saturating_add(e.length.saturating_mul(SECTOR_SIZE))
    })
}

/// Reconstructs logical file bytes by reading the physical sectors named by
/// an extent list, in list order.
///
/// The list is assumed to be in logical order. Each extent is read with an
/// absolute positioned read since consecutive extents are generally not
/// contiguous on the device.
#[derive(Debug)]
pub struct ExtentReader<'a, D: ByteDevice + ?Sized> {
    device: &'a D,
    extents: &'a [Extent],
}

impl<'a, D: ByteDevice + ?Sized> ExtentReader<'a, D> {
    #[must_use]
    pub fn new(device: &'a D, extents: &'a [Extent]) -> Self {
        Self { device, extents }
    }

    #[must_use]
    pub fn span_bytes(&self) -> u64 {
        total_span_bytes(self.extents)
    }

    /// Read exactly `len` bytes from the front or the back of the file.
    pub fn read(&self, len: usize, direction: ReadDirection) -> Result<Vec<u8>> {
        let requested = u64::try_from(len)
            .map_err(|_| FvError::Format("read length overflows u64".to_owned()))?;
        let available = self.span_bytes();
        if available < requested {
            return Err(FvError::ShortRead {
                requested,
                available,
            });
        }

        match direction {
            ReadDirection::FromStart => self.read_head(len),
            ReadDirection::FromEnd => self.read_tail(len),
        }
    }

    fn read_head(&self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        for extent in self.extents {
            if out.len() == len {
                break;
            }
            let (offset, span) = span_of(*extent)?;
            let take = take_len(span, len - out.len());
            let filled = out.len();
            out.resize(filled + take, 0);
            debug!(extent = %extent, offset = offset.0, take, "read head chunk");
            self.device.read_exact_at(offset.0, &mut out[filled..])?;
        }
        Ok(out)
    }

    fn read_tail(&self, len: usize) -> Result<Vec<u8>> {
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let mut collected = 0_usize;
        for extent in self.extents.iter().rev() {
            if collected == len {
                break;
            }
            let (offset, span) = span_of(*extent)?;
            let take = take_len(span, len - collected);
            // take <= span, so the subtraction cannot underflow.
            let skip = span - u64::try_from(take).unwrap_or(span);
            let tail_offset = offset
                .checked_add(skip)
                .ok_or_else(|| FvError::Format("tail offset overflow".to_owned()))?;
            let mut chunk = vec![0_u8; take];
            debug!(extent = %extent, offset = tail_offset.0, take, "read tail chunk");
            self.device.read_exact_at(tail_offset.0, &mut chunk)?;
            collected += take;
            chunks.push(chunk);
        }
        chunks.reverse();
        Ok(chunks.concat())
    }
}

fn span_of(extent: Extent) -> Result<(ByteOffset, u64)> {
    extent
        .byte_span()
        .ok_or_else(|| FvError::Format(format!("extent {extent} byte span overflows u64")))
}

fn take_len(span: u64, remaining: usize) -> usize {
    usize::try_from(span).map_or(remaining, |span| span.min(remaining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryByteDevice;

    fn ext(start: u64, length: u64) -> Extent {
        Extent::new(start, length).expect("extent")
    }

    /// Device of 300 sectors where every byte is derived from its offset.
    fn patterned_device() -> MemoryByteDevice {
        let bytes: Vec<u8> = (0..300 * 512_u32)
            .map(|i| u8::try_from((i / 7) % 251).unwrap())
            .collect();
        MemoryByteDevice::from_bytes(bytes)
    }

    fn slice(dev: &MemoryByteDevice, offset: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0_u8; len];
        dev.read_exact_at(offset, &mut buf).unwrap();
        buf
    }

    #[test]
    fn head_within_first_extent() {
        let dev = patterned_device();
        let extents = [ext(100, 10), ext(200, 5)];
        let reader = ExtentReader::new(&dev, &extents);

        let head = reader.read(20, ReadDirection::FromStart).unwrap();
        assert_eq!(head, slice(&dev, 100 * 512, 20));
    }

    #[test]
    fn tail_within_last_extent() {
        let dev = patterned_device();
        let extents = [ext(100, 10), ext(200, 5)];
        let reader = ExtentReader::new(&dev, &extents);

        let tail = reader.read(10, ReadDirection::FromEnd).unwrap();
        assert_eq!(tail, slice(&dev, 205 * 512 - 10, 10));
    }

    #[test]
    fn head_spans_extent_boundary() {
        let dev = patterned_device();
        let extents = [ext(10, 1), ext(50, 2)];
        let reader = ExtentReader::new(&dev, &extents);

        let head = reader.read(600, ReadDirection::FromStart).unwrap();
        let mut expected = slice(&dev, 10 * 512, 512);
        expected.extend(slice(&dev, 50 * 512, 88));
        assert_eq!(head, expected);
    }

    #[test]
    fn tail_spans_extent_boundary_in_logical_order() {
        let dev = patterned_device();
        let extents = [ext(10, 2), ext(50, 1)];
        let reader = ExtentReader::new(&dev, &extents);

        let tail = reader.read(600, ReadDirection::FromEnd).unwrap();
        let mut expected = slice(&dev, 12 * 512 - 88, 88);
        expected.extend(slice(&dev, 50 * 512, 512));
        assert_eq!(tail, expected);
    }

    #[test]
    fn whole_span_reads_identically_from_both_ends() {
        let dev = patterned_device();
        let extents = [ext(3, 1), ext(40, 2), ext(7, 1)];
        let reader = ExtentReader::new(&dev, &extents);

        let n = 4 * 512;
        let head = reader.read(n, ReadDirection::FromStart).unwrap();
        let tail = reader.read(n, ReadDirection::FromEnd).unwrap();
        assert_eq!(head, tail);
        assert_eq!(head.len(), n);
    }

    #[test]
    fn short_span_is_rejected() {
        let dev = patterned_device();
        let extents = [ext(0, 1)];
        let reader = ExtentReader::new(&dev, &extents);

        let err = reader.read(513, ReadDirection::FromStart).unwrap_err();
        assert!(matches!(
            err,
            FvError::ShortRead {
                requested: 513,
                available: 512
            }
        ));
        assert!(reader.read(0, ReadDirection::FromEnd).unwrap().is_empty());
    }

    #[test]
    fn extent_past_device_end_is_format_error() {
        let dev = patterned_device();
        let extents = [ext(299, 4)];
        let reader = ExtentReader::new(&dev, &extents);

        let err = reader.read(1024, ReadDirection::FromStart).unwrap_err();
        assert!(matches!(err, FvError::Format(_)), "got {err:?}");
    }

    #[test]
    fn total_span_saturates() {
        let extents = [ext(0, u64::MAX / 2), ext(0, u64::MAX / 2)];
        assert_eq!(total_span_bytes(&extents), u64::MAX);
    }
}
