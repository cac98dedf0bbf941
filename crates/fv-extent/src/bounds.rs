use fv_types::{Extent, PartitionBounds};
use serde::{Deserialize, Serialize};

/// Outcome of checking an extent list against its partition.
///
/// A violation is a data assertion failure, not an operational error; the
/// caller decides how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsCheck {
    /// Largest exclusive end sector in the list (0 for an empty list).
    pub max_end: u64,
    pub size_sectors: u64,
}

impl BoundsCheck {
    #[must_use]
    pub fn holds(&self) -> bool {
        self.max_end <= self.size_sectors
    }
}

#[must_use]
pub fn check_bounds(extents: &[Extent], bounds: PartitionBounds) -> BoundsCheck {
    let max_end = extents
        .iter()
        .map(|e| e.start.saturating_add(e.length))
        .max()
        .unwrap_or(0);
    BoundsCheck {
        max_end,
        size_sectors: bounds.size_sectors,
    }
}
