#![forbid(unsafe_code)]
//! Extent model: physical placement of a file as reported by `filefrag`.
//!
//! Parses `filefrag -b512 -e` reports into raw `(start, length)` sector
//! pairs, coalesces them into a merged extent list, and checks the merged
//! list against the containing partition's size.

pub mod bounds;
pub mod merge;
pub mod report;

pub use bounds::{BoundsCheck, check_bounds};
pub use merge::{MergeOutcome, OverlapEvent, merge_extents};
pub use report::{parse_extent_line, parse_report};
