//! Freshness predicates for pairs present on both sides.

use crate::enumerate::ObjectRecord;

/// Absorbs the difference between second-precision filesystem timestamps
/// and millisecond-precision object-store timestamps.
pub const MTIME_TOLERANCE: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Copy when the source is strictly newer than the destination.
    ModTime,
    /// Copy when the sizes differ, regardless of timestamps.
    SizeOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    NeedsCopy,
    InSync(&'static str),
}

impl SyncStrategy {
    /// Pure and stateless; only evaluated for pairs present on both sides.
    pub fn compare(&self, src: &ObjectRecord, dst: &ObjectRecord) -> Comparison {
        match self {
            SyncStrategy::ModTime => {
                let newer = match src.mtime.duration_since(dst.mtime) {
                    Ok(age) => age > MTIME_TOLERANCE,
                    Err(_) => false,
                };
                if newer {
                    Comparison::NeedsCopy
                } else {
                    Comparison::InSync("object is newer or same age")
                }
            }
            SyncStrategy::SizeOnly => {
                if src.size != dst.size {
                    Comparison::NeedsCopy
                } else {
                    Comparison::InSync("object size matches")
                }
            }
        }
    }
}
