//! Fixed storage-tier table used to cost out a level's expected I/O.
//!
//! The table has exactly five entries; a level deeper than the table is
//! clamped to the last (slowest) entry (`min(level, 5)`).

use serde::{Deserialize, Serialize};

/// One entry of the storage-tier table: a name and a relative
/// cost-per-access multiplier against the fastest tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageTier {
    pub name: &'static str,
    pub relative_cost: u32,
}

/// The fixed five-entry table: SSD, then four increasingly slow HDD tiers.
pub const STORAGE_TIERS: [StorageTier; 5] = [
    StorageTier { name: "ssd", relative_cost: 1 },
    StorageTier { name: "hdd1", relative_cost: 5 },
    StorageTier { name: "hdd2", relative_cost: 15 },
    StorageTier { name: "hdd3", relative_cost: 45 },
    StorageTier { name: "hdd4", relative_cost: 135 },
];

/// Returns the storage tier for 1-indexed level `level_num`, clamping to
/// the table's last entry once the level number exceeds the table size.
#[must_use]
pub fn storage_tier_for_level(level_num: usize) -> StorageTier {
    let idx = level_num.clamp(1, STORAGE_TIERS.len()) - 1;
    STORAGE_TIERS[idx]
}
