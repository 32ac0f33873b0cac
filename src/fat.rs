//! FAT12 allocation table entries
//!
//! Entries are 12 bits packed two per three bytes, little-endian.

use crate::error::Cluster;

pub const FAT12_MASK: u16 = 0x0FFF;
pub const CLUST_FREE: u16 = 0x000;
pub const CLUST_BAD: u16 = 0xFF7;
/// First end-of-chain value; this is what repairs write as a terminator.
pub const CLUST_EOFS: u16 = 0xFF8;
pub const CLUST_EOF: u16 = 0xFFF;

pub fn is_end_of_chain(value: u16) -> bool {
    let value = value & FAT12_MASK;
    (CLUST_EOFS..=CLUST_EOF).contains(&value)
}

/// Read the 12-bit entry for `cluster` from one FAT copy.
pub fn read_entry(fat: &[u8], cluster: Cluster) -> u16 {
    let offset = cluster as usize * 3 / 2;
    let word = u16::from_le_bytes([fat[offset], fat[offset + 1]]);
    if cluster & 1 == 1 {
        word >> 4
    } else {
        word & FAT12_MASK
    }
}

/// Write the 12-bit entry for `cluster` into one FAT copy, preserving the neighbouring nibble.
pub fn write_entry(fat: &mut [u8], cluster: Cluster, value: u16) {
    let offset = cluster as usize * 3 / 2;
    let existing = u16::from_le_bytes([fat[offset], fat[offset + 1]]);
    let value = value & FAT12_MASK;
    let word = if cluster & 1 == 1 {
        (existing & 0x000F) | (value << 4)
    } else {
        (existing & 0xF000) | value
    };
    fat[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
}
