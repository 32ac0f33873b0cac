//! A FAT12 image paired with its geometry
//!
//! Generic over the byte buffer so the same code runs on a memory map or a `Vec<u8>`.

use crate::boot_sector::{parse_boot_sector, Geometry};
use crate::dirent::{self, DirEntry, Slot, DIRENT_SIZE, SLOT_EMPTY};
use crate::error::{Cluster, Result};
use crate::fat;

pub struct Volume<B> {
    image: B,
    geometry: Geometry,
}

impl<B: AsRef<[u8]>> Volume<B> {
    /// Parse the boot sector of `image` and take ownership of the buffer.
    pub fn new(image: B) -> Result<Self> {
        let geometry = parse_boot_sector(image.as_ref())?;
        Ok(Volume { image, geometry })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn image(&self) -> &[u8] {
        self.image.as_ref()
    }

    pub fn into_inner(self) -> B {
        self.image
    }

    /// Entry for `cluster` in the first FAT copy.
    pub fn fat_entry(&self, cluster: Cluster) -> u16 {
        debug_assert!((cluster as usize) < self.geometry.total_clusters);
        let start = self.geometry.fat_offset();
        fat::read_entry(&self.image()[start..start + self.geometry.fat_size()], cluster)
    }

    /// Decode the directory slot at byte `offset`.
    pub fn slot(&self, offset: usize) -> Slot {
        Slot::parse(&self.image()[offset..offset + DIRENT_SIZE])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Volume<B> {
    /// Set the entry for `cluster` in every FAT copy.
    pub fn set_fat_entry(&mut self, cluster: Cluster, value: u16) {
        debug_assert!((cluster as usize) < self.geometry.total_clusters);
        let fat_size = self.geometry.fat_size();
        let first = self.geometry.fat_offset();
        for copy in 0..self.geometry.num_fats as usize {
            let start = first + copy * fat_size;
            fat::write_entry(&mut self.image.as_mut()[start..start + fat_size], cluster, value);
        }
    }

    pub fn write_entry(&mut self, offset: usize, entry: &DirEntry) {
        entry.encode(self.slot_mut(offset));
    }

    /// Zero a slot, leaving it as an end-of-directory marker.
    pub fn clear_slot(&mut self, offset: usize) {
        let raw = self.slot_mut(offset);
        raw.fill(0);
        raw[0] = SLOT_EMPTY;
    }

    pub fn set_file_size(&mut self, offset: usize, size: u32) {
        dirent::set_file_size(self.slot_mut(offset), size);
    }

    pub fn set_start_cluster(&mut self, offset: usize, cluster: Cluster) {
        dirent::set_start_cluster(self.slot_mut(offset), cluster);
    }

    fn slot_mut(&mut self, offset: usize) -> &mut [u8] {
        &mut self.image.as_mut()[offset..offset + DIRENT_SIZE]
    }
}
