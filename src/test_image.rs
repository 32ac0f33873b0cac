//! In-memory FAT12 images for unit tests
//!
//! 512-byte sectors, one sector per cluster, two FAT copies of one sector each,
//! a 16-entry root directory and 64 sectors in total: data clusters 2..62.

use std::collections::HashMap;

use crate::dirent::{DirEntry, ATTR_DIRECTORY, ATTR_VOLUME, DIRENT_SIZE, SLOT_DELETED};
use crate::error::Cluster;
use crate::fat::{self, CLUST_EOF};

pub const SECTOR: usize = 512;
const TOTAL_SECTORS: usize = 64;
pub const ROOT_ENTRIES: usize = 16;
const NUM_FATS: usize = 2;
const FAT_OFFSET: usize = SECTOR;
const ROOT_OFFSET: usize = FAT_OFFSET + NUM_FATS * SECTOR;
const DATA_OFFSET: usize = ROOT_OFFSET + SECTOR;

pub struct ImageBuilder {
    image: Vec<u8>,
    next_slot: HashMap<Cluster, usize>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        let mut image = vec![0u8; TOTAL_SECTORS * SECTOR];
        image[0] = 0xEB;
        image[1] = 0x3C;
        image[2] = 0x90;
        image[3..11].copy_from_slice(b"MSDOS5.0");
        image[11..13].copy_from_slice(&(SECTOR as u16).to_le_bytes());
        image[13] = 1;
        image[14..16].copy_from_slice(&1u16.to_le_bytes());
        image[16] = NUM_FATS as u8;
        image[17..19].copy_from_slice(&(ROOT_ENTRIES as u16).to_le_bytes());
        image[19..21].copy_from_slice(&(TOTAL_SECTORS as u16).to_le_bytes());
        image[21] = 0xF0;
        image[22..24].copy_from_slice(&1u16.to_le_bytes());
        image[510] = 0x55;
        image[511] = 0xAA;

        let builder = ImageBuilder {
            image,
            next_slot: HashMap::new(),
        };
        builder.fat(0, 0xFF0).fat(1, CLUST_EOF)
    }

    /// Set one FAT entry in both copies.
    pub fn fat(mut self, cluster: Cluster, value: u16) -> Self {
        for copy in 0..NUM_FATS {
            let start = FAT_OFFSET + copy * SECTOR;
            fat::write_entry(&mut self.image[start..start + SECTOR], cluster, value);
        }
        self
    }

    /// Link `clusters` in order and terminate the last one.
    pub fn chain(mut self, clusters: &[Cluster]) -> Self {
        for pair in clusters.windows(2) {
            self = self.fat(pair[0], pair[1]);
        }
        match clusters.last() {
            Some(&last) => self.fat(last, CLUST_EOF),
            None => self,
        }
    }

    /// Add a regular file entry to directory `dir` (0 = root).
    pub fn file(self, dir: Cluster, name: &str, start: Cluster, size: u32) -> Self {
        self.entry(dir, DirEntry::for_file(name, start, size))
    }

    /// Add a subdirectory entry to `dir` and give the new directory its `.` and `..`.
    pub fn subdir(self, dir: Cluster, name: &str, cluster: Cluster) -> Self {
        let mut entry = DirEntry::for_file(name, cluster, 0);
        entry.extension = *b"   ";
        entry.attributes = ATTR_DIRECTORY;
        self.entry(dir, entry)
            .entry(cluster, dot_entry(b".       ", cluster))
            .entry(cluster, dot_entry(b"..      ", dir))
            .fat(cluster, CLUST_EOF)
    }

    pub fn volume_label(self, label: &[u8; 8]) -> Self {
        let mut entry = dot_entry(label, 0);
        entry.attributes = ATTR_VOLUME;
        self.entry(0, entry)
    }

    /// Add a deleted slot to `dir`.
    pub fn deleted(mut self, dir: Cluster) -> Self {
        let offset = self.next_offset(dir);
        self.image[offset] = SLOT_DELETED;
        self.image[offset + 1..offset + 11].copy_from_slice(b"OLD     TX");
        self
    }

    pub fn entry(mut self, dir: Cluster, entry: DirEntry) -> Self {
        let offset = self.next_offset(dir);
        entry.encode(&mut self.image[offset..offset + DIRENT_SIZE]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.image
    }

    fn next_offset(&mut self, dir: Cluster) -> usize {
        let index = self.next_slot.entry(dir).or_insert(0);
        let base = if dir == 0 {
            ROOT_OFFSET
        } else {
            DATA_OFFSET + (dir as usize - 2) * SECTOR
        };
        let offset = base + *index * DIRENT_SIZE;
        *index += 1;
        offset
    }
}

/// Byte offset of root directory slot `index`.
pub fn root_slot(index: usize) -> usize {
    ROOT_OFFSET + index * DIRENT_SIZE
}

fn dot_entry(name: &[u8; 8], cluster: Cluster) -> DirEntry {
    DirEntry {
        name: *name,
        extension: *b"   ",
        attributes: ATTR_DIRECTORY,
        start_cluster: cluster,
        file_size: 0,
    }
}
