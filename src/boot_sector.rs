//! FAT12 Boot Sector Module
//! Parses the BIOS Parameter Block into the cluster geometry used by every pass

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;
use serde::Serialize;
use std::io::{Cursor, Seek, SeekFrom};

use crate::dirent::DIRENT_SIZE;
use crate::error::{Cluster, Result, ScanDiskError};

const BOOT_SECTOR_SIZE: usize = 512;
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

// A volume with this many data clusters or more is FAT16/FAT32.
pub const FAT12_MAX_CLUSTERS: u32 = 4085;

/// Cluster geometry of a FAT12 volume.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entries: u16,
    pub total_sectors: u32,
    pub sectors_per_fat: u16,
    /// Exclusive upper bound for cluster numbers; bounds every cluster-indexed array.
    pub total_clusters: usize,
}

impl Geometry {
    pub fn cluster_size(&self) -> usize {
        self.bytes_per_sector as usize * self.sectors_per_cluster as usize
    }

    pub fn fat_offset(&self) -> usize {
        self.reserved_sectors as usize * self.bytes_per_sector as usize
    }

    /// Size in bytes of one FAT copy.
    pub fn fat_size(&self) -> usize {
        self.sectors_per_fat as usize * self.bytes_per_sector as usize
    }

    pub fn root_dir_offset(&self) -> usize {
        self.fat_offset() + self.num_fats as usize * self.fat_size()
    }

    pub fn root_dir_sectors(&self) -> usize {
        let bps = self.bytes_per_sector as usize;
        (self.root_entries as usize * DIRENT_SIZE + bps - 1) / bps
    }

    pub fn data_offset(&self) -> usize {
        self.root_dir_offset() + self.root_dir_sectors() * self.bytes_per_sector as usize
    }

    /// Byte offset of a cluster within the image. Cluster 0 is the root directory region.
    pub fn cluster_offset(&self, cluster: Cluster) -> usize {
        if cluster == 0 {
            self.root_dir_offset()
        } else {
            self.data_offset() + (cluster as usize - 2) * self.cluster_size()
        }
    }

    pub fn is_data_cluster(&self, cluster: Cluster) -> bool {
        cluster >= 2 && (cluster as usize) < self.total_clusters
    }
}

/// Parse the FAT12 boot sector at the start of `image` and check it against the image size
pub fn parse_boot_sector(image: &[u8]) -> Result<Geometry> {
    if image.len() < BOOT_SECTOR_SIZE {
        return Err(invalid(format!(
            "image is {} bytes, smaller than a boot sector",
            image.len()
        )));
    }

    if image[0] != 0xEB && image[0] != 0xE9 {
        return Err(invalid(format!("bad jump instruction {:#04x}", image[0])));
    }

    if image[510..512] != BOOT_SIGNATURE {
        warn!("Boot sector signature missing, continuing with BPB values");
    }

    let mut cursor = Cursor::new(image);

    cursor.seek(SeekFrom::Start(0x0B))?;
    let bytes_per_sector = cursor.read_u16::<LittleEndian>()?;
    let sectors_per_cluster = cursor.read_u8()?;
    let reserved_sectors = cursor.read_u16::<LittleEndian>()?;
    let num_fats = cursor.read_u8()?;
    let root_entries = cursor.read_u16::<LittleEndian>()?;
    let small_total = cursor.read_u16::<LittleEndian>()?;

    // Skip the media descriptor at 0x15
    cursor.seek(SeekFrom::Start(0x16))?;
    let sectors_per_fat = cursor.read_u16::<LittleEndian>()?;

    cursor.seek(SeekFrom::Start(0x20))?;
    let large_total = cursor.read_u32::<LittleEndian>()?;
    let total_sectors = if small_total != 0 {
        small_total as u32
    } else {
        large_total
    };

    if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
        return Err(invalid(format!("unsupported sector size {}", bytes_per_sector)));
    }
    if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
        return Err(invalid(format!(
            "sectors per cluster must be a power of two, got {}",
            sectors_per_cluster
        )));
    }
    if reserved_sectors == 0 || num_fats == 0 || root_entries == 0 || sectors_per_fat == 0 {
        return Err(invalid(format!(
            "reserved={} fats={} root_entries={} sectors_per_fat={}",
            reserved_sectors, num_fats, root_entries, sectors_per_fat
        )));
    }

    let mut geometry = Geometry {
        bytes_per_sector,
        sectors_per_cluster,
        reserved_sectors,
        num_fats,
        root_entries,
        total_sectors,
        sectors_per_fat,
        total_clusters: 0,
    };

    let data_offset = geometry.data_offset();
    if data_offset > image.len() {
        return Err(invalid(format!(
            "image is {} bytes but FATs and root directory end at {}",
            image.len(),
            data_offset
        )));
    }

    let cluster_size = geometry.cluster_size();
    let volume_bytes = total_sectors as usize * bytes_per_sector as usize;
    let declared_data_clusters = volume_bytes.saturating_sub(data_offset) / cluster_size;
    if declared_data_clusters >= FAT12_MAX_CLUSTERS as usize {
        return Err(invalid(format!(
            "{} data clusters is too many for FAT12",
            declared_data_clusters
        )));
    }

    let mapped_data_bytes = volume_bytes.min(image.len()).saturating_sub(data_offset);
    let addressable = 2 + mapped_data_bytes / cluster_size;
    let fat_capacity = geometry.fat_size() * 2 / 3;
    let nominal = total_sectors as usize / sectors_per_cluster as usize;
    geometry.total_clusters = nominal.min(addressable).min(fat_capacity);

    if geometry.total_clusters < nominal {
        warn!(
            "Clamping cluster count from {} to {} (FAT holds {}, image addresses {})",
            nominal, geometry.total_clusters, fat_capacity, addressable
        );
    }

    Ok(geometry)
}

fn invalid(message: String) -> ScanDiskError {
    ScanDiskError::InvalidBootSector(message)
}
