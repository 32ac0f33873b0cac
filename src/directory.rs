//! Directory content access
//!
//! The FAT12 root directory lives in a fixed region between the FATs and the
//! data area; every other directory is an ordinary cluster chain.

use crate::chain::chain_prefix;
use crate::dirent::DIRENT_SIZE;
use crate::error::{Cluster, ScanDiskError};
use crate::volume::Volume;

pub const ROOT_CLUSTER: Cluster = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryRegion {
    /// Fixed extent, addressed linearly.
    Root,
    /// Addressed through the FAT chain starting at this cluster.
    Chained(Cluster),
}

/// Where a directory's slots are.
#[derive(Debug)]
pub struct DirectoryLayout {
    /// Clusters the directory occupies; empty for the root region.
    pub clusters: Vec<Cluster>,
    /// Byte offset of every slot in on-disk order.
    pub slots: Vec<usize>,
    /// Set when the chain broke; `clusters` and `slots` hold what was readable.
    pub fault: Option<ScanDiskError>,
}

impl DirectoryRegion {
    pub fn for_cluster(cluster: Cluster) -> Self {
        if cluster == ROOT_CLUSTER {
            DirectoryRegion::Root
        } else {
            DirectoryRegion::Chained(cluster)
        }
    }

    pub fn open<B: AsRef<[u8]>>(&self, volume: &Volume<B>) -> DirectoryLayout {
        let geometry = volume.geometry();
        match *self {
            DirectoryRegion::Root => {
                let base = geometry.root_dir_offset();
                DirectoryLayout {
                    clusters: Vec::new(),
                    slots: (0..geometry.root_entries as usize)
                        .map(|i| base + i * DIRENT_SIZE)
                        .collect(),
                    fault: None,
                }
            }
            DirectoryRegion::Chained(start) => {
                let (clusters, fault) = chain_prefix(volume, start);
                let per_cluster = geometry.cluster_size() / DIRENT_SIZE;
                let slots = clusters
                    .iter()
                    .flat_map(|&cluster| {
                        let base = geometry.cluster_offset(cluster);
                        (0..per_cluster).map(move |i| base + i * DIRENT_SIZE)
                    })
                    .collect();
                DirectoryLayout {
                    clusters,
                    slots,
                    fault,
                }
            }
        }
    }
}
