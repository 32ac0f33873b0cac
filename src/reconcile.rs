//! Size Reconciliation
//! Brings each file's cluster chain and declared size back into agreement
//!
//! The cut point of an overlong chain is found by walking the chain, so files
//! whose clusters are not laid out contiguously are truncated correctly.
//! Clusters another entry also reaches are never rewritten or freed.

use log::{info, warn};

use crate::chain::{chain_length, collect_chain};
use crate::directory::ROOT_CLUSTER;
use crate::error::{Result, ScanDiskError};
use crate::fat::{CLUST_EOFS, CLUST_FREE};
use crate::reachability::{mark_reachable, UsedSet};
use crate::report::{Problem, Repair, SizeMismatch};
use crate::volume::Volume;
use crate::walk::{walk_tree, FileRecord};

/// Check one file and repair it when its chain and declared size disagree.
///
/// A chain longer than the size needs is cut after the last needed cluster and
/// the rest freed. A chain too short for the size cannot be grown, so the
/// declared size is lowered to what the chain holds. Returns `None` when the
/// two already agree.
///
/// `used` must describe the current tree. A chain whose kept part is shared
/// with another entry is left alone with `CrossLinked`; freeing the tail stops
/// at the first shared cluster.
pub fn reconcile<B: AsRef<[u8]> + AsMut<[u8]>>(
    volume: &mut Volume<B>,
    file: &FileRecord,
    used: &UsedSet,
) -> Result<Option<SizeMismatch>> {
    let cluster_size = volume.geometry().cluster_size() as u64;
    let start = file.entry.start_cluster;
    let declared_size = file.entry.file_size;

    let fat_blocks = if start == 0 {
        0
    } else {
        chain_length(volume, start)? as u64
    };
    let dirent_blocks = (declared_size as u64 + cluster_size - 1) / cluster_size;

    if fat_blocks == dirent_blocks {
        return Ok(None);
    }

    let fat_capacity = fat_blocks * cluster_size;
    let repair = if fat_blocks > dirent_blocks {
        let chain = collect_chain(volume, start)?;
        let (kept, tail) = chain.split_at(dirent_blocks as usize);
        if let Some(&cluster) = kept.iter().find(|&&c| used.is_cross_linked(c)) {
            return Err(ScanDiskError::CrossLinked { cluster });
        }

        // Terminate the kept prefix before freeing the tail
        match kept.last() {
            Some(&last) => volume.set_fat_entry(last, CLUST_EOFS),
            None => volume.set_start_cluster(file.slot_offset, 0),
        }
        // From a shared cluster on, the rest belongs to another entry as well
        let freed = tail
            .iter()
            .take_while(|&&c| !used.is_cross_linked(c))
            .count();
        for &cluster in &tail[..freed] {
            volume.set_fat_entry(cluster, CLUST_FREE);
        }
        Repair::Truncated { freed }
    } else {
        let size = fat_capacity as u32;
        volume.set_file_size(file.slot_offset, size);
        Repair::SizeLowered { size }
    };

    Ok(Some(SizeMismatch {
        name: file.entry.display_name(),
        start,
        declared_size,
        fat_capacity,
        repair,
    }))
}

/// Walk the whole tree and reconcile every regular file.
///
/// A file whose chain cannot be followed, or whose kept clusters are shared,
/// is reported and left alone. `used` is rebuilt before the first file and
/// after every repair.
pub fn reconcile_tree<B: AsRef<[u8]> + AsMut<[u8]>>(
    volume: &mut Volume<B>,
    used: &mut UsedSet,
) -> (Vec<SizeMismatch>, Vec<Problem>) {
    // The final build reports whatever this one finds
    mark_reachable(volume, used, ROOT_CLUSTER);
    let listing = walk_tree(volume, ROOT_CLUSTER);
    let mut mismatches = Vec::new();
    let mut problems = Vec::new();

    for file in &listing.files {
        match reconcile(volume, file, used) {
            Ok(Some(mismatch)) => {
                info!(
                    "{}: declared {} bytes, chain held {} ({:?})",
                    mismatch.name, mismatch.declared_size, mismatch.fat_capacity, mismatch.repair
                );
                mismatches.push(mismatch);
                // A cut may have ended a cross-link
                mark_reachable(volume, used, ROOT_CLUSTER);
            }
            Ok(None) => {}
            Err(e) => {
                let name = file.entry.display_name();
                warn!("Skipping {} in directory {}: {}", name, file.directory, e);
                problems.push(Problem::from_error(&name, file.entry.start_cluster, &e));
            }
        }
    }

    (mismatches, problems)
}
