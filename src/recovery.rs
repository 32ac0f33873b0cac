//! Lost-Cluster Recovery
//! Gives every orphaned chain a `foundN.dat` entry in the root directory
//!
//! Each recovered chain is linked into the tree and reachability is rebuilt
//! before the next lost cluster is chosen, so clusters further down a chain
//! that was just recovered are never picked up as orphans of their own.
//! An orphan that runs into a reachable chain is cut off just before the join.

use log::{info, warn};
use std::collections::HashSet;

use crate::chain::chain_prefix;
use crate::directory::{DirectoryRegion, ROOT_CLUSTER};
use crate::dirent::{DirEntry, Slot};
use crate::error::{Cluster, Result, ScanDiskError};
use crate::fat::CLUST_EOFS;
use crate::reachability::{find_unreferenced, mark_reachable, UsedSet};
use crate::report::{LostFile, Problem};
use crate::volume::Volume;

#[derive(Debug, Default)]
pub struct RecoveryOutcome {
    pub recovered: Vec<LostFile>,
    pub problems: Vec<Problem>,
}

/// Recover lost chains until none is left that has not been tried.
///
/// `used` must describe the current tree on entry; it is kept current.
pub fn recover_lost<B: AsRef<[u8]> + AsMut<[u8]>>(
    volume: &mut Volume<B>,
    used: &mut UsedSet,
) -> RecoveryOutcome {
    let total_clusters = volume.geometry().total_clusters;
    let cluster_size = volume.geometry().cluster_size();
    let mut tried = vec![false; total_clusters];
    let mut outcome = RecoveryOutcome::default();

    // Every round tries at least one new cluster
    for _ in 0..total_clusters {
        let lost: Vec<Cluster> = find_unreferenced(volume, used)
            .into_iter()
            .filter(|&cluster| !tried[cluster as usize])
            .collect();
        let Some(start) = pick_chain_head(volume, &lost) else {
            break;
        };

        let (mut clusters, fault) = chain_prefix(volume, start);
        for &cluster in &clusters {
            tried[cluster as usize] = true;
        }
        tried[start as usize] = true;

        // `start` is lost, so a join is never at index 0
        if let Some(join) = clusters.iter().position(|&c| used.is_used(c)) {
            let shared = clusters[join];
            warn!(
                "Lost chain at cluster {} runs into reachable cluster {}",
                start, shared
            );
            outcome.problems.push(Problem::CrossLinked { cluster: shared });
            clusters.truncate(join);
            if let Some(&last) = clusters.last() {
                volume.set_fat_entry(last, CLUST_EOFS);
            }
        } else if let Some(fault) = fault {
            warn!("Lost chain at cluster {}: {}", start, fault);
            outcome
                .problems
                .push(Problem::from_error("lost chain", start, &fault));
            continue;
        }

        let blocks = clusters.len();
        let name = format!("found{}.dat", outcome.recovered.len() + 1);
        let size = (blocks * cluster_size) as u32;

        match create_root_entry(volume, &name, start, size) {
            Ok(_) => {
                info!("Recovered {} clusters at {} as {}", blocks, start, name);
                outcome.recovered.push(LostFile {
                    start,
                    blocks,
                    name,
                });
                // The final build reports anything found here
                mark_reachable(volume, used, ROOT_CLUSTER);
            }
            Err(e) => {
                warn!("{}", e);
                outcome.problems.push(Problem::DirectoryFull { start, blocks });
            }
        }
    }

    outcome
}

/// Lowest lost cluster that no other lost cluster links to. Falls back to the
/// lowest lost cluster when every candidate sits on a loop.
fn pick_chain_head<B: AsRef<[u8]>>(volume: &Volume<B>, lost: &[Cluster]) -> Option<Cluster> {
    let candidates: HashSet<Cluster> = lost.iter().copied().collect();
    let linked_to: HashSet<Cluster> = lost
        .iter()
        .map(|&cluster| volume.fat_entry(cluster))
        .filter(|next| candidates.contains(next))
        .collect();

    lost.iter()
        .copied()
        .find(|cluster| !linked_to.contains(cluster))
        .or_else(|| lost.first().copied())
}

/// Write a normal-file entry into the first empty or deleted root slot and
/// return its byte offset. Writing into the empty terminator moves the
/// terminator to the following slot.
pub fn create_root_entry<B: AsRef<[u8]> + AsMut<[u8]>>(
    volume: &mut Volume<B>,
    filename: &str,
    start: Cluster,
    size: u32,
) -> Result<usize> {
    let slots = DirectoryRegion::Root.open(volume).slots;
    let entry = DirEntry::for_file(filename, start, size);

    for (index, &offset) in slots.iter().enumerate() {
        match volume.slot(offset) {
            Slot::Empty => {
                volume.write_entry(offset, &entry);
                if let Some(&next) = slots.get(index + 1) {
                    volume.clear_slot(next);
                }
                return Ok(offset);
            }
            Slot::Deleted => {
                volume.write_entry(offset, &entry);
                return Ok(offset);
            }
            Slot::Live(_) => {}
        }
    }

    Err(ScanDiskError::DirectoryFull { cluster: start })
}
