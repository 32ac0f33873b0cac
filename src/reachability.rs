//! Reachability Builder
//! Marks every cluster owned by a directory or by a file reachable from the root

use log::{debug, warn};
use std::collections::BTreeSet;

use crate::chain::chain_prefix;
use crate::error::Cluster;
use crate::fat::{CLUST_BAD, CLUST_FREE};
use crate::report::Problem;
use crate::volume::Volume;
use crate::walk::walk_tree;

/// One flag per cluster number, sized to `total_clusters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedSet {
    used: Vec<bool>,
    cross_linked: BTreeSet<Cluster>,
}

impl UsedSet {
    pub fn new(total_clusters: usize) -> Self {
        UsedSet {
            used: vec![false; total_clusters],
            cross_linked: BTreeSet::new(),
        }
    }

    pub fn reset(&mut self) {
        self.used.fill(false);
        self.cross_linked.clear();
    }

    pub fn is_used(&self, cluster: Cluster) -> bool {
        self.used.get(cluster as usize).copied().unwrap_or(false)
    }

    /// Mark `cluster` used. Returns false, and remembers the cluster as
    /// cross-linked, when something already claimed it.
    pub fn claim(&mut self, cluster: Cluster) -> bool {
        let Some(flag) = self.used.get_mut(cluster as usize) else {
            return false;
        };
        if *flag {
            self.cross_linked.insert(cluster);
            return false;
        }
        *flag = true;
        true
    }

    /// True when more than one chain reaches `cluster`.
    pub fn is_cross_linked(&self, cluster: Cluster) -> bool {
        self.cross_linked.contains(&cluster)
    }

    /// Used data clusters; reserved clusters 0 and 1 are never counted.
    pub fn used_count(&self) -> usize {
        self.used.iter().skip(2).filter(|&&used| used).count()
    }

    pub fn cross_linked(&self) -> impl Iterator<Item = Cluster> + '_ {
        self.cross_linked.iter().copied()
    }
}

/// Rebuild `used` from scratch by walking the tree below `root`.
///
/// Chains that cannot be followed are claimed up to the fault and reported;
/// clusters claimed twice are reported as cross-linked.
pub fn mark_reachable<B: AsRef<[u8]>>(
    volume: &Volume<B>,
    used: &mut UsedSet,
    root: Cluster,
) -> Vec<Problem> {
    used.reset();
    let listing = walk_tree(volume, root);
    let mut problems = listing.problems;

    for directory in &listing.directories {
        debug!(
            "Directory {} at {} occupies {:?}",
            directory.name, directory.start, directory.clusters
        );
        for &cluster in &directory.clusters {
            used.claim(cluster);
        }
    }

    for file in &listing.files {
        let start = file.entry.start_cluster;
        if start == 0 {
            // Empty file, no chain
            continue;
        }
        let (clusters, fault) = chain_prefix(volume, start);
        for cluster in clusters {
            used.claim(cluster);
        }
        if let Some(fault) = fault {
            let name = file.entry.display_name();
            warn!("{}: {}", name, fault);
            problems.push(Problem::from_error(&name, start, &fault));
        }
    }

    for cluster in used.cross_linked() {
        warn!("Cluster {} is claimed by more than one chain", cluster);
        problems.push(Problem::CrossLinked { cluster });
    }

    debug!(
        "Reachability: {} clusters used of {}",
        used.used_count(),
        volume.geometry().total_clusters.saturating_sub(2)
    );
    problems
}

/// Clusters that are allocated in the FAT but not reachable, in ascending order.
///
/// Clusters marked bad are allocated on purpose and never count as lost.
pub fn find_unreferenced<B: AsRef<[u8]>>(volume: &Volume<B>, used: &UsedSet) -> Vec<Cluster> {
    (2..volume.geometry().total_clusters as Cluster)
        .filter(|&cluster| !used.is_used(cluster))
        .filter(|&cluster| {
            let value = volume.fat_entry(cluster);
            value != CLUST_FREE && value != CLUST_BAD
        })
        .collect()
}
