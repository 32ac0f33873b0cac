//! Cluster-chain walking
//!
//! A chain is followed through the first FAT copy until an end-of-chain marker.
//! Every cluster may appear at most once, so a walk never takes more than
//! `total_clusters` steps; a repeat or a link outside the data area ends the
//! walk with `CorruptChain`.

use crate::error::{ChainFault, Cluster, Result, ScanDiskError};
use crate::fat::is_end_of_chain;
use crate::volume::Volume;

/// Lazy walk of one cluster chain. Yields each cluster in order, then stops.
/// After an error it yields nothing more.
pub struct ClusterChain<'v, B> {
    volume: &'v Volume<B>,
    start: Cluster,
    previous: Option<Cluster>,
    next: Option<Cluster>,
    visited: Vec<bool>,
}

impl<'v, B: AsRef<[u8]>> ClusterChain<'v, B> {
    pub fn new(volume: &'v Volume<B>, start: Cluster) -> Self {
        ClusterChain {
            volume,
            start,
            previous: None,
            next: Some(start),
            visited: vec![false; volume.geometry().total_clusters],
        }
    }

    fn fail(&mut self, fault: ChainFault) -> Option<Result<Cluster>> {
        self.next = None;
        Some(Err(ScanDiskError::CorruptChain {
            start: self.start,
            fault,
        }))
    }
}

impl<'v, B: AsRef<[u8]>> Iterator for ClusterChain<'v, B> {
    type Item = Result<Cluster>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        if !self.volume.geometry().is_data_cluster(current) {
            return match self.previous {
                None => self.fail(ChainFault::BadStart),
                Some(from) => self.fail(ChainFault::BadLink { from, to: current }),
            };
        }
        if self.visited[current as usize] {
            return self.fail(ChainFault::Cycle { at: current });
        }
        self.visited[current as usize] = true;

        let value = self.volume.fat_entry(current);
        if !is_end_of_chain(value) {
            self.next = Some(value);
        }
        self.previous = Some(current);
        Some(Ok(current))
    }
}

/// Number of clusters from `start` (inclusive) to the end-of-chain marker.
pub fn chain_length<B: AsRef<[u8]>>(volume: &Volume<B>, start: Cluster) -> Result<usize> {
    let mut length = 0;
    for cluster in ClusterChain::new(volume, start) {
        cluster?;
        length += 1;
    }
    Ok(length)
}

pub fn collect_chain<B: AsRef<[u8]>>(volume: &Volume<B>, start: Cluster) -> Result<Vec<Cluster>> {
    ClusterChain::new(volume, start).collect()
}

/// Clusters readable before the first fault, plus that fault if there was one.
pub fn chain_prefix<B: AsRef<[u8]>>(
    volume: &Volume<B>,
    start: Cluster,
) -> (Vec<Cluster>, Option<ScanDiskError>) {
    let mut clusters = Vec::new();
    for cluster in ClusterChain::new(volume, start) {
        match cluster {
            Ok(cluster) => clusters.push(cluster),
            Err(e) => return (clusters, Some(e)),
        }
    }
    (clusters, None)
}
