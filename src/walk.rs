//! Directory tree walk
//!
//! Pre-order, depth first, driven by an explicit stack of open directories so
//! that a deep or looping tree on disk cannot exhaust the call stack.

use log::{debug, warn};
use std::collections::HashSet;

use crate::directory::DirectoryRegion;
use crate::dirent::{DirEntry, Slot};
use crate::error::{ChainFault, Cluster};
use crate::report::Problem;
use crate::volume::Volume;

pub const MAX_DIR_DEPTH: usize = 64;

/// A regular file entry found in some directory.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub entry: DirEntry,
    /// Byte offset of the entry's slot in the image.
    pub slot_offset: usize,
    /// Directory holding the entry (0 = root).
    pub directory: Cluster,
}

#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub name: String,
    pub start: Cluster,
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Default)]
pub struct TreeListing {
    pub directories: Vec<DirectoryRecord>,
    pub files: Vec<FileRecord>,
    pub problems: Vec<Problem>,
}

struct Frame {
    cluster: Cluster,
    slots: Vec<usize>,
    next: usize,
}

pub fn walk_tree<B: AsRef<[u8]>>(volume: &Volume<B>, root: Cluster) -> TreeListing {
    walk_tree_bounded(volume, root, MAX_DIR_DEPTH)
}

pub fn walk_tree_bounded<B: AsRef<[u8]>>(
    volume: &Volume<B>,
    root: Cluster,
    max_depth: usize,
) -> TreeListing {
    let mut listing = TreeListing::default();
    let mut entered = HashSet::new();
    entered.insert(root);
    let mut stack = vec![enter(volume, root, "\\", &mut listing)];

    while let Some(frame) = stack.last_mut() {
        let Some(&offset) = frame.slots.get(frame.next) else {
            stack.pop();
            continue;
        };
        frame.next += 1;
        let parent = frame.cluster;

        let entry = match volume.slot(offset) {
            Slot::Empty => {
                frame.next = frame.slots.len();
                continue;
            }
            Slot::Deleted => continue,
            Slot::Live(entry) => entry,
        };

        if entry.is_dot_entry() || entry.is_volume_label() {
            continue;
        }

        if !entry.is_directory() {
            listing.files.push(FileRecord {
                entry,
                slot_offset: offset,
                directory: parent,
            });
            continue;
        }

        let child = entry.start_cluster;
        let name = directory_name(&entry);
        if !volume.geometry().is_data_cluster(child) {
            warn!("Directory {} starts at invalid cluster {}", name, child);
            listing.problems.push(Problem::CorruptChain {
                owner: name,
                start: child,
                detail: ChainFault::BadStart.to_string(),
            });
            continue;
        }
        if stack.len() >= max_depth {
            warn!("Directory {} at cluster {} is nested too deeply", name, child);
            listing.problems.push(Problem::DirectoryTooDeep {
                name,
                cluster: child,
            });
            continue;
        }
        if !entered.insert(child) {
            warn!("Directory {} at cluster {} was already visited", name, child);
            listing.problems.push(Problem::DirectoryLoop {
                name,
                cluster: child,
            });
            continue;
        }

        let frame = enter(volume, child, &name, &mut listing);
        stack.push(frame);
    }

    debug!(
        "Walked {} directories, {} files",
        listing.directories.len(),
        listing.files.len()
    );
    listing
}

fn enter<B: AsRef<[u8]>>(
    volume: &Volume<B>,
    cluster: Cluster,
    name: &str,
    listing: &mut TreeListing,
) -> Frame {
    let layout = DirectoryRegion::for_cluster(cluster).open(volume);
    if let Some(fault) = &layout.fault {
        warn!("Directory {}: {}", name, fault);
        listing
            .problems
            .push(Problem::from_error(name, cluster, fault));
    }
    listing.directories.push(DirectoryRecord {
        name: name.to_string(),
        start: cluster,
        clusters: layout.clusters,
    });
    Frame {
        cluster,
        slots: layout.slots,
        next: 0,
    }
}

fn directory_name(entry: &DirEntry) -> String {
    if entry.extension().is_empty() {
        entry.name()
    } else {
        entry.display_name()
    }
}
