//! Error taxonomy for the scanner
//!
//! `Usage`, `Io` and `InvalidBootSector` are fatal and abort before any repair.
//! `CorruptChain`, `CrossLinked` and `DirectoryFull` describe a single file or orphaned chain;
//! callers turn them into report problems and keep going.

use thiserror::Error;

/// A cluster number (12 bits significant on FAT12).
pub type Cluster = u16;

/// Why a cluster chain could not be followed to its end-of-chain marker.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFault {
    #[error("start cluster is outside the data area")]
    BadStart,

    #[error("cluster {from} links to invalid cluster {to:#05x}")]
    BadLink { from: Cluster, to: Cluster },

    #[error("chain loops back to cluster {at}")]
    Cycle { at: Cluster },
}

#[derive(Error, Debug)]
pub enum ScanDiskError {
    #[error("{0}")]
    Usage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid boot sector: {0}")]
    InvalidBootSector(String),

    #[error("Corrupt cluster chain starting at {start}: {fault}")]
    CorruptChain { start: Cluster, fault: ChainFault },

    #[error("Cluster {cluster} is shared with another chain")]
    CrossLinked { cluster: Cluster },

    #[error("Root directory is full, cannot record chain at cluster {cluster}")]
    DirectoryFull { cluster: Cluster },
}

pub type Result<T> = std::result::Result<T, ScanDiskError>;
