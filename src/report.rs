//! Scan Report Module
//! Findings of a run, printed as fixed-format text lines or as JSON

use serde::Serialize;
use std::fmt;
use std::io::{self, Write};

use crate::boot_sector::Geometry;
use crate::error::{Cluster, ScanDiskError};

/// An orphaned chain that was given a root directory entry.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LostFile {
    pub start: Cluster,
    pub blocks: usize,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Repair {
    /// Clusters past the declared size were freed.
    Truncated { freed: usize },
    /// The chain was shorter than the declared size, so the size was lowered.
    SizeLowered { size: u32 },
}

/// A file whose declared size disagreed with its chain, as observed before repair.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SizeMismatch {
    pub name: String,
    pub start: Cluster,
    pub declared_size: u32,
    /// Bytes the FAT chain occupied.
    pub fat_capacity: u64,
    pub repair: Repair,
}

/// A failure confined to one file, directory or orphaned chain.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    CorruptChain {
        owner: String,
        start: Cluster,
        detail: String,
    },
    DirectoryLoop {
        name: String,
        cluster: Cluster,
    },
    DirectoryTooDeep {
        name: String,
        cluster: Cluster,
    },
    DirectoryFull {
        start: Cluster,
        blocks: usize,
    },
    CrossLinked {
        cluster: Cluster,
    },
}

impl Problem {
    /// Attribute a per-entity error to `owner`.
    pub fn from_error(owner: &str, start: Cluster, error: &ScanDiskError) -> Problem {
        match error {
            ScanDiskError::CorruptChain { start, fault } => Problem::CorruptChain {
                owner: owner.to_string(),
                start: *start,
                detail: fault.to_string(),
            },
            ScanDiskError::CrossLinked { cluster } => Problem::CrossLinked { cluster: *cluster },
            other => Problem::CorruptChain {
                owner: owner.to_string(),
                start,
                detail: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::CorruptChain {
                owner,
                start,
                detail,
            } => write!(f, "Corrupt Chain: {} {} ({})", owner, start, detail),
            Problem::DirectoryLoop { name, cluster } => {
                write!(f, "Directory Loop: {} {}", name, cluster)
            }
            Problem::DirectoryTooDeep { name, cluster } => {
                write!(f, "Directory Too Deep: {} {}", name, cluster)
            }
            Problem::DirectoryFull { start, blocks } => {
                write!(f, "Directory Full: {} {}", start, blocks)
            }
            Problem::CrossLinked { cluster } => write!(f, "Cross-linked: {}", cluster),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ScanReport {
    pub geometry: Geometry,
    /// Allocated but unreachable clusters before recovery.
    pub initially_unreferenced: Vec<Cluster>,
    /// Allocated but unreachable clusters still left after every repair.
    pub unreferenced: Vec<Cluster>,
    pub size_mismatches: Vec<SizeMismatch>,
    pub lost_files: Vec<LostFile>,
    pub problems: Vec<Problem>,
}

impl ScanReport {
    pub fn new(geometry: Geometry) -> Self {
        ScanReport {
            geometry,
            initially_unreferenced: Vec::new(),
            unreferenced: Vec::new(),
            size_mismatches: Vec::new(),
            lost_files: Vec::new(),
            problems: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.initially_unreferenced.is_empty()
            && self.unreferenced.is_empty()
            && self.size_mismatches.is_empty()
            && self.lost_files.is_empty()
            && self.problems.is_empty()
    }

    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if !self.unreferenced.is_empty() {
            write!(out, "Unreferenced:")?;
            for cluster in &self.unreferenced {
                write!(out, " {}", cluster)?;
            }
            writeln!(out)?;
        }

        for mismatch in &self.size_mismatches {
            writeln!(
                out,
                "{} {} {}",
                mismatch.name, mismatch.declared_size, mismatch.fat_capacity
            )?;
        }

        for lost in &self.lost_files {
            writeln!(out, "Lost File: {} {}", lost.start, lost.blocks)?;
        }

        for problem in &self.problems {
            writeln!(out, "{}", problem)?;
        }

        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
