//! Disk Image Module
//! Maps a FAT12 image file into memory so repairs are made in place

use log::debug;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{Result, ScanDiskError};

const MIN_IMAGE_SIZE: u64 = 512;

/// A memory-mapped image. Writes go straight to the file unless it was opened for a dry run.
pub struct MappedImage {
    map: MmapMut,
    writable: bool,
}

impl MappedImage {
    /// Map the image at `path`.
    ///
    /// With `dry_run` the file is opened read-only and mapped copy-on-write:
    /// every repair still happens in memory, none reaches the file.
    pub fn open(path: &Path, dry_run: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!dry_run)
            .open(path)?;

        let size = file.metadata()?.len();
        if size < MIN_IMAGE_SIZE {
            return Err(ScanDiskError::InvalidBootSector(format!(
                "{} is only {} bytes",
                path.display(),
                size
            )));
        }

        // The image must not be mounted or otherwise modified while mapped
        let map = unsafe {
            if dry_run {
                MmapOptions::new().map_copy(&file)?
            } else {
                MmapMut::map_mut(&file)?
            }
        };

        debug!(
            "Mapped {} ({} bytes, {})",
            path.display(),
            size,
            if dry_run { "copy-on-write" } else { "shared" }
        );

        Ok(MappedImage {
            map,
            writable: !dry_run,
        })
    }

    /// Write modified pages back to the file. Does nothing for a dry run.
    pub fn flush(&self) -> Result<()> {
        if self.writable {
            self.map.flush()?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for MappedImage {
    fn as_ref(&self) -> &[u8] {
        &self.map
    }
}

impl AsMut<[u8]> for MappedImage {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}
