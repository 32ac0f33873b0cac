//! Directory Entry Module
//! Decodes and encodes the 32-byte 8.3 directory slots of a FAT12 volume

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::error::Cluster;

pub const DIRENT_SIZE: usize = 32;

// First name byte markers
pub const SLOT_EMPTY: u8 = 0x00;
pub const SLOT_DELETED: u8 = 0xE5;
const SLOT_E5_ESCAPE: u8 = 0x05;

// Attribute bits
pub const ATTR_NORMAL: u8 = 0x00;
pub const ATTR_VOLUME: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;

const OFFSET_EXTENSION: usize = 8;
const OFFSET_ATTRIBUTES: usize = 11;
const OFFSET_START_CLUSTER: usize = 26;
const OFFSET_FILE_SIZE: usize = 28;

/// One directory slot as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Never used; nothing follows it in this directory.
    Empty,
    Deleted,
    Live(DirEntry),
}

impl Slot {
    pub fn parse(raw: &[u8]) -> Slot {
        match raw[0] {
            SLOT_EMPTY => Slot::Empty,
            SLOT_DELETED => Slot::Deleted,
            _ => Slot::Live(DirEntry::parse(raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; 8],
    pub extension: [u8; 3],
    pub attributes: u8,
    pub start_cluster: Cluster,
    pub file_size: u32,
}

impl DirEntry {
    pub fn parse(raw: &[u8]) -> DirEntry {
        let mut name = [0u8; 8];
        let mut extension = [0u8; 3];
        name.copy_from_slice(&raw[..OFFSET_EXTENSION]);
        extension.copy_from_slice(&raw[OFFSET_EXTENSION..OFFSET_ATTRIBUTES]);

        DirEntry {
            name,
            extension,
            attributes: raw[OFFSET_ATTRIBUTES],
            start_cluster: LittleEndian::read_u16(&raw[OFFSET_START_CLUSTER..]),
            file_size: LittleEndian::read_u32(&raw[OFFSET_FILE_SIZE..]),
        }
    }

    /// Build a normal-file entry from a name like `found1.dat`.
    ///
    /// Any directory prefix is dropped, the name is upper-cased and cut to 8.3.
    /// A name without an extension gets `___`.
    pub fn for_file(filename: &str, start_cluster: Cluster, file_size: u32) -> DirEntry {
        let base = filename
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(filename)
            .to_ascii_uppercase();

        let (stem, ext) = match base.split_once('.') {
            Some((stem, ext)) => (stem, ext),
            None => {
                warn!("No filename extension given for {}, defaulting to .___", base);
                (base.as_str(), "___")
            }
        };

        let mut name = [b' '; 8];
        let mut extension = [b' '; 3];
        for (dst, src) in name.iter_mut().zip(stem.bytes()) {
            *dst = src;
        }
        for (dst, src) in extension.iter_mut().zip(ext.bytes()) {
            *dst = src;
        }

        DirEntry {
            name,
            extension,
            attributes: ATTR_NORMAL,
            start_cluster,
            file_size,
        }
    }

    /// Write this entry over a whole slot, clearing anything that was there before.
    pub fn encode(&self, raw: &mut [u8]) {
        raw[..DIRENT_SIZE].fill(0);
        raw[..OFFSET_EXTENSION].copy_from_slice(&self.name);
        raw[OFFSET_EXTENSION..OFFSET_ATTRIBUTES].copy_from_slice(&self.extension);
        raw[OFFSET_ATTRIBUTES] = self.attributes;
        LittleEndian::write_u16(&mut raw[OFFSET_START_CLUSTER..], self.start_cluster);
        LittleEndian::write_u32(&mut raw[OFFSET_FILE_SIZE..], self.file_size);
    }

    /// Name without its space padding.
    pub fn name(&self) -> String {
        let mut bytes = self.name;
        if bytes[0] == SLOT_E5_ESCAPE {
            bytes[0] = SLOT_DELETED;
        }
        trim_padding(&bytes)
    }

    pub fn extension(&self) -> String {
        trim_padding(&self.extension)
    }

    /// `NAME.EXT`, as the report prints it.
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.name(), self.extension())
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes & ATTR_VOLUME != 0
    }

    pub fn is_directory(&self) -> bool {
        !self.is_volume_label() && self.attributes & ATTR_DIRECTORY != 0
    }

    /// `.` or `..`
    pub fn is_dot_entry(&self) -> bool {
        let name = self.name();
        name == "." || name == ".."
    }
}

pub(crate) fn set_start_cluster(raw: &mut [u8], cluster: Cluster) {
    LittleEndian::write_u16(&mut raw[OFFSET_START_CLUSTER..], cluster);
}

pub(crate) fn set_file_size(raw: &mut [u8], size: u32) {
    LittleEndian::write_u32(&mut raw[OFFSET_FILE_SIZE..], size);
}

fn trim_padding(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |last| last + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
