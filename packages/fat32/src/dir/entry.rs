use super::names::{format_name, ShortName};

pub const DIR_ENTRY_SIZE: usize = 32;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;

pub const SLOT_END: u8 = 0x00;
pub const SLOT_DELETED: u8 = 0xE5;

/// A short (8.3) directory record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attr: u8,
    pub nt_reserved: u8,
    pub create_time_tenth: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    pub first_cluster: u32,
    pub write_time: u16,
    pub write_date: u16,
    pub size: u32,
}

impl DirEntry {
    pub fn new(name: [u8; 11], attr: u8, first_cluster: u32, size: u32) -> Self {
        Self {
            name,
            attr,
            first_cluster,
            size,
            ..Self::default()
        }
    }

    pub fn decode(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let u16_at = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[0..11]);
        let cluster_hi = u16_at(20) as u32;
        let cluster_lo = u16_at(26) as u32;
        Self {
            name,
            attr: raw[11],
            nt_reserved: raw[12],
            create_time_tenth: raw[13],
            create_time: u16_at(14),
            create_date: u16_at(16),
            access_date: u16_at(18),
            first_cluster: (cluster_hi << 16) | cluster_lo,
            write_time: u16_at(22),
            write_date: u16_at(24),
            size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }

    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[0..11].copy_from_slice(&self.name);
        raw[11] = self.attr;
        raw[12] = self.nt_reserved;
        raw[13] = self.create_time_tenth;
        raw[14..16].copy_from_slice(&self.create_time.to_le_bytes());
        raw[16..18].copy_from_slice(&self.create_date.to_le_bytes());
        raw[18..20].copy_from_slice(&self.access_date.to_le_bytes());
        raw[20..22].copy_from_slice(&((self.first_cluster >> 16) as u16).to_le_bytes());
        raw[22..24].copy_from_slice(&self.write_time.to_le_bytes());
        raw[24..26].copy_from_slice(&self.write_date.to_le_bytes());
        raw[26..28].copy_from_slice(&(self.first_cluster as u16).to_le_bytes());
        raw[28..32].copy_from_slice(&self.size.to_le_bytes());
        raw
    }

    pub fn is_dir(&self) -> bool {
        (self.attr & ATTR_DIRECTORY) != 0
    }

    pub fn is_long_name(&self) -> bool {
        (self.attr & ATTR_LONG_NAME) == ATTR_LONG_NAME
    }

    pub fn is_volume_label(&self) -> bool {
        (self.attr & ATTR_VOLUME_ID) != 0
    }

    pub fn is_hidden_or_system(&self) -> bool {
        (self.attr & (ATTR_HIDDEN | ATTR_SYSTEM)) != 0
    }

    pub fn is_dot_entry(&self) -> bool {
        self.name[0] == b'.'
    }

    pub fn display_name(&self) -> ShortName {
        format_name(&self.name)
    }
}

/// What a 32-byte directory slot holds, decided by its first name byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirSlot {
    Live(DirEntry),
    Deleted,
    End,
}

impl DirSlot {
    pub fn decode(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        match raw[0] {
            SLOT_END => Self::End,
            SLOT_DELETED => Self::Deleted,
            _ => Self::Live(DirEntry::decode(raw)),
        }
    }
}
