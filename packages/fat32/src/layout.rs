//! Boot sector decoding and the sector/cluster arithmetic derived from it.

use crate::error::{FatError, Result};

pub const BOOT_SECTOR_SIZE: usize = 512;
pub const BOOT_SIGNATURE: u16 = 0xAA55;
const SIGNATURE_OFFSET: usize = 510;

/// Field-by-field view of a FAT32 boot sector, including the extended BPB.
///
/// Bootstrap code between the extended BPB and the signature is not kept;
/// `encode` writes it back as zeros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootSector {
    pub jump: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media: u8,
    pub fat_size_16: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    pub fat_size_32: u32,
    pub ext_flags: u16,
    pub fs_version: u16,
    pub root_cluster: u32,
    pub fs_info_sector: u16,
    pub backup_boot_sector: u16,
    pub drive_number: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
    pub signature: u16,
}

fn le_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn le_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn bytes<const N: usize>(raw: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[at..at + N]);
    out
}

impl BootSector {
    pub fn decode(raw: &[u8; BOOT_SECTOR_SIZE]) -> Self {
        Self {
            jump: bytes(raw, 0),
            oem_name: bytes(raw, 3),
            bytes_per_sector: le_u16(raw, 11),
            sectors_per_cluster: raw[13],
            reserved_sectors: le_u16(raw, 14),
            num_fats: raw[16],
            root_entry_count: le_u16(raw, 17),
            total_sectors_16: le_u16(raw, 19),
            media: raw[21],
            fat_size_16: le_u16(raw, 22),
            sectors_per_track: le_u16(raw, 24),
            num_heads: le_u16(raw, 26),
            hidden_sectors: le_u32(raw, 28),
            total_sectors_32: le_u32(raw, 32),
            fat_size_32: le_u32(raw, 36),
            ext_flags: le_u16(raw, 40),
            fs_version: le_u16(raw, 42),
            root_cluster: le_u32(raw, 44),
            fs_info_sector: le_u16(raw, 48),
            backup_boot_sector: le_u16(raw, 50),
            drive_number: raw[64],
            boot_signature: raw[66],
            volume_id: le_u32(raw, 67),
            volume_label: bytes(raw, 71),
            fs_type: bytes(raw, 82),
            signature: le_u16(raw, SIGNATURE_OFFSET),
        }
    }

    pub fn encode(&self) -> [u8; BOOT_SECTOR_SIZE] {
        let mut raw = [0u8; BOOT_SECTOR_SIZE];
        raw[0..3].copy_from_slice(&self.jump);
        raw[3..11].copy_from_slice(&self.oem_name);
        raw[11..13].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        raw[13] = self.sectors_per_cluster;
        raw[14..16].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        raw[16] = self.num_fats;
        raw[17..19].copy_from_slice(&self.root_entry_count.to_le_bytes());
        raw[19..21].copy_from_slice(&self.total_sectors_16.to_le_bytes());
        raw[21] = self.media;
        raw[22..24].copy_from_slice(&self.fat_size_16.to_le_bytes());
        raw[24..26].copy_from_slice(&self.sectors_per_track.to_le_bytes());
        raw[26..28].copy_from_slice(&self.num_heads.to_le_bytes());
        raw[28..32].copy_from_slice(&self.hidden_sectors.to_le_bytes());
        raw[32..36].copy_from_slice(&self.total_sectors_32.to_le_bytes());
        raw[36..40].copy_from_slice(&self.fat_size_32.to_le_bytes());
        raw[40..42].copy_from_slice(&self.ext_flags.to_le_bytes());
        raw[42..44].copy_from_slice(&self.fs_version.to_le_bytes());
        raw[44..48].copy_from_slice(&self.root_cluster.to_le_bytes());
        raw[48..50].copy_from_slice(&self.fs_info_sector.to_le_bytes());
        raw[50..52].copy_from_slice(&self.backup_boot_sector.to_le_bytes());
        raw[64] = self.drive_number;
        raw[66] = self.boot_signature;
        raw[67..71].copy_from_slice(&self.volume_id.to_le_bytes());
        raw[71..82].copy_from_slice(&self.volume_label);
        raw[82..90].copy_from_slice(&self.fs_type);
        raw[SIGNATURE_OFFSET..].copy_from_slice(&self.signature.to_le_bytes());
        raw
    }
}

/// Geometry of a mounted volume. Immutable once parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeLayout {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub fat_size_sectors: u32,
    pub total_sectors: u32,
    pub root_cluster: u32,
}

impl VolumeLayout {
    pub fn parse(raw: &[u8; BOOT_SECTOR_SIZE]) -> Result<Self> {
        Self::from_boot_sector(&BootSector::decode(raw))
    }

    pub fn from_boot_sector(boot: &BootSector) -> Result<Self> {
        if boot.signature != BOOT_SIGNATURE {
            return Err(FatError::InvalidSignature(boot.signature));
        }
        if !matches!(boot.bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            return Err(FatError::InvalidBootSector(
                "bytes per sector must be 512, 1024, 2048 or 4096",
            ));
        }
        if boot.sectors_per_cluster == 0 || !boot.sectors_per_cluster.is_power_of_two() {
            return Err(FatError::InvalidBootSector(
                "sectors per cluster must be a power of two",
            ));
        }
        if boot.num_fats == 0 {
            return Err(FatError::InvalidBootSector("volume has no FAT copies"));
        }
        if boot.fat_size_32 == 0 {
            return Err(FatError::InvalidBootSector("not a FAT32 volume"));
        }

        let total_sectors = if boot.total_sectors_32 != 0 {
            boot.total_sectors_32
        } else {
            boot.total_sectors_16 as u32
        };
        let used = boot.reserved_sectors as u64 + boot.num_fats as u64 * boot.fat_size_32 as u64;
        if used >= total_sectors as u64 {
            return Err(FatError::InvalidBootSector("no room for a data region"));
        }

        let layout = Self {
            bytes_per_sector: boot.bytes_per_sector,
            sectors_per_cluster: boot.sectors_per_cluster,
            reserved_sectors: boot.reserved_sectors,
            num_fats: boot.num_fats,
            fat_size_sectors: boot.fat_size_32,
            total_sectors,
            root_cluster: boot.root_cluster,
        };
        if !layout.is_data_cluster(layout.root_cluster) {
            return Err(FatError::InvalidBootSector("root cluster outside the data region"));
        }
        Ok(layout)
    }

    pub fn sector_byte_offset(&self, sector: u32) -> u64 {
        sector as u64 * self.bytes_per_sector as u64
    }

    pub fn first_data_sector(&self) -> u32 {
        self.reserved_sectors as u32 + self.num_fats as u32 * self.fat_size_sectors
    }

    pub fn total_data_clusters(&self) -> u32 {
        (self.total_sectors - self.first_data_sector()) / self.sectors_per_cluster as u32
    }

    /// Clusters 0 and 1 are reserved and fold onto the first data sector.
    pub fn cluster_to_sector(&self, cluster: u32) -> u32 {
        if cluster < 2 {
            return self.first_data_sector();
        }
        self.first_data_sector() + (cluster - 2) * self.sectors_per_cluster as u32
    }

    pub fn cluster_byte_offset(&self, cluster: u32) -> u64 {
        self.sector_byte_offset(self.cluster_to_sector(cluster))
    }

    pub fn cluster_size(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// Highest addressable data cluster.
    pub fn max_cluster(&self) -> u32 {
        self.total_data_clusters() + 1
    }

    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster <= self.max_cluster()
    }

    pub fn fat_entry_count(&self) -> u32 {
        ((self.fat_size_sectors as u64 * self.bytes_per_sector as u64) / 4) as u32
    }

    pub fn image_size(&self) -> u64 {
        self.sector_byte_offset(self.total_sectors)
    }

    /// Absolute byte address of `cluster`'s slot inside FAT copy `copy`.
    pub fn fat_entry_offset(&self, copy: u8, cluster: u32) -> u64 {
        let fat_offset = cluster as u64 * 4;
        let bps = self.bytes_per_sector as u64;
        let sector = self.reserved_sectors as u64
            + copy as u64 * self.fat_size_sectors as u64
            + fat_offset / bps;
        sector * bps + fat_offset % bps
    }
}
