//! Writes a fresh, empty FAT32 volume onto a block device.

use std::io::{Seek as _, SeekFrom, Write as _};

use log::info;

use crate::{
    error::{FatError, Result},
    fat::{FAT32_EOC_WRITE, FAT_ENTRY_MASK},
    layout::{BootSector, VolumeLayout, BOOT_SIGNATURE},
    volume::BlockDevice,
};

const FSINFO_LEAD_SIGNATURE: u32 = 0x4161_5252;
const FSINFO_STRUCT_SIGNATURE: u32 = 0x6141_7272;
const FSINFO_TRAIL_SIGNATURE: u32 = 0xAA55_0000;
const FSINFO_UNKNOWN: u32 = 0xFFFF_FFFF;
const FSINFO_SECTOR: u16 = 1;
const BACKUP_BOOT_SECTOR: u16 = 6;
const MEDIA_FIXED: u8 = 0xF8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatOptions {
    pub total_sectors: u32,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            total_sectors: 65_536,
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 32,
            num_fats: 2,
            volume_id: 0x2024_0001,
            volume_label: *b"NO NAME    ",
        }
    }
}

impl FormatOptions {
    pub fn with_total_sectors(total_sectors: u32) -> Self {
        Self {
            total_sectors,
            ..Self::default()
        }
    }

    /// Sectors per FAT copy, sized for every cluster the data region could
    /// hold if the FATs took no space.
    fn fat_size_sectors(&self) -> u32 {
        let usable = self.total_sectors.saturating_sub(self.reserved_sectors as u32) as u64;
        let entries = usable / self.sectors_per_cluster.max(1) as u64 + 2;
        (entries * 4).div_ceil(self.bytes_per_sector.max(1) as u64) as u32
    }

    fn boot_sector(&self) -> BootSector {
        BootSector {
            jump: [0xEB, 0x58, 0x90],
            oem_name: *b"FATSH   ",
            bytes_per_sector: self.bytes_per_sector,
            sectors_per_cluster: self.sectors_per_cluster,
            reserved_sectors: self.reserved_sectors,
            num_fats: self.num_fats,
            root_entry_count: 0,
            total_sectors_16: 0,
            media: MEDIA_FIXED,
            fat_size_16: 0,
            sectors_per_track: 32,
            num_heads: 64,
            hidden_sectors: 0,
            total_sectors_32: self.total_sectors,
            fat_size_32: self.fat_size_sectors(),
            ext_flags: 0,
            fs_version: 0,
            root_cluster: 2,
            fs_info_sector: FSINFO_SECTOR,
            backup_boot_sector: BACKUP_BOOT_SECTOR,
            drive_number: 0x80,
            boot_signature: 0x29,
            volume_id: self.volume_id,
            volume_label: self.volume_label,
            fs_type: *b"FAT32   ",
            signature: BOOT_SIGNATURE,
        }
    }
}

/// FSInfo with free-count and next-free hints left unknown.
fn fs_info_sector(layout: &VolumeLayout) -> Vec<u8> {
    let mut raw = vec![0u8; layout.bytes_per_sector as usize];
    raw[0..4].copy_from_slice(&FSINFO_LEAD_SIGNATURE.to_le_bytes());
    raw[484..488].copy_from_slice(&FSINFO_STRUCT_SIGNATURE.to_le_bytes());
    raw[488..492].copy_from_slice(&FSINFO_UNKNOWN.to_le_bytes());
    raw[492..496].copy_from_slice(&FSINFO_UNKNOWN.to_le_bytes());
    raw[508..512].copy_from_slice(&FSINFO_TRAIL_SIGNATURE.to_le_bytes());
    raw
}

/// First sector of the FAT region: media byte in entry 0, entry 1 and the
/// root cluster's entry 2 marked end-of-chain.
fn first_fat_sector(layout: &VolumeLayout) -> Vec<u8> {
    let mut raw = vec![0u8; layout.bytes_per_sector as usize];
    let media_entry = (FAT_ENTRY_MASK & !0xFF) | MEDIA_FIXED as u32;
    raw[0..4].copy_from_slice(&media_entry.to_le_bytes());
    raw[4..8].copy_from_slice(&FAT32_EOC_WRITE.to_le_bytes());
    raw[8..12].copy_from_slice(&FAT32_EOC_WRITE.to_le_bytes());
    raw
}

fn write_sector<D: BlockDevice>(
    dev: &mut D,
    layout: &VolumeLayout,
    sector: u32,
    data: &[u8],
) -> Result<()> {
    dev.seek(SeekFrom::Start(layout.sector_byte_offset(sector)))?;
    dev.write_all(data)?;
    Ok(())
}

/// Lays down boot sector, FSInfo, backup copies, empty FATs and an empty
/// root directory in cluster 2. The device is sized to the full volume.
pub fn format_volume<D: BlockDevice>(dev: &mut D, opts: &FormatOptions) -> Result<VolumeLayout> {
    let boot = opts.boot_sector();
    let layout = VolumeLayout::from_boot_sector(&boot)?;
    if opts.reserved_sectors <= BACKUP_BOOT_SECTOR + 1 {
        return Err(FatError::InvalidBootSector(
            "reserved area too small for the backup boot sector",
        ));
    }

    let sector_size = layout.bytes_per_sector as usize;
    let zero = vec![0u8; sector_size];
    let mut boot_block = zero.clone();
    boot_block[..512].copy_from_slice(&boot.encode());
    let fs_info = fs_info_sector(&layout);

    for sector in 0..opts.reserved_sectors as u32 {
        write_sector(dev, &layout, sector, &zero)?;
    }
    write_sector(dev, &layout, 0, &boot_block)?;
    write_sector(dev, &layout, FSINFO_SECTOR as u32, &fs_info)?;
    write_sector(dev, &layout, BACKUP_BOOT_SECTOR as u32, &boot_block)?;
    write_sector(dev, &layout, BACKUP_BOOT_SECTOR as u32 + 1, &fs_info)?;

    let head = first_fat_sector(&layout);
    for copy in 0..layout.num_fats as u32 {
        let start = layout.reserved_sectors as u32 + copy * layout.fat_size_sectors;
        write_sector(dev, &layout, start, &head)?;
        for sector in start + 1..start + layout.fat_size_sectors {
            write_sector(dev, &layout, sector, &zero)?;
        }
    }

    let root = layout.cluster_to_sector(layout.root_cluster);
    for sector in root..root + layout.sectors_per_cluster as u32 {
        write_sector(dev, &layout, sector, &zero)?;
    }
    write_sector(dev, &layout, layout.total_sectors - 1, &zero)?;
    dev.flush()?;

    info!(
        "formatted FAT32: {} sectors, {} data clusters, FAT {} sectors x {}",
        layout.total_sectors,
        layout.total_data_clusters(),
        layout.fat_size_sectors,
        layout.num_fats
    );
    Ok(layout)
}

#[cfg(test)]
pub(crate) fn test_volume() -> crate::volume::Volume<std::io::Cursor<Vec<u8>>> {
    let mut image = std::io::Cursor::new(Vec::new());
    format_volume(&mut image, &FormatOptions::with_total_sectors(1024)).unwrap();
    crate::volume::Volume::mount(image).unwrap()
}

/// Same geometry as `test_volume`, on a device that can be told to fail.
#[cfg(test)]
pub(crate) fn faulty_test_volume() -> crate::volume::Volume<crate::volume::FaultyDevice> {
    let mut image = std::io::Cursor::new(Vec::new());
    format_volume(&mut image, &FormatOptions::with_total_sectors(1024)).unwrap();
    let dev = crate::volume::FaultyDevice::new(image.into_inner());
    crate::volume::Volume::mount(dev).unwrap()
}
