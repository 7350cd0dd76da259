use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::{
    error::Result,
    layout::{VolumeLayout, BOOT_SECTOR_SIZE},
};

/// Anything that can back a volume image: files, in-memory cursors.
pub trait BlockDevice: Read + Write + Seek {}

impl<T: Read + Write + Seek> BlockDevice for T {}

/// An image handle paired with the geometry decoded from its boot sector.
pub struct Volume<D> {
    dev: D,
    layout: VolumeLayout,
}

impl<D: BlockDevice> Volume<D> {
    pub fn mount(mut dev: D) -> Result<Self> {
        let mut boot = [0u8; BOOT_SECTOR_SIZE];
        dev.seek(SeekFrom::Start(0))?;
        dev.read_exact(&mut boot)?;
        let layout = VolumeLayout::parse(&boot)?;
        debug!(
            "mounted FAT32: {} B/sector, {} sectors/cluster, {} FATs x {} sectors, root cluster {}",
            layout.bytes_per_sector,
            layout.sectors_per_cluster,
            layout.num_fats,
            layout.fat_size_sectors,
            layout.root_cluster
        );
        Ok(Self { dev, layout })
    }

    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.dev.seek(SeekFrom::Start(offset))?;
        self.dev.read_exact(buf)
    }

    pub fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.dev.seek(SeekFrom::Start(offset))?;
        self.dev.write_all(buf)
    }

    pub(crate) fn read_sector(&mut self, sector: u32, buf: &mut [u8]) -> io::Result<()> {
        let offset = self.layout.sector_byte_offset(sector);
        self.read_exact_at(offset, buf)
    }

    pub(crate) fn sector_buffer(&self) -> Vec<u8> {
        vec![0u8; self.layout.bytes_per_sector as usize]
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.dev.flush()
    }

    pub fn into_inner(self) -> D {
        self.dev
    }

    #[cfg(test)]
    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }
}

/// In-memory image whose reads or writes fail inside chosen byte ranges.
#[cfg(test)]
pub(crate) struct FaultyDevice {
    inner: std::io::Cursor<Vec<u8>>,
    pub fail_reads: Option<core::ops::Range<u64>>,
    pub fail_writes: Option<core::ops::Range<u64>>,
}

#[cfg(test)]
impl FaultyDevice {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            inner: std::io::Cursor::new(image),
            fail_reads: None,
            fail_writes: None,
        }
    }

    fn check(&self, range: &Option<core::ops::Range<u64>>, len: usize) -> io::Result<()> {
        let start = self.inner.position();
        let end = start + len as u64;
        match range {
            Some(bad) if start < bad.end && bad.start < end => {
                Err(io::Error::other(format!("injected fault at {start:#x}")))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
impl Read for FaultyDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check(&self.fail_reads, buf.len())?;
        self.inner.read(buf)
    }
}

#[cfg(test)]
impl Write for FaultyDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check(&self.fail_writes, buf.len())?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
impl Seek for FaultyDevice {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
