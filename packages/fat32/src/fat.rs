//! FAT table access: entry decode, mirrored writes, chain walking and
//! cluster allocation.

use log::{debug, error, trace};

use crate::{
    error::{FatError, Result},
    volume::{BlockDevice, Volume},
};

pub const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;
pub const FAT32_EOC: u32 = 0x0FFF_FFF8;
pub const FAT32_EOC_WRITE: u32 = 0x0FFF_FFFF;

/// Decoded meaning of a FAT entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterLink {
    Free,
    End,
    Next(u32),
}

impl ClusterLink {
    pub fn decode(raw: u32) -> Self {
        match raw & FAT_ENTRY_MASK {
            0 => Self::Free,
            value if value >= FAT32_EOC => Self::End,
            value => Self::Next(value),
        }
    }

    pub fn encode(self) -> u32 {
        match self {
            Self::Free => 0,
            Self::End => FAT32_EOC_WRITE,
            Self::Next(cluster) => cluster & FAT_ENTRY_MASK,
        }
    }
}

impl<D: BlockDevice> Volume<D> {
    fn check_fat_slot(&self, cluster: u32) -> Result<()> {
        let layout = self.layout();
        let sector_offset = (cluster as u64 * 4) / layout.bytes_per_sector as u64;
        if sector_offset >= layout.fat_size_sectors as u64 {
            return Err(FatError::BadCluster(cluster));
        }
        Ok(())
    }

    /// Reads `cluster`'s entry from the first FAT copy, masked to 28 bits.
    pub fn read_fat_entry(&mut self, cluster: u32) -> Result<u32> {
        self.check_fat_slot(cluster)?;
        let offset = self.layout().fat_entry_offset(0, cluster);
        let mut raw = [0u8; 4];
        self.read_exact_at(offset, &mut raw)?;
        Ok(u32::from_le_bytes(raw) & FAT_ENTRY_MASK)
    }

    /// Writes `value` into every FAT copy. The reserved top nibble of each
    /// slot is preserved.
    pub fn write_fat_entry(&mut self, cluster: u32, value: u32) -> Result<()> {
        self.check_fat_slot(cluster)?;
        let masked = value & FAT_ENTRY_MASK;
        for copy in 0..self.layout().num_fats {
            let offset = self.layout().fat_entry_offset(copy, cluster);
            if let Err(source) = self.rewrite_fat_slot(offset, masked) {
                if copy == 0 {
                    return Err(source.into());
                }
                error!("FAT copy {copy} write failed for cluster {cluster}; copies diverged");
                return Err(FatError::MirrorWrite {
                    cluster,
                    copy,
                    source,
                });
            }
        }
        Ok(())
    }

    fn rewrite_fat_slot(&mut self, offset: u64, masked: u32) -> std::io::Result<()> {
        let mut raw = [0u8; 4];
        self.read_exact_at(offset, &mut raw)?;
        let new = (u32::from_le_bytes(raw) & !FAT_ENTRY_MASK) | masked;
        self.write_all_at(offset, &new.to_le_bytes())
    }

    pub fn cluster_link(&mut self, cluster: u32) -> Result<ClusterLink> {
        Ok(ClusterLink::decode(self.read_fat_entry(cluster)?))
    }

    /// Follows one link. `None` at end of chain; links that point outside
    /// the data region are reported as corruption instead of being followed.
    pub fn next_cluster(&mut self, cluster: u32) -> Result<Option<u32>> {
        match self.cluster_link(cluster)? {
            ClusterLink::End => Ok(None),
            ClusterLink::Next(next) if self.layout().is_data_cluster(next) => {
                trace!("chain {cluster} -> {next}");
                Ok(Some(next))
            }
            ClusterLink::Next(next) => Err(FatError::BadCluster(next)),
            ClusterLink::Free => Err(FatError::BadCluster(cluster)),
        }
    }

    pub(crate) fn chain_walk_limit(&self) -> u32 {
        self.layout().total_data_clusters().saturating_add(2)
    }

    /// First cluster whose entry reads free. The caller claims it.
    pub fn allocate_free_cluster(&mut self) -> Result<u32> {
        let end = self.layout().total_data_clusters() as u64 + 2;
        for cluster in 2..end {
            let cluster = cluster as u32;
            if self.read_fat_entry(cluster)? == 0 {
                return Ok(cluster);
            }
        }
        Err(FatError::NoFreeCluster)
    }

    /// Allocates a cluster, terminates it, and links it after `tail` when
    /// one is given.
    pub fn claim_cluster(&mut self, tail: Option<u32>) -> Result<u32> {
        let cluster = self.allocate_free_cluster()?;
        self.write_fat_entry(cluster, FAT32_EOC_WRITE)?;
        if let Some(tail) = tail {
            self.write_fat_entry(tail, cluster)?;
        }
        debug!("claimed cluster {cluster} after {tail:?}");
        Ok(cluster)
    }

    /// Releases every cluster of the chain starting at `start_cluster`.
    pub fn free_chain(&mut self, start_cluster: u32) -> Result<()> {
        if !self.layout().is_data_cluster(start_cluster) {
            return Ok(());
        }

        let limit = self.chain_walk_limit();
        let mut cluster = start_cluster;
        let mut visited = 0u32;
        loop {
            if visited > limit {
                return Err(FatError::ClusterChainTooLong);
            }
            visited = visited.saturating_add(1);

            let link = self.cluster_link(cluster)?;
            self.write_fat_entry(cluster, 0)?;
            match link {
                ClusterLink::Next(next) if self.layout().is_data_cluster(next) => cluster = next,
                _ => break,
            }
        }
        debug!("freed {visited} cluster(s) from {start_cluster}");
        Ok(())
    }

    /// Cluster holding `byte_offset` of the chain that starts at
    /// `starting_cluster`, or `None` when the chain ends first.
    pub fn find_cluster_from_offset(
        &mut self,
        starting_cluster: u32,
        byte_offset: u64,
    ) -> Result<Option<u32>> {
        if !self.layout().is_data_cluster(starting_cluster) {
            return Err(FatError::BadCluster(starting_cluster));
        }
        let clusters_to_skip = byte_offset / self.layout().cluster_size() as u64;
        let mut cluster = starting_cluster;
        for _ in 0..clusters_to_skip {
            match self.next_cluster(cluster)? {
                Some(next) => cluster = next,
                None => return Ok(None),
            }
        }
        Ok(Some(cluster))
    }
}

#[cfg(test)]
impl<D: BlockDevice> Volume<D> {
    pub(crate) fn chain_length(&mut self, start_cluster: u32) -> Result<u32> {
        let limit = self.chain_walk_limit();
        let mut cluster = start_cluster;
        let mut count = 1u32;
        while let Some(next) = self.next_cluster(cluster)? {
            if count > limit {
                return Err(FatError::ClusterChainTooLong);
            }
            count += 1;
            cluster = next;
        }
        Ok(count)
    }
}
