use core::ops::ControlFlow;

use log::debug;

use super::{
    entry::{DirEntry, DirSlot, ATTR_ARCHIVE, ATTR_DIRECTORY, DIR_ENTRY_SIZE, SLOT_DELETED},
    names::{encode_short_name, format_name, DOTDOT_NAME, DOT_NAME},
    scan::FoundEntry,
};
use crate::{
    error::{FatError, Result},
    volume::{BlockDevice, Volume},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn attr(self) -> u8 {
        match self {
            Self::File => ATTR_ARCHIVE,
            Self::Directory => ATTR_DIRECTORY,
        }
    }
}

impl<D: BlockDevice> Volume<D> {
    pub fn read_entry_at(&mut self, location: u64) -> Result<DirEntry> {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        self.read_exact_at(location, &mut raw)?;
        Ok(DirEntry::decode(&raw))
    }

    pub fn write_entry_at(&mut self, location: u64, entry: &DirEntry) -> Result<()> {
        self.write_all_at(location, &entry.encode())?;
        Ok(())
    }

    /// Reference a `..` entry stores for `dir_cluster`: root is written as 0.
    pub(crate) fn parent_ref(&self, dir_cluster: u32) -> u32 {
        if dir_cluster == self.layout().root_cluster {
            0
        } else {
            dir_cluster
        }
    }

    /// Free slot in `dir_cluster` for `raw_name`, refusing live duplicates.
    fn reserve_slot(&mut self, dir_cluster: u32, raw_name: &[u8; 11]) -> Result<u64> {
        let canonical = format_name(raw_name);
        let lookup = self.search(dir_cluster, canonical.as_str())?;
        if lookup.found.is_some() {
            return Err(FatError::AlreadyExists(canonical.as_str().to_string()));
        }
        lookup.free_slot.ok_or(FatError::DirFull)
    }

    /// Writes a new entry named `name` into the first free slot of
    /// `dir_cluster`. No clusters are allocated.
    pub fn create_entry(
        &mut self,
        dir_cluster: u32,
        name: &str,
        kind: EntryKind,
        size: u32,
        first_cluster: u32,
    ) -> Result<FoundEntry> {
        let raw_name = encode_short_name(name)?;
        let location = self.reserve_slot(dir_cluster, &raw_name)?;
        let entry = DirEntry::new(raw_name, kind.attr(), first_cluster, size);
        self.write_entry_at(location, &entry)?;
        debug!("created {kind:?} {} at {location:#x}", entry.display_name());
        Ok(FoundEntry { entry, location })
    }

    /// Creates a subdirectory of `parent_cluster` backed by one fresh cluster
    /// holding `.` and `..`.
    pub fn create_directory(&mut self, parent_cluster: u32, name: &str) -> Result<FoundEntry> {
        let raw_name = encode_short_name(name)?;
        let location = self.reserve_slot(parent_cluster, &raw_name)?;

        let cluster = self.claim_cluster(None)?;
        let entry = DirEntry::new(raw_name, ATTR_DIRECTORY, cluster, 0);
        self.write_entry_at(location, &entry)?;
        let parent = self.parent_ref(parent_cluster);
        self.initialize_directory_cluster(cluster, parent)?;

        debug!(
            "mkdir {} -> cluster {cluster} (parent {parent_cluster})",
            entry.display_name()
        );
        Ok(FoundEntry { entry, location })
    }

    /// Zero-fills `dir_cluster`, then writes `.` and `..` into its first two
    /// slots. The zero third slot terminates the directory.
    pub(crate) fn initialize_directory_cluster(
        &mut self,
        dir_cluster: u32,
        parent_ref: u32,
    ) -> Result<()> {
        let layout = *self.layout();
        let mut block = vec![0u8; layout.cluster_size() as usize];
        let dot = DirEntry::new(DOT_NAME, ATTR_DIRECTORY, dir_cluster, 0);
        let dotdot = DirEntry::new(DOTDOT_NAME, ATTR_DIRECTORY, parent_ref, 0);
        block[..DIR_ENTRY_SIZE].copy_from_slice(&dot.encode());
        block[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&dotdot.encode());
        self.write_all_at(layout.cluster_byte_offset(dir_cluster), &block)?;
        Ok(())
    }

    pub fn mark_deleted(&mut self, location: u64) -> Result<()> {
        self.write_all_at(location, &[SLOT_DELETED])?;
        Ok(())
    }

    /// True when nothing but `.` and `..` is live in the directory.
    pub fn is_directory_empty(&mut self, dir_cluster: u32) -> Result<bool> {
        let occupied = self.walk_directory(dir_cluster, |_, slot| match slot {
            DirSlot::End => ControlFlow::Break(false),
            DirSlot::Deleted => ControlFlow::Continue(()),
            DirSlot::Live(entry) if entry.is_long_name() || entry.is_dot_entry() => {
                ControlFlow::Continue(())
            }
            DirSlot::Live(_) => ControlFlow::Break(true),
        })?;
        Ok(!occupied.unwrap_or(false))
    }

    /// Releases the entry's clusters, then tombstones its slot.
    pub fn remove_entry(&mut self, found: &FoundEntry) -> Result<()> {
        self.free_chain(found.entry.first_cluster)?;
        self.mark_deleted(found.location)?;
        debug!("removed {} at {:#x}", found.name(), found.location);
        Ok(())
    }

    /// Rewrites only the name bytes of an entry that stays in `dir_cluster`.
    pub fn rename_entry(
        &mut self,
        dir_cluster: u32,
        found: &FoundEntry,
        new_name: &str,
    ) -> Result<FoundEntry> {
        let raw_name = encode_short_name(new_name)?;
        let canonical = format_name(&raw_name);
        if self.search(dir_cluster, canonical.as_str())?.found.is_some() {
            return Err(FatError::AlreadyExists(canonical.as_str().to_string()));
        }

        let mut entry = found.entry.clone();
        entry.name = raw_name;
        self.write_entry_at(found.location, &entry)?;
        debug!("renamed {} to {canonical}", found.name());
        Ok(FoundEntry {
            entry,
            location: found.location,
        })
    }

    /// Copies the entry into `target_cluster` and tombstones the original.
    /// A moved directory gets its `..` pointed at the new parent.
    pub fn move_entry(&mut self, found: &FoundEntry, target_cluster: u32) -> Result<FoundEntry> {
        let location = self.reserve_slot(target_cluster, &found.entry.name)?;
        self.write_entry_at(location, &found.entry)?;
        self.mark_deleted(found.location)?;

        if found.entry.is_dir() && self.layout().is_data_cluster(found.entry.first_cluster) {
            let dotdot_at =
                self.layout().cluster_byte_offset(found.entry.first_cluster) + DIR_ENTRY_SIZE as u64;
            let mut dotdot = self.read_entry_at(dotdot_at)?;
            if dotdot.name == DOTDOT_NAME {
                dotdot.first_cluster = self.parent_ref(target_cluster);
                self.write_entry_at(dotdot_at, &dotdot)?;
            }
        }

        debug!("moved {} into cluster {target_cluster}", found.name());
        Ok(FoundEntry {
            entry: found.entry.clone(),
            location,
        })
    }
}
