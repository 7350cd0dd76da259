//! Directory traversal: walk every 32-byte slot of a directory's cluster
//! chain, locate names and free slots, list live entries.

use core::ops::ControlFlow;

use log::trace;

use super::{
    entry::{DirEntry, DirSlot, DIR_ENTRY_SIZE},
    names::{format_name, ShortName},
};
use crate::{
    error::{FatError, Result},
    volume::{BlockDevice, Volume},
};

/// A live entry together with the absolute image offset of its slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundEntry {
    pub entry: DirEntry,
    pub location: u64,
}

impl FoundEntry {
    pub fn name(&self) -> ShortName {
        self.entry.display_name()
    }
}

/// Result of `search`: the match, and the first reusable slot seen before
/// the scan stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirLookup {
    pub found: Option<FoundEntry>,
    pub free_slot: Option<u64>,
}

/// One row of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FatDirEntry {
    pub name: ShortName,
    pub is_dir: bool,
    pub size: u32,
    pub first_cluster: u32,
}

fn slot_bytes(sector: &[u8], index: usize) -> [u8; DIR_ENTRY_SIZE] {
    let mut raw = [0u8; DIR_ENTRY_SIZE];
    let base = index * DIR_ENTRY_SIZE;
    raw.copy_from_slice(&sector[base..base + DIR_ENTRY_SIZE]);
    raw
}

impl<D: BlockDevice> Volume<D> {
    /// Feeds every slot of the directory at `dir_cluster` to `visit` in
    /// on-disk order until it breaks or the chain ends. The terminator slot
    /// is delivered like any other; the visitor decides to stop there.
    pub(crate) fn walk_directory<T>(
        &mut self,
        dir_cluster: u32,
        mut visit: impl FnMut(u64, DirSlot) -> ControlFlow<T>,
    ) -> Result<Option<T>> {
        let layout = *self.layout();
        if !layout.is_data_cluster(dir_cluster) {
            return Err(FatError::BadCluster(dir_cluster));
        }

        let limit = self.chain_walk_limit();
        let slots_per_sector = layout.bytes_per_sector as usize / DIR_ENTRY_SIZE;
        let mut sector = self.sector_buffer();
        let mut cluster = dir_cluster;
        let mut visited = 0u32;
        loop {
            if visited > limit {
                return Err(FatError::ClusterChainTooLong);
            }
            visited = visited.saturating_add(1);

            let first_sector = layout.cluster_to_sector(cluster);
            for sector_index in 0..layout.sectors_per_cluster as u32 {
                let lba = first_sector + sector_index;
                self.read_sector(lba, &mut sector)?;
                let sector_base = layout.sector_byte_offset(lba);

                for index in 0..slots_per_sector {
                    let location = sector_base + (index * DIR_ENTRY_SIZE) as u64;
                    let slot = DirSlot::decode(&slot_bytes(&sector, index));
                    if let ControlFlow::Break(value) = visit(location, slot) {
                        return Ok(Some(value));
                    }
                }
            }

            match self.next_cluster(cluster)? {
                Some(next) => cluster = next,
                None => return Ok(None),
            }
        }
    }

    /// Looks up `target` among the entries of `dir_cluster`, comparing the
    /// formatted 8.3 name exactly. LFN and volume-label slots are skipped.
    ///
    /// `free_slot` is the first deleted slot or the terminator, whichever
    /// comes first. A chain that runs out without either leaves it `None`.
    pub fn search(&mut self, dir_cluster: u32, target: &str) -> Result<DirLookup> {
        let mut free_slot = None;
        let found = self
            .walk_directory(dir_cluster, |location, slot| match slot {
                DirSlot::End => {
                    free_slot.get_or_insert(location);
                    ControlFlow::Break(None)
                }
                DirSlot::Deleted => {
                    free_slot.get_or_insert(location);
                    ControlFlow::Continue(())
                }
                DirSlot::Live(entry) if entry.is_long_name() || entry.is_volume_label() => {
                    ControlFlow::Continue(())
                }
                DirSlot::Live(entry) => {
                    if format_name(&entry.name).as_str() == target {
                        ControlFlow::Break(Some(FoundEntry { entry, location }))
                    } else {
                        ControlFlow::Continue(())
                    }
                }
            })?
            .flatten();

        trace!(
            "search {target:?} in cluster {dir_cluster}: found={} free={free_slot:?}",
            found.is_some()
        );
        Ok(DirLookup { found, free_slot })
    }

    /// Like `search`, but a missing name is an error.
    pub fn find_entry(&mut self, dir_cluster: u32, name: &str) -> Result<FoundEntry> {
        self.search(dir_cluster, name)?
            .found
            .ok_or_else(|| FatError::NotFound(name.to_string()))
    }

    /// Every live short entry up to the terminator, LFN slots excluded.
    pub(crate) fn live_entries(&mut self, dir_cluster: u32) -> Result<Vec<FoundEntry>> {
        let mut entries = Vec::new();
        self.walk_directory(dir_cluster, |location, slot| match slot {
            DirSlot::End => ControlFlow::Break(()),
            DirSlot::Deleted => ControlFlow::Continue(()),
            DirSlot::Live(entry) if entry.is_long_name() => ControlFlow::Continue(()),
            DirSlot::Live(entry) => {
                entries.push(FoundEntry { entry, location });
                ControlFlow::Continue(())
            }
        })?;
        Ok(entries)
    }

    /// Visible entries in scan order. Hidden, system and volume-label entries
    /// are left out; `.` and `..` are kept.
    pub fn list_dir(&mut self, dir_cluster: u32) -> Result<Vec<FatDirEntry>> {
        Ok(self
            .live_entries(dir_cluster)?
            .into_iter()
            .filter(|found| !found.entry.is_volume_label() && !found.entry.is_hidden_or_system())
            .map(|found| FatDirEntry {
                name: found.name(),
                is_dir: found.entry.is_dir(),
                size: found.entry.size,
                first_cluster: found.entry.first_cluster,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::{ATTR_ARCHIVE, ATTR_HIDDEN, ATTR_LONG_NAME, ATTR_VOLUME_ID, SLOT_DELETED};
    use crate::format::test_volume;

    fn root_slot(volume: &Volume<std::io::Cursor<Vec<u8>>>, index: u64) -> u64 {
        let layout = volume.layout();
        layout.cluster_byte_offset(layout.root_cluster) + index * DIR_ENTRY_SIZE as u64
    }

    fn put(volume: &mut Volume<std::io::Cursor<Vec<u8>>>, index: u64, entry: DirEntry) {
        let at = root_slot(volume, index);
        volume.write_all_at(at, &entry.encode()).unwrap();
    }

    #[test]
    fn empty_root_offers_its_first_slot() {
        let mut volume = test_volume();
        let root = volume.layout().root_cluster;
        let lookup = volume.search(root, "A").unwrap();
        assert_eq!(lookup.found, None);
        assert_eq!(lookup.free_slot, Some(root_slot(&volume, 0)));
    }

    #[test]
    fn deleted_slot_wins_over_terminator() {
        let mut volume = test_volume();
        let root = volume.layout().root_cluster;
        put(&mut volume, 0, DirEntry::new(*b"A          ", ATTR_ARCHIVE, 0, 0));
        let mut gone = DirEntry::new(*b"B          ", ATTR_ARCHIVE, 0, 0);
        gone.name[0] = SLOT_DELETED;
        put(&mut volume, 1, gone);
        put(&mut volume, 2, DirEntry::new(*b"C          ", ATTR_ARCHIVE, 0, 7));

        let lookup = volume.search(root, "C").unwrap();
        assert_eq!(lookup.found.as_ref().map(|f| f.entry.size), Some(7));
        assert_eq!(lookup.found.map(|f| f.location), Some(root_slot(&volume, 2)));
        assert_eq!(lookup.free_slot, Some(root_slot(&volume, 1)));
    }

    #[test]
    fn scan_stops_at_terminator() {
        let mut volume = test_volume();
        let root = volume.layout().root_cluster;
        // Slot 1 stays zero, so the entry behind it is unreachable.
        put(&mut volume, 2, DirEntry::new(*b"LOST       ", ATTR_ARCHIVE, 0, 0));
        assert_eq!(volume.search(root, "LOST").unwrap().found, None);
        assert!(volume.list_dir(root).unwrap().is_empty());
    }

    #[test]
    fn names_compare_exactly() {
        let mut volume = test_volume();
        let root = volume.layout().root_cluster;
        put(&mut volume, 0, DirEntry::new(*b"HI      TXT", ATTR_ARCHIVE, 0, 0));
        assert!(volume.search(root, "HI.TXT").unwrap().found.is_some());
        assert!(volume.search(root, "hi.txt").unwrap().found.is_none());
        assert!(matches!(
            volume.find_entry(root, "HI"),
            Err(FatError::NotFound(name)) if name == "HI"
        ));
    }

    #[test]
    fn long_name_and_label_slots_are_invisible() {
        let mut volume = test_volume();
        let root = volume.layout().root_cluster;
        put(&mut volume, 0, DirEntry::new(*b"MYDISK     ", ATTR_VOLUME_ID, 0, 0));
        put(&mut volume, 1, DirEntry::new(*b"AFILE  TXT ", ATTR_LONG_NAME, 0, 0));
        put(&mut volume, 2, DirEntry::new(*b"SECRET     ", ATTR_HIDDEN, 0, 0));
        put(&mut volume, 3, DirEntry::new(*b"SHOWN   TXT", ATTR_ARCHIVE, 0, 3));

        assert!(volume.search(root, "MYDISK").unwrap().found.is_none());
        assert!(volume.search(root, "SECRET").unwrap().found.is_some());

        let listing = volume.list_dir(root).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name.as_str(), "SHOWN.TXT");
        assert_eq!(listing[0].size, 3);
        assert!(!listing[0].is_dir);
    }

    #[test]
    fn full_directory_has_no_free_slot() {
        let mut volume = test_volume();
        let root = volume.layout().root_cluster;
        let slots = volume.layout().cluster_size() as u64 / DIR_ENTRY_SIZE as u64;
        for index in 0..slots {
            let mut name = *b"F          ";
            name[1] = b'A' + (index % 26) as u8;
            name[2] = b'A' + (index / 26) as u8;
            put(&mut volume, index, DirEntry::new(name, ATTR_ARCHIVE, 0, 0));
        }
        let lookup = volume.search(root, "NOPE").unwrap();
        assert_eq!(lookup, DirLookup::default());
    }
}
