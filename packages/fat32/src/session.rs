//! The mounted-volume context the shell drives: current directory, open
//! handles, and every user-facing operation on top of the engine.

use log::{debug, info};

use crate::{
    dir::{EntryKind, FatDirEntry, FoundEntry},
    error::{FatError, Result},
    file::{AccessMode, OpenFile, OpenFileTable, ReadOutcome},
    layout::VolumeLayout,
    volume::{BlockDevice, Volume},
};

const ROOT_PATH: &str = "/";

/// Geometry summary reported by `info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeInfo {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_data_clusters: u32,
    pub fat_entries: u32,
    pub image_size: u64,
    pub root_cluster: u32,
}

impl From<&VolumeLayout> for VolumeInfo {
    fn from(layout: &VolumeLayout) -> Self {
        Self {
            bytes_per_sector: layout.bytes_per_sector,
            sectors_per_cluster: layout.sectors_per_cluster,
            total_data_clusters: layout.total_data_clusters(),
            fat_entries: layout.fat_entry_count(),
            image_size: layout.image_size(),
            root_cluster: layout.root_cluster,
        }
    }
}

pub struct Session<D> {
    volume: Volume<D>,
    image_name: String,
    current_cluster: u32,
    current_path: String,
    open_files: OpenFileTable,
}

impl<D: BlockDevice> Session<D> {
    pub fn mount(dev: D, image_name: impl Into<String>) -> Result<Self> {
        let volume = Volume::mount(dev)?;
        let root = volume.layout().root_cluster;
        let image_name = image_name.into();
        info!("mounted {image_name}");
        Ok(Self {
            volume,
            image_name,
            current_cluster: root,
            current_path: ROOT_PATH.to_string(),
            open_files: OpenFileTable::new(),
        })
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn current_cluster(&self) -> u32 {
        self.current_cluster
    }

    pub fn volume(&mut self) -> &mut Volume<D> {
        &mut self.volume
    }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo::from(self.volume.layout())
    }

    fn root_cluster(&self) -> u32 {
        self.volume.layout().root_cluster
    }

    fn at_root(&self) -> bool {
        self.current_cluster == self.root_cluster()
    }

    /// `..` entries store 0 for the root; anything outside the data region
    /// is treated the same way.
    fn resolve_dir_ref(&self, cluster: u32) -> u32 {
        if self.volume.layout().is_data_cluster(cluster) {
            cluster
        } else {
            self.root_cluster()
        }
    }

    fn parent_cluster(&mut self) -> Result<u32> {
        if self.at_root() {
            return Ok(self.root_cluster());
        }
        let dotdot = self.volume.find_entry(self.current_cluster, "..")?;
        Ok(self.resolve_dir_ref(dotdot.entry.first_cluster))
    }

    fn find_here(&mut self, name: &str) -> Result<FoundEntry> {
        self.volume.find_entry(self.current_cluster, name)
    }

    /// Moves into `name`. Path and cluster change together or not at all.
    pub fn change_directory(&mut self, name: &str) -> Result<()> {
        let (cluster, path) = match name {
            "." => return Ok(()),
            ".." => {
                let parent = self.parent_cluster()?;
                let trimmed = self.current_path.trim_end_matches('/');
                let path = match trimmed.rfind('/') {
                    Some(cut) if parent != self.root_cluster() => trimmed[..=cut].to_string(),
                    _ => ROOT_PATH.to_string(),
                };
                (parent, path)
            }
            _ => {
                let found = self.find_here(name)?;
                if !found.entry.is_dir() {
                    return Err(FatError::NotDirectory(name.to_string()));
                }
                let cluster = self.resolve_dir_ref(found.entry.first_cluster);
                (cluster, format!("{}{}/", self.current_path, found.name()))
            }
        };
        debug!("cd {name}: cluster {} -> {cluster}, path {path}", self.current_cluster);
        self.current_cluster = cluster;
        self.current_path = path;
        Ok(())
    }

    pub fn list_directory(&mut self) -> Result<Vec<FatDirEntry>> {
        self.volume.list_dir(self.current_cluster)
    }

    pub fn create_file(&mut self, name: &str) -> Result<()> {
        self.volume
            .create_entry(self.current_cluster, name, EntryKind::File, 0, 0)?;
        Ok(())
    }

    pub fn create_directory(&mut self, name: &str) -> Result<()> {
        self.volume.create_directory(self.current_cluster, name)?;
        Ok(())
    }

    /// Opens a file of the current directory and returns its table index.
    pub fn open(&mut self, name: &str, mode: AccessMode) -> Result<usize> {
        let found = self.find_here(name)?;
        if found.entry.is_dir() {
            return Err(FatError::IsDirectory(name.to_string()));
        }
        if self.open_files.is_open(found.name().as_str(), &self.current_path)
            || self.open_files.holds_entry(found.location)
        {
            return Err(FatError::AlreadyOpen(name.to_string()));
        }
        let index = self.open_files.insert(OpenFile {
            index: 0,
            name: found.name(),
            path: self.current_path.clone(),
            mode,
            offset: 0,
            starting_cluster: found.entry.first_cluster,
            file_size: found.entry.size,
            entry_location: found.location,
        })?;
        debug!("open {name} ({}) in slot {index}", mode.label());
        Ok(index)
    }

    fn handle_index(&self, name: &str) -> Result<usize> {
        self.open_files
            .find(name, &self.current_path)
            .ok_or_else(|| FatError::NotOpen(name.to_string()))
    }

    fn handle(&self, name: &str) -> Result<OpenFile> {
        let index = self.handle_index(name)?;
        self.open_files
            .get(index)
            .cloned()
            .ok_or_else(|| FatError::NotOpen(name.to_string()))
    }

    fn handle_mut(&mut self, index: usize, name: &str) -> Result<&mut OpenFile> {
        self.open_files
            .get_mut(index)
            .ok_or_else(|| FatError::NotOpen(name.to_string()))
    }

    pub fn close(&mut self, name: &str) -> Result<()> {
        let index = self.handle_index(name)?;
        self.open_files.remove(index);
        debug!("closed {name} (slot {index})");
        Ok(())
    }

    pub fn list_open_files(&self) -> impl Iterator<Item = &OpenFile> {
        self.open_files.iter()
    }

    pub fn open_file(&self, name: &str) -> Option<&OpenFile> {
        self.handle_index(name)
            .ok()
            .and_then(|index| self.open_files.get(index))
    }

    /// Moves the handle's offset to any position in `[0, file_size]`.
    pub fn seek(&mut self, name: &str, offset: u64) -> Result<()> {
        let file = self.handle(name)?;
        if offset > file.file_size as u64 {
            return Err(FatError::OffsetOutOfRange {
                offset,
                size: file.file_size,
            });
        }
        self.handle_mut(file.index, name)?.offset = offset as u32;
        Ok(())
    }

    /// Reads at the handle's offset. Requests past the end are cut to what
    /// remains; at end of file the outcome is empty.
    pub fn read(&mut self, name: &str, len: u64) -> Result<ReadOutcome> {
        let file = self.handle(name)?;
        if !file.mode.can_read() {
            return Err(FatError::AccessDenied {
                name: name.to_string(),
                access: "reading",
            });
        }
        if len == 0 {
            return Err(FatError::EmptyLength);
        }

        let remaining = file.file_size.saturating_sub(file.offset) as u64;
        if remaining == 0 {
            return Ok(ReadOutcome::default());
        }
        let clamped = len > remaining;
        let want = len.min(remaining) as usize;
        let data = self
            .volume
            .read_chain(file.starting_cluster, file.offset as u64, want)?;

        self.handle_mut(file.index, name)?.offset = file.offset + data.len() as u32;
        Ok(ReadOutcome { data, clamped })
    }

    /// Size recorded in the directory entry of `name`.
    pub fn size(&mut self, name: &str) -> Result<u32> {
        Ok(self.find_here(name)?.entry.size)
    }

    /// Writes at the handle's offset, growing the file when the write runs
    /// past its end.
    pub fn write(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        let file = self.handle(name)?;
        if !file.mode.can_write() {
            return Err(FatError::AccessDenied {
                name: name.to_string(),
                access: "writing",
            });
        }
        if data.is_empty() {
            return Err(FatError::EmptyLength);
        }
        let end = file.offset as u64 + data.len() as u64;
        if end > u32::MAX as u64 {
            return Err(FatError::FileTooLarge);
        }
        let end = end as u32;

        let first = self
            .volume
            .write_chain(file.starting_cluster, file.offset as u64, data)?;
        let new_size = file.file_size.max(end);

        if first != file.starting_cluster || new_size != file.file_size {
            let mut entry = self.volume.read_entry_at(file.entry_location)?;
            entry.first_cluster = first;
            entry.size = new_size;
            self.volume.write_entry_at(file.entry_location, &entry)?;
        }

        let handle = self.handle_mut(file.index, name)?;
        handle.offset = end;
        handle.file_size = new_size;
        handle.starting_cluster = first;
        Ok(data.len())
    }

    fn refuse_dot_names(name: &str) -> Result<()> {
        if matches!(name, "." | "..") {
            return Err(FatError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn refuse_if_open(&self, found: &FoundEntry, name: &str) -> Result<()> {
        if self.open_files.holds_entry(found.location) {
            return Err(FatError::FileBusy(name.to_string()));
        }
        Ok(())
    }

    pub fn remove_file(&mut self, name: &str) -> Result<()> {
        let found = self.find_here(name)?;
        if found.entry.is_dir() {
            return Err(FatError::IsDirectory(name.to_string()));
        }
        self.refuse_if_open(&found, name)?;
        self.volume.remove_entry(&found)
    }

    pub fn remove_directory(&mut self, name: &str) -> Result<()> {
        Self::refuse_dot_names(name)?;
        let found = self.find_here(name)?;
        if !found.entry.is_dir() {
            return Err(FatError::NotDirectory(name.to_string()));
        }
        let cluster = self.resolve_dir_ref(found.entry.first_cluster);
        if cluster == self.root_cluster() || !self.volume.is_directory_empty(cluster)? {
            return Err(FatError::NotEmpty(name.to_string()));
        }
        self.volume.remove_entry(&found)
    }

    /// Moves `src` into the directory `dst` when `dst` names one here,
    /// otherwise renames `src` to `dst` in place.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        Self::refuse_dot_names(src)?;
        let found = self.find_here(src)?;
        self.refuse_if_open(&found, src)?;

        let target = match dst {
            "." => Some(self.current_cluster),
            ".." => Some(self.parent_cluster()?),
            _ => match self.volume.search(self.current_cluster, dst)?.found {
                Some(dir) if dir.entry.is_dir() => {
                    if dir.location == found.location {
                        return Err(FatError::MoveIntoSelf(src.to_string()));
                    }
                    Some(self.resolve_dir_ref(dir.entry.first_cluster))
                }
                Some(_) => return Err(FatError::AlreadyExists(dst.to_string())),
                None => None,
            },
        };

        match target {
            Some(cluster) if cluster == self.current_cluster => {
                Err(FatError::AlreadyExists(src.to_string()))
            }
            Some(cluster) => {
                self.volume.move_entry(&found, cluster)?;
                Ok(())
            }
            None => {
                self.volume.rename_entry(self.current_cluster, &found, dst)?;
                Ok(())
            }
        }
    }

    /// Flushes the image and hands the device back. Open handles are
    /// discarded.
    pub fn unmount(mut self) -> Result<D> {
        let dropped = self.open_files.len();
        self.open_files.clear();
        self.volume.flush()?;
        info!("unmounted {} ({dropped} handle(s) dropped)", self.image_name);
        Ok(self.volume.into_inner())
    }
}
