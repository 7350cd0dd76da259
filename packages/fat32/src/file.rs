//! Open-file bookkeeping and cluster-chain aware byte I/O.

use log::{debug, warn};

use crate::{
    dir::ShortName,
    error::{FatError, Result},
    volume::{BlockDevice, Volume},
};

pub const MAX_OPEN_FILES: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
    WriteRead,
}

impl AccessMode {
    /// Parses the shell flag form: `-r`, `-w`, `-rw`, `-wr`.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-r" => Some(Self::Read),
            "-w" => Some(Self::Write),
            "-rw" => Some(Self::ReadWrite),
            "-wr" => Some(Self::WriteRead),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::ReadWrite => "rw",
            Self::WriteRead => "wr",
        }
    }

    pub fn can_read(self) -> bool {
        !matches!(self, Self::Write)
    }

    pub fn can_write(self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// One active handle. `file_size` and `starting_cluster` are captured at
/// open time and only change through writes made via this handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenFile {
    pub index: usize,
    pub name: ShortName,
    pub path: String,
    pub mode: AccessMode,
    pub offset: u32,
    pub starting_cluster: u32,
    pub file_size: u32,
    /// Image offset of the directory slot backing this handle.
    pub entry_location: u64,
}

/// Fixed-capacity handle table; the lowest free slot is handed out first.
#[derive(Debug)]
pub struct OpenFileTable {
    slots: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `file` in the first free slot and returns the slot index.
    pub fn insert(&mut self, mut file: OpenFile) -> Result<usize> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FatError::OpenFileTableFull(MAX_OPEN_FILES))?;
        file.index = index;
        self.slots[index] = Some(file);
        Ok(index)
    }

    pub fn is_open(&self, name: &str, path: &str) -> bool {
        self.iter().any(|file| file.name.as_str() == name && file.path == path)
    }

    /// True when some handle is backed by the directory slot at `location`.
    pub fn holds_entry(&self, location: u64) -> bool {
        self.iter().any(|file| file.entry_location == location)
    }

    /// Slot of the handle called `name`, preferring one opened from `path`.
    pub fn find(&self, name: &str, path: &str) -> Option<usize> {
        let mut by_name = None;
        for file in self.iter().filter(|file| file.name.as_str() == name) {
            if file.path == path {
                return Some(file.index);
            }
            by_name.get_or_insert(file.index);
        }
        by_name
    }

    pub fn get(&self, index: usize) -> Option<&OpenFile> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut OpenFile> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, index: usize) -> Option<OpenFile> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenFile> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}

/// Bytes delivered by a read. `clamped` is set when the request ran past the
/// end of the file and was cut to what remained.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub data: Vec<u8>,
    pub clamped: bool,
}

impl ReadOutcome {
    pub fn at_eof(&self) -> bool {
        self.data.is_empty()
    }
}

impl<D: BlockDevice> Volume<D> {
    /// Reads up to `len` bytes of the chain at `start_cluster`, beginning
    /// `offset` bytes in.
    ///
    /// A premature end-of-chain or a failing image read after some bytes
    /// were delivered ends the read early instead of failing it.
    pub fn read_chain(&mut self, start_cluster: u32, offset: u64, len: usize) -> Result<Vec<u8>> {
        let cluster_size = self.layout().cluster_size() as u64;
        let mut cluster = self
            .find_cluster_from_offset(start_cluster, offset)?
            .ok_or(FatError::ChainTooShort(offset))?;

        let mut out = Vec::with_capacity(len);
        let mut position = offset;
        while out.len() < len {
            let in_cluster = position % cluster_size;
            let span = (cluster_size - in_cluster).min((len - out.len()) as u64) as usize;
            let at = self.layout().cluster_byte_offset(cluster) + in_cluster;

            let filled = out.len();
            out.resize(filled + span, 0);
            if let Err(err) = self.read_exact_at(at, &mut out[filled..]) {
                out.truncate(filled);
                if filled == 0 {
                    return Err(err.into());
                }
                warn!("short read at cluster {cluster}: {err}");
                break;
            }
            position += span as u64;

            if out.len() == len {
                break;
            }
            match self.next_cluster(cluster) {
                Ok(Some(next)) => cluster = next,
                Ok(None) => {
                    warn!("chain from {start_cluster} ended after {} of {len} bytes", out.len());
                    break;
                }
                Err(err) => {
                    warn!("short read, chain from {start_cluster} broken: {err}");
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Writes `data` into the chain at `start_cluster` (0 when the file has
    /// no clusters yet) at byte `offset`, growing the chain with fresh
    /// clusters as needed. Returns the chain's first cluster.
    ///
    /// `offset` must not lie past the end of the bytes the chain holds.
    pub fn write_chain(&mut self, start_cluster: u32, offset: u64, data: &[u8]) -> Result<u32> {
        let first = if start_cluster == 0 {
            self.claim_cluster(None)?
        } else {
            start_cluster
        };
        let cluster_size = self.layout().cluster_size() as u64;

        let mut cluster = first;
        for _ in 0..offset / cluster_size {
            cluster = self.next_or_extend(cluster)?;
        }

        let mut written = 0usize;
        let mut position = offset;
        while written < data.len() {
            let in_cluster = position % cluster_size;
            let span = (cluster_size - in_cluster).min((data.len() - written) as u64) as usize;
            let at = self.layout().cluster_byte_offset(cluster) + in_cluster;
            self.write_all_at(at, &data[written..written + span])?;
            written += span;
            position += span as u64;

            if written < data.len() {
                cluster = self.next_or_extend(cluster)?;
            }
        }
        debug!("wrote {written} bytes at {offset} into chain {first}");
        Ok(first)
    }

    fn next_or_extend(&mut self, cluster: u32) -> Result<u32> {
        match self.next_cluster(cluster)? {
            Some(next) => Ok(next),
            None => self.claim_cluster(Some(cluster)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{faulty_test_volume, test_volume};

    fn handle(name: &str, path: &str, location: u64) -> OpenFile {
        OpenFile {
            index: 0,
            name: ShortName::try_from(name).unwrap(),
            path: path.to_string(),
            mode: AccessMode::Read,
            offset: 0,
            starting_cluster: 0,
            file_size: 0,
            entry_location: location,
        }
    }

    #[test]
    fn flags_map_to_modes() {
        assert_eq!(AccessMode::from_flag("-r"), Some(AccessMode::Read));
        assert_eq!(AccessMode::from_flag("-wr"), Some(AccessMode::WriteRead));
        assert_eq!(AccessMode::from_flag("r"), None);
        assert!(!AccessMode::Write.can_read());
        assert!(!AccessMode::Read.can_write());
        assert!(AccessMode::ReadWrite.can_read() && AccessMode::WriteRead.can_write());
        assert_eq!(AccessMode::WriteRead.label(), "wr");
    }

    #[test]
    fn table_hands_out_lowest_free_slot() {
        let mut table = OpenFileTable::new();
        assert_eq!(table.insert(handle("A", "/", 1)).unwrap(), 0);
        assert_eq!(table.insert(handle("B", "/", 2)).unwrap(), 1);
        table.remove(0);
        assert_eq!(table.insert(handle("C", "/", 3)).unwrap(), 0);
        assert_eq!(table.get(0).map(|f| f.name.as_str()), Some("C"));
        assert!(table.holds_entry(2));
        assert!(!table.holds_entry(1));
    }

    #[test]
    fn full_table_refuses_without_side_effects() {
        let mut table = OpenFileTable::new();
        for n in 0..MAX_OPEN_FILES {
            table.insert(handle("A", &format!("/{n}/"), n as u64)).unwrap();
        }
        assert!(matches!(
            table.insert(handle("B", "/", 99)),
            Err(FatError::OpenFileTableFull(MAX_OPEN_FILES))
        ));
        assert_eq!(table.len(), MAX_OPEN_FILES);
    }

    #[test]
    fn lookup_prefers_current_path() {
        let mut table = OpenFileTable::new();
        table.insert(handle("A", "/x/", 1)).unwrap();
        table.insert(handle("A", "/", 2)).unwrap();
        assert_eq!(table.find("A", "/"), Some(1));
        assert_eq!(table.find("A", "/y/"), Some(0));
        assert_eq!(table.find("B", "/"), None);
        assert!(table.is_open("A", "/x/"));
        assert!(!table.is_open("A", "/y/"));
    }

    #[test]
    fn chain_write_spans_clusters_and_reads_back() {
        let mut volume = test_volume();
        let cluster_size = volume.layout().cluster_size() as usize;
        let data: Vec<u8> = (0..cluster_size * 2 + 100).map(|i| (i % 251) as u8).collect();

        let first = volume.write_chain(0, 0, &data).unwrap();
        assert_eq!(volume.chain_length(first).unwrap(), 3);

        let whole = volume.read_chain(first, 0, data.len()).unwrap();
        assert_eq!(whole, data);

        let split = cluster_size - 7;
        let mut halves = volume.read_chain(first, 0, split).unwrap();
        halves.extend(volume.read_chain(first, split as u64, data.len() - split).unwrap());
        assert_eq!(halves, data);
    }

    #[test]
    fn writing_at_cluster_boundary_extends_chain() {
        let mut volume = test_volume();
        let cluster_size = volume.layout().cluster_size() as usize;
        let first = volume.write_chain(0, 0, &vec![b'a'; cluster_size]).unwrap();
        assert_eq!(volume.chain_length(first).unwrap(), 1);

        let again = volume.write_chain(first, cluster_size as u64, b"tail").unwrap();
        assert_eq!(again, first);
        assert_eq!(volume.chain_length(first).unwrap(), 2);
        assert_eq!(
            volume.read_chain(first, cluster_size as u64 - 1, 5).unwrap(),
            b"atail"
        );
    }

    #[test]
    fn premature_end_of_chain_gives_short_read() {
        let mut volume = test_volume();
        let cluster_size = volume.layout().cluster_size() as usize;
        let first = volume.write_chain(0, 0, &vec![7u8; cluster_size]).unwrap();
        let data = volume.read_chain(first, 0, cluster_size * 3).unwrap();
        assert_eq!(data.len(), cluster_size);
    }

    #[test]
    fn offset_past_chain_is_reported() {
        let mut volume = test_volume();
        let cluster_size = volume.layout().cluster_size() as u64;
        let first = volume.write_chain(0, 0, b"x").unwrap();
        assert!(matches!(
            volume.read_chain(first, cluster_size * 4, 1),
            Err(FatError::ChainTooShort(_))
        ));
    }

    #[test]
    fn failing_image_read_mid_chain_gives_short_read() {
        let mut volume = faulty_test_volume();
        let cluster_size = volume.layout().cluster_size() as usize;
        let data: Vec<u8> = (0..cluster_size * 3).map(|i| (i % 199) as u8).collect();
        let first = volume.write_chain(0, 0, &data).unwrap();
        let second = volume.next_cluster(first).unwrap().unwrap();

        let bad = volume.layout().cluster_byte_offset(second);
        volume.device_mut().fail_reads = Some(bad..bad + cluster_size as u64);

        let got = volume.read_chain(first, 0, data.len()).unwrap();
        assert_eq!(got, &data[..cluster_size]);
    }

    #[test]
    fn failing_first_read_is_an_error() {
        let mut volume = faulty_test_volume();
        let first = volume.write_chain(0, 0, b"payload").unwrap();
        let at = volume.layout().cluster_byte_offset(first);
        volume.device_mut().fail_reads = Some(at..at + 1);

        let err = volume.read_chain(first, 0, 7).unwrap_err();
        assert!(matches!(err, FatError::Io(_)));
    }
}
