//! FAT32 volume engine operating on a raw disk image.
//!
//! Every access to the volume goes through sector and cluster arithmetic on
//! the image handle; nothing is delegated to a host filesystem.

pub mod dir;
pub mod error;
pub mod fat;
pub mod file;
pub mod format;
pub mod layout;
pub mod session;
pub mod volume;

pub use dir::{format_name, DirEntry, DirLookup, DirSlot, EntryKind, FatDirEntry, FoundEntry, ShortName};
pub use error::{ErrorKind, FatError, Result};
pub use fat::ClusterLink;
pub use file::{AccessMode, OpenFile, OpenFileTable, ReadOutcome, MAX_OPEN_FILES};
pub use format::{format_volume, FormatOptions};
pub use layout::{BootSector, VolumeLayout};
pub use session::{Session, VolumeInfo};
pub use volume::{BlockDevice, Volume};
