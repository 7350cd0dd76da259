mod entry;
mod mutate;
mod names;
mod scan;

pub use entry::{
    DirEntry, DirSlot, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_HIDDEN, ATTR_LONG_NAME, ATTR_READ_ONLY,
    ATTR_SYSTEM, ATTR_VOLUME_ID, DIR_ENTRY_SIZE, SLOT_DELETED, SLOT_END,
};
pub use mutate::EntryKind;
pub use names::{encode_short_name, format_name, ShortName, DOT_NAME, DOTDOT_NAME};
pub use scan::{DirLookup, FatDirEntry, FoundEntry};
