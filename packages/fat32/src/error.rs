use std::io;

use thiserror::Error;

/// Coarse classification callers use to decide how to report a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Io,
    NotFound,
    AlreadyExists,
    WrongKind,
    CapacityExhausted,
    InvalidRange,
    InvalidName,
    Corrupt,
}

#[derive(Debug, Error)]
pub enum FatError {
    #[error("I/O error on image: {0}")]
    Io(#[from] io::Error),
    #[error("FAT copy {copy} not updated for cluster {cluster}, FAT copies now differ: {source}")]
    MirrorWrite {
        cluster: u32,
        copy: u8,
        #[source]
        source: io::Error,
    },
    #[error("invalid FAT32 signature (0x{0:04X})")]
    InvalidSignature(u16),
    #[error("invalid boot sector: {0}")]
    InvalidBootSector(&'static str),
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("'{0}' already exists")]
    AlreadyExists(String),
    #[error("'{0}' is not a directory")]
    NotDirectory(String),
    #[error("'{0}' is a directory")]
    IsDirectory(String),
    #[error("directory '{0}' is not empty")]
    NotEmpty(String),
    #[error("cannot move '{0}' into itself")]
    MoveIntoSelf(String),
    #[error("no free directory entry available")]
    DirFull,
    #[error("no free clusters available")]
    NoFreeCluster,
    #[error("maximum number of open files reached ({0})")]
    OpenFileTableFull(usize),
    #[error("'{0}' is already open")]
    AlreadyOpen(String),
    #[error("'{0}' is not open")]
    NotOpen(String),
    #[error("'{0}' is open, close it first")]
    FileBusy(String),
    #[error("'{name}' is not open for {access}")]
    AccessDenied { name: String, access: &'static str },
    #[error("offset {offset} is outside the file size boundaries (0 to {size})")]
    OffsetOutOfRange { offset: u64, size: u32 },
    #[error("length must be positive")]
    EmptyLength,
    #[error("file would grow past 4 GiB")]
    FileTooLarge,
    #[error("'{0}' is not a valid 8.3 name")]
    InvalidName(String),
    #[error("bad cluster {0}")]
    BadCluster(u32),
    #[error("cluster chain ends before byte offset {0}")]
    ChainTooShort(u64),
    #[error("cluster chain is longer than the volume")]
    ClusterChainTooLong,
}

impl FatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::MirrorWrite { .. } => ErrorKind::Io,
            Self::InvalidSignature(_) | Self::InvalidBootSector(_) => ErrorKind::Format,
            Self::NotFound(_) | Self::NotOpen(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) | Self::AlreadyOpen(_) => ErrorKind::AlreadyExists,
            Self::NotDirectory(_)
            | Self::IsDirectory(_)
            | Self::NotEmpty(_)
            | Self::MoveIntoSelf(_)
            | Self::FileBusy(_)
            | Self::AccessDenied { .. } => ErrorKind::WrongKind,
            Self::DirFull | Self::NoFreeCluster | Self::OpenFileTableFull(_) | Self::FileTooLarge => {
                ErrorKind::CapacityExhausted
            }
            Self::OffsetOutOfRange { .. } | Self::EmptyLength => ErrorKind::InvalidRange,
            Self::InvalidName(_) => ErrorKind::InvalidName,
            Self::BadCluster(_) | Self::ChainTooShort(_) | Self::ClusterChainTooLong => {
                ErrorKind::Corrupt
            }
        }
    }
}

pub type Result<T> = core::result::Result<T, FatError>;
