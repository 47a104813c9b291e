use std::{fmt, io};

use disk::DiskError;
use memory::MemoryError;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidPageSize(usize),
    NoFrames,
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPageSize(size) => {
                write!(f, "page size {} is not a non-zero multiple of 4", size)
            }
            ConfigError::NoFrames => write!(f, "physical memory needs at least one frame"),
            ConfigError::InvalidValue { key, value } => write!(f, "{}={:?} is not valid", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Reasons an address space cannot be set up. It never starts running after one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    InvalidSize,
    SegmentOutOfRange,
    EntryOutOfRange,
    Open(io::ErrorKind),
    Disk(DiskError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::InvalidSize => write!(f, "program declares an invalid memory size"),
            LoadError::SegmentOutOfRange => write!(f, "segment lies outside the address space"),
            LoadError::EntryOutOfRange => write!(f, "entry point lies outside the address space"),
            LoadError::Open(kind) => write!(f, "unable to open program image: {}", kind),
            LoadError::Disk(err) => write!(f, "unable to stage backing store: {}", err),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<DiskError> for LoadError {
    fn from(err: DiskError) -> Self {
        LoadError::Disk(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FaultError {
    /// The page number is past the end of the page table.
    AddressOutOfRange { vpn: usize },
    /// The page is already valid, so this is not a demand-paging fault.
    AlreadyMapped { vpn: usize },
    /// Explicit eviction of a frame that holds no evictable page.
    NotResident { frame: usize },
    Disk(DiskError),
    Memory(MemoryError),
}

impl FaultError {
    /// Faults the kernel cannot recover from: paging state is inconsistent.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, FaultError::AlreadyMapped { .. })
    }
}

impl fmt::Display for FaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultError::AddressOutOfRange { vpn } => write!(f, "page {} is outside the address space", vpn),
            FaultError::AlreadyMapped { vpn } => write!(f, "page fault on valid page {}", vpn),
            FaultError::NotResident { frame } => write!(f, "frame {} holds no resident page", frame),
            FaultError::Disk(err) => write!(f, "paging i/o failed: {}", err),
            FaultError::Memory(err) => write!(f, "physical memory access failed: {}", err),
        }
    }
}

impl std::error::Error for FaultError {}

impl From<DiskError> for FaultError {
    fn from(err: DiskError) -> Self {
        FaultError::Disk(err)
    }
}

impl From<MemoryError> for FaultError {
    fn from(err: MemoryError) -> Self {
        FaultError::Memory(err)
    }
}
