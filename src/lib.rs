//! Demand paging for a teaching kernel: per-process page tables backed by a swap file,
//! a shared pool of physical frames with an inverted owner table, random victim
//! selection and a page fault handler that ties them together.

pub mod address_space;
pub mod config;
pub mod error;
mod eviction;
mod fault;
pub mod image;
pub mod kernel;
pub mod machine;
pub mod stats;

pub use address_space::AddressSpace;
pub use config::VmConfig;
pub use error::{ConfigError, FaultError, LoadError};
pub use image::{ProgramImage, Segment};
pub use kernel::Kernel;
pub use machine::{ExceptionType, MachineError, Registers};
pub use stats::{Statistics, StatsSnapshot};

pub use disk::{BackingStore, Disk, DiskError};
pub use memory::{MemoryError, PhysicalMemory};
pub use paging::{
    FrameAllocator, FrameState, Owner, PageTable, PageTableEntry, RandomPolicy, ReplacementPolicy,
    SpaceId,
};
