mod frame_allocator;
mod page_table;
mod policy;

pub use frame_allocator::{FrameAllocator, FrameState, Owner, SpaceId};
pub use page_table::{PageTable, PageTableEntry, ValidEntries};
pub use policy::{RandomPolicy, ReplacementPolicy};
