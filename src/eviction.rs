use disk::DiskError;
use log::{debug, info};
use paging::{FrameAllocator, FrameState, Owner};

use crate::{error::FaultError, kernel::Kernel};

impl Kernel {
    /// Takes `frame` away from the page it holds. A dirty page is written back to its
    /// owner's backing store first; a clean one is simply dropped. The frame is free on
    /// return.
    ///
    /// Caller holds the paging lock. Panics if the frame is not resident or the owner's
    /// page table disagrees with the inverted table.
    pub(crate) fn evict(&self, allocator: &mut FrameAllocator, frame: usize) -> Result<Owner, FaultError> {
        let owner = match allocator.state(frame) {
            Some(FrameState::Resident(owner)) => owner,
            state => panic!("Evicting frame {} in state {:?}", frame, state),
        };
        let space = self
            .lookup(owner.space)
            .unwrap_or_else(|| panic!("Frame {} owned by unknown space {}", frame, owner.space));

        let mut table = space.page_table.lock().unwrap();
        let entry = match table.get_entry(owner.vpn) {
            Some(entry) if entry.is_mapped_to(frame) => *entry,
            entry => panic!(
                "Inverted table says frame {} holds page {} of {}, page table has {:?}",
                frame, owner.vpn, space.name, entry
            ),
        };

        if entry.is_dirty() {
            let page_size = self.page_size();
            let page = self.memory().read_frame(frame)?;
            let written = space.store.write_at(&page, owner.vpn * page_size)?;
            if written != page_size {
                return Err(DiskError::ShortTransfer.into());
            }
            self.stats().record_disk_write();
            debug!("Wrote back page {} of {} from frame {}", owner.vpn, space.name, frame);
        }

        table.unmap_page(owner.vpn);
        drop(table);
        allocator.release(frame);
        self.stats().record_eviction();
        info!("Evicted page {} of {} from frame {}", owner.vpn, space.name, frame);
        Ok(owner)
    }
}
