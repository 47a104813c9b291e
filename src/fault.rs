//! Demand-paging fault handling.
//!
//! A fault runs in three steps. Claiming a frame happens under the paging lock: take a
//! free frame if there is one, otherwise evict a random resident page, otherwise wait.
//! Loading the page contents happens outside the lock, with the frame marked loading so
//! no other fault can pick it as a victim. The fixup takes the lock again to map the page
//! and make the frame resident.

use log::{debug, warn};
use paging::Owner;

use crate::{
    address_space::SpaceShared,
    error::FaultError,
    kernel::{FrameTable, Kernel},
};


impl Kernel {
    pub(crate) fn handle_page_fault(&self, space: &SpaceShared, vpn: usize) -> Result<(), FaultError> {
        self.check_unmapped(space, vpn)?;
        debug!("Page fault on page {} of {}", vpn, space.name);

        let owner = Owner { space: space.id, vpn };
        let frame = self.claim_frame(owner)?;
        if let Err(err) = self.load_page(space, vpn, frame) {
            warn!("Loading page {} of {} failed: {}", vpn, space.name, err);
            self.abandon_frame(frame);
            return Err(err);
        }
        self.finish_fault(space, vpn, frame)?;

        self.stats().record_page_fault();
        Ok(())
    }

    fn check_unmapped(&self, space: &SpaceShared, vpn: usize) -> Result<(), FaultError> {
        let table = space.page_table.lock().unwrap();
        match table.get_entry(vpn) {
            None => Err(FaultError::AddressOutOfRange { vpn }),
            Some(entry) if entry.is_valid() => Err(FaultError::AlreadyMapped { vpn }),
            Some(_) => Ok(()),
        }
    }

    /// Finds a frame for `owner` and leaves it bound in the loading state.
    fn claim_frame(&self, owner: Owner) -> Result<usize, FaultError> {
        let mut paging = self.lock_paging();
        let frame = loop {
            if let Some(frame) = paging.allocator.find_free() {
                break frame;
            }
            let victim = {
                let FrameTable { allocator, policy } = &mut *paging;
                policy.select_victim(allocator)
            };
            match victim {
                Some(victim) => {
                    self.evict(&mut paging.allocator, victim)?;
                    paging.allocator.reserve(victim);
                    break victim;
                }
                None => {
                    debug!("Every frame is loading, waiting");
                    paging = self.wait_for_frame(paging);
                }
            }
        };
        paging.allocator.bind(frame, owner);
        Ok(frame)
    }

    /// Copies the page from the backing store into `frame`. A short read leaves the tail zeroed.
    fn load_page(&self, space: &SpaceShared, vpn: usize, frame: usize) -> Result<(), FaultError> {
        let page_size = self.page_size();
        self.memory().zero_frame(frame)?;
        let mut page = vec![0; page_size];
        let read = space.store.read_at(&mut page, vpn * page_size)?;
        self.memory().write_frame(frame, &page[..read.min(page_size)])?;
        self.stats().record_disk_read();
        debug!("Loaded page {} of {} into frame {} ({} bytes)", vpn, space.name, frame, read);
        Ok(())
    }

    fn finish_fault(&self, space: &SpaceShared, vpn: usize, frame: usize) -> Result<(), FaultError> {
        let mut paging = self.lock_paging();
        let mut table = space.page_table.lock().unwrap();
        let mapped = table.get_entry(vpn).map_or(false, |entry| entry.is_valid());
        if mapped {
            drop(table);
            paging.allocator.release(frame);
            drop(paging);
            self.notify_frame_available();
            return Err(FaultError::AlreadyMapped { vpn });
        }
        table.map_to_frame(vpn, frame);
        paging.allocator.mark_resident(frame);
        drop(table);
        drop(paging);
        self.notify_frame_available();
        Ok(())
    }

    fn abandon_frame(&self, frame: usize) {
        self.lock_paging().allocator.release(frame);
        self.notify_frame_available();
    }
}
