//! Per-process virtual address spaces.

use std::sync::{Arc, Mutex};

use disk::{BackingStore, Disk, DiskError};
use log::{info, warn};
use paging::{PageTable, PageTableEntry, SpaceId};

use crate::{
    config::{STACK_MARGIN, SWAP_SUFFIX},
    error::{FaultError, LoadError},
    image::{check_space_size, ProgramImage},
    kernel::Kernel,
    machine::{Registers, STACK_REG},
};

/// The part of an address space the kernel reaches through the inverted table.
pub(crate) struct SpaceShared {
    pub(crate) id: SpaceId,
    pub(crate) name: String,
    pub(crate) page_table: Mutex<PageTable>,
    pub(crate) store: Box<dyn BackingStore>,
}

pub struct AddressSpace {
    pub(crate) kernel: Arc<Kernel>,
    pub(crate) shared: Arc<SpaceShared>,
    num_pages: usize,
    entry_point: usize,
    /// Swap file created by `load`, deleted on teardown.
    swap: Option<Disk>,
    torn_down: bool,
}

impl AddressSpace {
    /// Sizes the address space for `image`, creates its backing store `<name>_vm` and
    /// stages the code and data segments into it. No frame is bound yet.
    pub fn load(kernel: &Arc<Kernel>, name: &str, image: &ProgramImage) -> Result<Self, LoadError> {
        let page_size = kernel.page_size();
        let num_pages = image.num_pages(page_size)?;
        let size = num_pages * page_size;
        info!("Initializing address space {}: {} pages, {} bytes", name, num_pages, size);

        let swap_name = format!("{}{}", name, SWAP_SUFFIX);
        let disk = Disk::create(&kernel.config().swap_dir, &swap_name, page_size, size)?;
        if let Err(err) = stage(&disk, image) {
            if let Err(cleanup) = disk.remove() {
                warn!("Removing backing store of {}: {}", name, cleanup);
            }
            return Err(err.into());
        }

        let mut space = Self::build(kernel, name, num_pages, Box::new(disk.clone()));
        space.entry_point = image.entry_point;
        space.swap = Some(disk);
        Ok(space)
    }

    /// Address space of `num_pages` pages over an already populated store.
    /// The store is dropped, not deleted, on teardown.
    pub fn with_store<S: BackingStore + 'static>(
        kernel: &Arc<Kernel>,
        name: &str,
        num_pages: usize,
        store: S,
    ) -> Result<Self, LoadError> {
        match num_pages.checked_mul(kernel.page_size()) {
            Some(size) if size <= store.capacity() => check_space_size(size)?,
            _ => return Err(LoadError::InvalidSize),
        }
        Ok(Self::build(kernel, name, num_pages, Box::new(store)))
    }

    fn build(kernel: &Arc<Kernel>, name: &str, num_pages: usize, store: Box<dyn BackingStore>) -> Self {
        let shared = Arc::new(SpaceShared {
            id: kernel.allocate_space_id(),
            name: name.to_string(),
            page_table: Mutex::new(PageTable::init(num_pages)),
            store,
        });
        kernel.register(shared.clone());
        Self {
            kernel: kernel.clone(),
            shared,
            num_pages,
            entry_point: 0,
            swap: None,
            torn_down: false,
        }
    }

    pub fn id(&self) -> SpaceId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn size(&self) -> usize {
        self.num_pages * self.kernel.page_size()
    }

    pub fn entry_point(&self) -> usize {
        self.entry_point
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub fn backing_store(&self) -> &dyn BackingStore {
        self.shared.store.as_ref()
    }

    /// Register state for the first instruction: everything zero except the program
    /// counter and a stack pointer just below the top of the address space.
    pub fn init_registers(&self) -> Registers {
        let mut registers = Registers::default();
        registers.pc = self.entry_point as u32;
        registers.next_pc = (self.entry_point as u32).wrapping_add(4);
        registers.gpr[STACK_REG] = (self.size() - STACK_MARGIN) as u32;
        info!("Initializing stack pointer: {}", registers.gpr[STACK_REG]);
        registers
    }

    /// Resolves a demand-paging fault on `vpn`; the faulting access can be retried on success.
    pub fn page_fault(&self, vpn: usize) -> Result<(), FaultError> {
        self.kernel.handle_page_fault(&self.shared, vpn)
    }

    pub fn entry(&self, vpn: usize) -> Option<PageTableEntry> {
        self.shared.page_table.lock().unwrap().get_entry(vpn).copied()
    }

    /// Snapshot of the entries currently holding a frame.
    pub fn valid_entries(&self) -> Vec<PageTableEntry> {
        let table = self.shared.page_table.lock().unwrap();
        table.valid_entries().copied().collect()
    }

    /// Write-protects a page. Mapping the page in again clears the flag.
    pub fn set_read_only(&self, vpn: usize, read_only: bool) -> Result<(), FaultError> {
        let mut table = self.shared.page_table.lock().unwrap();
        let entry = table
            .get_entry_mut(vpn)
            .ok_or(FaultError::AddressOutOfRange { vpn })?;
        entry.set_read_only(read_only);
        Ok(())
    }

    /// Releases the frames, unregisters from the kernel and removes the swap file.
    pub fn destroy(mut self) -> Result<(), DiskError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), DiskError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        let freed = self.kernel.release_space(&self.shared);
        info!("Destroyed address space {} ({} frames freed)", self.shared.name, freed);
        match self.swap.take() {
            Some(disk) => disk.remove(),
            None => Ok(()),
        }
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            warn!("Tearing down {}: {}", self.shared.name, err);
        }
    }
}

fn stage(disk: &Disk, image: &ProgramImage) -> Result<(), DiskError> {
    if !image.code.is_empty() {
        disk.write_at(&image.code.data, image.code.virtual_addr)?;
    }
    if !image.init_data.is_empty() {
        disk.write_at(&image.init_data.data, image.init_data.virtual_addr)?;
    }
    Ok(())
}
