//! Process-wide paging state shared by every address space.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Condvar, Mutex, MutexGuard, RwLock,
    },
};

use log::{debug, info};
use memory::PhysicalMemory;
use paging::{FrameAllocator, FrameState, Owner, RandomPolicy, ReplacementPolicy, SpaceId};

use crate::{
    address_space::SpaceShared,
    config::VmConfig,
    error::{ConfigError, FaultError},
    stats::Statistics,
};

/// Everything guarded by the paging lock: frame status, the inverted table and the
/// replacement policy's state.
pub(crate) struct FrameTable {
    pub(crate) allocator: FrameAllocator,
    pub(crate) policy: Box<dyn ReplacementPolicy>,
}

pub struct Kernel {
    config: VmConfig,
    memory: PhysicalMemory,
    /// The single coarse lock serialising frame search, victim selection, eviction
    /// writeback and binding.
    paging: Mutex<FrameTable>,
    /// Signalled whenever a frame finishes loading or is released.
    frame_available: Condvar,
    spaces: RwLock<HashMap<SpaceId, Arc<SpaceShared>>>,
    next_space_id: AtomicU32,
    stats: Statistics,
}

impl Kernel {
    /// Builds a kernel using random victim selection, seeded from `config.seed` if set.
    pub fn new(config: VmConfig) -> Result<Arc<Self>, ConfigError> {
        let policy = match config.seed {
            Some(seed) => RandomPolicy::seeded(seed),
            None => RandomPolicy::new(),
        };
        Self::with_policy(config, Box::new(policy))
    }

    pub fn with_policy(
        config: VmConfig,
        policy: Box<dyn ReplacementPolicy>,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        info!(
            "Physical memory: {} frames of {} bytes",
            config.num_phys_pages, config.page_size
        );
        Ok(Arc::new(Self {
            memory: PhysicalMemory::new(config.num_phys_pages, config.page_size),
            paging: Mutex::new(FrameTable {
                allocator: FrameAllocator::init(config.num_phys_pages),
                policy,
            }),
            frame_available: Condvar::new(),
            spaces: RwLock::new(HashMap::new()),
            next_space_id: AtomicU32::new(1),
            stats: Statistics::default(),
            config,
        }))
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn num_page_faults(&self) -> u64 {
        self.stats.num_page_faults()
    }

    pub fn frame_state(&self, frame: usize) -> Option<FrameState> {
        self.lock_paging().allocator.state(frame)
    }

    /// The inverted table: owner of every frame, `None` for frames holding no page.
    pub fn frame_owners(&self) -> Vec<Option<Owner>> {
        let paging = self.lock_paging();
        (0..paging.allocator.len())
            .map(|frame| paging.allocator.owner(frame))
            .collect()
    }

    pub fn used_frames(&self) -> usize {
        self.lock_paging().allocator.used_count()
    }

    pub fn num_address_spaces(&self) -> usize {
        self.spaces.read().unwrap().len()
    }

    /// Evicts whatever page `frame` holds and leaves the frame free.
    pub fn evict_frame(&self, frame: usize) -> Result<Owner, FaultError> {
        let mut paging = self.lock_paging();
        match paging.allocator.state(frame) {
            Some(FrameState::Resident(_)) => {}
            _ => return Err(FaultError::NotResident { frame }),
        }
        let owner = self.evict(&mut paging.allocator, frame)?;
        drop(paging);
        self.frame_available.notify_all();
        Ok(owner)
    }

    pub(crate) fn lock_paging(&self) -> MutexGuard<'_, FrameTable> {
        self.paging.lock().unwrap()
    }

    pub(crate) fn wait_for_frame<'a>(
        &self,
        guard: MutexGuard<'a, FrameTable>,
    ) -> MutexGuard<'a, FrameTable> {
        self.frame_available.wait(guard).unwrap()
    }

    pub(crate) fn notify_frame_available(&self) {
        self.frame_available.notify_all();
    }

    pub(crate) fn allocate_space_id(&self) -> SpaceId {
        self.next_space_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register(&self, space: Arc<SpaceShared>) {
        self.spaces.write().unwrap().insert(space.id, space);
    }

    pub(crate) fn lookup(&self, id: SpaceId) -> Option<Arc<SpaceShared>> {
        self.spaces.read().unwrap().get(&id).cloned()
    }

    /// Frees every frame owned by `space` and forgets it. Returns how many frames were freed.
    pub(crate) fn release_space(&self, space: &SpaceShared) -> usize {
        let mut paging = self.lock_paging();
        let frames = paging.allocator.frames_owned_by(space.id);
        {
            let mut table = space.page_table.lock().unwrap();
            for &frame in &frames {
                if let Some(owner) = paging.allocator.release(frame) {
                    table.unmap_page(owner.vpn);
                }
            }
        }
        self.spaces.write().unwrap().remove(&space.id);
        drop(paging);
        self.frame_available.notify_all();
        debug!("Released {} frames of {}", frames.len(), space.name);
        frames.len()
    }
}
