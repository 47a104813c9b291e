use log::debug;

/// Stable identifier of an address space, handed out by the kernel.
pub type SpaceId = u32;

/// The (address space, virtual page) pair currently held in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    pub space: SpaceId,
    pub vpn: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Free,
    /// Claimed by a fault, owner not recorded yet.
    Reserved,
    /// Owner recorded, page content still being read in.
    Loading(Owner),
    Resident(Owner),
}

impl FrameState {
    pub fn owner(&self) -> Option<Owner> {
        match *self {
            FrameState::Loading(owner) | FrameState::Resident(owner) => Some(owner),
            FrameState::Free | FrameState::Reserved => None,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, FrameState::Free)
    }
}

/// Status of every physical frame plus the inverted table (frame -> owner).
///
/// Not synchronised itself; the kernel keeps it behind the paging lock.
#[derive(Debug)]
pub struct FrameAllocator {
    frames: Vec<FrameState>,
}

impl FrameAllocator {
    pub fn init(num_frames: usize) -> Self {
        Self {
            frames: vec![FrameState::Free; num_frames],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Claims the lowest numbered free frame.
    pub fn find_free(&mut self) -> Option<usize> {
        let frame = self.frames.iter().position(FrameState::is_free);
        match frame {
            Some(frame) => self.frames[frame] = FrameState::Reserved,
            None => debug!("No free frames"),
        }
        frame
    }

    /// Claims a specific frame, normally one that eviction just freed.
    ///
    /// # Panics
    /// Panics if the frame is not free.
    pub fn reserve(&mut self, frame: usize) {
        match self.frames[frame] {
            FrameState::Free => self.frames[frame] = FrameState::Reserved,
            state => panic!("Frame {} is not free: {:?}", frame, state),
        }
    }

    /// Records `owner` for a frame obtained from `find_free` or `reserve`.
    ///
    /// # Panics
    /// Panics if the frame is not reserved, so a frame never gains a second owner.
    pub fn bind(&mut self, frame: usize, owner: Owner) {
        match self.frames[frame] {
            FrameState::Reserved => self.frames[frame] = FrameState::Loading(owner),
            state => panic!("Frame {} bound while {:?}", frame, state),
        }
    }

    /// Marks a loaded frame as eligible for eviction.
    ///
    /// # Panics
    /// Panics unless the frame is loading.
    pub fn mark_resident(&mut self, frame: usize) {
        match self.frames[frame] {
            FrameState::Loading(owner) => self.frames[frame] = FrameState::Resident(owner),
            state => panic!("Frame {} became resident while {:?}", frame, state),
        }
    }

    /// Returns the frame to the pool, yielding whoever owned it.
    pub fn release(&mut self, frame: usize) -> Option<Owner> {
        let owner = self.frames[frame].owner();
        self.frames[frame] = FrameState::Free;
        owner
    }

    /// `None` for a frame number past the end of memory.
    pub fn state(&self, frame: usize) -> Option<FrameState> {
        self.frames.get(frame).copied()
    }

    pub fn owner(&self, frame: usize) -> Option<Owner> {
        self.frames.get(frame)?.owner()
    }

    pub fn resident_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, state)| matches!(state, FrameState::Resident(_)))
            .map(|(frame, _)| frame)
    }

    pub fn frames_owned_by(&self, space: SpaceId) -> Vec<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, state)| state.owner().map(|o| o.space) == Some(space))
            .map(|(frame, _)| frame)
            .collect()
    }

    pub fn used_count(&self) -> usize {
        self.frames.iter().filter(|state| !state.is_free()).count()
    }

    pub fn free_count(&self) -> usize {
        self.len() - self.used_count()
    }
}
