use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::FrameAllocator;

/// Picks the frame to evict when no frame is free.
pub trait ReplacementPolicy: Send {
    /// Returns a resident frame, or `None` when nothing can be evicted right now.
    fn select_victim(&mut self, frames: &FrameAllocator) -> Option<usize>;
}

/// Uniform random choice among resident frames. Successive calls may pick the same frame.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn select_victim(&mut self, frames: &FrameAllocator) -> Option<usize> {
        let candidates: Vec<usize> = frames.resident_frames().collect();
        candidates.choose(&mut self.rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::Owner;

    fn resident(allocator: &mut FrameAllocator, vpn: usize) -> usize {
        let frame = allocator.find_free().unwrap();
        allocator.bind(frame, Owner { space: 1, vpn });
        allocator.mark_resident(frame);
        frame
    }

    #[test]
    fn no_victim_when_nothing_resident() {
        let mut policy = RandomPolicy::seeded(1);
        let mut allocator = FrameAllocator::init(4);
        assert_eq!(policy.select_victim(&allocator), None);

        // reserved and loading frames are never candidates
        allocator.find_free();
        let frame = allocator.find_free().unwrap();
        allocator.bind(frame, Owner { space: 1, vpn: 0 });
        assert_eq!(policy.select_victim(&allocator), None);
    }

    #[test]
    fn only_resident_frames_are_picked() {
        let mut policy = RandomPolicy::seeded(42);
        let mut allocator = FrameAllocator::init(8);
        let a = resident(&mut allocator, 0);
        allocator.find_free();
        let b = resident(&mut allocator, 1);
        for _ in 0..200 {
            let victim = policy.select_victim(&allocator).unwrap();
            assert!(victim == a || victim == b);
        }
    }

    #[test]
    fn every_resident_frame_gets_picked_eventually() {
        let mut policy = RandomPolicy::new();
        let mut allocator = FrameAllocator::init(4);
        for vpn in 0..4 {
            resident(&mut allocator, vpn);
        }
        let seen: HashSet<usize> = (0..500)
            .filter_map(|_| policy.select_victim(&allocator))
            .collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn seeded_policies_agree() {
        let mut allocator = FrameAllocator::init(16);
        for vpn in 0..16 {
            resident(&mut allocator, vpn);
        }
        let mut first = RandomPolicy::seeded(7);
        let mut second = RandomPolicy::seeded(7);
        for _ in 0..32 {
            assert_eq!(first.select_victim(&allocator), second.select_victim(&allocator));
        }
    }
}
