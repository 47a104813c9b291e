use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

/// Paging counters shared by every address space. Diagnostic only.
#[derive(Debug, Default)]
pub struct Statistics {
    num_page_faults: AtomicU64,
    num_evictions: AtomicU64,
    num_disk_reads: AtomicU64,
    num_disk_writes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub num_page_faults: u64,
    pub num_evictions: u64,
    pub num_disk_reads: u64,
    pub num_disk_writes: u64,
}

impl Statistics {
    pub(crate) fn record_page_fault(&self) {
        self.num_page_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.num_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_read(&self) {
        self.num_disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_write(&self) {
        self.num_disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn num_page_faults(&self) -> u64 {
        self.num_page_faults.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            num_page_faults: self.num_page_faults.load(Ordering::Relaxed),
            num_evictions: self.num_evictions.load(Ordering::Relaxed),
            num_disk_reads: self.num_disk_reads.load(Ordering::Relaxed),
            num_disk_writes: self.num_disk_writes.load(Ordering::Relaxed),
        }
    }

    pub fn print(&self) {
        let stats = self.snapshot();
        info!(
            "Paging: faults {}, evictions {}, disk reads {}, disk writes {}",
            stats.num_page_faults, stats.num_evictions, stats.num_disk_reads, stats.num_disk_writes
        );
    }
}
