use std::slice;

use super::PageTableEntry;

/// Iterates over the entries that currently hold a frame.
pub struct ValidEntries<'a> {
    entries: slice::Iter<'a, PageTableEntry>,
}

impl<'a> ValidEntries<'a> {
    pub(super) fn new(entries: &'a [PageTableEntry]) -> Self {
        Self {
            entries: entries.iter(),
        }
    }
}

impl<'a> Iterator for ValidEntries<'a> {
    type Item = &'a PageTableEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.by_ref().find(|entry| entry.is_valid())
    }
}
