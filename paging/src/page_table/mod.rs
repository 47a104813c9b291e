mod iter;
mod page_table_entry;

pub use iter::ValidEntries;
pub use page_table_entry::PageTableEntry;

/// Single-level page table, one entry per virtual page number.
#[derive(Debug, Clone)]
pub struct PageTable {
    entries: Vec<PageTableEntry>,
}

impl PageTable {
    /// Every entry starts out invalid with no frame assigned.
    pub fn init(num_pages: usize) -> Self {
        let entries = (0..num_pages).map(PageTableEntry::new).collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_entry(&self, page_number: usize) -> Option<&PageTableEntry> {
        self.entries.get(page_number)
    }

    pub fn get_entry_mut(&mut self, page_number: usize) -> Option<&mut PageTableEntry> {
        self.entries.get_mut(page_number)
    }

    pub fn get_frame(&self, page_number: usize) -> Option<usize> {
        let entry = self.get_entry(page_number)?;
        if entry.is_valid() {
            entry.physical_page()
        } else {
            None
        }
    }

    /// Makes `page_number` live in `frame` with clean flags.
    ///
    /// # Panics
    /// Panics if the page is already valid.
    pub fn map_to_frame(&mut self, page_number: usize, frame_number: usize) {
        let entry = &mut self.entries[page_number];
        if entry.is_valid() {
            panic!("Page {} is already mapped", page_number);
        }
        entry.map(frame_number);
    }

    /// Invalidates `page_number`, returning the frame it held.
    pub fn unmap_page(&mut self, page_number: usize) -> Option<usize> {
        self.entries.get_mut(page_number)?.invalidate()
    }

    pub fn valid_entries(&self) -> ValidEntries<'_> {
        ValidEntries::new(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::PageTable;

    #[test]
    fn starts_invalid() {
        let table = PageTable::init(6);
        assert_eq!(table.len(), 6);
        for vpn in 0..6 {
            let entry = table.get_entry(vpn).unwrap();
            assert_eq!(entry.virtual_page(), vpn);
            assert!(!entry.is_valid());
            assert_eq!(entry.physical_page(), None);
        }
        assert!(table.get_entry(6).is_none());
        assert_eq!(table.valid_entries().count(), 0);
    }

    #[test]
    fn create_mapping() {
        let mut table = PageTable::init(64);
        table.map_to_frame(12, 43);
        table.map_to_frame(4, 45);
        assert_eq!(table.get_frame(12), Some(43));
        assert_eq!(table.get_frame(4), Some(45));
        assert!(table.get_entry(12).unwrap().is_mapped_to(43));

        assert_eq!(table.unmap_page(12), Some(43));
        assert_eq!(table.get_frame(12), None);
        table.map_to_frame(12, 49);
        assert_eq!(table.get_frame(12), Some(49));
    }

    #[test]
    fn map_resets_flags() {
        let mut table = PageTable::init(4);
        table.map_to_frame(1, 0);
        let entry = table.get_entry_mut(1).unwrap();
        entry.set_read_only(true);
        entry.touch(false);
        table.unmap_page(1);
        table.map_to_frame(1, 2);
        let entry = table.get_entry(1).unwrap();
        assert!(!entry.is_read_only());
        assert!(!entry.is_dirty());
        assert!(!entry.is_referenced());
    }

    #[test]
    fn touch_sets_use_and_dirty() {
        let mut table = PageTable::init(4);
        table.map_to_frame(2, 3);
        let entry = table.get_entry_mut(2).unwrap();
        entry.touch(false);
        assert!(entry.is_referenced());
        assert!(!entry.is_dirty());
        entry.touch(true);
        assert!(entry.is_dirty());

        assert_eq!(table.unmap_page(2), Some(3));
        let entry = table.get_entry(2).unwrap();
        assert!(!entry.is_valid());
        assert!(!entry.is_dirty());
        assert!(!entry.is_referenced());
        assert_eq!(entry.physical_page(), None);
    }

    #[test]
    fn valid_entries_skips_invalid() {
        let mut table = PageTable::init(8);
        table.map_to_frame(1, 0);
        table.map_to_frame(5, 2);
        table.map_to_frame(7, 1);
        table.unmap_page(5);
        let pages: Vec<usize> = table.valid_entries().map(|e| e.virtual_page()).collect();
        assert_eq!(pages, vec![1, 7]);
    }

    #[test]
    #[should_panic]
    fn double_map_panics() {
        let mut table = PageTable::init(2);
        table.map_to_frame(0, 0);
        table.map_to_frame(0, 1);
    }
}
