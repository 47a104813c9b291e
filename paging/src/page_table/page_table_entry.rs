/// Translation for one virtual page of an address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    virtual_page: usize,
    physical_page: Option<usize>,
    valid: bool,
    dirty: bool,
    /// Set on every access. No replacement policy reads it yet.
    referenced: bool,
    read_only: bool,
}

impl PageTableEntry {
    pub(super) fn new(virtual_page: usize) -> Self {
        PageTableEntry {
            virtual_page,
            physical_page: None,
            valid: false,
            dirty: false,
            referenced: false,
            read_only: false,
        }
    }

    pub fn virtual_page(&self) -> usize {
        self.virtual_page
    }

    pub fn physical_page(&self) -> Option<usize> {
        self.physical_page
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True when the entry is live and points at `frame`.
    pub fn is_mapped_to(&self, frame: usize) -> bool {
        self.valid && self.physical_page == Some(frame)
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Records an access the way the MMU would.
    pub fn touch(&mut self, writing: bool) {
        self.referenced = true;
        if writing {
            self.dirty = true;
        }
    }

    pub(super) fn map(&mut self, frame: usize) {
        self.physical_page = Some(frame);
        self.valid = true;
        self.referenced = false;
        self.dirty = false;
        self.read_only = false;
    }

    pub(super) fn invalidate(&mut self) -> Option<usize> {
        self.valid = false;
        self.referenced = false;
        self.dirty = false;
        self.physical_page.take()
    }
}
