//! Program images handed to [`AddressSpace::load`](crate::AddressSpace::load).
//!
//! Parsing real executable formats happens elsewhere; an image here is already split into
//! the segments that must be staged into the backing store.

use std::{fs, path::Path};

use crate::{
    config::{STACK_MARGIN, USER_STACK_SIZE},
    error::LoadError,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub virtual_addr: usize,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn new(virtual_addr: usize, data: Vec<u8>) -> Self {
        Self { virtual_addr, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn end(&self) -> Option<usize> {
        self.virtual_addr.checked_add(self.data.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramImage {
    pub code: Segment,
    pub init_data: Segment,
    pub uninit_data_size: usize,
    pub entry_point: usize,
    /// Overrides the footprint computed from the segments.
    pub memory_size: Option<usize>,
}

impl ProgramImage {
    pub fn new(entry_point: usize) -> Self {
        Self {
            entry_point,
            ..Self::default()
        }
    }

    /// Reads a flat binary: the whole file is code at virtual address 0.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let data = fs::read(path).map_err(|err| LoadError::Open(err.kind()))?;
        Ok(Self::new(0).with_code(0, data))
    }

    pub fn with_code(mut self, virtual_addr: usize, data: Vec<u8>) -> Self {
        self.code = Segment::new(virtual_addr, data);
        self
    }

    pub fn with_init_data(mut self, virtual_addr: usize, data: Vec<u8>) -> Self {
        self.init_data = Segment::new(virtual_addr, data);
        self
    }

    pub fn with_uninit_data(mut self, size: usize) -> Self {
        self.uninit_data_size = size;
        self
    }

    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = Some(size);
        self
    }

    /// Bytes of virtual memory the program needs, stack included. `None` if the
    /// declared sizes overflow.
    pub fn footprint(&self) -> Option<usize> {
        match self.memory_size {
            Some(size) => Some(size),
            None => self
                .code
                .len()
                .checked_add(self.init_data.len())?
                .checked_add(self.uninit_data_size)?
                .checked_add(USER_STACK_SIZE),
        }
    }

    /// Rounds the footprint up to whole pages and checks the image fits inside.
    pub(crate) fn num_pages(&self, page_size: usize) -> Result<usize, LoadError> {
        let footprint = self.footprint().ok_or(LoadError::InvalidSize)?;
        let num_pages = footprint
            .checked_add(page_size - 1)
            .ok_or(LoadError::InvalidSize)?
            / page_size;
        let size = num_pages * page_size;
        check_space_size(size)?;
        for segment in [&self.code, &self.init_data] {
            match segment.end() {
                Some(end) if end <= size => {}
                _ => return Err(LoadError::SegmentOutOfRange),
            }
        }
        if self.entry_point >= size {
            return Err(LoadError::EntryOutOfRange);
        }
        Ok(num_pages)
    }
}

/// An address space must leave room for the initial stack pointer and stay addressable
/// by 32-bit registers.
pub(crate) fn check_space_size(size: usize) -> Result<(), LoadError> {
    if size <= STACK_MARGIN || size > u32::MAX as usize {
        return Err(LoadError::InvalidSize);
    }
    Ok(())
}
