use std::{
    fmt,
    mem::size_of,
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryError {
    OverCapacity,
    Misaligned,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OverCapacity => write!(f, "physical address out of range"),
            MemoryError::Misaligned => write!(f, "buffer does not match the frame size"),
        }
    }
}

impl std::error::Error for MemoryError {}

/// The machine's main memory: `num_frames` page-sized slots in one contiguous buffer.
/// Frame `n` occupies bytes `n * page_size .. (n + 1) * page_size`.
#[derive(Clone)]
pub struct PhysicalMemory {
    page_size: usize,
    num_frames: usize,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl PhysicalMemory {
    pub fn new(num_frames: usize, page_size: usize) -> Self {
        Self {
            page_size,
            num_frames,
            buffer: Arc::new(Mutex::new(vec![0; num_frames * page_size])),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn capacity(&self) -> usize {
        self.num_frames * self.page_size
    }

    pub fn frame_to_address(&self, frame: usize) -> usize {
        frame * self.page_size
    }

    pub fn check_address(&self, address: usize, len: usize) -> Result<(), MemoryError> {
        match address.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(MemoryError::OverCapacity),
        }
    }

    fn check_frame(&self, frame: usize) -> Result<(), MemoryError> {
        if frame >= self.num_frames {
            return Err(MemoryError::OverCapacity);
        }
        Ok(())
    }

    pub fn zero_frame(&self, frame: usize) -> Result<(), MemoryError> {
        self.check_frame(frame)?;
        let start = self.frame_to_address(frame);
        let mut buffer = self.buffer.lock().unwrap();
        buffer[start..start + self.page_size].fill(0);
        Ok(())
    }

    /// Copies the whole content of `frame` out of memory.
    pub fn read_frame(&self, frame: usize) -> Result<Vec<u8>, MemoryError> {
        self.check_frame(frame)?;
        let start = self.frame_to_address(frame);
        let buffer = self.buffer.lock().unwrap();
        Ok(buffer[start..start + self.page_size].to_vec())
    }

    /// Overwrites the beginning of `frame` with `bytes`; at most one page.
    pub fn write_frame(&self, frame: usize, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_frame(frame)?;
        if bytes.len() > self.page_size {
            return Err(MemoryError::Misaligned);
        }
        let start = self.frame_to_address(frame);
        let mut buffer = self.buffer.lock().unwrap();
        buffer[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_u8(&self, address: usize) -> Result<u8, MemoryError> {
        self.check_address(address, 1)?;
        let buffer = self.buffer.lock().unwrap();
        Ok(buffer[address])
    }

    pub fn write_u8(&self, address: usize, byte: u8) -> Result<(), MemoryError> {
        self.check_address(address, 1)?;
        let mut buffer = self.buffer.lock().unwrap();
        buffer[address] = byte;
        Ok(())
    }

    pub fn read_u16(&self, address: usize) -> Result<u16, MemoryError> {
        self.check_address(address, size_of::<u16>())?;
        let buffer = self.buffer.lock().unwrap();
        let mut bytes = [0; size_of::<u16>()];
        bytes.copy_from_slice(&buffer[address..address + size_of::<u16>()]);
        Ok(u16::from_be_bytes(bytes))
    }

    pub fn write_u16(&self, address: usize, word: u16) -> Result<(), MemoryError> {
        self.check_address(address, size_of::<u16>())?;
        let mut buffer = self.buffer.lock().unwrap();
        buffer[address..address + size_of::<u16>()].copy_from_slice(&word.to_be_bytes());
        Ok(())
    }

    pub fn read_u32(&self, address: usize) -> Result<u32, MemoryError> {
        self.check_address(address, size_of::<u32>())?;
        let buffer = self.buffer.lock().unwrap();
        let mut bytes = [0; size_of::<u32>()];
        bytes.copy_from_slice(&buffer[address..address + size_of::<u32>()]);
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn write_u32(&self, address: usize, word: u32) -> Result<(), MemoryError> {
        self.check_address(address, size_of::<u32>())?;
        let mut buffer = self.buffer.lock().unwrap();
        buffer[address..address + size_of::<u32>()].copy_from_slice(&word.to_be_bytes());
        Ok(())
    }
}
