use std::{
    fmt,
    fs::{remove_file, File},
    io::{self, Read, Seek, SeekFrom, Write},
    mem::size_of,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use log::{info, trace};

#[derive(Debug, Clone, PartialEq)]
pub enum DiskError {
    OverCapacity,
    InvalidHeader,
    ShortTransfer,
    Io(io::ErrorKind),
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskError::OverCapacity => write!(f, "access past the end of the backing store"),
            DiskError::InvalidHeader => write!(f, "backing store header does not match"),
            DiskError::ShortTransfer => write!(f, "backing store transferred fewer bytes than asked"),
            DiskError::Io(kind) => write!(f, "backing store i/o error: {}", kind),
        }
    }
}

impl std::error::Error for DiskError {}

impl From<io::Error> for DiskError {
    fn from(err: io::Error) -> Self {
        DiskError::Io(err.kind())
    }
}

/// Offset-addressed storage holding the full virtual image of one process.
pub trait BackingStore: Send + Sync {
    /// Reads `buf.len()` bytes starting at `offset`, returning how many were read.
    fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<usize, DiskError>;

    /// Writes `buf` starting at `offset`, returning how many bytes were written.
    fn write_at(&self, buf: &[u8], offset: usize) -> Result<usize, DiskError>;

    /// Size of the image in bytes.
    fn capacity(&self) -> usize;
}

impl<T: BackingStore + ?Sized> BackingStore for Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<usize, DiskError> {
        (**self).read_at(buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: usize) -> Result<usize, DiskError> {
        (**self).write_at(buf, offset)
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }
}

const HEADER_SIZE: usize = size_of::<u32>() * 2;

#[derive(Debug, Clone)]
pub struct Disk {
    path: PathBuf,
    page_size: usize,
    capacity: usize,
    file: Arc<Mutex<File>>,
}

pub fn make_name(name: &str) -> String {
    let name = name.replace(['-', ' ', '/'], "_");
    let mut disk_name = String::from("SWAP_");
    disk_name.push_str(&name);
    disk_name
}

fn write_header(file: &mut File, page_size: u32, capacity: u32) -> Result<(), io::Error> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&page_size.to_be_bytes())?;
    file.write_all(&capacity.to_be_bytes())?;
    Ok(())
}

fn read_header(file: &mut File) -> Result<(u32, u32), io::Error> {
    let mut page_size = [0; size_of::<u32>()];
    let mut capacity = [0; size_of::<u32>()];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut page_size)?;
    file.read_exact(&mut capacity)?;
    Ok((u32::from_be_bytes(page_size), u32::from_be_bytes(capacity)))
}

impl Disk {
    /// Creates (or truncates) the image `dir/SWAP_<name>` holding `capacity` zeroed bytes.
    pub fn create(dir: &Path, name: &str, page_size: usize, capacity: usize) -> Result<Self, DiskError> {
        if page_size == 0 || capacity % page_size != 0 || capacity > u32::MAX as usize {
            return Err(DiskError::InvalidHeader);
        }
        let path = dir.join(make_name(name));
        let mut file = File::options()
            .truncate(true)
            .write(true)
            .read(true)
            .create(true)
            .open(&path)?;
        file.set_len((HEADER_SIZE + capacity) as u64)?;
        write_header(&mut file, page_size as u32, capacity as u32)?;
        info!("Created backing store {} ({} bytes)", path.display(), capacity);
        Ok(Self {
            path,
            page_size,
            capacity,
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Re-opens an existing image, checking its header against the expected geometry.
    pub fn connect(dir: &Path, name: &str, page_size: usize, capacity: usize) -> Result<Self, DiskError> {
        let path = dir.join(make_name(name));
        let mut file = File::options().write(true).read(true).open(&path)?;
        let (stored_page_size, stored_capacity) = read_header(&mut file)?;
        if stored_page_size as usize != page_size || stored_capacity as usize != capacity {
            return Err(DiskError::InvalidHeader);
        }
        Ok(Self {
            path,
            page_size,
            capacity,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Deletes the image file. Other clones of this handle become unusable.
    pub fn remove(self) -> Result<(), DiskError> {
        info!("Removing backing store {}", self.path.display());
        remove_file(&self.path)?;
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), DiskError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(DiskError::OverCapacity),
        }
    }
}

impl BackingStore for Disk {
    fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<usize, DiskError> {
        self.check_range(offset, buf.len())?;
        let mut file = self.file.lock().unwrap();
        trace!("Reading {} bytes at {} from {}", buf.len(), offset, self.path.display());
        file.seek(SeekFrom::Start((HEADER_SIZE + offset) as u64))?;
        file.read_exact(buf)?;
        Ok(buf.len())
    }

    fn write_at(&self, buf: &[u8], offset: usize) -> Result<usize, DiskError> {
        self.check_range(offset, buf.len())?;
        let mut file = self.file.lock().unwrap();
        trace!("Writing {} bytes at {} to {}", buf.len(), offset, self.path.display());
        file.seek(SeekFrom::Start((HEADER_SIZE + offset) as u64))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
