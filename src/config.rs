//! Sizing constants and the runtime configuration a [`Kernel`](crate::Kernel) is built from.

use std::{env, path::PathBuf, str::FromStr};

use crate::error::ConfigError;

/// Bytes per page and per physical frame.
pub const PAGE_SIZE: usize = 128;
/// Frames in main memory.
pub const NUM_PHYS_PAGES: usize = 32;
/// Stack space added on top of a program's segments.
pub const USER_STACK_SIZE: usize = 1024;
/// Gap left between the initial stack pointer and the end of the address space.
pub const STACK_MARGIN: usize = 16;
/// Appended to the process name to name its backing store.
pub const SWAP_SUFFIX: &str = "_vm";

#[derive(Debug, Clone, PartialEq)]
pub struct VmConfig {
    pub page_size: usize,
    pub num_phys_pages: usize,
    /// Directory holding the per-process backing stores.
    pub swap_dir: PathBuf,
    /// Seed for victim selection; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            num_phys_pages: NUM_PHYS_PAGES,
            swap_dir: env::temp_dir(),
            seed: None,
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(None),
    }
}

impl VmConfig {
    pub fn with_frames(mut self, num_phys_pages: usize) -> Self {
        self.num_phys_pages = num_phys_pages;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_swap_dir(mut self, swap_dir: impl Into<PathBuf>) -> Self {
        self.swap_dir = swap_dir.into();
        self
    }

    /// Defaults overridden by `VM_NUM_PHYS_PAGES`, `VM_PAGE_SIZE`, `VM_SEED` and `VM_SWAP_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(frames) = parse_var::<usize>("VM_NUM_PHYS_PAGES")? {
            config.num_phys_pages = frames;
        }
        if let Some(page_size) = parse_var::<usize>("VM_PAGE_SIZE")? {
            config.page_size = page_size;
        }
        config.seed = parse_var::<u64>("VM_SEED")?;
        if let Ok(dir) = env::var("VM_SWAP_DIR") {
            config.swap_dir = PathBuf::from(dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Pages must hold whole words so an aligned access never straddles two pages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size % 4 != 0 {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        if self.num_phys_pages == 0 {
            return Err(ConfigError::NoFrames);
        }
        Ok(())
    }
}
