//! The slice of the MIPS emulator that touches user memory: register state, address
//! translation through the page table and faulting loads and stores.

use std::fmt;

use memory::MemoryError;
use paging::PageTable;

use crate::{address_space::AddressSpace, error::FaultError};

pub const NUM_GP_REGS: usize = 32;
pub const STACK_REG: usize = 29;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    pub gpr: [u32; NUM_GP_REGS],
    pub pc: u32,
    pub next_pc: u32,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            gpr: [0; NUM_GP_REGS],
            pc: 0,
            next_pc: 0,
        }
    }
}

impl Registers {
    pub fn stack_pointer(&self) -> u32 {
        self.gpr[STACK_REG]
    }
}

/// Exceptions raised by translation, each carrying the faulting virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionType {
    PageFault(usize),
    AddressError(usize),
    ReadOnly(usize),
}

impl ExceptionType {
    pub fn bad_vaddr(&self) -> usize {
        match *self {
            ExceptionType::PageFault(vaddr)
            | ExceptionType::AddressError(vaddr)
            | ExceptionType::ReadOnly(vaddr) => vaddr,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MachineError {
    Exception(ExceptionType),
    Fault(FaultError),
    Memory(MemoryError),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::Exception(exception) => {
                write!(f, "{:?} at 0x{:x}", exception, exception.bad_vaddr())
            }
            MachineError::Fault(err) => write!(f, "{}", err),
            MachineError::Memory(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for MachineError {}

impl From<ExceptionType> for MachineError {
    fn from(exception: ExceptionType) -> Self {
        MachineError::Exception(exception)
    }
}

impl From<FaultError> for MachineError {
    fn from(err: FaultError) -> Self {
        MachineError::Fault(err)
    }
}

impl From<MemoryError> for MachineError {
    fn from(err: MemoryError) -> Self {
        MachineError::Memory(err)
    }
}

pub(crate) fn translate_locked(
    table: &mut PageTable,
    page_size: usize,
    vaddr: usize,
    size: usize,
    writing: bool,
) -> Result<usize, ExceptionType> {
    if !matches!(size, 1 | 2 | 4) || vaddr % size != 0 {
        return Err(ExceptionType::AddressError(vaddr));
    }
    let vpn = vaddr / page_size;
    let offset = vaddr % page_size;
    let entry = table
        .get_entry_mut(vpn)
        .ok_or(ExceptionType::AddressError(vaddr))?;
    let frame = match entry.physical_page() {
        Some(frame) if entry.is_valid() => frame,
        _ => return Err(ExceptionType::PageFault(vaddr)),
    };
    if writing && entry.is_read_only() {
        return Err(ExceptionType::ReadOnly(vaddr));
    }
    entry.touch(writing);
    Ok(frame * page_size + offset)
}

impl AddressSpace {
    /// Virtual to physical translation. Sets the referenced bit, and the dirty bit on writes.
    pub fn translate(&self, vaddr: usize, size: usize, writing: bool) -> Result<usize, ExceptionType> {
        let mut table = self.shared.page_table.lock().unwrap();
        translate_locked(&mut table, self.kernel.page_size(), vaddr, size, writing)
    }

    /// Loads a big-endian value of `size` bytes, paging it in first if needed.
    pub fn read_mem(&self, vaddr: usize, size: usize) -> Result<u32, MachineError> {
        let page_size = self.kernel.page_size();
        loop {
            let mut table = self.shared.page_table.lock().unwrap();
            match translate_locked(&mut table, page_size, vaddr, size, false) {
                Ok(paddr) => {
                    let memory = self.kernel.memory();
                    let value = match size {
                        1 => memory.read_u8(paddr)? as u32,
                        2 => memory.read_u16(paddr)? as u32,
                        _ => memory.read_u32(paddr)?,
                    };
                    return Ok(value);
                }
                Err(ExceptionType::PageFault(_)) => {
                    drop(table);
                    self.retry_after_fault(vaddr / page_size)?;
                }
                Err(exception) => return Err(exception.into()),
            }
        }
    }

    /// Stores the low `size` bytes of `value` big-endian, paging the target in first if needed.
    pub fn write_mem(&self, vaddr: usize, size: usize, value: u32) -> Result<(), MachineError> {
        let page_size = self.kernel.page_size();
        loop {
            let mut table = self.shared.page_table.lock().unwrap();
            match translate_locked(&mut table, page_size, vaddr, size, true) {
                Ok(paddr) => {
                    let memory = self.kernel.memory();
                    match size {
                        1 => memory.write_u8(paddr, value as u8)?,
                        2 => memory.write_u16(paddr, value as u16)?,
                        _ => memory.write_u32(paddr, value)?,
                    }
                    return Ok(());
                }
                Err(ExceptionType::PageFault(_)) => {
                    drop(table);
                    self.retry_after_fault(vaddr / page_size)?;
                }
                Err(exception) => return Err(exception.into()),
            }
        }
    }

    fn retry_after_fault(&self, vpn: usize) -> Result<(), FaultError> {
        match self.page_fault(vpn) {
            // Another thread of this space got there first.
            Err(FaultError::AlreadyMapped { .. }) => Ok(()),
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_checks_alignment() {
        let mut table = PageTable::init(4);
        assert_eq!(
            translate_locked(&mut table, 128, 2, 4, false),
            Err(ExceptionType::AddressError(2))
        );
        assert_eq!(
            translate_locked(&mut table, 128, 1, 2, false),
            Err(ExceptionType::AddressError(1))
        );
        assert_eq!(
            translate_locked(&mut table, 128, 0, 3, false),
            Err(ExceptionType::AddressError(0))
        );
    }

    #[test]
    fn translate_out_of_range() {
        let mut table = PageTable::init(4);
        assert_eq!(
            translate_locked(&mut table, 128, 512, 4, false),
            Err(ExceptionType::AddressError(512))
        );
    }

    #[test]
    fn translate_invalid_page_faults() {
        let mut table = PageTable::init(4);
        assert_eq!(
            translate_locked(&mut table, 128, 130, 1, false),
            Err(ExceptionType::PageFault(130))
        );
    }

    #[test]
    fn translate_sets_usage_bits() {
        let mut table = PageTable::init(4);
        table.map_to_frame(1, 3);
        assert_eq!(translate_locked(&mut table, 128, 132, 4, false), Ok(3 * 128 + 4));
        let entry = *table.get_entry(1).unwrap();
        assert!(entry.is_referenced());
        assert!(!entry.is_dirty());

        assert_eq!(translate_locked(&mut table, 128, 136, 2, true), Ok(3 * 128 + 8));
        assert!(table.get_entry(1).unwrap().is_dirty());
    }

    #[test]
    fn translate_read_only() {
        let mut table = PageTable::init(4);
        table.map_to_frame(0, 0);
        table.get_entry_mut(0).unwrap().set_read_only(true);
        assert_eq!(translate_locked(&mut table, 128, 4, 4, true), Err(ExceptionType::ReadOnly(4)));
        assert!(!table.get_entry(0).unwrap().is_dirty());
        assert_eq!(translate_locked(&mut table, 128, 4, 4, false), Ok(4));
    }

    #[test]
    fn registers_default_zero() {
        let registers = Registers::default();
        assert_eq!(registers.stack_pointer(), 0);
        assert!(registers.gpr.iter().all(|&reg| reg == 0));
    }
}
