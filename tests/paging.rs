use std::{env::temp_dir, fs, path::PathBuf, sync::Arc};

use demand_paging::{
    AddressSpace, ExceptionType, FaultError, Kernel, LoadError, MachineError, ProgramImage,
    VmConfig,
};
use disk::make_name;
use rand::{thread_rng, Rng};
use serial_test::serial;

const PAGE_SIZE: usize = 128;

fn swap_dir() -> PathBuf {
    let dir = temp_dir().join("demand_paging_tests");
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn kernel(frames: usize) -> Arc<Kernel> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = VmConfig::default()
        .with_frames(frames)
        .with_page_size(PAGE_SIZE)
        .with_seed(42)
        .with_swap_dir(swap_dir());
    Kernel::new(config).unwrap()
}

/// Code segment where byte `i` of page `vpn` is `vpn * 16 + i % 16`.
fn code(num_pages: usize) -> Vec<u8> {
    (0..num_pages * PAGE_SIZE)
        .map(|i| ((i / PAGE_SIZE) * 16 + i % 16) as u8)
        .collect()
}

fn assert_consistent(kernel: &Kernel, spaces: &[&AddressSpace]) {
    let owners = kernel.frame_owners();
    for (frame, owner) in owners.iter().enumerate() {
        if let Some(owner) = owner {
            let space = spaces.iter().find(|space| space.id() == owner.space).unwrap();
            assert!(space.entry(owner.vpn).unwrap().is_mapped_to(frame));
        }
    }
    let mut mapped: Vec<usize> = spaces
        .iter()
        .flat_map(|space| space.valid_entries())
        .map(|entry| entry.physical_page().unwrap())
        .collect();
    let total = mapped.len();
    mapped.sort_unstable();
    mapped.dedup();
    assert_eq!(mapped.len(), total, "frame mapped twice");
    assert_eq!(total, kernel.used_frames());
}

#[test]
#[serial]
fn six_pages_in_four_frames() {
    let kernel = kernel(4);
    let image = ProgramImage::new(0).with_code(0, code(6)).with_memory_size(6 * PAGE_SIZE);
    let space = AddressSpace::load(&kernel, "six_pages", &image).unwrap();

    for vpn in 0..6 {
        assert_eq!(space.read_mem(vpn * PAGE_SIZE + 3, 1).unwrap(), (vpn * 16 + 3) as u32);
        assert_consistent(&kernel, &[&space]);
    }
    let stats = kernel.stats().snapshot();
    assert_eq!(stats.num_page_faults, 6);
    assert_eq!(stats.num_evictions, 2);
    assert_eq!(stats.num_disk_writes, 0);
    assert_eq!(kernel.used_frames(), 4);
    assert_eq!(space.valid_entries().len(), 4);

    for vpn in 0..6 {
        let word = space.read_mem(vpn * PAGE_SIZE + 4, 4).unwrap();
        let base = (vpn * 16 + 4) as u32;
        assert_eq!(word, base << 24 | (base + 1) << 16 | (base + 2) << 8 | (base + 3));
    }
    assert_consistent(&kernel, &[&space]);
    space.destroy().unwrap();
}

#[test]
#[serial]
fn writes_survive_eviction() {
    let kernel = kernel(3);
    let image = ProgramImage::new(0).with_memory_size(10 * PAGE_SIZE);
    let space = AddressSpace::load(&kernel, "round_trip", &image).unwrap();

    let mut rng = thread_rng();
    let words: Vec<u32> = (0..10).map(|_| rng.gen()).collect();
    for (vpn, &word) in words.iter().enumerate() {
        space.write_mem(vpn * PAGE_SIZE + 8, 4, word).unwrap();
        space.write_mem(vpn * PAGE_SIZE + 2, 2, vpn as u32).unwrap();
    }
    assert!(kernel.stats().snapshot().num_disk_writes >= 7);
    for _ in 0..50 {
        let vpn = rng.gen_range(0..10);
        assert_eq!(space.read_mem(vpn * PAGE_SIZE + 8, 4).unwrap(), words[vpn]);
        assert_eq!(space.read_mem(vpn * PAGE_SIZE + 2, 2).unwrap(), vpn as u32);
        assert_eq!(space.read_mem(vpn * PAGE_SIZE + 100, 1).unwrap(), 0);
    }
    assert_consistent(&kernel, &[&space]);
    space.destroy().unwrap();
}

#[test]
#[serial]
fn access_errors_are_not_faults() {
    let kernel = kernel(2);
    let image = ProgramImage::new(0).with_memory_size(2 * PAGE_SIZE);
    let space = AddressSpace::load(&kernel, "access_errors", &image).unwrap();

    assert_eq!(
        space.read_mem(2 * PAGE_SIZE, 1),
        Err(MachineError::Exception(ExceptionType::AddressError(2 * PAGE_SIZE)))
    );
    assert_eq!(
        space.write_mem(6, 4, 1),
        Err(MachineError::Exception(ExceptionType::AddressError(6)))
    );
    space.page_fault(1).unwrap();
    space.set_read_only(1, true).unwrap();
    assert_eq!(
        space.write_mem(PAGE_SIZE, 4, 1),
        Err(MachineError::Exception(ExceptionType::ReadOnly(PAGE_SIZE)))
    );
    assert_eq!(space.read_mem(PAGE_SIZE, 4).unwrap(), 0);
    assert_eq!(kernel.num_page_faults(), 1);
    assert_eq!(
        space.set_read_only(2, true),
        Err(FaultError::AddressOutOfRange { vpn: 2 })
    );
}

#[test]
#[serial]
fn translate_after_fault() {
    let kernel = kernel(2);
    let image = ProgramImage::new(0).with_memory_size(4 * PAGE_SIZE);
    let space = AddressSpace::load(&kernel, "translate", &image).unwrap();

    assert_eq!(
        space.translate(PAGE_SIZE + 12, 4, false),
        Err(ExceptionType::PageFault(PAGE_SIZE + 12))
    );
    space.page_fault(1).unwrap();
    let frame = space.entry(1).unwrap().physical_page().unwrap();
    assert_eq!(space.translate(PAGE_SIZE + 12, 4, true), Ok(frame * PAGE_SIZE + 12));
    assert!(space.entry(1).unwrap().is_dirty());
}

#[test]
#[serial]
fn teardown_frees_frames_and_swap() {
    let kernel = kernel(4);
    let image = ProgramImage::new(0).with_memory_size(8 * PAGE_SIZE);
    let first = AddressSpace::load(&kernel, "teardown-a", &image).unwrap();
    let second = AddressSpace::load(&kernel, "teardown-b", &image).unwrap();
    for vpn in 0..3 {
        first.write_mem(vpn * PAGE_SIZE, 4, 0xabcd).unwrap();
    }
    second.write_mem(0, 4, 0x1234).unwrap();
    assert_eq!(kernel.used_frames(), 4);

    let first_swap = swap_dir().join(make_name("teardown-a_vm"));
    assert!(first_swap.exists());
    first.destroy().unwrap();
    assert!(!first_swap.exists());
    assert_eq!(kernel.used_frames(), 1);
    assert_eq!(kernel.num_address_spaces(), 1);
    assert_consistent(&kernel, &[&second]);

    for vpn in 1..4 {
        second.write_mem(vpn * PAGE_SIZE, 4, vpn as u32).unwrap();
    }
    assert_eq!(kernel.stats().snapshot().num_evictions, 0);
    assert_eq!(second.read_mem(0, 4).unwrap(), 0x1234);
    drop(second);
    assert_eq!(kernel.used_frames(), 0);
    assert_eq!(kernel.num_address_spaces(), 0);
}

#[test]
#[serial]
fn bad_images_are_rejected() {
    let kernel = kernel(2);
    let too_small = ProgramImage::new(0)
        .with_code(0, vec![1; 300])
        .with_memory_size(2 * PAGE_SIZE);
    assert_eq!(
        AddressSpace::load(&kernel, "too_small", &too_small).err(),
        Some(LoadError::SegmentOutOfRange)
    );
    let bad_entry = ProgramImage::new(4 * PAGE_SIZE).with_memory_size(2 * PAGE_SIZE);
    assert_eq!(
        AddressSpace::load(&kernel, "bad_entry", &bad_entry).err(),
        Some(LoadError::EntryOutOfRange)
    );
    assert!(!swap_dir().join(make_name("too_small_vm")).exists());
    assert_eq!(kernel.num_address_spaces(), 0);
}

#[test]
#[serial]
fn flat_binary_runs_from_address_zero() {
    let kernel = kernel(2);
    let path = swap_dir().join("flat_binary.bin");
    fs::write(&path, [0x24, 0x02, 0x00, 0x0a]).unwrap();
    let image = ProgramImage::open(&path).unwrap();
    let space = AddressSpace::load(&kernel, "flat_binary", &image).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(space.read_mem(0, 4).unwrap(), 0x2402_000a);
    let registers = space.init_registers();
    assert_eq!(registers.pc, 0);
    assert_eq!(registers.stack_pointer() as usize, space.size() - 16);
}
