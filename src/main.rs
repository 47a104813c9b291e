use std::{process, sync::Arc, thread};

use demand_paging::{AddressSpace, Kernel, MachineError, ProgramImage, VmConfig};
use log::{error, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

const NUM_PROCESSES: usize = 4;
/// Each process touches more pages than physical memory holds.
const PAGES_PER_PROCESS: usize = 48;

fn run_process(kernel: Arc<Kernel>, pid: usize, seed: u64) -> Result<(), MachineError> {
    let page_size = kernel.page_size();
    let image = ProgramImage::new(0)
        .with_code(0, vec![pid as u8; page_size])
        .with_memory_size(PAGES_PER_PROCESS * page_size);
    let name = format!("demo-{}", pid);
    let space = match AddressSpace::load(&kernel, &name, &image) {
        Ok(space) => space,
        Err(err) => {
            error!("{}: {}", name, err);
            return Ok(());
        }
    };
    let registers = space.init_registers();
    info!("{} starts at pc {} sp {}", name, registers.pc, registers.stack_pointer());

    let mut rng = StdRng::seed_from_u64(seed);
    let pattern: Vec<u32> = (0..PAGES_PER_PROCESS).map(|_| rng.gen()).collect();
    for (vpn, &word) in pattern.iter().enumerate().skip(1) {
        space.write_mem(vpn * page_size, 4, word)?;
    }
    for _ in 0..PAGES_PER_PROCESS * 4 {
        let vpn = rng.gen_range(1..PAGES_PER_PROCESS);
        let word = space.read_mem(vpn * page_size, 4)?;
        if word != pattern[vpn] {
            error!("{}: page {} holds {:#x}, expected {:#x}", name, vpn, word, pattern[vpn]);
        }
    }
    let code = space.read_mem(0, 1)?;
    if code != pid as u32 {
        error!("{}: code segment holds {}, expected {}", name, code, pid);
    }

    if let Err(err) = space.destroy() {
        error!("{}: {}", name, err);
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let config = match VmConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    let seed = config.seed.unwrap_or(0);
    let kernel = match Kernel::new(config) {
        Ok(kernel) => kernel,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    println!("---- Kernel initialized ----");

    let handles: Vec<_> = (0..NUM_PROCESSES)
        .map(|pid| {
            let kernel = kernel.clone();
            thread::spawn(move || run_process(kernel, pid, seed + pid as u64))
        })
        .collect();
    for (pid, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("demo-{} stopped: {}", pid, err),
            Err(_) => error!("demo-{} panicked", pid),
        }
    }

    kernel.stats().print();
    let stats = kernel.stats().snapshot();
    println!(
        "Page faults: {}, evictions: {}, disk reads: {}, disk writes: {}",
        stats.num_page_faults, stats.num_evictions, stats.num_disk_reads, stats.num_disk_writes
    );
    println!("---- Kernel shut down ----");
}
