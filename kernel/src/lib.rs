#![no_std]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]

extern crate alloc;

pub mod allocator;
pub mod interrupts;
pub mod process;
pub mod serial;

use core::panic::PanicInfo;

/// The process loaded alongside the kernel image. Building/loading real
/// user binaries from disk is out of scope here (no filesystem, no ELF
/// loader); this stub exists so the dispatcher always has at least one
/// real process to run instead of idling forever on an empty ready queue.
extern "C" fn init_process() {
    loop {
        // A genuine syscall thunk (the register-marshaling wrapper around
        // `int 0x40`) is out of scope; user code here is a placeholder for
        // where one would issue SLEEP/YIELD/SEND/RECV.
        unsafe { core::arch::asm!("hlt") };
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    serial::init();
    interrupts::init();
    allocator::init();

    log_info!("xeros kernel started.");

    x86_64::instructions::interrupts::enable();

    process::dispatch::run(init_process);
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log_error!("{}", info);
    loop {
        x86_64::instructions::hlt();
    }
}
