//! The single trap gate. One naked routine owns both halves of every
//! kernel<->process transition: the top half resumes a process from its
//! saved per-process kernel stack pointer via `iretq`; the bottom half,
//! installed directly into the IDT at vector `0x40`, is where control comes
//! back on the next `int 0x40` (voluntary syscall) or on a fault that
//! re-enters through the same gate.
//!
//! This mirrors `ctsw.c`'s `contextswitch`/`_ISREntryPoint` pair (save
//! flags+GPRs, swap stack pointers, `iret`/resume) widened to the x86_64
//! register file, rather than the fiber-style `switch_context` pattern used
//! elsewhere in this tree for kernel-internal coroutines — a process
//! boundary is a privilege-level boundary here, which that pattern does not
//! cross.

use core::arch::naked_asm;
use core::sync::atomic::{AtomicU64, Ordering};

/// Syscall request code (RAX) captured by the most recent trap.
pub static TRAP_REQUEST: AtomicU64 = AtomicU64::new(0);
/// Argument-block pointer (RDX) captured by the most recent trap.
pub static TRAP_ARGS_PTR: AtomicU64 = AtomicU64::new(0);

/// Kernel's own stack pointer, saved for the duration of a process's run.
/// A single global slot suffices: context switches never nest, since
/// interrupts stay masked from trap entry to trap exit (see the
/// concurrency notes on why the kernel needs no further locking here).
static KERNEL_RSP: AtomicU64 = AtomicU64::new(0);

unsafe extern "C" {
    /// Address of the label `context_switch`'s naked body exports for the
    /// IDT to point at directly — installed with `set_handler_addr` rather
    /// than a typed `extern "x86-interrupt"` handler, since it must resume
    /// into the exact assembly routine that suspended the process.
    fn trap_reentry();
}

pub fn trap_reentry_addr() -> u64 {
    trap_reentry as usize as u64
}

/// Run the process whose per-process kernel stack currently has its
/// pointer at `saved_rsp` until it next traps. `saved_rsp` must point at a
/// stack built either by `super::factory::build_initial_frame` (first run)
/// or by a previous call to this function (resume) — both shapes are
/// identical, so there is exactly one resume path.
///
/// Returns the updated stack pointer to store back into the process's
/// saved state. After this returns, read `TRAP_REQUEST`/`TRAP_ARGS_PTR` for
/// the syscall that caused the trap.
///
/// # Safety
/// `saved_rsp` must address a correctly-shaped frame on a stack mapped and
/// owned by the caller; interrupts must be enabled on return via `iretq`
/// (the frame's saved RFLAGS carries `IF`), and `gdt::set_tss_rsp0` must
/// already point at this same stack's region before calling.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(saved_rsp: u64) -> u64 {
    naked_asm!(
        "cli",
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "pushfq",
        "mov [{kernel_rsp}], rsp",
        "mov rsp, rdi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdx",
        "pop rsi",
        "pop rdi",
        "pop rbx",
        "pop rcx",
        "iretq",

        ".global trap_reentry",
        "trap_reentry:",
        "push rcx",
        "push rbx",
        "push rdi",
        "push rsi",
        "push rdx",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [{trap_req}], rax",
        "mov [{trap_args}], rdx",
        "mov rdi, rsp",
        "mov rsp, [{kernel_rsp}]",
        "popfq",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "mov rax, rdi",
        "ret",
        kernel_rsp = sym KERNEL_RSP,
        trap_req = sym TRAP_REQUEST,
        trap_args = sym TRAP_ARGS_PTR,
    )
}

pub fn last_trap_request() -> u64 {
    TRAP_REQUEST.load(Ordering::SeqCst)
}

pub fn last_trap_args_ptr() -> u64 {
    TRAP_ARGS_PTR.load(Ordering::SeqCst)
}
