//! Builds the per-process kernel stack frame that `context_switch` resumes
//! into for the very first time. It is shaped identically to a frame left
//! behind by a real trap, so `context_switch` has exactly one resume path
//! for both a brand-new process and one that has already run.

use alloc::boxed::Box;

use crate::interrupts::gdt;

/// Owned stacks for one process: the kernel-side stack the trap frame
/// lives on (and that `TSS.RSP0` points at while this process runs), and
/// the user-mode stack the process itself executes on.
pub struct Stacks {
    pub kernel_stack: Box<[u8]>,
    pub user_stack: Box<[u8]>,
}

/// A sentinel the kernel stack's manufactured RIP slot never actually
/// targets directly; `entry` is used instead. Kept only as documentation
/// of the convention: a process that `ret`s out of its own top-level
/// function runs off the end of `user_stack`, which is deliberately left
/// zeroed so that falls through to a fault rather than executing garbage
/// — the process should call `sysstop` instead of returning.
pub const GUARD_RETURN_ADDR: u64 = 0;

/// Build the artificial trap frame for a freshly created process.
///
/// Returns the stack pointer to store as the process's `saved_rsp`, ready
/// to be handed to `context_switch`.
pub fn build_initial_frame(stacks: &mut Stacks, entry: extern "C" fn()) -> u64 {
    let kernel_top = stacks.kernel_stack.as_ptr() as u64 + stacks.kernel_stack.len() as u64;
    let user_top = (stacks.user_stack.as_ptr() as u64 + stacks.user_stack.len() as u64) & !0xF;

    // 19 qwords: 14 GPRs (in `trap_reentry`'s push order, reversed so the
    // pop sequence in `context_switch`'s top half restores them correctly)
    // followed by the 5-qword iretq frame.
    const FRAME_QWORDS: u64 = 19;
    let frame_base = kernel_top - FRAME_QWORDS * 8;
    let frame = frame_base as *mut u64;

    let rflags: u64 = 0x202; // IF set, reserved bit 1 set
    let cs = gdt::user_code_selector().0 as u64;
    let ss = gdt::user_data_selector().0 as u64;

    unsafe {
        // GPRs, low to high address: rcx, rbx, rdi, rsi, rdx, rbp,
        // r8, r9, r10, r11, r12, r13, r14, r15 — all zeroed for a fresh
        // process.
        for i in 0..14u64 {
            frame.add(i as usize).write(0);
        }
        // iretq frame: RIP, CS, RFLAGS, RSP, SS
        frame.add(14).write(entry as usize as u64);
        frame.add(15).write(cs);
        frame.add(16).write(rflags);
        frame.add(17).write(user_top);
        frame.add(18).write(ss);
    }

    frame_base
}

pub fn allocate_stacks(kernel_stack_bytes: usize, user_stack_bytes: usize) -> Stacks {
    Stacks {
        kernel_stack: alloc::vec![0u8; kernel_stack_bytes].into_boxed_slice(),
        user_stack: alloc::vec![0u8; user_stack_bytes].into_boxed_slice(),
    }
}

impl Stacks {
    pub fn kernel_stack_top(&self) -> u64 {
        self.kernel_stack.as_ptr() as u64 + self.kernel_stack.len() as u64
    }
}
