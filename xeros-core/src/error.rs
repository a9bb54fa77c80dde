//! Kernel-internal error type. Propagated with `?` inside the crate and
//! converted to a negative wire return code only at the syscall dispatch
//! boundary — callers never see a raw integer from deep inside the kernel.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The destination PID does not name a live process.
    BadDest,
    /// Source and destination of an IPC call are the same process.
    Loopback,
    /// Generic IPC failure: deadlock detected, or peer died while blocked.
    Ipc,
    /// No free process table slot.
    NoFreeSlot,
    /// Allocator handed back nothing.
    OutOfMemory,
    /// Request code is reserved but has no kernel-side handler.
    NotImplemented,
}

impl KernelError {
    /// The stable wire return code for this error, per the syscall ABI.
    pub const fn code(self) -> i64 {
        match self {
            KernelError::BadDest => -1,
            KernelError::Loopback => -2,
            KernelError::Ipc => -3,
            KernelError::NotImplemented => -4,
            KernelError::NoFreeSlot => -5,
            KernelError::OutOfMemory => -6,
        }
    }
}
