//! Kernel-wide constants shared across `xeros-core` and `kernel`, collected
//! in one place rather than scattered as per-module `const` items.

use crate::pcb::Pid;

/// Fixed capacity of the process table.
pub const MAX_PROC: usize = 32;

/// Sentinel PID of the idle process. Never appears in the process table;
/// the dispatcher resumes it directly when the ready queue is empty.
pub const IDLE_PID: Pid = Pid::MAX;

/// Lowest PID ever handed to a real process.
pub const MIN_PID: Pid = 1;

/// One past the highest PID; the allocator wraps back to `MIN_PID` here.
pub const MAX_PID: Pid = 1_000_000;

/// PIT divisor driving the timer tick; one sleep slice is `CLOCK_DIVISOR / 10`
/// milliseconds.
pub const CLOCK_DIVISOR: u32 = 100;

/// Milliseconds per sleep slice (10ms at the divisor above).
pub const SLICE_MS: u32 = CLOCK_DIVISOR / 10;

/// Default user stack size handed out by `create` when the caller does not
/// ask for a specific size.
pub const DEFAULT_STACK_BYTES: usize = 4096 * 4;
