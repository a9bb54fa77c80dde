#![cfg_attr(not(test), no_std)]

//! Hardware-free core of the kernel: process table, ready/sleep/IPC queues,
//! and syscall routing. Nothing in this crate touches a register, a port, or
//! an interrupt vector — that is `kernel`'s job. This crate exists so the
//! scheduling and IPC logic can be exercised with `cargo test` instead of a
//! full boot.

extern crate alloc;

pub mod config;
pub mod error;
pub mod kernel;
pub mod pcb;
pub mod sleep;
pub mod syscall;

pub use error::KernelError;
pub use kernel::Kernel;
pub use pcb::{Pcb, Pid, ProcState};
