//! Per-process hardware-facing state that has no place in `xeros_core::Pcb`:
//! the owned stacks and the saved kernel-stack pointer `context_switch`
//! resumes from. Keyed by `Pid` alongside the logical `xeros_core::Kernel`.

use alloc::collections::BTreeMap;
use lazy_static::lazy_static;
use spin::Mutex;
use xeros_core::{Kernel, Pid};

use super::factory::Stacks;

pub struct ProcessRuntime {
    pub stacks: Stacks,
    pub saved_rsp: u64,
}

pub struct Scheduler {
    pub core: Kernel,
    pub runtime: BTreeMap<Pid, ProcessRuntime>,
}

impl Scheduler {
    fn new() -> Self {
        Scheduler {
            core: Kernel::new(),
            runtime: BTreeMap::new(),
        }
    }
}

lazy_static! {
    pub static ref SCHED: Mutex<Scheduler> = Mutex::new(Scheduler::new());
}
