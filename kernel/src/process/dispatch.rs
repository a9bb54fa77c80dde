//! The dispatcher loop: pull the next runnable process, resume it through
//! the trap gate, decode what it asked for, route to the matching handler.

use xeros_core::kernel::{RecvOutcome, SendOutcome};
use xeros_core::syscall::{Request, SYSERR};
use xeros_core::{KernelError, Pid, ProcState};

use super::context::{context_switch, last_trap_args_ptr, last_trap_request};
use super::factory::{allocate_stacks, build_initial_frame};
use super::table::{ProcessRuntime, SCHED};
use crate::interrupts::gdt;

/// Per-request argument blocks, decoded from the raw pointer the trap left
/// in RDX. One union slot per request code — the typed replacement for the
/// original's variadic argument block.
#[repr(C)]
#[derive(Clone, Copy)]
pub union SyscallArgs {
    pub create: CreateArgs,
    pub sleep: SleepArgs,
    pub send: SendArgs,
    pub recv: RecvArgs,
    pub puts: PutsArgs,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CreateArgs {
    pub entry: u64,
    pub stack_bytes: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct SleepArgs {
    pub ms: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct SendArgs {
    pub dest_pid: u32,
    pub buf: u64,
    pub len: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RecvArgs {
    pub from_pid: u64,
    pub buf: u64,
    pub len: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct PutsArgs {
    pub ptr: u64,
    pub len: u32,
}

const DEFAULT_KERNEL_STACK_BYTES: usize = 4096 * 4;

/// Spawn the first process (the one loaded alongside the kernel image) and
/// enter the dispatcher loop. Never returns.
pub fn run(init_entry: extern "C" fn()) -> ! {
    spawn(init_entry, xeros_core::config::DEFAULT_STACK_BYTES).expect("failed to create init process");

    loop {
        let pid = { SCHED.lock().core.next() };

        if pid == xeros_core::config::IDLE_PID {
            x86_64::instructions::interrupts::enable_and_hlt();
            continue;
        }

        let saved_rsp = {
            let sched = SCHED.lock();
            sched.runtime.get(&pid).map(|r| r.saved_rsp)
        };
        let Some(saved_rsp) = saved_rsp else {
            // Process table and runtime map disagree; drop it and move on.
            continue;
        };

        let kernel_top = { SCHED.lock().runtime.get(&pid).map(|r| r.stacks.kernel_stack_top()) };
        if let Some(top) = kernel_top {
            gdt::set_tss_rsp0(top);
        }

        let new_rsp = unsafe { context_switch(saved_rsp) };
        {
            let mut sched = SCHED.lock();
            if let Some(rt) = sched.runtime.get_mut(&pid) {
                rt.saved_rsp = new_rsp;
            }
        }

        let request = last_trap_request();
        let args_ptr = last_trap_args_ptr();
        handle_trap(pid, request, args_ptr);
    }
}

pub fn spawn(entry: extern "C" fn(), stack_bytes: usize) -> Result<Pid, KernelError> {
    let mut sched = SCHED.lock();
    let pid = sched.core.create()?;

    let kernel_stack_bytes = DEFAULT_KERNEL_STACK_BYTES;
    let mut stacks = allocate_stacks(kernel_stack_bytes, stack_bytes);
    let saved_rsp = build_initial_frame(&mut stacks, entry);

    sched.runtime.insert(pid, ProcessRuntime { stacks, saved_rsp });
    sched.core.ready(pid);
    Ok(pid)
}

fn handle_trap(pid: Pid, request_code: u64, args_ptr: u64) {
    let request = Request::from_code(request_code);
    let args = if args_ptr != 0 {
        Some(unsafe { *(args_ptr as *const SyscallArgs) })
    } else {
        None
    };

    let mut sched = SCHED.lock();

    match request {
        Request::Stop => {
            let _ = sched.core.stop(pid);
            sched.runtime.remove(&pid);
            return; // no PCB left to requeue
        }
        Request::Yield => {
            set_return(&mut sched.core, pid, 0);
        }
        Request::GetPid => {
            set_return(&mut sched.core, pid, pid as i64);
        }
        Request::Puts => {
            if let Some(a) = args.map(|a| unsafe { a.puts }) {
                let slice = unsafe {
                    core::slice::from_raw_parts(a.ptr as *const u8, a.len as usize)
                };
                if let Ok(s) = core::str::from_utf8(slice) {
                    crate::print!("{}", s);
                }
            }
            set_return(&mut sched.core, pid, 0);
        }
        Request::Sleep => {
            let ms = args.map(|a| unsafe { a.sleep.ms }).unwrap_or(0);
            sched.core.sleep(pid, ms);
            // `return_code` is set later by `wake`/`wake_early`; the
            // process is already parked off the ready queue by `sleep`.
            return;
        }
        Request::Send => {
            if let Some(a) = args.map(|a| unsafe { a.send }) {
                let buf = unsafe {
                    core::slice::from_raw_parts(a.buf as *const u8, a.len as usize)
                };
                match sched.core.send(pid, a.dest_pid, buf) {
                    Ok(SendOutcome::Delivered(_)) => {}
                    Ok(SendOutcome::Blocked) => return,
                    Err(e) => set_return(&mut sched.core, pid, e.code()),
                }
            }
        }
        Request::Recv => {
            if let Some(a) = args.map(|a| unsafe { a.recv }) {
                let from_filter = if a.from_pid != 0 {
                    Some(unsafe { *(a.from_pid as *const u32) })
                } else {
                    None
                };
                match sched.core.recv(pid, from_filter, a.len as usize) {
                    Ok(RecvOutcome::Received { from, data }) => {
                        let dest = unsafe {
                            core::slice::from_raw_parts_mut(a.buf as *mut u8, data.len())
                        };
                        dest.copy_from_slice(&data);
                        if a.from_pid != 0 {
                            unsafe { *(a.from_pid as *mut u32) = from };
                        }
                    }
                    Ok(RecvOutcome::Blocked) => return,
                    Err(e) => set_return(&mut sched.core, pid, e.code()),
                }
            }
        }
        Request::Create => {
            // Dropping the scheduler lock before `spawn()` re-acquires it.
            // `sched` is moved here, so this arm must requeue and return on
            // its own rather than falling through to the shared call below.
            drop(sched);
            let result = args
                .map(|a| unsafe { a.create })
                .ok_or(KernelError::NoFreeSlot)
                .and_then(|a| {
                    let entry: extern "C" fn() = unsafe { core::mem::transmute(a.entry as usize) };
                    spawn(entry, a.stack_bytes as usize)
                });
            let mut sched = SCHED.lock();
            match result {
                Ok(new_pid) => set_return(&mut sched.core, pid, new_pid as i64),
                Err(e) => set_return(&mut sched.core, pid, e.code()),
            }
            requeue_if_ready(&mut sched.core, pid);
            return;
        }
        Request::Unimplemented | Request::Unknown(_) => {
            set_return(&mut sched.core, pid, SYSERR);
        }
    }

    requeue_if_ready(&mut sched.core, pid);
}

fn set_return(core: &mut xeros_core::Kernel, pid: Pid, value: i64) {
    core.set_return_code(pid, value);
}

fn requeue_if_ready(core: &mut xeros_core::Kernel, pid: Pid) {
    if core.state(pid) != Some(ProcState::Stopped) {
        core.ready(pid);
    }
}

pub fn on_timer_tick() {
    let mut sched = SCHED.lock();
    if sched.core.tick() {
        sched.core.wake();
    }
}
