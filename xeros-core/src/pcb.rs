use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// Process identifier. Zero is reserved, `Pid::MAX` names the idle process.
pub type Pid = u32;

/// Process state machine. A PCB's state determines which single queue (if
/// any) it lives in; `kernel::Kernel`'s methods are responsible for keeping
/// the two in sync rather than deriving one from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Ready,
    Sleep,
    BlockedOnSend,
    BlockedOnRecv,
    Stopped,
}

/// A message a blocked sender is holding until a matching receiver arrives.
/// Captured at block time because the core crate has no notion of "user
/// stack memory" to read from later — the hardware-facing `kernel` crate
/// hands over an owned copy when it blocks a sender.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub dest: Pid,
    pub data: Vec<u8>,
}

/// What a blocked receiver is waiting for.
#[derive(Debug, Clone, Copy)]
pub struct PendingRecv {
    pub from_filter: Option<Pid>,
    pub capacity: usize,
}

/// Process control block. Carries every piece of state the core logic needs;
/// the live register context and owned stacks live alongside this, keyed by
/// the same `Pid`, in the `kernel` crate's `process::table::ProcessRuntime`,
/// since only `kernel` touches those from assembly.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub pid: Pid,
    pub state: ProcState,

    /// Value the next resume of this process will see as its syscall return.
    pub return_code: i64,

    /// Slices until this process fires, relative to its predecessor in the
    /// sleep list. Meaningful only while `state == Sleep`.
    pub delta_slice: u32,

    /// Processes blocked trying to send to this one.
    pub blocked_senders: VecDeque<Pid>,
    /// Processes blocked trying to receive from this one.
    pub blocked_receivers: VecDeque<Pid>,

    pub pending_send: Option<PendingSend>,
    pub pending_recv: Option<PendingRecv>,
}

impl Pcb {
    pub fn new(pid: Pid) -> Self {
        Pcb {
            pid,
            state: ProcState::Ready,
            return_code: 0,
            delta_slice: 0,
            blocked_senders: VecDeque::new(),
            blocked_receivers: VecDeque::new(),
            pending_send: None,
            pending_recv: None,
        }
    }
}
