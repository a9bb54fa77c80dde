//! The stable wire contract between user-mode stubs and the dispatcher.
//! Only numeric request codes and the small return-code constants live
//! here; the actual per-call argument layout (which involves raw pointers
//! into user memory) is a `kernel`-crate concern.

pub const REQ_STOP: u64 = 100;
pub const REQ_YIELD: u64 = 101;
pub const REQ_CREATE: u64 = 102;
pub const REQ_GETPID: u64 = 103;
pub const REQ_PUTS: u64 = 104;
pub const REQ_SLEEP: u64 = 105;
pub const REQ_SEND: u64 = 106;
pub const REQ_RECV: u64 = 107;

/// Reserved request codes for a signal subsystem with no kernel-side handler
/// yet. `Request::from_code` maps these to `Request::Unimplemented` so the
/// dispatcher can return `SYSERR` instead of treating a reserved-but-unhandled
/// code as a bug.
pub const REQ_SIG_HANDLER: u64 = 110;
pub const REQ_SIG_KILL: u64 = 111;
pub const REQ_SIG_WAIT: u64 = 112;
pub const REQ_SIG_RETURN: u64 = 113;

pub const SYSERR: i64 = -4;

/// Decoded request kind. Carries no arguments — those are extracted by
/// `kernel` from the register-supplied argument block and passed to the
/// matching `Kernel` method directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Stop,
    Yield,
    Create,
    GetPid,
    Puts,
    Sleep,
    Send,
    Recv,
    Unimplemented,
    Unknown(u64),
}

impl Request {
    pub fn from_code(code: u64) -> Request {
        match code {
            REQ_STOP => Request::Stop,
            REQ_YIELD => Request::Yield,
            REQ_CREATE => Request::Create,
            REQ_GETPID => Request::GetPid,
            REQ_PUTS => Request::Puts,
            REQ_SLEEP => Request::Sleep,
            REQ_SEND => Request::Send,
            REQ_RECV => Request::Recv,
            REQ_SIG_HANDLER | REQ_SIG_KILL | REQ_SIG_WAIT | REQ_SIG_RETURN => {
                Request::Unimplemented
            }
            other => Request::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_codes() {
        assert_eq!(Request::from_code(REQ_SLEEP), Request::Sleep);
        assert_eq!(Request::from_code(REQ_SEND), Request::Send);
    }

    #[test]
    fn signals_are_unimplemented_not_unknown() {
        assert_eq!(Request::from_code(REQ_SIG_KILL), Request::Unimplemented);
    }

    #[test]
    fn garbage_code_is_unknown() {
        assert_eq!(Request::from_code(9999), Request::Unknown(9999));
    }
}
