//! Pure arithmetic for the delta-list sleep device. The list itself lives in
//! `kernel::Kernel` since inserting/removing an element means touching both
//! a `VecDeque<Pid>` and the `delta_slice` field on two different PCBs at
//! once — there's no clean way to split "the list" from "the table" here
//! without just re-deriving a PCB-owning structure, so `Kernel` owns both.

use crate::config::SLICE_MS;

/// Convert a requested sleep duration in milliseconds to whole slices,
/// rounding up, with a floor of one slice for any nonzero request.
pub fn ms_to_slices(ms: u32) -> u32 {
    if ms == 0 {
        return 0;
    }
    let slices = (ms + SLICE_MS - 1) / SLICE_MS;
    slices.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        assert_eq!(ms_to_slices(0), 0);
    }

    #[test]
    fn rounds_up() {
        assert_eq!(ms_to_slices(1), 1);
        assert_eq!(ms_to_slices(10), 1);
        assert_eq!(ms_to_slices(11), 2);
        assert_eq!(ms_to_slices(100), 10);
    }
}
