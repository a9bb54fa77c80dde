//! Programs the 8253/8254 PIT (channel 0) to fire at the sleep device's
//! slice rate, derived from `xeros_core::config::CLOCK_DIVISOR` — the same
//! constant name the original kernel used for this exact purpose.

use x86_64::instructions::port::Port;

const PIT_FREQUENCY_HZ: u32 = 1_193_182;

pub fn init() {
    let target_hz = 1000 / xeros_core::config::SLICE_MS.max(1);
    let divisor = (PIT_FREQUENCY_HZ / target_hz).clamp(1, u16::MAX as u32) as u16;

    let mut command: Port<u8> = Port::new(0x43);
    let mut channel0: Port<u8> = Port::new(0x40);
    unsafe {
        command.write(0x36); // channel 0, lobyte/hibyte, mode 3 (square wave)
        channel0.write((divisor & 0xFF) as u8);
        channel0.write((divisor >> 8) as u8);
    }
}
