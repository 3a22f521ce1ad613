//! Zilog 8530 SCC serial controller (modem and printer ports).
//!
//! Grounded on `clem_scc_*` in `clem_device.h`. The real 8530 is addressed
//! through four ports (command/data for each of two channels) selected by
//! the low address bits, with an internal register-pointer latch for
//! indirect register access, matching Z8530 conventions generally.

use super::{AccessFlags, Device};

mod reg {
    pub const CHANNEL_B_CMD: u8 = 0x38;
    pub const CHANNEL_A_CMD: u8 = 0x39;
    pub const CHANNEL_B_DATA: u8 = 0x3A;
    pub const CHANNEL_A_DATA: u8 = 0x3B;
}

const REGISTER_COUNT: usize = 16;

#[derive(Debug, Clone, Default)]
struct Channel {
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
    data_out: u8,
}

impl Channel {
    fn write_cmd(&mut self, value: u8) {
        if self.pointer == 0 {
            self.pointer = value & 0x0F;
        } else {
            self.registers[self.pointer as usize] = value;
            self.pointer = 0;
        }
    }

    fn read_cmd(&mut self) -> u8 {
        let value = self.registers[self.pointer as usize];
        self.pointer = 0;
        value
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scc {
    channel_a: Channel,
    channel_b: Channel,
}

impl Scc {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Device for Scc {
    fn reset(&mut self) {
        self.channel_a = Channel::default();
        self.channel_b = Channel::default();
    }

    fn read_switch(&mut self, ioreg: u8, _flags: AccessFlags) -> u8 {
        match ioreg {
            reg::CHANNEL_A_CMD => self.channel_a.read_cmd(),
            reg::CHANNEL_B_CMD => self.channel_b.read_cmd(),
            reg::CHANNEL_A_DATA => self.channel_a.data_out,
            reg::CHANNEL_B_DATA => self.channel_b.data_out,
            _ => 0,
        }
    }

    fn write_switch(&mut self, ioreg: u8, value: u8) {
        match ioreg {
            reg::CHANNEL_A_CMD => self.channel_a.write_cmd(value),
            reg::CHANNEL_B_CMD => self.channel_b.write_cmd(value),
            reg::CHANNEL_A_DATA => self.channel_a.data_out = value,
            reg::CHANNEL_B_DATA => self.channel_b.data_out = value,
            _ => {}
        }
    }

    fn sync(&mut self, _delta_us: u32) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_pointer_latch_then_write() {
        let mut scc = Scc::new();
        scc.write_switch(reg::CHANNEL_A_CMD, 0x04);
        scc.write_switch(reg::CHANNEL_A_CMD, 0x55);
        assert_eq!(scc.channel_a.registers[4], 0x55);
    }

    #[test]
    fn channels_are_independent() {
        let mut scc = Scc::new();
        scc.write_switch(reg::CHANNEL_A_DATA, 0x11);
        scc.write_switch(reg::CHANNEL_B_DATA, 0x22);
        assert_eq!(scc.read_switch(reg::CHANNEL_A_DATA, AccessFlags::NORMAL), 0x11);
        assert_eq!(scc.read_switch(reg::CHANNEL_B_DATA, AccessFlags::NORMAL), 0x22);
    }

    #[test]
    fn reset_clears_registers() {
        let mut scc = Scc::new();
        scc.write_switch(reg::CHANNEL_A_CMD, 0x04);
        scc.write_switch(reg::CHANNEL_A_CMD, 0x55);
        scc.reset();
        scc.write_switch(reg::CHANNEL_A_CMD, 0x04);
        assert_eq!(scc.read_switch(reg::CHANNEL_A_CMD, AccessFlags::NORMAL), 0);
    }
}
