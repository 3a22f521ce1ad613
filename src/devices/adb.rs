//! Apple Desktop Bus GLU: keyboard and mouse input, as seen by the 65816
//! through the Mega2 MMIO window.
//!
//! Grounded on `clem_adb_*` in `clem_device.h`: input arrives as host events
//! (`clem_adb_device_input`), is queued, and is drained through a small set
//! of MMIO registers rather than being visible to the CPU all at once. Mouse
//! deltas and keyboard scan codes use separate register pairs, matching the
//! real GLU's split between `$C000` (keyboard data/strobe) and the ADB
//! command/mouse registers in the `$C024-$C027` range.

use std::collections::VecDeque;

use super::{irq, AccessFlags, Device};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(u8),
    KeyUp(u8),
    MouseMove { dx: i8, dy: i8 },
    MouseButton { down: bool },
}

mod reg {
    /// Keyboard data; bit 7 set means a key is waiting, low 7 bits are the
    /// Apple II scan code.
    pub const KEYB_DATA: u8 = 0x00;
    /// Any access clears the keyboard strobe (`$C010` AKD/keyboard-strobe).
    pub const KEYB_STROBE: u8 = 0x10;
    pub const BTN0: u8 = 0x61;
    pub const BTN1: u8 = 0x62;
    pub const MOUSE_DX: u8 = 0x66;
    pub const MOUSE_DY: u8 = 0x67;
}

const MAX_QUEUED_EVENTS: usize = 16;

#[derive(Debug, Clone)]
pub struct Adb {
    key_queue: VecDeque<u8>,
    last_key: u8,
    key_strobe: bool,
    mouse_dx: i8,
    mouse_dy: i8,
    mouse_button_down: bool,
    mouse_moved: bool,
    keyboard_enabled: bool,
}

impl Adb {
    pub fn new() -> Self {
        Self {
            key_queue: VecDeque::new(),
            last_key: 0,
            key_strobe: false,
            mouse_dx: 0,
            mouse_dy: 0,
            mouse_button_down: false,
            mouse_moved: false,
            keyboard_enabled: true,
        }
    }

    /// Queues a host input event (`clem_adb_device_input`).
    pub fn device_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(code) => {
                if self.key_queue.len() < MAX_QUEUED_EVENTS {
                    self.key_queue.push_back(code);
                }
            }
            InputEvent::KeyUp(_) => {}
            InputEvent::MouseMove { dx, dy } => {
                self.mouse_dx = self.mouse_dx.saturating_add(dx);
                self.mouse_dy = self.mouse_dy.saturating_add(dy);
                self.mouse_moved = true;
            }
            InputEvent::MouseButton { down } => self.mouse_button_down = down,
        }
    }

    /// Enables or disables keyboard scanning (`clem_adb_device_key_toggle`).
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    fn pump_keyboard(&mut self) {
        if !self.key_strobe && self.keyboard_enabled {
            if let Some(code) = self.key_queue.pop_front() {
                self.last_key = code;
                self.key_strobe = true;
            }
        }
    }
}

impl Default for Adb {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for Adb {
    fn reset(&mut self) {
        self.key_queue.clear();
        self.last_key = 0;
        self.key_strobe = false;
        self.mouse_dx = 0;
        self.mouse_dy = 0;
        self.mouse_moved = false;
    }

    fn read_switch(&mut self, ioreg: u8, flags: AccessFlags) -> u8 {
        match ioreg {
            reg::KEYB_DATA => {
                let value = (if self.key_strobe { 0x80 } else { 0 }) | (self.last_key & 0x7F);
                if !flags.no_op {
                    self.key_strobe = false;
                }
                value
            }
            reg::KEYB_STROBE => {
                if !flags.no_op {
                    self.key_strobe = false;
                }
                0
            }
            reg::BTN0 | reg::BTN1 => {
                if self.mouse_button_down {
                    0x80
                } else {
                    0
                }
            }
            reg::MOUSE_DX => self.mouse_dx as u8,
            reg::MOUSE_DY => self.mouse_dy as u8,
            _ => 0,
        }
    }

    fn write_switch(&mut self, ioreg: u8, _value: u8) {
        if ioreg == reg::KEYB_STROBE {
            self.key_strobe = false;
        }
    }

    fn sync(&mut self, _delta_us: u32) -> u32 {
        self.pump_keyboard();
        let mut fired = 0;
        if self.key_strobe {
            fired |= irq::ADB_KEYB_SRQ;
        }
        if self.mouse_moved {
            self.mouse_moved = false;
            fired |= irq::ADB_MOUSE;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_key_is_delivered_on_sync() {
        let mut adb = Adb::new();
        adb.device_input(InputEvent::KeyDown(0x41));
        let fired = adb.sync(0);
        assert_eq!(fired, irq::ADB_KEYB_SRQ);
        assert_eq!(adb.read_switch(reg::KEYB_DATA, AccessFlags::NORMAL), 0xC1);
    }

    #[test]
    fn reading_keyboard_data_clears_strobe() {
        let mut adb = Adb::new();
        adb.device_input(InputEvent::KeyDown(0x41));
        adb.sync(0);
        adb.read_switch(reg::KEYB_DATA, AccessFlags::NORMAL);
        assert_eq!(adb.read_switch(reg::KEYB_DATA, AccessFlags::NORMAL) & 0x80, 0);
    }

    #[test]
    fn mouse_move_accumulates_and_fires_irq() {
        let mut adb = Adb::new();
        adb.device_input(InputEvent::MouseMove { dx: 3, dy: -2 });
        let fired = adb.sync(0);
        assert_eq!(fired, irq::ADB_MOUSE);
        assert_eq!(adb.read_switch(reg::MOUSE_DX, AccessFlags::NORMAL), 3);
        assert_eq!(adb.read_switch(reg::MOUSE_DY, AccessFlags::NORMAL) as i8, -2);
    }

    #[test]
    fn mouse_button_reflected_immediately() {
        let mut adb = Adb::new();
        adb.device_input(InputEvent::MouseButton { down: true });
        assert_eq!(adb.read_switch(reg::BTN0, AccessFlags::NORMAL), 0x80);
    }

    #[test]
    fn disabled_keyboard_never_strobes() {
        let mut adb = Adb::new();
        adb.set_keyboard_enabled(false);
        adb.device_input(InputEvent::KeyDown(0x20));
        adb.sync(0);
        assert_eq!(adb.read_switch(reg::KEYB_DATA, AccessFlags::NORMAL) & 0x80, 0);
    }
}
