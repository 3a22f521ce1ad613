//! MMIO dispatcher: routes `$C000-$C0FF` accesses to soft switches and
//! device registers, and owns every device's lazy `sync`.
//!
//! Grounded on `clem_mmio_defs.h`'s `CLEM_MMIO_REG_*` register map and
//! `clem_device.h`'s per-device `read_switch`/`write_switch`/`glu_sync`
//! entry points: devices are touched only when their registers are
//! addressed, plus a periodic catch-up `sync` call from the machine loop, so
//! this crate never eagerly advances a device every CPU cycle.

use crate::devices::{adb::Adb, gameport::Gameport, iwm::Iwm, rtc::Rtc, scc::Scc, sound::Sound, timers::Timers, vgc::Vgc};
use crate::devices::{irq, AccessFlags, Device};
use crate::disk::DriveBay;
use crate::page_map::PageMap;
use crate::softswitch::SoftSwitches;

/// Registers below this offset affect address translation directly (bank
/// selection, language card, shadowing) rather than belonging to a device.
const STATE_REGISTER_MAX: u8 = 0x3F;

mod state_reg {
    pub const KEYB_STROBE: u8 = 0x10;
    pub const RAMRD_OFF: u8 = 0x02;
    pub const RAMRD_ON: u8 = 0x03;
    pub const RAMWRT_OFF: u8 = 0x04;
    pub const RAMWRT_ON: u8 = 0x05;
    pub const ALTZP_OFF: u8 = 0x08;
    pub const ALTZP_ON: u8 = 0x09;
    pub const CXROM_OFF: u8 = 0x06;
    pub const CXROM_ON: u8 = 0x07;
    pub const C3ROM_OFF: u8 = 0x0A;
    pub const C3ROM_ON: u8 = 0x0B;
    pub const SHADOW: u8 = 0x35;
    pub const SPEED: u8 = 0x36;
    pub const LC_BASE: u8 = 0x80;
    pub const LC_TOP: u8 = 0x8F;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastLcAccess {
    None,
    Read(u8),
}

pub struct Mmio {
    pub switches: SoftSwitches,
    pub page_map: PageMap,
    pub rtc: Rtc,
    pub timers: Timers,
    pub vgc: Vgc,
    pub adb: Adb,
    pub sound: Sound,
    pub iwm: Iwm,
    pub scc: Scc,
    pub gameport: Gameport,
    pub drives: DriveBay,
    pending_irq: u32,
    last_lc_access: LastLcAccess,
}

impl Mmio {
    pub fn new(fpi_bank_count: usize, rom_bank_count: usize) -> Self {
        Self {
            switches: SoftSwitches::new(),
            page_map: PageMap::new(fpi_bank_count, rom_bank_count),
            rtc: Rtc::new(),
            timers: Timers::new(),
            vgc: Vgc::new(),
            adb: Adb::new(),
            sound: Sound::new(),
            iwm: Iwm::new(),
            scc: Scc::new(),
            gameport: Gameport::new(),
            drives: DriveBay::new(),
            pending_irq: 0,
            last_lc_access: LastLcAccess::None,
        }
    }

    pub fn reset(&mut self) {
        self.switches.reset();
        self.rtc.reset();
        self.timers.reset();
        self.vgc.reset();
        self.adb.reset();
        self.sound.reset();
        self.iwm.reset(&mut self.drives);
        self.scc.reset();
        self.gameport.reset();
        self.pending_irq = 0;
        self.last_lc_access = LastLcAccess::None;
        self.page_map.rebuild(&self.switches);
    }

    pub fn irq_line(&self) -> u32 {
        self.pending_irq
    }

    /// Clears the named IRQ source bits, e.g. once the CPU has vectored to
    /// the interrupt handler for them.
    pub fn ack_irq(&mut self, mask: u32) {
        self.pending_irq &= !mask;
    }

    /// Periodic catch-up tick plus whatever a just-touched device already
    /// folded in via [`Self::read`]/[`Self::write`].
    pub fn sync(&mut self, delta_us: u32) {
        self.pending_irq |= self.rtc.sync(delta_us);
        self.pending_irq |= self.timers.sync(delta_us);
        self.pending_irq |= self.vgc.sync(delta_us);
        self.pending_irq |= self.adb.sync(delta_us);
        self.pending_irq |= self.sound.sync(delta_us);
        self.pending_irq |= self.iwm.sync(&mut self.drives, delta_us);
        self.pending_irq |= self.scc.sync(delta_us);
        self.pending_irq |= self.gameport.sync(delta_us);
    }

    pub fn read(&mut self, ioreg: u8, flags: AccessFlags) -> u8 {
        if ioreg <= STATE_REGISTER_MAX {
            return self.read_state_register(ioreg, flags);
        }
        if (state_reg::LC_BASE..=state_reg::LC_TOP).contains(&ioreg) {
            return self.read_lc_switch(ioreg, flags);
        }
        match ioreg {
            0x40..=0x4F => self.timers.read_switch(ioreg - 0x40, flags),
            0x50..=0x5F => self.vgc.read_switch(ioreg, flags),
            0x60..=0x67 => self.adb.read_switch(ioreg, flags),
            0x68..=0x6F => self.gameport.read_switch(ioreg, flags),
            0x70..=0x7F => self.gameport.read_switch(ioreg, flags),
            0x80..=0x8F => 0,
            0x90..=0x9F => self.rtc.read_switch(ioreg - 0x90, flags),
            0xA0..=0xAF => self.scc.read_switch(ioreg, flags),
            0xB0..=0xBF => self.sound.read_switch(ioreg, flags),
            0xE0..=0xEF => self.iwm.read_switch(&mut self.drives, ioreg, flags),
            _ => 0,
        }
    }

    pub fn write(&mut self, ioreg: u8, value: u8) {
        if ioreg <= STATE_REGISTER_MAX {
            self.write_state_register(ioreg, value);
            return;
        }
        if (state_reg::LC_BASE..=state_reg::LC_TOP).contains(&ioreg) {
            self.write_lc_switch(ioreg);
            return;
        }
        match ioreg {
            0x40..=0x4F => self.timers.write_switch(ioreg - 0x40, value),
            0x50..=0x5F => self.vgc.write_switch(ioreg, value),
            0x60..=0x67 => self.adb.write_switch(ioreg, value),
            0x68..=0x7F => self.gameport.write_switch(ioreg, value),
            0x90..=0x9F => self.rtc.write_switch(ioreg - 0x90, value),
            0xA0..=0xAF => self.scc.write_switch(ioreg, value),
            0xB0..=0xBF => self.sound.write_switch(ioreg, value),
            0xE0..=0xEF => self.iwm.write_switch(&mut self.drives, ioreg, value),
            _ => {}
        }
    }

    fn read_state_register(&mut self, ioreg: u8, flags: AccessFlags) -> u8 {
        let value = match ioreg {
            state_reg::KEYB_STROBE => self.adb.read_switch(0x10, flags),
            state_reg::RAMRD_OFF | state_reg::RAMRD_ON => bit7(self.switches.ramrd()),
            state_reg::RAMWRT_OFF | state_reg::RAMWRT_ON => bit7(self.switches.ramwrt()),
            state_reg::CXROM_OFF | state_reg::CXROM_ON => bit7(self.switches.cxrom()),
            state_reg::C3ROM_OFF | state_reg::C3ROM_ON => bit7(self.switches.c3rom()),
            state_reg::ALTZP_OFF | state_reg::ALTZP_ON => bit7(self.switches.altzp()),
            state_reg::SHADOW => 0,
            state_reg::SPEED => bit7(self.switches.fast_mode()),
            _ => self.adb.read_switch(ioreg, flags),
        };
        value
    }

    fn write_state_register(&mut self, ioreg: u8, value: u8) {
        match ioreg {
            state_reg::RAMRD_OFF => self.switches.set_ramrd(false),
            state_reg::RAMRD_ON => self.switches.set_ramrd(true),
            state_reg::RAMWRT_OFF => self.switches.set_ramwrt(false),
            state_reg::RAMWRT_ON => self.switches.set_ramwrt(true),
            state_reg::CXROM_OFF => self.switches.set_cxrom(false),
            state_reg::CXROM_ON => self.switches.set_cxrom(true),
            state_reg::C3ROM_OFF => self.switches.set_c3rom(false),
            state_reg::C3ROM_ON => self.switches.set_c3rom(true),
            state_reg::ALTZP_OFF => self.switches.set_altzp(false),
            state_reg::ALTZP_ON => self.switches.set_altzp(true),
            state_reg::SHADOW => {
                self.switches.set_shadow_text1(value & 0x01 == 0);
                self.switches.set_shadow_text2(value & 0x02 == 0);
                self.switches.set_shadow_hgr1(value & 0x04 == 0);
                self.switches.set_shadow_hgr2(value & 0x08 == 0);
                self.switches.set_shadow_shgr(value & 0x40 == 0);
                self.switches.set_shadow_aux(value & 0x80 != 0);
            }
            state_reg::SPEED => self.switches.set_fast_mode(value & 0x80 != 0),
            state_reg::KEYB_STROBE => self.adb.write_switch(0x10, value),
            _ => self.adb.write_switch(ioreg, value),
        }
        log::trace!("state register write ${:02X}={:02X}, rebuilding page map", ioreg, value);
        self.page_map.rebuild(&self.switches);
    }

    fn read_lc_switch(&mut self, ioreg: u8, flags: AccessFlags) -> u8 {
        let is_read_register = ioreg & 0x01 == 0;
        if is_read_register && !flags.no_op {
            let second_read = self.last_lc_access == LastLcAccess::Read(ioreg);
            self.switches.lc_switch_from_offset(ioreg - state_reg::LC_BASE, second_read);
            self.last_lc_access = LastLcAccess::Read(ioreg);
            log::trace!("language card switch read ${:02X}, rebuilding page map", ioreg);
            self.page_map.rebuild(&self.switches);
        } else if !flags.no_op {
            self.last_lc_access = LastLcAccess::None;
        }
        0
    }

    fn write_lc_switch(&mut self, ioreg: u8) {
        self.switches.lc_switch_from_offset(ioreg - state_reg::LC_BASE, false);
        self.last_lc_access = LastLcAccess::None;
        log::trace!("language card switch write ${:02X}, rebuilding page map", ioreg);
        self.page_map.rebuild(&self.switches);
    }
}

fn bit7(set: bool) -> u8 {
    if set {
        0x80
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramrd_write_rebuilds_page_map() {
        let mut mmio = Mmio::new(2, 16);
        mmio.write(state_reg::RAMRD_ON, 0);
        assert!(mmio.switches.ramrd());
    }

    #[test]
    fn lc_double_read_arms_write_enable() {
        let mut mmio = Mmio::new(2, 16);
        mmio.read(0x80, AccessFlags::NORMAL);
        mmio.read(0x80, AccessFlags::NORMAL);
        assert!(mmio.switches.lc_write_enable());
    }

    #[test]
    fn reset_rebuilds_page_map_with_boot_defaults() {
        let mut mmio = Mmio::new(2, 16);
        mmio.write(state_reg::RAMRD_ON, 0);
        mmio.reset();
        assert!(!mmio.switches.ramrd());
    }

    #[test]
    fn sync_accumulates_device_irqs() {
        let mut mmio = Mmio::new(2, 16);
        mmio.write(0x40, 0x01);
        mmio.sync(1_000_000);
        assert_eq!(mmio.irq_line() & irq::TIMER_RTC_1SEC, irq::TIMER_RTC_1SEC);
    }

    #[test]
    fn ack_irq_clears_requested_bits() {
        let mut mmio = Mmio::new(2, 16);
        mmio.write(0x40, 0x01);
        mmio.sync(1_000_000);
        mmio.ack_irq(irq::TIMER_RTC_1SEC);
        assert_eq!(mmio.irq_line() & irq::TIMER_RTC_1SEC, 0);
    }
}
