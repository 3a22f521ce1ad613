//! Soft-switch state: every bit driven by a write to `$C000-$C0FF` that
//! affects address translation, shadowing, or machine speed.
//!
//! Kept as a flat struct of named booleans/fields rather than a single
//! packed register, since each switch is read back from a distinct memory
//! location (and several are write-only or read-only) in the real machine's
//! `$C000-$C06F` "state register" space.

#[derive(Debug, Clone)]
pub struct SoftSwitches {
    // Main/aux bank selection ($C000-$C00F area).
    altzp: bool,
    ramrd: bool,
    ramwrt: bool,

    // ROM routing ($C006/$C007, $C00A/$C00B).
    cxrom: bool,
    c3rom: bool,

    // Language card ($C080-$C08F).
    lc_read_ram: bool,
    lc_write_enable: bool,
    lc_bank2: bool,

    // Bank-0 I/O + language card enable ($C068 SHADOW bit 6 / STATEREG).
    io_lc_enabled: bool,

    // Shadow register ($C035).
    shadow_text1: bool,
    shadow_text2: bool,
    shadow_hgr1: bool,
    shadow_hgr2: bool,
    shadow_shgr: bool,
    shadow_aux: bool,

    // Speed register ($C036).
    fast_mode: bool,

    // New video register ($C029).
    new_video: bool,
}

impl SoftSwitches {
    pub fn new() -> Self {
        Self {
            altzp: false,
            ramrd: false,
            ramwrt: false,
            cxrom: false,
            c3rom: false,
            lc_read_ram: false,
            lc_write_enable: false,
            lc_bank2: true,
            io_lc_enabled: true,
            shadow_text1: true,
            shadow_text2: true,
            shadow_hgr1: true,
            shadow_hgr2: true,
            shadow_shgr: true,
            shadow_aux: false,
            fast_mode: true,
            new_video: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn altzp(&self) -> bool {
        self.altzp
    }
    pub fn set_altzp(&mut self, v: bool) {
        self.altzp = v;
    }

    pub fn ramrd(&self) -> bool {
        self.ramrd
    }
    pub fn set_ramrd(&mut self, v: bool) {
        self.ramrd = v;
    }

    pub fn ramwrt(&self) -> bool {
        self.ramwrt
    }
    pub fn set_ramwrt(&mut self, v: bool) {
        self.ramwrt = v;
    }

    pub fn cxrom(&self) -> bool {
        self.cxrom
    }
    pub fn set_cxrom(&mut self, v: bool) {
        self.cxrom = v;
    }

    pub fn c3rom(&self) -> bool {
        self.c3rom
    }
    pub fn set_c3rom(&mut self, v: bool) {
        self.c3rom = v;
    }

    pub fn lc_read_ram(&self) -> bool {
        self.lc_read_ram
    }
    pub fn set_lc_read_ram(&mut self, v: bool) {
        self.lc_read_ram = v;
    }

    pub fn lc_write_enable(&self) -> bool {
        self.lc_write_enable
    }
    pub fn set_lc_write_enable(&mut self, v: bool) {
        self.lc_write_enable = v;
    }

    pub fn lc_bank2(&self) -> bool {
        self.lc_bank2
    }
    pub fn set_lc_bank2(&mut self, v: bool) {
        self.lc_bank2 = v;
    }

    pub fn io_lc_enabled(&self) -> bool {
        self.io_lc_enabled
    }
    pub fn set_io_lc_enabled(&mut self, v: bool) {
        self.io_lc_enabled = v;
    }

    pub fn shadow_text1(&self) -> bool {
        self.shadow_text1
    }
    pub fn set_shadow_text1(&mut self, v: bool) {
        self.shadow_text1 = v;
    }
    pub fn shadow_text2(&self) -> bool {
        self.shadow_text2
    }
    pub fn set_shadow_text2(&mut self, v: bool) {
        self.shadow_text2 = v;
    }
    pub fn shadow_hgr1(&self) -> bool {
        self.shadow_hgr1
    }
    pub fn set_shadow_hgr1(&mut self, v: bool) {
        self.shadow_hgr1 = v;
    }
    pub fn shadow_hgr2(&self) -> bool {
        self.shadow_hgr2
    }
    pub fn set_shadow_hgr2(&mut self, v: bool) {
        self.shadow_hgr2 = v;
    }
    pub fn shadow_shgr(&self) -> bool {
        self.shadow_shgr
    }
    pub fn set_shadow_shgr(&mut self, v: bool) {
        self.shadow_shgr = v;
    }
    pub fn shadow_aux(&self) -> bool {
        self.shadow_aux
    }
    pub fn set_shadow_aux(&mut self, v: bool) {
        self.shadow_aux = v;
    }

    pub fn fast_mode(&self) -> bool {
        self.fast_mode
    }
    pub fn set_fast_mode(&mut self, v: bool) {
        self.fast_mode = v;
    }

    pub fn new_video(&self) -> bool {
        self.new_video
    }
    pub fn set_new_video(&mut self, v: bool) {
        self.new_video = v;
    }

    /// Applies a write to `$C080-$C08F` (the four-register language-card
    /// bank-switch state machine), per `CLEM_MMIO_REG_LC1_*`/`LC2_*` in the
    /// original. Pre-boot reads of $C080-$C08F also toggle write-enable in
    /// the real hardware (two consecutive reads of the same "read" register
    /// arm write-enable); that two-read latch is handled by the MMIO
    /// dispatcher, which calls [`Self::lc_switch_from_offset`] once per access.
    pub fn lc_switch_from_offset(&mut self, offset: u8, second_read_of_same_switch: bool) {
        let bank2 = offset & 0x08 == 0;
        let low = offset & 0x03;
        self.lc_bank2 = bank2;
        match low {
            0x00 => {
                self.lc_read_ram = true;
                if second_read_of_same_switch {
                    self.lc_write_enable = true;
                } else {
                    self.lc_write_enable = false;
                }
            }
            0x01 => {
                self.lc_read_ram = false;
                self.lc_write_enable = true;
            }
            0x02 => {
                self.lc_read_ram = false;
                self.lc_write_enable = false;
            }
            0x03 => {
                self.lc_read_ram = true;
                self.lc_write_enable = true;
            }
            _ => unreachable!(),
        }
    }
}

impl Default for SoftSwitches {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_boot_with_rom_and_shadowing_on() {
        let s = SoftSwitches::new();
        assert!(!s.lc_read_ram());
        assert!(s.shadow_text1());
        assert!(s.io_lc_enabled());
    }

    #[test]
    fn lc_switch_r1_bank1_selects_rom_write_protect() {
        let mut s = SoftSwitches::new();
        s.lc_switch_from_offset(0x0A, false); // bank 1, offset&3==2 -> ROM read, write protect... actually 0x0A&3=2
        assert!(!s.lc_read_ram());
        assert!(!s.lc_write_enable());
    }

    #[test]
    fn lc_switch_double_read_arms_write_enable() {
        let mut s = SoftSwitches::new();
        s.lc_switch_from_offset(0x08, false);
        assert!(s.lc_read_ram());
        assert!(!s.lc_write_enable());
        s.lc_switch_from_offset(0x08, true);
        assert!(s.lc_write_enable());
    }

    #[test]
    fn reset_restores_boot_defaults() {
        let mut s = SoftSwitches::new();
        s.set_altzp(true);
        s.set_cxrom(true);
        s.reset();
        assert!(!s.altzp());
        assert!(!s.cxrom());
    }
}
