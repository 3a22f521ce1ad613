//! Page-granularity address translation.
//!
//! Each of the 256 banks is split into 256 pages of 256 bytes. A
//! [`PageInfo`] names the backing store for a page plus flags controlling
//! whether it's writable or redirects to MMIO. The map is rebuilt in bulk
//! whenever a soft switch that affects addressing changes — never
//! recomputed per access — mirroring `clem_mmio_create_page_mapping` in the
//! original.

use crate::softswitch::SoftSwitches;

/// Per-page behavior flags, carried over from `CLEM_MMIO_PAGE_*` in the
/// original `clem_mmio_defs.h` under this crate's own names. A small
/// hand-rolled bitset rather than a `bitflags` dependency, since there are
/// only two bits worth tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageFlags(u8);

impl PageFlags {
    pub const WRITE_OK: PageFlags = PageFlags(0x01);
    pub const IO_ADDR: PageFlags = PageFlags(0x02);

    pub const fn empty() -> Self {
        PageFlags(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for PageFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        PageFlags(self.0 | rhs.0)
    }
}

/// The $D000-$DFFF language-card bank selector, when a page targets LC space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcBank {
    One,
    Two,
}

/// Where a page's bytes actually live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTarget {
    /// FPI RAM, indexed by its own bank number (not necessarily the CPU bank).
    Fpi { bank: u8 },
    /// Mega2 RAM bank 0 (`$E0`) or 1 (`$E1`).
    Mega2 { bank: u8 },
    /// ROM, indexed by bank relative to the start of the ROM image.
    Rom { bank: usize },
    /// Language-card RAM at `$D000-$DFFF`, bank-switched between two 4KiB banks.
    LcBanked { aux: bool, bank: LcBank },
    /// Language-card RAM at `$E000-$FFFF`, shared between both LC banks.
    LcCommon { aux: bool },
    /// MMIO register space (`$C000`-`$C0FF` and the slot I/O windows).
    Io,
    /// No backing store; reads return open-bus-like zero, writes are dropped.
    Unmapped,
}

#[derive(Debug, Clone, Copy)]
pub struct PageInfo {
    pub target: PageTarget,
    pub flags: PageFlags,
    /// Set when a write to this page must also be mirrored into Mega2 RAM
    /// for video visibility (the shadow register controls).
    pub shadow_mega2_bank: Option<u8>,
    /// Set when RAMWRT selects a different FPI bank for writes than RAMRD
    /// selects for reads to this same page.
    pub write_fpi_bank: Option<u8>,
}

impl PageInfo {
    fn unmapped() -> Self {
        Self { target: PageTarget::Unmapped, flags: PageFlags::empty(), shadow_mega2_bank: None, write_fpi_bank: None }
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(PageFlags::WRITE_OK)
    }

    pub fn is_io(&self) -> bool {
        self.flags.contains(PageFlags::IO_ADDR)
    }
}

const PAGES_PER_BANK: usize = 256;

/// The full 256-bank x 256-page translation table.
pub struct PageMap {
    pages: Vec<PageInfo>,
    fpi_bank_count: usize,
    rom_bank_count: usize,
}

impl PageMap {
    pub fn new(fpi_bank_count: usize, rom_bank_count: usize) -> Self {
        let mut map = Self {
            pages: vec![PageInfo::unmapped(); 256 * PAGES_PER_BANK],
            fpi_bank_count,
            rom_bank_count,
        };
        map.rebuild(&SoftSwitches::new());
        map
    }

    #[inline]
    fn index(bank: u8, page: u8) -> usize {
        (bank as usize) * PAGES_PER_BANK + page as usize
    }

    pub fn page_info(&self, bank: u8, page: u8) -> PageInfo {
        self.pages[Self::index(bank, page)]
    }

    fn set(&mut self, bank: u8, page: u8, info: PageInfo) {
        let idx = Self::index(bank, page);
        self.pages[idx] = info;
    }

    fn set_range(&mut self, bank: u8, start_page: u16, end_page: u16, info: PageInfo) {
        for page in start_page..=end_page {
            self.set(bank, page as u8, info);
        }
    }

    fn fpi_page(bank: u8, writable: bool) -> PageInfo {
        PageInfo {
            target: PageTarget::Fpi { bank },
            flags: if writable { PageFlags::WRITE_OK } else { PageFlags::empty() },
            shadow_mega2_bank: None,
            write_fpi_bank: None,
        }
    }

    fn rom_page(rom_bank: usize) -> PageInfo {
        PageInfo {
            target: PageTarget::Rom { bank: rom_bank },
            flags: PageFlags::empty(),
            shadow_mega2_bank: None,
            write_fpi_bank: None,
        }
    }

    fn mega2_page(bank: u8, writable: bool) -> PageInfo {
        PageInfo {
            target: PageTarget::Mega2 { bank },
            flags: if writable { PageFlags::WRITE_OK } else { PageFlags::empty() },
            shadow_mega2_bank: None,
            write_fpi_bank: None,
        }
    }

    /// Rebuilds the entire map from the current soft-switch state. Called
    /// whenever a switch affecting address translation changes, never
    /// per-access.
    pub fn rebuild(&mut self, switches: &SoftSwitches) {
        // Banks 02 and up: plain FPI RAM, direct-mapped 1:1.
        for bank in 2u16..self.fpi_bank_count.min(0x100) as u16 {
            self.set_range(bank as u8, 0, 255, Self::fpi_page(bank as u8, true));
        }

        let aux_bank: u8 = if self.fpi_bank_count > 1 { 0x01 } else { 0x00 };

        for bank in [0x00u8, 0x01u8] {
            let aux = bank == 0x01;
            let read_bank = if switches.ramrd() { aux_bank } else { 0x00 };
            let write_bank = if switches.ramwrt() { aux_bank } else { 0x00 };

            // $0200-$BFFF: general RAM, RAMRD/RAMWRT select reads vs writes independently.
            for page in 0x02u16..=0xBFu16 {
                let info = PageInfo {
                    target: PageTarget::Fpi { bank: read_bank },
                    flags: PageFlags::WRITE_OK,
                    shadow_mega2_bank: None,
                    write_fpi_bank: if write_bank != read_bank { Some(write_bank) } else { None },
                };
                self.set(bank, page as u8, info);
            }

            // $0000-$01FF: zero page + stack, follows ALTZP instead of RAMRD/RAMWRT.
            let altzp_bank = if switches.altzp() { aux_bank } else { 0x00 };
            self.set_range(bank, 0x00, 0x01, Self::fpi_page(altzp_bank, true));

            self.apply_language_card(bank, aux, switches);
            self.apply_c_space(bank, switches);
        }

        // Mega2 banks $E0/$E1 are always directly mapped RAM.
        for (idx, bank) in [0xE0u8, 0xE1u8].into_iter().enumerate() {
            self.set_range(bank, 0x00, 0xFF, Self::mega2_page(idx as u8, true));
        }

        // ROM banks occupy the top of the FPI address space.
        if self.rom_bank_count > 0 {
            let rom_start_bank = 0x100 - self.rom_bank_count;
            for (i, bank) in (rom_start_bank..0x100).enumerate() {
                self.set_range(bank as u8, 0, 255, Self::rom_page(i));
            }
        }

        self.apply_shadowing(switches);
    }

    fn apply_language_card(&mut self, bank: u8, aux: bool, switches: &SoftSwitches) {
        let flags = if switches.lc_write_enable() { PageFlags::WRITE_OK } else { PageFlags::empty() };
        let reads_ram = switches.lc_read_ram();
        let bank2 = switches.lc_bank2();

        let d_target = if reads_ram {
            PageTarget::LcBanked { aux, bank: if bank2 { LcBank::Two } else { LcBank::One } }
        } else if self.rom_bank_count > 0 {
            PageTarget::Rom { bank: if bank == 0x01 { self.rom_bank_count - 1 } else { 0 } }
        } else {
            PageTarget::Unmapped
        };
        self.set_range(bank, 0xD0, 0xDF, PageInfo { target: d_target, flags, shadow_mega2_bank: None, write_fpi_bank: None });

        let e_target = if reads_ram {
            PageTarget::LcCommon { aux }
        } else if self.rom_bank_count > 0 {
            PageTarget::Rom { bank: if bank == 0x01 { self.rom_bank_count - 1 } else { 0 } }
        } else {
            PageTarget::Unmapped
        };
        self.set_range(bank, 0xE0, 0xFF, PageInfo { target: e_target, flags, shadow_mega2_bank: None, write_fpi_bank: None });
    }

    fn apply_c_space(&mut self, bank: u8, switches: &SoftSwitches) {
        if bank == 0x01 {
            // Bank 01's $C000-$CFFF is ordinary RAM, not I/O (I/O is bank 00 only).
            return;
        }
        if !switches.io_lc_enabled() {
            return;
        }
        self.set(
            bank,
            0xC0,
            PageInfo { target: PageTarget::Io, flags: PageFlags::empty(), shadow_mega2_bank: None, write_fpi_bank: None },
        );

        let internal = !switches.cxrom();
        let internal_c3 = internal && !switches.c3rom();
        for page in 0xC1u16..=0xFFu16 {
            let use_internal = if page == 0xC3 { internal_c3 } else { internal };
            let target = if use_internal && self.rom_bank_count > 0 {
                PageTarget::Rom { bank: 0 }
            } else {
                PageTarget::Io
            };
            self.set(
                bank,
                page as u8,
                PageInfo { target, flags: PageFlags::empty(), shadow_mega2_bank: None, write_fpi_bank: None },
            );
        }
    }

    fn apply_shadowing(&mut self, switches: &SoftSwitches) {
        // Shadowed regions mirror FPI writes into Mega2 E0/E1 for video
        // visibility: text page 1/2 ($0400-$0BFF) and hi-res page 1/2
        // ($2000-$5FFF) in banks 00/01.
        for bank in [0x00u8, 0x01u8] {
            let mega2_bank = if bank == 0x00 { 0 } else { 1 };
            let regions: &[(u16, u16, bool)] = &[
                (0x04, 0x07, switches.shadow_text1()),
                (0x08, 0x0B, switches.shadow_text2()),
                (0x20, 0x3F, switches.shadow_hgr1()),
                (0x40, 0x5F, switches.shadow_hgr2()),
            ];
            for &(start, end, enabled) in regions {
                if !enabled {
                    continue;
                }
                for page in start..=end {
                    let idx = Self::index(bank, page as u8);
                    if matches!(self.pages[idx].target, PageTarget::Fpi { .. }) {
                        self.pages[idx].shadow_mega2_bank = Some(mega2_bank);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_two_and_up_are_direct_fpi() {
        let map = PageMap::new(8, 0);
        let info = map.page_info(0x02, 0x10);
        assert_eq!(info.target, PageTarget::Fpi { bank: 0x02 });
        assert!(info.is_writable());
    }

    #[test]
    fn rom_occupies_top_banks() {
        let map = PageMap::new(8, 2);
        assert_eq!(map.page_info(0xFF, 0x00).target, PageTarget::Rom { bank: 1 });
        assert_eq!(map.page_info(0xFE, 0x00).target, PageTarget::Rom { bank: 0 });
    }

    #[test]
    fn mega2_banks_are_always_ram() {
        let map = PageMap::new(1, 0);
        assert_eq!(map.page_info(0xE0, 0x00).target, PageTarget::Mega2 { bank: 0 });
        assert_eq!(map.page_info(0xE1, 0x00).target, PageTarget::Mega2 { bank: 1 });
    }

    #[test]
    fn c0_page_is_io_when_iolc_enabled() {
        let map = PageMap::new(4, 0);
        let info = map.page_info(0x00, 0xC0);
        assert!(info.is_io());
    }

    #[test]
    fn ramrd_selects_aux_bank_for_reads() {
        let mut switches = SoftSwitches::new();
        switches.set_ramrd(true);
        let mut map = PageMap::new(2, 0);
        map.rebuild(&switches);
        let info = map.page_info(0x00, 0x20);
        assert_eq!(info.target, PageTarget::Fpi { bank: 0x01 });
    }

    #[test]
    fn ramwrt_selects_different_bank_for_writes_than_reads() {
        let mut switches = SoftSwitches::new();
        switches.set_ramrd(false);
        switches.set_ramwrt(true);
        let mut map = PageMap::new(2, 0);
        map.rebuild(&switches);
        let info = map.page_info(0x00, 0x20);
        assert_eq!(info.target, PageTarget::Fpi { bank: 0x00 });
        assert_eq!(info.write_fpi_bank, Some(0x01));
    }

    #[test]
    fn language_card_defaults_to_rom_until_enabled() {
        let map = PageMap::new(2, 2);
        let info = map.page_info(0x00, 0xE0);
        assert_eq!(info.target, PageTarget::Rom { bank: 0 });
    }

    #[test]
    fn language_card_switches_to_ram_bank_and_back() {
        let mut switches = SoftSwitches::new();
        switches.set_lc_read_ram(true);
        switches.set_lc_bank2(true);
        let mut map = PageMap::new(2, 2);
        map.rebuild(&switches);
        assert_eq!(map.page_info(0x00, 0xD5).target, PageTarget::LcBanked { aux: false, bank: LcBank::Two });
        assert_eq!(map.page_info(0x00, 0xF0).target, PageTarget::LcCommon { aux: false });

        switches.set_lc_bank2(false);
        map.rebuild(&switches);
        assert_eq!(map.page_info(0x00, 0xD5).target, PageTarget::LcBanked { aux: false, bank: LcBank::One });
    }

    #[test]
    fn text_page_1_shadow_targets_mega2_when_enabled() {
        let mut switches = SoftSwitches::new();
        switches.set_shadow_text1(true);
        let mut map = PageMap::new(2, 0);
        map.rebuild(&switches);
        let info = map.page_info(0x00, 0x04);
        assert_eq!(info.shadow_mega2_bank, Some(0));
    }
}
