//! WDC 65C816 interpreter.
//!
//! The 816 powers up in 6502-compatible emulation mode and switches to
//! native 16-bit mode via `XCE`. Register widths then track the `M`
//! (accumulator/memory) and `X` (index) status bits independently, so most
//! arithmetic and load/store handlers branch on those bits rather than on a
//! single "native" flag.
//!
//! # Module organization
//!
//! - `flags`: P register bit constants
//! - `addressing`: effective-address resolution for every address mode
//! - `execute`: opcode dispatch and the operations themselves
//!
//! # References
//! - Western Design Center W65C816S datasheet
//! - `clem_device.h` / `emulator.c` (the machine this crate's bus timing is grounded on)

use crate::bus::Bus;

mod addressing;
mod execute;
pub mod flags;

pub use addressing::AddressingMode;

/// Reset/interrupt vector addresses, identical in both modes except BRK/COP.
mod vector {
    pub const EMULATION_COP: u16 = 0xFFF4;
    pub const EMULATION_ABORT: u16 = 0xFFF8;
    pub const EMULATION_NMI: u16 = 0xFFFA;
    pub const EMULATION_RESET: u16 = 0xFFFC;
    pub const EMULATION_IRQ_BRK: u16 = 0xFFFE;

    pub const NATIVE_COP: u16 = 0xFFE4;
    pub const NATIVE_BRK: u16 = 0xFFE6;
    pub const NATIVE_ABORT: u16 = 0xFFE8;
    pub const NATIVE_NMI: u16 = 0xFFEA;
    pub const NATIVE_IRQ: u16 = 0xFFEE;
}

/// What `step` is about to do, mirroring the source's `state_type` so a host
/// debugger can tell a reset-in-progress CPU from one mid-interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Reset,
    Execute,
    Irq,
    Nmi,
}

/// WDC 65C816 register file and pin state.
pub struct Cpu {
    /// Accumulator. Only the low byte is meaningful when `M` is set.
    pub c: u16,
    /// X index register. Only the low byte is meaningful when `X` is set.
    pub x: u16,
    /// Y index register. Only the low byte is meaningful when `X` is set.
    pub y: u16,
    /// Direct-page register.
    pub d: u16,
    /// Stack pointer. Confined to page 1 (`0x0100`-`0x01FF`) in emulation mode.
    pub s: u16,
    /// Program counter.
    pub pc: u16,
    /// Program bank register.
    pub pbr: u8,
    /// Data bank register.
    pub dbr: u8,
    /// Processor status flags.
    pub p: u8,
    /// True in 6502-compatible emulation mode, false in native mode.
    pub emulation: bool,

    /// Pin state: reset requested.
    pub resb_in: bool,
    /// Pin state: level-sensitive IRQ line, OR'd in by the machine from device sync.
    pub irqb_in: bool,
    /// Pin state: edge-sensitive NMI request, latched until serviced.
    nmi_pending: bool,
    /// Mirrors the real `readyOut` pin: false while halted by WAI, true otherwise.
    pub ready_out: bool,
    /// Set by STP; only a reset clears it.
    pub stopped: bool,

    pub state: CpuState,
}

impl Cpu {
    pub fn new() -> Self {
        let mut cpu = Self {
            c: 0,
            x: 0,
            y: 0,
            d: 0,
            s: 0x01FF,
            pc: 0,
            pbr: 0,
            dbr: 0,
            p: flags::I | flags::M | flags::X,
            emulation: true,
            resb_in: false,
            irqb_in: false,
            nmi_pending: false,
            ready_out: true,
            stopped: false,
            state: CpuState::Reset,
        };
        cpu.x &= 0x00FF;
        cpu.y &= 0x00FF;
        cpu
    }

    /// Performs the reset sequence: discards three phantom stack reads,
    /// forces emulation mode with 8-bit A/X/Y, clears D/PBR/DBR, and pulls
    /// PC from the reset vector.
    pub fn reset(&mut self, bus: &mut Bus) {
        self.emulation = true;
        self.p = flags::I | flags::M | flags::X | flags::B;
        self.d = 0;
        self.dbr = 0;
        self.pbr = 0;
        self.s = 0x01FF;
        self.x &= 0x00FF;
        self.y &= 0x00FF;
        self.resb_in = false;
        self.nmi_pending = false;
        self.stopped = false;
        self.ready_out = true;
        self.state = CpuState::Execute;

        // Three read-then-discard stack accesses, matching real reset timing.
        for _ in 0..3 {
            let _ = bus.read_byte(0, 0x0100 + self.s);
            self.s = self.s.wrapping_sub(1) & 0x00FF | 0x0100;
        }

        let lo = bus.read_byte(0, vector::EMULATION_RESET);
        let hi = bus.read_byte(0, vector::EMULATION_RESET.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// Raises the edge-triggered NMI line. Serviced at the next instruction boundary.
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    #[inline]
    pub fn is_emulation(&self) -> bool {
        self.emulation
    }

    #[inline]
    pub fn m_flag(&self) -> bool {
        self.emulation || self.p & flags::M != 0
    }

    #[inline]
    pub fn x_flag(&self) -> bool {
        self.emulation || self.p & flags::X != 0
    }

    #[inline]
    fn set_flag(&mut self, bit: u8, on: bool) {
        if on {
            self.p |= bit;
        } else {
            self.p &= !bit;
        }
    }

    fn update_nz_8(&mut self, value: u8) {
        self.set_flag(flags::Z, value == 0);
        self.set_flag(flags::N, value & 0x80 != 0);
    }

    fn update_nz_16(&mut self, value: u16) {
        self.set_flag(flags::Z, value == 0);
        self.set_flag(flags::N, value & 0x8000 != 0);
    }

    #[inline]
    fn fetch_byte(&mut self, bus: &mut Bus) -> u8 {
        let value = bus.read_byte(self.pbr, self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    #[inline]
    fn fetch_word(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Pushes a byte to the stack, confining the pointer to page 1 in
    /// emulation mode as real hardware does.
    fn push_byte(&mut self, bus: &mut Bus, value: u8) {
        bus.write_byte(0, self.s, value);
        self.s = self.s.wrapping_sub(1);
        if self.emulation {
            self.s = (self.s & 0x00FF) | 0x0100;
        }
    }

    fn push_word(&mut self, bus: &mut Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push_byte(bus, hi);
        self.push_byte(bus, lo);
    }

    fn pull_byte(&mut self, bus: &mut Bus) -> u8 {
        self.s = self.s.wrapping_add(1);
        if self.emulation {
            self.s = (self.s & 0x00FF) | 0x0100;
        }
        bus.read_byte(0, self.s)
    }

    fn pull_word(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.pull_byte(bus);
        let hi = self.pull_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Runs one instruction (or one interrupt-entry sequence) to completion
    /// and returns the bus cycles it consumed. Interrupts are only
    /// recognized at this call boundary, never mid-instruction.
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        let start_ts = bus.clock.ts;

        if self.stopped {
            bus.clock.step_fast();
            return self.cycles_since(bus, start_ts);
        }

        if self.nmi_pending {
            self.nmi_pending = false;
            self.state = CpuState::Nmi;
            self.service_interrupt(bus, false, true);
            self.state = CpuState::Execute;
            return self.cycles_since(bus, start_ts);
        }

        if self.irqb_in && self.p & flags::I == 0 {
            self.state = CpuState::Irq;
            self.ready_out = true;
            self.service_interrupt(bus, false, false);
            self.state = CpuState::Execute;
            return self.cycles_since(bus, start_ts);
        }

        if !self.ready_out {
            // Parked in WAI; only an interrupt (handled above) wakes us.
            bus.clock.step_fast();
            return self.cycles_since(bus, start_ts);
        }

        let opcode = self.fetch_byte(bus);
        self.execute(bus, opcode);
        self.cycles_since(bus, start_ts)
    }

    fn cycles_since(&self, bus: &Bus, start_ts: u64) -> u32 {
        bus.clock.ts.saturating_sub(start_ts) as u32
    }

    /// Shared BRK/COP/IRQ/NMI entry sequence. `is_brk_or_cop` controls
    /// whether the pushed PC is the one past the signature/operand byte
    /// (BRK, COP) or unchanged (IRQ, NMI).
    fn service_interrupt(&mut self, bus: &mut Bus, is_cop: bool, is_nmi: bool) {
        if !self.emulation {
            self.push_byte(bus, self.pbr);
        }
        self.push_word(bus, self.pc);
        let pushed_p = if self.emulation && !is_nmi && !is_cop { self.p | flags::B } else { self.p };
        self.push_byte(bus, pushed_p);
        self.set_flag(flags::D, false);
        self.set_flag(flags::I, true);
        self.pbr = 0;

        let vector_addr = if self.emulation {
            if is_nmi {
                vector::EMULATION_NMI
            } else if is_cop {
                vector::EMULATION_COP
            } else {
                vector::EMULATION_IRQ_BRK
            }
        } else if is_nmi {
            vector::NATIVE_NMI
        } else if is_cop {
            vector::NATIVE_COP
        } else {
            vector::NATIVE_IRQ
        };

        let lo = bus.read_byte(0, vector_addr);
        let hi = bus.read_byte(0, vector_addr.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// BRK/COP vectoring as reached from `execute`: the operand/signature
    /// byte has already been consumed by the caller, so PC already points
    /// past it, matching BRK's documented "pushes PC+2".
    fn enter_brk(&mut self, bus: &mut Bus) {
        let vector_addr = if self.emulation { vector::EMULATION_IRQ_BRK } else { vector::NATIVE_BRK };
        self.enter_software_interrupt(bus, vector_addr, true);
    }

    fn enter_cop(&mut self, bus: &mut Bus) {
        let vector_addr = if self.emulation { vector::EMULATION_COP } else { vector::NATIVE_COP };
        self.enter_software_interrupt(bus, vector_addr, false);
    }

    fn enter_software_interrupt(&mut self, bus: &mut Bus, vector_addr: u16, is_brk: bool) {
        let _ = is_brk;
        if !self.emulation {
            self.push_byte(bus, self.pbr);
        }
        self.push_word(bus, self.pc);
        let pushed_p = if self.emulation { self.p | flags::B } else { self.p };
        self.push_byte(bus, pushed_p);
        self.set_flag(flags::D, false);
        self.set_flag(flags::I, true);
        self.pbr = 0;
        let lo = bus.read_byte(0, vector_addr);
        let hi = bus.read_byte(0, vector_addr.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// RTI: pulls P, PC, and (in native mode) PBR.
    fn return_from_interrupt(&mut self, bus: &mut Bus) {
        let mut p = self.pull_byte(bus);
        if self.emulation {
            p |= flags::M | flags::X;
        }
        self.p = p;
        self.pc = self.pull_word(bus);
        if !self.emulation {
            self.pbr = self.pull_byte(bus);
        }
    }

    /// XCE: swap the carry flag with the emulation bit, then reapply the
    /// emulation-mode register-width and stack-confinement consequences.
    fn exchange_carry_emulation(&mut self) {
        let carry = self.p & flags::C != 0;
        let was_emulation = self.emulation;
        self.emulation = carry;
        self.set_flag(flags::C, was_emulation);

        if self.emulation {
            self.p |= flags::M | flags::X;
            self.x &= 0x00FF;
            self.y &= 0x00FF;
            self.s = (self.s & 0x00FF) | 0x0100;
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

// ========== State persistence ==========

impl Cpu {
    pub const SNAPSHOT_SIZE: usize = 24;

    pub fn to_bytes(&self) -> [u8; Self::SNAPSHOT_SIZE] {
        let mut buf = [0u8; Self::SNAPSHOT_SIZE];
        buf[0..2].copy_from_slice(&self.c.to_le_bytes());
        buf[2..4].copy_from_slice(&self.x.to_le_bytes());
        buf[4..6].copy_from_slice(&self.y.to_le_bytes());
        buf[6..8].copy_from_slice(&self.d.to_le_bytes());
        buf[8..10].copy_from_slice(&self.s.to_le_bytes());
        buf[10..12].copy_from_slice(&self.pc.to_le_bytes());
        buf[12] = self.pbr;
        buf[13] = self.dbr;
        buf[14] = self.p;
        let mut flags_byte = 0u8;
        if self.emulation {
            flags_byte |= 1 << 0;
        }
        if self.irqb_in {
            flags_byte |= 1 << 1;
        }
        if self.nmi_pending {
            flags_byte |= 1 << 2;
        }
        if self.ready_out {
            flags_byte |= 1 << 3;
        }
        if self.stopped {
            flags_byte |= 1 << 4;
        }
        buf[15] = flags_byte;
        buf
    }

    pub fn from_bytes(&mut self, buf: &[u8]) -> Result<(), &'static str> {
        if buf.len() < Self::SNAPSHOT_SIZE {
            return Err("CPU snapshot buffer too small");
        }
        self.c = u16::from_le_bytes([buf[0], buf[1]]);
        self.x = u16::from_le_bytes([buf[2], buf[3]]);
        self.y = u16::from_le_bytes([buf[4], buf[5]]);
        self.d = u16::from_le_bytes([buf[6], buf[7]]);
        self.s = u16::from_le_bytes([buf[8], buf[9]]);
        self.pc = u16::from_le_bytes([buf[10], buf[11]]);
        self.pbr = buf[12];
        self.dbr = buf[13];
        self.p = buf[14];
        let flags_byte = buf[15];
        self.emulation = flags_byte & (1 << 0) != 0;
        self.irqb_in = flags_byte & (1 << 1) != 0;
        self.nmi_pending = flags_byte & (1 << 2) != 0;
        self.ready_out = flags_byte & (1 << 3) != 0;
        self.stopped = flags_byte & (1 << 4) != 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;

    fn bus_with_rom_at_reset_vector(reset_pc: u16) -> Bus {
        let mut rom = vec![0u8; 0x20000];
        // Bank 0's $E000-$FFFF reads from ROM bank 0 (offset = addr - $E000) by
        // default (language card off), so $FFFC lands at ROM image offset $1FFC.
        rom[0x1FFC] = reset_pc as u8;
        rom[0x1FFD] = (reset_pc >> 8) as u8;
        let mut bus = Bus::new(&MachineConfig::new()).unwrap();
        bus.load_rom(&rom).unwrap();
        bus
    }

    #[test]
    fn reset_pulls_pc_from_emulation_reset_vector() {
        let mut bus = bus_with_rom_at_reset_vector(0x1234);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        assert_eq!(cpu.pc, 0x1234);
        assert!(cpu.is_emulation());
        assert_eq!(cpu.pbr, 0);
        assert_eq!(cpu.dbr, 0);
        assert_eq!(cpu.d, 0);
    }

    #[test]
    fn reset_clears_stopped_and_pending_interrupt_state() {
        let mut bus = bus_with_rom_at_reset_vector(0x2000);
        let mut cpu = Cpu::new();
        cpu.stopped = true;
        cpu.request_nmi();
        cpu.reset(&mut bus);
        assert!(!cpu.stopped);
        cpu.irqb_in = false;
        assert_eq!(cpu.pc, 0x2000);
    }

    #[test]
    fn step_wakes_from_wai_on_irq() {
        let mut bus = bus_with_rom_at_reset_vector(0x3000);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.ready_out = false;
        cpu.p &= !flags::I;
        cpu.irqb_in = true;
        cpu.step(&mut bus);
        assert!(cpu.ready_out);
        assert_eq!(cpu.state, CpuState::Execute);
    }
}
