//! Opcode dispatch and instruction bodies for the 65C816 interpreter.
//!
//! Each handler resolves its operand through [`super::addressing`], performs
//! the operation at the width selected by the `M`/`X` status bits (or a fixed
//! width for instructions that ignore them), and updates flags. Grouped
//! roughly the way the datasheet's opcode matrix groups them: load/store,
//! ALU, read-modify-write, branches, stack, transfers, and the handful of
//! 65816-only additions (block move, long addressing, REP/SEP/XCE).

use super::addressing::{AddressingMode, Effective};
use super::flags;
use super::Cpu;
use crate::bus::Bus;

impl Cpu {
    pub(super) fn execute(&mut self, bus: &mut Bus, opcode: u8) {
        use AddressingMode::*;
        match opcode {
            0x00 => {
                let _ = self.fetch_byte(bus); // BRK signature byte
                self.enter_brk(bus);
            }
            0x01 => self.op_ora(bus, DirectIndirectX),
            0x02 => {
                let _ = self.fetch_byte(bus); // COP signature byte
                self.enter_cop(bus);
            }
            0x03 => self.op_ora(bus, StackRelative),
            0x04 => self.op_tsb(bus, Direct),
            0x05 => self.op_ora(bus, Direct),
            0x06 => self.op_asl(bus, Direct),
            0x07 => self.op_ora(bus, DirectIndirectLong),
            0x08 => {
                let p = self.p;
                self.push_byte(bus, p);
            }
            0x09 => self.op_ora(bus, Immediate),
            0x0A => self.op_asl(bus, Accumulator),
            0x0B => {
                let d = self.d;
                self.push_word(bus, d);
            }
            0x0C => self.op_tsb(bus, Absolute),
            0x0D => self.op_ora(bus, Absolute),
            0x0E => self.op_asl(bus, Absolute),
            0x0F => self.op_ora(bus, AbsoluteLong),

            0x10 => self.branch_if(bus, self.p & flags::N == 0),
            0x11 => self.op_ora(bus, DirectIndirectIndexedY),
            0x12 => self.op_ora(bus, DirectIndirect),
            0x13 => self.op_ora(bus, StackRelativeIndirectIndexedY),
            0x14 => self.op_trb(bus, Direct),
            0x15 => self.op_ora(bus, DirectX),
            0x16 => self.op_asl(bus, DirectX),
            0x17 => self.op_ora(bus, DirectIndirectIndexedYLong),
            0x18 => self.set_flag(flags::C, false),
            0x19 => self.op_ora(bus, AbsoluteY),
            0x1A => self.op_ina(),
            0x1B => self.op_tcs(),
            0x1C => self.op_trb(bus, Absolute),
            0x1D => self.op_ora(bus, AbsoluteX),
            0x1E => self.op_asl(bus, AbsoluteX),
            0x1F => self.op_ora(bus, AbsoluteLongX),

            0x20 => self.op_jsr(bus),
            0x21 => self.op_and(bus, DirectIndirectX),
            0x22 => self.op_jsl(bus),
            0x23 => self.op_and(bus, StackRelative),
            0x24 => self.op_bit(bus, Direct, false),
            0x25 => self.op_and(bus, Direct),
            0x26 => self.op_rol(bus, Direct),
            0x27 => self.op_and(bus, DirectIndirectLong),
            0x28 => self.op_plp(bus),
            0x29 => self.op_and(bus, Immediate),
            0x2A => self.op_rol(bus, Accumulator),
            0x2B => self.op_pld(bus),
            0x2C => self.op_bit(bus, Absolute, false),
            0x2D => self.op_and(bus, Absolute),
            0x2E => self.op_rol(bus, Absolute),
            0x2F => self.op_and(bus, AbsoluteLong),

            0x30 => self.branch_if(bus, self.p & flags::N != 0),
            0x31 => self.op_and(bus, DirectIndirectIndexedY),
            0x32 => self.op_and(bus, DirectIndirect),
            0x33 => self.op_and(bus, StackRelativeIndirectIndexedY),
            0x34 => self.op_bit(bus, DirectX, false),
            0x35 => self.op_and(bus, DirectX),
            0x36 => self.op_rol(bus, DirectX),
            0x37 => self.op_and(bus, DirectIndirectIndexedYLong),
            0x38 => self.set_flag(flags::C, true),
            0x39 => self.op_and(bus, AbsoluteY),
            0x3A => self.op_dea(),
            0x3B => self.op_tsc(),
            0x3C => self.op_bit(bus, AbsoluteX, false),
            0x3D => self.op_and(bus, AbsoluteX),
            0x3E => self.op_rol(bus, AbsoluteX),
            0x3F => self.op_and(bus, AbsoluteLongX),

            0x40 => self.return_from_interrupt(bus),
            0x41 => self.op_eor(bus, DirectIndirectX),
            0x42 => self.op_wdm(bus),
            0x43 => self.op_eor(bus, StackRelative),
            0x44 => self.op_mvp(bus),
            0x45 => self.op_eor(bus, Direct),
            0x46 => self.op_lsr(bus, Direct),
            0x47 => self.op_eor(bus, DirectIndirectLong),
            0x48 => self.op_pha(bus),
            0x49 => self.op_eor(bus, Immediate),
            0x4A => self.op_lsr(bus, Accumulator),
            0x4B => {
                let pbr = self.pbr;
                self.push_byte(bus, pbr);
            }
            0x4C => self.op_jmp_absolute(bus),
            0x4D => self.op_eor(bus, Absolute),
            0x4E => self.op_lsr(bus, Absolute),
            0x4F => self.op_eor(bus, AbsoluteLong),

            0x50 => self.branch_if(bus, self.p & flags::V == 0),
            0x51 => self.op_eor(bus, DirectIndirectIndexedY),
            0x52 => self.op_eor(bus, DirectIndirect),
            0x53 => self.op_eor(bus, StackRelativeIndirectIndexedY),
            0x54 => self.op_mvn(bus),
            0x55 => self.op_eor(bus, DirectX),
            0x56 => self.op_lsr(bus, DirectX),
            0x57 => self.op_eor(bus, DirectIndirectIndexedYLong),
            0x58 => self.set_flag(flags::I, false),
            0x59 => self.op_eor(bus, AbsoluteY),
            0x5A => self.op_phy(bus),
            0x5B => self.op_tcd(),
            0x5C => self.op_jmp_long(bus),
            0x5D => self.op_eor(bus, AbsoluteX),
            0x5E => self.op_lsr(bus, AbsoluteX),
            0x5F => self.op_eor(bus, AbsoluteLongX),

            0x60 => self.op_rts(bus),
            0x61 => self.op_adc(bus, DirectIndirectX),
            0x62 => self.op_per(bus),
            0x63 => self.op_adc(bus, StackRelative),
            0x64 => self.op_stz(bus, Direct),
            0x65 => self.op_adc(bus, Direct),
            0x66 => self.op_ror(bus, Direct),
            0x67 => self.op_adc(bus, DirectIndirectLong),
            0x68 => self.op_pla(bus),
            0x69 => self.op_adc(bus, Immediate),
            0x6A => self.op_ror(bus, Accumulator),
            0x6B => self.op_rtl(bus),
            0x6C => self.op_jmp_indirect(bus),
            0x6D => self.op_adc(bus, Absolute),
            0x6E => self.op_ror(bus, Absolute),
            0x6F => self.op_adc(bus, AbsoluteLong),

            0x70 => self.branch_if(bus, self.p & flags::V != 0),
            0x71 => self.op_adc(bus, DirectIndirectIndexedY),
            0x72 => self.op_adc(bus, DirectIndirect),
            0x73 => self.op_adc(bus, StackRelativeIndirectIndexedY),
            0x74 => self.op_stz(bus, DirectX),
            0x75 => self.op_adc(bus, DirectX),
            0x76 => self.op_ror(bus, DirectX),
            0x77 => self.op_adc(bus, DirectIndirectIndexedYLong),
            0x78 => self.set_flag(flags::I, true),
            0x79 => self.op_adc(bus, AbsoluteY),
            0x7A => self.op_ply(bus),
            0x7B => self.op_tdc(),
            0x7C => self.op_jmp_indexed_indirect(bus),
            0x7D => self.op_adc(bus, AbsoluteX),
            0x7E => self.op_ror(bus, AbsoluteX),
            0x7F => self.op_adc(bus, AbsoluteLongX),

            0x80 => self.branch_if(bus, true),
            0x81 => self.op_sta(bus, DirectIndirectX),
            0x82 => self.op_brl(bus),
            0x83 => self.op_sta(bus, StackRelative),
            0x84 => self.op_sty(bus, Direct),
            0x85 => self.op_sta(bus, Direct),
            0x86 => self.op_stx(bus, Direct),
            0x87 => self.op_sta(bus, DirectIndirectLong),
            0x88 => self.op_dey(),
            0x89 => self.op_bit(bus, Immediate, true),
            0x8A => self.op_txa(),
            0x8B => {
                let dbr = self.dbr;
                self.push_byte(bus, dbr);
            }
            0x8C => self.op_sty(bus, Absolute),
            0x8D => self.op_sta(bus, Absolute),
            0x8E => self.op_stx(bus, Absolute),
            0x8F => self.op_sta(bus, AbsoluteLong),

            0x90 => self.branch_if(bus, self.p & flags::C == 0),
            0x91 => self.op_sta(bus, DirectIndirectIndexedY),
            0x92 => self.op_sta(bus, DirectIndirect),
            0x93 => self.op_sta(bus, StackRelativeIndirectIndexedY),
            0x94 => self.op_sty(bus, DirectX),
            0x95 => self.op_sta(bus, DirectX),
            0x96 => self.op_stx(bus, DirectY),
            0x97 => self.op_sta(bus, DirectIndirectIndexedYLong),
            0x98 => self.op_tya(),
            0x99 => self.op_sta(bus, AbsoluteY),
            0x9A => self.op_txs(),
            0x9B => self.op_txy(),
            0x9C => self.op_stz(bus, Absolute),
            0x9D => self.op_sta(bus, AbsoluteX),
            0x9E => self.op_stz(bus, AbsoluteX),
            0x9F => self.op_sta(bus, AbsoluteLongX),

            0xA0 => self.op_ldy(bus, Immediate),
            0xA1 => self.op_lda(bus, DirectIndirectX),
            0xA2 => self.op_ldx(bus, Immediate),
            0xA3 => self.op_lda(bus, StackRelative),
            0xA4 => self.op_ldy(bus, Direct),
            0xA5 => self.op_lda(bus, Direct),
            0xA6 => self.op_ldx(bus, Direct),
            0xA7 => self.op_lda(bus, DirectIndirectLong),
            0xA8 => self.op_tay(),
            0xA9 => self.op_lda(bus, Immediate),
            0xAA => self.op_tax(),
            0xAB => self.op_plb(bus),
            0xAC => self.op_ldy(bus, Absolute),
            0xAD => self.op_lda(bus, Absolute),
            0xAE => self.op_ldx(bus, Absolute),
            0xAF => self.op_lda(bus, AbsoluteLong),

            0xB0 => self.branch_if(bus, self.p & flags::C != 0),
            0xB1 => self.op_lda(bus, DirectIndirectIndexedY),
            0xB2 => self.op_lda(bus, DirectIndirect),
            0xB3 => self.op_lda(bus, StackRelativeIndirectIndexedY),
            0xB4 => self.op_ldy(bus, DirectX),
            0xB5 => self.op_lda(bus, DirectX),
            0xB6 => self.op_ldx(bus, DirectY),
            0xB7 => self.op_lda(bus, DirectIndirectIndexedYLong),
            0xB8 => self.set_flag(flags::V, false),
            0xB9 => self.op_lda(bus, AbsoluteY),
            0xBA => self.op_tsx(),
            0xBB => self.op_tyx(),
            0xBC => self.op_ldy(bus, AbsoluteX),
            0xBD => self.op_lda(bus, AbsoluteX),
            0xBE => self.op_ldx(bus, AbsoluteY),
            0xBF => self.op_lda(bus, AbsoluteLongX),

            0xC0 => self.op_cpy(bus, Immediate),
            0xC1 => self.op_cmp(bus, DirectIndirectX),
            0xC2 => self.op_rep(bus),
            0xC3 => self.op_cmp(bus, StackRelative),
            0xC4 => self.op_cpy(bus, Direct),
            0xC5 => self.op_cmp(bus, Direct),
            0xC6 => self.op_dec_mem(bus, Direct),
            0xC7 => self.op_cmp(bus, DirectIndirectLong),
            0xC8 => self.op_iny(),
            0xC9 => self.op_cmp(bus, Immediate),
            0xCA => self.op_dex(),
            0xCB => self.op_wai(),
            0xCC => self.op_cpy(bus, Absolute),
            0xCD => self.op_cmp(bus, Absolute),
            0xCE => self.op_dec_mem(bus, Absolute),
            0xCF => self.op_cmp(bus, AbsoluteLong),

            0xD0 => self.branch_if(bus, self.p & flags::Z == 0),
            0xD1 => self.op_cmp(bus, DirectIndirectIndexedY),
            0xD2 => self.op_cmp(bus, DirectIndirect),
            0xD3 => self.op_cmp(bus, StackRelativeIndirectIndexedY),
            0xD4 => self.op_pei(bus),
            0xD5 => self.op_cmp(bus, DirectX),
            0xD6 => self.op_dec_mem(bus, DirectX),
            0xD7 => self.op_cmp(bus, DirectIndirectIndexedYLong),
            0xD8 => self.set_flag(flags::D, false),
            0xD9 => self.op_cmp(bus, AbsoluteY),
            0xDA => self.op_phx(bus),
            0xDB => self.stopped = true,
            0xDC => self.op_jmp_indirect_long(bus),
            0xDD => self.op_cmp(bus, AbsoluteX),
            0xDE => self.op_dec_mem(bus, AbsoluteX),
            0xDF => self.op_cmp(bus, AbsoluteLongX),

            0xE0 => self.op_cpx(bus, Immediate),
            0xE1 => self.op_sbc(bus, DirectIndirectX),
            0xE2 => self.op_sep(bus),
            0xE3 => self.op_sbc(bus, StackRelative),
            0xE4 => self.op_cpx(bus, Direct),
            0xE5 => self.op_sbc(bus, Direct),
            0xE6 => self.op_inc_mem(bus, Direct),
            0xE7 => self.op_sbc(bus, DirectIndirectLong),
            0xE8 => self.op_inx(),
            0xE9 => self.op_sbc(bus, Immediate),
            0xEA => {}
            0xEB => self.op_xba(),
            0xEC => self.op_cpx(bus, Absolute),
            0xED => self.op_sbc(bus, Absolute),
            0xEE => self.op_inc_mem(bus, Absolute),
            0xEF => self.op_sbc(bus, AbsoluteLong),

            0xF0 => self.branch_if(bus, self.p & flags::Z != 0),
            0xF1 => self.op_sbc(bus, DirectIndirectIndexedY),
            0xF2 => self.op_sbc(bus, DirectIndirect),
            0xF3 => self.op_sbc(bus, StackRelativeIndirectIndexedY),
            0xF4 => self.op_pea(bus),
            0xF5 => self.op_sbc(bus, DirectX),
            0xF6 => self.op_inc_mem(bus, DirectX),
            0xF7 => self.op_sbc(bus, DirectIndirectIndexedYLong),
            0xF8 => self.set_flag(flags::D, true),
            0xF9 => self.op_sbc(bus, AbsoluteY),
            0xFA => self.op_plx(bus),
            0xFB => self.exchange_carry_emulation(),
            0xFC => self.op_jsr_indexed_indirect(bus),
            0xFD => self.op_sbc(bus, AbsoluteX),
            0xFE => self.op_inc_mem(bus, AbsoluteX),
            0xFF => self.op_sbc(bus, AbsoluteLongX),
        }
    }

    fn apply_penalty(&self, bus: &mut Bus, extra: u32) {
        for _ in 0..extra {
            bus.clock.step_fast();
        }
    }

    fn read_mem(&self, bus: &mut Bus, eff: Effective, wide: bool) -> u16 {
        if wide {
            let lo = bus.read_byte(eff.bank, eff.addr);
            let hi = bus.read_byte(eff.bank, eff.addr.wrapping_add(1));
            u16::from_le_bytes([lo, hi])
        } else {
            bus.read_byte(eff.bank, eff.addr) as u16
        }
    }

    fn write_mem(&self, bus: &mut Bus, eff: Effective, wide: bool, value: u16) {
        if wide {
            let [lo, hi] = value.to_le_bytes();
            bus.write_byte(eff.bank, eff.addr, lo);
            bus.write_byte(eff.bank, eff.addr.wrapping_add(1), hi);
        } else {
            bus.write_byte(eff.bank, eff.addr, value as u8);
        }
    }

    fn read_operand(&mut self, bus: &mut Bus, mode: AddressingMode, wide: bool) -> u16 {
        match mode {
            AddressingMode::Immediate => {
                if wide {
                    self.fetch_word(bus)
                } else {
                    self.fetch_byte(bus) as u16
                }
            }
            AddressingMode::Accumulator => self.c,
            _ => {
                let eff = self.resolve_address(bus, mode);
                self.apply_penalty(bus, eff.extra_cycles);
                self.read_mem(bus, eff, wide)
            }
        }
    }

    fn apply_width_effects(&mut self) {
        if self.x_flag() {
            self.x &= 0x00FF;
            self.y &= 0x00FF;
        }
    }

    // ===== Load / store =====

    fn op_lda(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let value = self.read_operand(bus, mode, wide);
        if wide {
            self.c = value;
            self.update_nz_16(value);
        } else {
            self.c = (self.c & 0xFF00) | (value & 0xFF);
            self.update_nz_8(value as u8);
        }
    }

    fn op_ldx(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.x_flag();
        let value = self.read_operand(bus, mode, wide);
        self.x = value;
        if wide {
            self.update_nz_16(value);
        } else {
            self.update_nz_8(value as u8);
        }
    }

    fn op_ldy(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.x_flag();
        let value = self.read_operand(bus, mode, wide);
        self.y = value;
        if wide {
            self.update_nz_16(value);
        } else {
            self.update_nz_8(value as u8);
        }
    }

    fn op_sta(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        self.write_mem(bus, eff, wide, self.c);
    }

    fn op_stx(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.x_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        self.write_mem(bus, eff, wide, self.x);
    }

    fn op_sty(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.x_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        self.write_mem(bus, eff, wide, self.y);
    }

    fn op_stz(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        self.write_mem(bus, eff, wide, 0);
    }

    // ===== Logical / arithmetic (accumulator) =====

    fn op_ora(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let operand = self.read_operand(bus, mode, wide);
        if wide {
            self.c |= operand;
            self.update_nz_16(self.c);
        } else {
            let result = (self.c as u8) | (operand as u8);
            self.c = (self.c & 0xFF00) | result as u16;
            self.update_nz_8(result);
        }
    }

    fn op_and(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let operand = self.read_operand(bus, mode, wide);
        if wide {
            self.c &= operand;
            self.update_nz_16(self.c);
        } else {
            let result = (self.c as u8) & (operand as u8);
            self.c = (self.c & 0xFF00) | result as u16;
            self.update_nz_8(result);
        }
    }

    fn op_eor(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let operand = self.read_operand(bus, mode, wide);
        if wide {
            self.c ^= operand;
            self.update_nz_16(self.c);
        } else {
            let result = (self.c as u8) ^ (operand as u8);
            self.c = (self.c & 0xFF00) | result as u16;
            self.update_nz_8(result);
        }
    }

    fn op_bit(&mut self, bus: &mut Bus, mode: AddressingMode, immediate: bool) {
        let wide = !self.m_flag();
        let operand = self.read_operand(bus, mode, wide);
        if wide {
            let result = self.c & operand;
            self.set_flag(flags::Z, result == 0);
            if !immediate {
                self.set_flag(flags::N, operand & 0x8000 != 0);
                self.set_flag(flags::V, operand & 0x4000 != 0);
            }
        } else {
            let result = (self.c as u8) & (operand as u8);
            self.set_flag(flags::Z, result == 0);
            if !immediate {
                self.set_flag(flags::N, operand & 0x80 != 0);
                self.set_flag(flags::V, operand & 0x40 != 0);
            }
        }
    }

    fn op_cmp(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let operand = self.read_operand(bus, mode, wide);
        self.compare(if wide { self.c } else { self.c & 0xFF }, operand, wide);
    }

    fn op_cpx(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.x_flag();
        let operand = self.read_operand(bus, mode, wide);
        self.compare(if wide { self.x } else { self.x & 0xFF }, operand, wide);
    }

    fn op_cpy(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.x_flag();
        let operand = self.read_operand(bus, mode, wide);
        self.compare(if wide { self.y } else { self.y & 0xFF }, operand, wide);
    }

    fn compare(&mut self, reg: u16, operand: u16, wide: bool) {
        if wide {
            let result = reg.wrapping_sub(operand);
            self.set_flag(flags::C, reg >= operand);
            self.update_nz_16(result);
        } else {
            let result = (reg as u8).wrapping_sub(operand as u8);
            self.set_flag(flags::C, (reg as u8) >= (operand as u8));
            self.update_nz_8(result);
        }
    }

    // ===== ADC / SBC =====

    fn op_adc(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let operand = self.read_operand(bus, mode, wide);
        if self.p & flags::D != 0 {
            self.adc_decimal(operand, wide);
        } else {
            self.adc_binary(operand, wide);
        }
    }

    fn op_sbc(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let operand = self.read_operand(bus, mode, wide);
        if self.p & flags::D != 0 {
            self.sbc_decimal(operand, wide);
        } else {
            self.sbc_binary(operand, wide);
        }
    }

    fn adc_binary(&mut self, operand: u16, wide: bool) {
        let carry_in = (self.p & flags::C != 0) as u32;
        if wide {
            let a = self.c;
            let sum = a as u32 + operand as u32 + carry_in;
            let result = sum as u16;
            let overflow = (!(a ^ operand) & (a ^ result)) & 0x8000 != 0;
            self.set_flag(flags::C, sum > 0xFFFF);
            self.set_flag(flags::V, overflow);
            self.c = result;
            self.update_nz_16(result);
        } else {
            let a = self.c as u8;
            let b = operand as u8;
            let sum = a as u32 + b as u32 + carry_in;
            let result = sum as u8;
            let overflow = (!(a ^ b) & (a ^ result)) & 0x80 != 0;
            self.set_flag(flags::C, sum > 0xFF);
            self.set_flag(flags::V, overflow);
            self.c = (self.c & 0xFF00) | result as u16;
            self.update_nz_8(result);
        }
    }

    fn sbc_binary(&mut self, operand: u16, wide: bool) {
        let borrow_in = (self.p & flags::C == 0) as i32;
        if wide {
            let a = self.c as i32;
            let b = operand as i32;
            let diff = a - b - borrow_in;
            let result = diff as u16;
            let overflow = ((a as u16 ^ operand) & (a as u16 ^ result) & 0x8000) != 0;
            self.set_flag(flags::C, diff >= 0);
            self.set_flag(flags::V, overflow);
            self.c = result;
            self.update_nz_16(result);
        } else {
            let a = (self.c as u8) as i32;
            let b = (operand as u8) as i32;
            let diff = a - b - borrow_in;
            let result = diff as u8;
            let overflow = (((a as u8) ^ (operand as u8)) & ((a as u8) ^ result) & 0x80) != 0;
            self.set_flag(flags::C, diff >= 0);
            self.set_flag(flags::V, overflow);
            self.c = (self.c & 0xFF00) | result as u16;
            self.update_nz_8(result);
        }
    }

    fn adc_decimal(&mut self, operand: u16, wide: bool) {
        let carry_in = self.p & flags::C != 0;
        if !wide {
            let (result, carry, overflow) = bcd_add_byte(self.c as u8, operand as u8, carry_in);
            self.c = (self.c & 0xFF00) | result as u16;
            self.set_flag(flags::C, carry);
            self.set_flag(flags::V, overflow);
            self.update_nz_8(result);
        } else {
            let a_lo = (self.c & 0xFF) as u8;
            let a_hi = (self.c >> 8) as u8;
            let b_lo = (operand & 0xFF) as u8;
            let b_hi = (operand >> 8) as u8;
            let (lo, carry_lo, _) = bcd_add_byte(a_lo, b_lo, carry_in);
            let (hi, carry_hi, overflow) = bcd_add_byte(a_hi, b_hi, carry_lo);
            let result = u16::from_le_bytes([lo, hi]);
            self.c = result;
            self.set_flag(flags::C, carry_hi);
            self.set_flag(flags::V, overflow);
            self.update_nz_16(result);
        }
    }

    fn sbc_decimal(&mut self, operand: u16, wide: bool) {
        let borrow_in = self.p & flags::C == 0;
        if !wide {
            let (result, carry, overflow) = bcd_sub_byte(self.c as u8, operand as u8, borrow_in);
            self.c = (self.c & 0xFF00) | result as u16;
            self.set_flag(flags::C, carry);
            self.set_flag(flags::V, overflow);
            self.update_nz_8(result);
        } else {
            let a_lo = (self.c & 0xFF) as u8;
            let a_hi = (self.c >> 8) as u8;
            let b_lo = (operand & 0xFF) as u8;
            let b_hi = (operand >> 8) as u8;
            let (lo, carry_lo, _) = bcd_sub_byte(a_lo, b_lo, borrow_in);
            let (hi, carry_hi, overflow) = bcd_sub_byte(a_hi, b_hi, !carry_lo);
            let result = u16::from_le_bytes([lo, hi]);
            self.c = result;
            self.set_flag(flags::C, carry_hi);
            self.set_flag(flags::V, overflow);
            self.update_nz_16(result);
        }
    }

    // ===== Read-modify-write =====

    fn op_asl(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        if matches!(mode, AddressingMode::Accumulator) {
            let (result, carry) = shift_left(self.c, wide);
            self.c = result;
            self.set_flag(flags::C, carry);
            self.update_nz(result, wide);
            return;
        }
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let (result, carry) = shift_left(value, wide);
        self.write_mem(bus, eff, wide, result);
        self.set_flag(flags::C, carry);
        self.update_nz(result, wide);
    }

    fn op_lsr(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        if matches!(mode, AddressingMode::Accumulator) {
            let (result, carry) = shift_right(self.c, wide);
            self.c = result;
            self.set_flag(flags::C, carry);
            self.update_nz(result, wide);
            return;
        }
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let (result, carry) = shift_right(value, wide);
        self.write_mem(bus, eff, wide, result);
        self.set_flag(flags::C, carry);
        self.update_nz(result, wide);
    }

    fn op_rol(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let carry_in = self.p & flags::C != 0;
        if matches!(mode, AddressingMode::Accumulator) {
            let (result, carry) = rotate_left(self.c, wide, carry_in);
            self.c = result;
            self.set_flag(flags::C, carry);
            self.update_nz(result, wide);
            return;
        }
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let (result, carry) = rotate_left(value, wide, carry_in);
        self.write_mem(bus, eff, wide, result);
        self.set_flag(flags::C, carry);
        self.update_nz(result, wide);
    }

    fn op_ror(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let carry_in = self.p & flags::C != 0;
        if matches!(mode, AddressingMode::Accumulator) {
            let (result, carry) = rotate_right(self.c, wide, carry_in);
            self.c = result;
            self.set_flag(flags::C, carry);
            self.update_nz(result, wide);
            return;
        }
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let (result, carry) = rotate_right(value, wide, carry_in);
        self.write_mem(bus, eff, wide, result);
        self.set_flag(flags::C, carry);
        self.update_nz(result, wide);
    }

    fn op_inc_mem(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let result = if wide { value.wrapping_add(1) } else { (value as u8).wrapping_add(1) as u16 };
        self.write_mem(bus, eff, wide, result);
        self.update_nz(result, wide);
    }

    fn op_dec_mem(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let result = if wide { value.wrapping_sub(1) } else { (value as u8).wrapping_sub(1) as u16 };
        self.write_mem(bus, eff, wide, result);
        self.update_nz(result, wide);
    }

    fn op_tsb(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let acc = if wide { self.c } else { self.c & 0xFF };
        self.set_flag(flags::Z, value & acc == 0);
        self.write_mem(bus, eff, wide, value | acc);
    }

    fn op_trb(&mut self, bus: &mut Bus, mode: AddressingMode) {
        let wide = !self.m_flag();
        let eff = self.resolve_address(bus, mode);
        self.apply_penalty(bus, eff.extra_cycles);
        let value = self.read_mem(bus, eff, wide);
        let acc = if wide { self.c } else { self.c & 0xFF };
        self.set_flag(flags::Z, value & acc == 0);
        self.write_mem(bus, eff, wide, value & !acc);
    }

    fn update_nz(&mut self, value: u16, wide: bool) {
        if wide {
            self.update_nz_16(value);
        } else {
            self.update_nz_8(value as u8);
        }
    }

    // ===== Register increment/decrement =====

    fn op_ina(&mut self) {
        if self.m_flag() {
            let v = (self.c as u8).wrapping_add(1);
            self.c = (self.c & 0xFF00) | v as u16;
            self.update_nz_8(v);
        } else {
            let v = self.c.wrapping_add(1);
            self.c = v;
            self.update_nz_16(v);
        }
    }

    fn op_dea(&mut self) {
        if self.m_flag() {
            let v = (self.c as u8).wrapping_sub(1);
            self.c = (self.c & 0xFF00) | v as u16;
            self.update_nz_8(v);
        } else {
            let v = self.c.wrapping_sub(1);
            self.c = v;
            self.update_nz_16(v);
        }
    }

    fn op_inx(&mut self) {
        if self.x_flag() {
            let v = (self.x as u8).wrapping_add(1);
            self.x = v as u16;
            self.update_nz_8(v);
        } else {
            let v = self.x.wrapping_add(1);
            self.x = v;
            self.update_nz_16(v);
        }
    }

    fn op_iny(&mut self) {
        if self.x_flag() {
            let v = (self.y as u8).wrapping_add(1);
            self.y = v as u16;
            self.update_nz_8(v);
        } else {
            let v = self.y.wrapping_add(1);
            self.y = v;
            self.update_nz_16(v);
        }
    }

    fn op_dex(&mut self) {
        if self.x_flag() {
            let v = (self.x as u8).wrapping_sub(1);
            self.x = v as u16;
            self.update_nz_8(v);
        } else {
            let v = self.x.wrapping_sub(1);
            self.x = v;
            self.update_nz_16(v);
        }
    }

    fn op_dey(&mut self) {
        if self.x_flag() {
            let v = (self.y as u8).wrapping_sub(1);
            self.y = v as u16;
            self.update_nz_8(v);
        } else {
            let v = self.y.wrapping_sub(1);
            self.y = v;
            self.update_nz_16(v);
        }
    }

    // ===== Branches and jumps =====

    fn branch_if(&mut self, bus: &mut Bus, taken: bool) {
        let eff = self.resolve_address(bus, AddressingMode::Relative);
        if taken {
            bus.clock.step_fast();
            if self.emulation && (self.pc & 0xFF00) != (eff.addr & 0xFF00) {
                bus.clock.step_fast();
            }
            self.pc = eff.addr;
        }
    }

    fn op_brl(&mut self, bus: &mut Bus) {
        let eff = self.resolve_address(bus, AddressingMode::RelativeLong);
        self.pc = eff.addr;
    }

    fn op_jmp_absolute(&mut self, bus: &mut Bus) {
        self.pc = self.fetch_word(bus);
    }

    fn op_jmp_long(&mut self, bus: &mut Bus) {
        let addr = self.fetch_word(bus);
        let bank = self.fetch_byte(bus);
        self.pbr = bank;
        self.pc = addr;
    }

    fn op_jmp_indirect(&mut self, bus: &mut Bus) {
        let ptr = self.fetch_word(bus);
        let lo = bus.read_byte(0, ptr);
        let hi = bus.read_byte(0, ptr.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    fn op_jmp_indirect_long(&mut self, bus: &mut Bus) {
        let ptr = self.fetch_word(bus);
        let lo = bus.read_byte(0, ptr);
        let hi = bus.read_byte(0, ptr.wrapping_add(1));
        let bank = bus.read_byte(0, ptr.wrapping_add(2));
        self.pbr = bank;
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    fn op_jmp_indexed_indirect(&mut self, bus: &mut Bus) {
        let base = self.fetch_word(bus);
        let ptr = base.wrapping_add(self.x);
        let lo = bus.read_byte(self.pbr, ptr);
        let hi = bus.read_byte(self.pbr, ptr.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    fn op_jsr(&mut self, bus: &mut Bus) {
        let addr = self.fetch_word(bus);
        let return_addr = self.pc.wrapping_sub(1);
        self.push_word(bus, return_addr);
        self.pc = addr;
    }

    fn op_jsr_indexed_indirect(&mut self, bus: &mut Bus) {
        let base = self.fetch_word(bus);
        let return_addr = self.pc.wrapping_sub(1);
        self.push_word(bus, return_addr);
        let ptr = base.wrapping_add(self.x);
        let lo = bus.read_byte(self.pbr, ptr);
        let hi = bus.read_byte(self.pbr, ptr.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    fn op_jsl(&mut self, bus: &mut Bus) {
        let addr = self.fetch_word(bus);
        let bank = self.fetch_byte(bus);
        let pbr = self.pbr;
        self.push_byte(bus, pbr);
        let return_addr = self.pc.wrapping_sub(1);
        self.push_word(bus, return_addr);
        self.pbr = bank;
        self.pc = addr;
    }

    fn op_rts(&mut self, bus: &mut Bus) {
        let addr = self.pull_word(bus);
        self.pc = addr.wrapping_add(1);
    }

    fn op_rtl(&mut self, bus: &mut Bus) {
        let addr = self.pull_word(bus);
        let bank = self.pull_byte(bus);
        self.pbr = bank;
        self.pc = addr.wrapping_add(1);
    }

    // ===== Stack =====

    fn op_pha(&mut self, bus: &mut Bus) {
        if !self.m_flag() {
            let c = self.c;
            self.push_word(bus, c);
        } else {
            let v = self.c as u8;
            self.push_byte(bus, v);
        }
    }

    fn op_pla(&mut self, bus: &mut Bus) {
        if !self.m_flag() {
            let v = self.pull_word(bus);
            self.c = v;
            self.update_nz_16(v);
        } else {
            let v = self.pull_byte(bus);
            self.c = (self.c & 0xFF00) | v as u16;
            self.update_nz_8(v);
        }
    }

    fn op_phx(&mut self, bus: &mut Bus) {
        if !self.x_flag() {
            let x = self.x;
            self.push_word(bus, x);
        } else {
            let v = self.x as u8;
            self.push_byte(bus, v);
        }
    }

    fn op_plx(&mut self, bus: &mut Bus) {
        if !self.x_flag() {
            let v = self.pull_word(bus);
            self.x = v;
            self.update_nz_16(v);
        } else {
            let v = self.pull_byte(bus);
            self.x = v as u16;
            self.update_nz_8(v);
        }
    }

    fn op_phy(&mut self, bus: &mut Bus) {
        if !self.x_flag() {
            let y = self.y;
            self.push_word(bus, y);
        } else {
            let v = self.y as u8;
            self.push_byte(bus, v);
        }
    }

    fn op_ply(&mut self, bus: &mut Bus) {
        if !self.x_flag() {
            let v = self.pull_word(bus);
            self.y = v;
            self.update_nz_16(v);
        } else {
            let v = self.pull_byte(bus);
            self.y = v as u16;
            self.update_nz_8(v);
        }
    }

    fn op_plp(&mut self, bus: &mut Bus) {
        let mut p = self.pull_byte(bus);
        if self.emulation {
            p |= flags::M | flags::X;
        }
        self.p = p;
        self.apply_width_effects();
    }

    fn op_plb(&mut self, bus: &mut Bus) {
        let v = self.pull_byte(bus);
        self.dbr = v;
        self.update_nz_8(v);
    }

    fn op_pld(&mut self, bus: &mut Bus) {
        let v = self.pull_word(bus);
        self.d = v;
        self.update_nz_16(v);
    }

    fn op_pea(&mut self, bus: &mut Bus) {
        let value = self.fetch_word(bus);
        self.push_word(bus, value);
    }

    fn op_pei(&mut self, bus: &mut Bus) {
        let offset = self.fetch_byte(bus);
        let ptr = self.d.wrapping_add(offset as u16);
        let lo = bus.read_byte(0, ptr);
        let hi = bus.read_byte(0, ptr.wrapping_add(1));
        let value = u16::from_le_bytes([lo, hi]);
        self.push_word(bus, value);
    }

    fn op_per(&mut self, bus: &mut Bus) {
        let offset = self.fetch_word(bus) as i16;
        let addr = (self.pc as i32 + offset as i32) as u16;
        self.push_word(bus, addr);
    }

    // ===== Transfers =====

    fn op_tax(&mut self) {
        if self.x_flag() {
            let v = self.c as u8;
            self.x = v as u16;
            self.update_nz_8(v);
        } else {
            self.x = self.c;
            self.update_nz_16(self.c);
        }
    }

    fn op_tay(&mut self) {
        if self.x_flag() {
            let v = self.c as u8;
            self.y = v as u16;
            self.update_nz_8(v);
        } else {
            self.y = self.c;
            self.update_nz_16(self.c);
        }
    }

    fn op_txa(&mut self) {
        if self.m_flag() {
            let v = self.x as u8;
            self.c = (self.c & 0xFF00) | v as u16;
            self.update_nz_8(v);
        } else {
            self.c = self.x;
            self.update_nz_16(self.x);
        }
    }

    fn op_tya(&mut self) {
        if self.m_flag() {
            let v = self.y as u8;
            self.c = (self.c & 0xFF00) | v as u16;
            self.update_nz_8(v);
        } else {
            self.c = self.y;
            self.update_nz_16(self.y);
        }
    }

    fn op_tsx(&mut self) {
        if self.x_flag() {
            let v = self.s as u8;
            self.x = v as u16;
            self.update_nz_8(v);
        } else {
            self.x = self.s;
            self.update_nz_16(self.s);
        }
    }

    fn op_txs(&mut self) {
        self.s = if self.emulation { (self.x & 0xFF) | 0x0100 } else { self.x };
    }

    fn op_tcs(&mut self) {
        self.s = if self.emulation { (self.c & 0xFF) | 0x0100 } else { self.c };
    }

    fn op_tsc(&mut self) {
        self.c = self.s;
        self.update_nz_16(self.s);
    }

    fn op_tcd(&mut self) {
        self.d = self.c;
        self.update_nz_16(self.d);
    }

    fn op_tdc(&mut self) {
        self.c = self.d;
        self.update_nz_16(self.d);
    }

    fn op_txy(&mut self) {
        if self.x_flag() {
            let v = self.x as u8;
            self.y = v as u16;
            self.update_nz_8(v);
        } else {
            self.y = self.x;
            self.update_nz_16(self.x);
        }
    }

    fn op_tyx(&mut self) {
        if self.x_flag() {
            let v = self.y as u8;
            self.x = v as u16;
            self.update_nz_8(v);
        } else {
            self.x = self.y;
            self.update_nz_16(self.y);
        }
    }

    fn op_xba(&mut self) {
        let lo = self.c as u8;
        let hi = (self.c >> 8) as u8;
        self.c = ((lo as u16) << 8) | hi as u16;
        self.update_nz_8(hi);
    }

    // ===== Flags, block move, misc =====

    fn op_rep(&mut self, bus: &mut Bus) {
        let mask = self.fetch_byte(bus);
        self.p &= !mask;
        if self.emulation {
            self.p |= flags::M | flags::X;
        }
        self.apply_width_effects();
    }

    fn op_sep(&mut self, bus: &mut Bus) {
        let mask = self.fetch_byte(bus);
        self.p |= mask;
        self.apply_width_effects();
    }

    fn op_mvn(&mut self, bus: &mut Bus) {
        let eff = self.resolve_address(bus, AddressingMode::BlockMove);
        let src_bank = eff.bank;
        let dest_bank = eff.addr as u8;
        let byte = bus.read_byte(src_bank, self.x);
        bus.write_byte(dest_bank, self.y, byte);
        self.x = self.x.wrapping_add(1);
        self.y = self.y.wrapping_add(1);
        self.c = self.c.wrapping_sub(1);
        self.dbr = dest_bank;
        if self.c != 0xFFFF {
            self.pc = self.pc.wrapping_sub(3);
        }
    }

    fn op_mvp(&mut self, bus: &mut Bus) {
        let eff = self.resolve_address(bus, AddressingMode::BlockMove);
        let src_bank = eff.bank;
        let dest_bank = eff.addr as u8;
        let byte = bus.read_byte(src_bank, self.x);
        bus.write_byte(dest_bank, self.y, byte);
        self.x = self.x.wrapping_sub(1);
        self.y = self.y.wrapping_sub(1);
        self.c = self.c.wrapping_sub(1);
        self.dbr = dest_bank;
        if self.c != 0xFFFF {
            self.pc = self.pc.wrapping_sub(3);
        }
    }

    fn op_wdm(&mut self, bus: &mut Bus) {
        let _ = self.fetch_byte(bus);
    }

    fn op_wai(&mut self) {
        self.ready_out = false;
    }
}

fn shift_left(value: u16, wide: bool) -> (u16, bool) {
    if wide {
        (value << 1, value & 0x8000 != 0)
    } else {
        let v = value as u8;
        ((v << 1) as u16, v & 0x80 != 0)
    }
}

fn shift_right(value: u16, wide: bool) -> (u16, bool) {
    if wide {
        (value >> 1, value & 0x0001 != 0)
    } else {
        let v = value as u8;
        ((v >> 1) as u16, v & 0x01 != 0)
    }
}

fn rotate_left(value: u16, wide: bool, carry_in: bool) -> (u16, bool) {
    if wide {
        let carry_out = value & 0x8000 != 0;
        ((value << 1) | carry_in as u16, carry_out)
    } else {
        let v = value as u8;
        let carry_out = v & 0x80 != 0;
        (((v << 1) | carry_in as u8) as u16, carry_out)
    }
}

fn rotate_right(value: u16, wide: bool, carry_in: bool) -> (u16, bool) {
    if wide {
        let carry_out = value & 0x0001 != 0;
        ((value >> 1) | ((carry_in as u16) << 15), carry_out)
    } else {
        let v = value as u8;
        let carry_out = v & 0x01 != 0;
        (((v >> 1) | ((carry_in as u8) << 7)) as u16, carry_out)
    }
}

/// Adds two BCD digit-pairs plus carry, producing a valid packed-BCD result
/// and the N/V/Z-correct carry/overflow the 65C816 (unlike the NMOS 6502)
/// guarantees in decimal mode.
fn bcd_add_byte(a: u8, b: u8, carry_in: bool) -> (u8, bool, bool) {
    let mut lo = (a & 0x0F) + (b & 0x0F) + carry_in as u8;
    let half_carry = lo > 9;
    if half_carry {
        lo = lo.wrapping_sub(10);
    }
    let mut hi = (a >> 4) + (b >> 4) + half_carry as u8;
    let overflow = (a ^ b) & 0x80 == 0 && (a ^ (hi << 4)) & 0x80 != 0;
    let carry_out = hi > 9;
    if carry_out {
        hi = hi.wrapping_sub(10);
    }
    (((hi & 0x0F) << 4) | (lo & 0x0F), carry_out, overflow)
}

fn bcd_sub_byte(a: u8, b: u8, borrow_in: bool) -> (u8, bool, bool) {
    let bin = a as i16 - b as i16 - borrow_in as i16;
    let mut lo = (a & 0x0F) as i16 - (b & 0x0F) as i16 - borrow_in as i16;
    let mut hi = (a >> 4) as i16 - (b >> 4) as i16;
    if lo < 0 {
        lo += 10;
        hi -= 1;
    }
    if hi < 0 {
        hi += 10;
    }
    let result = ((hi as u8) << 4) | (lo as u8);
    let overflow = (a ^ b) & 0x80 != 0 && (a ^ result) & 0x80 != 0;
    (result, bin >= 0, overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::config::MachineConfig;

    fn test_bus() -> Bus {
        let mut bus = Bus::new(&MachineConfig::new()).unwrap();
        bus.load_rom(&vec![0u8; 0x20000]).unwrap();
        bus
    }

    #[test]
    fn lda_immediate_8_bit_sets_flags() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.emulation = false;
        cpu.p |= flags::M;
        bus.write_byte(cpu.pbr, cpu.pc, 0x00);
        cpu.execute(&mut bus, 0xA9);
        assert_eq!(cpu.c & 0xFF, 0);
        assert!(cpu.p & flags::Z != 0);
    }

    #[test]
    fn adc_decimal_mode_carries_between_digits() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.emulation = false;
        cpu.p |= flags::M | flags::D;
        cpu.c = 0x0099;
        bus.write_byte(cpu.pbr, cpu.pc, 0x01);
        cpu.execute(&mut bus, 0x69);
        assert_eq!(cpu.c & 0xFF, 0x00);
        assert!(cpu.p & flags::C != 0);
    }

    #[test]
    fn mvn_repeats_until_accumulator_exhausted() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.emulation = false;
        cpu.p &= !flags::M;
        cpu.c = 0x0001; // two bytes to move
        cpu.x = 0x1000;
        cpu.y = 0x2000;
        bus.write_byte(0x01, 0x1000, 0xAA);
        bus.write_byte(0x01, 0x1001, 0xBB);
        bus.write_byte(cpu.pbr, cpu.pc, 0x02); // dest bank
        bus.write_byte(cpu.pbr, cpu.pc.wrapping_add(1), 0x01); // src bank
        let start_pc = cpu.pc;
        cpu.execute(&mut bus, 0x54);
        assert_eq!(cpu.pc, start_pc); // re-executes, one byte left
        cpu.execute(&mut bus, 0x54);
        assert_eq!(cpu.c, 0xFFFF);
        assert_eq!(bus.read_byte(0x02, 0x2000), 0xAA);
        assert_eq!(bus.read_byte(0x02, 0x2001), 0xBB);
        assert_eq!(cpu.dbr, 0x02);
    }

    #[test]
    fn xce_switches_to_native_and_widens_stack() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        assert!(cpu.emulation);
        cpu.p &= !flags::C;
        cpu.execute(&mut bus, 0xFB);
        assert!(!cpu.emulation);
        assert!(cpu.p & flags::C != 0);
    }

    #[test]
    fn jsr_rts_round_trip_preserves_pc() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.emulation = false;
        let start = cpu.pc;
        bus.write_byte(cpu.pbr, cpu.pc, 0x34);
        bus.write_byte(cpu.pbr, cpu.pc.wrapping_add(1), 0x12);
        cpu.execute(&mut bus, 0x20);
        assert_eq!(cpu.pc, 0x1234);
        cpu.execute(&mut bus, 0x60);
        assert_eq!(cpu.pc, start.wrapping_add(3));
    }

    #[test]
    fn tsb_sets_zero_flag_from_original_memory() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.emulation = false;
        cpu.p |= flags::M;
        cpu.c = 0x0001;
        bus.write_byte(0, 0x0010, 0x00);
        cpu.d = 0;
        bus.write_byte(cpu.pbr, cpu.pc, 0x10);
        cpu.execute(&mut bus, 0x04);
        assert!(cpu.p & flags::Z != 0);
        assert_eq!(bus.read_byte(0, 0x0010), 0x01);
    }
}
