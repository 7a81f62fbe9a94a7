use crate::{
    interrupt::Interrupt,
    mmu::Mmu,
    registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, Reg16, Registers},
};
use log::warn;

/// 8-bit operand selected by the low three bits of most ALU/LD/CB opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operand {
    B,
    C,
    D,
    E,
    H,
    L,
    HlIndirect,
    A,
}

impl Operand {
    #[inline]
    const fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => Operand::B,
            1 => Operand::C,
            2 => Operand::D,
            3 => Operand::E,
            4 => Operand::H,
            5 => Operand::L,
            6 => Operand::HlIndirect,
            _ => Operand::A,
        }
    }
}

pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    /// Counts down to IME=1 after EI. Set to 2 so the instruction following
    /// EI completes before interrupts are taken.
    ime_enable_delay: u8,
}

impl Cpu {
    /// CPU state after the DMG boot ROM hands over to the cartridge.
    pub fn new() -> Self {
        Self {
            regs: Registers::post_boot(),
            ime: false,
            halted: false,
            stopped: false,
            ime_enable_delay: 0,
        }
    }

    /// All registers cleared, PC at the start of the boot ROM.
    pub fn new_power_on() -> Self {
        Self {
            regs: Registers::default(),
            ime: false,
            halted: false,
            stopped: false,
            ime_enable_delay: 0,
        }
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} IME:{} HALT:{}",
            self.regs.af(),
            self.regs.bc(),
            self.regs.de(),
            self.regs.hl(),
            self.regs.pc,
            self.regs.sp,
            self.ime as u8,
            self.halted as u8,
        )
    }

    /// Execute one instruction (or one idle cycle while halted/stopped) and
    /// then service a pending interrupt if IME allows it.
    pub fn step(&mut self, mmu: &mut Mmu) {
        if self.stopped {
            if !mmu.interrupts.is_requested(Interrupt::Joypad) {
                mmu.tick();
                return;
            }
            self.stopped = false;
        }

        if self.halted {
            mmu.tick();
            if mmu.interrupts.pending() == 0 {
                return;
            }
            self.halted = false;
            self.handle_interrupts(mmu);
            return;
        }

        let opcode = self.fetch8(mmu);
        self.execute(opcode, mmu);

        if self.ime_enable_delay > 0 {
            self.ime_enable_delay -= 1;
            if self.ime_enable_delay == 0 {
                self.ime = true;
            }
        }

        self.handle_interrupts(mmu);
    }

    fn handle_interrupts(&mut self, mmu: &mut Mmu) {
        if !self.ime {
            return;
        }
        let Some(source) = mmu.interrupts.highest_priority() else {
            return;
        };
        self.halted = false;
        self.ime = false;
        self.ime_enable_delay = 0;

        mmu.tick();
        mmu.tick();
        let pc = self.regs.pc;
        self.push_stack(mmu, pc);
        mmu.interrupts.acknowledge(source);
        self.regs.pc = source.vector();
        mmu.tick();
    }

    #[inline(always)]
    fn fetch8(&mut self, mmu: &mut Mmu) -> u8 {
        let val = mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    #[inline(always)]
    fn fetch16(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, val as u8);
    }

    fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = mmu.read_byte(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = mmu.read_byte(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    fn read_operand(&mut self, mmu: &mut Mmu, op: Operand) -> u8 {
        match op {
            Operand::B => self.regs.b,
            Operand::C => self.regs.c,
            Operand::D => self.regs.d,
            Operand::E => self.regs.e,
            Operand::H => self.regs.h,
            Operand::L => self.regs.l,
            Operand::HlIndirect => mmu.read_byte(self.regs.hl()),
            Operand::A => self.regs.a,
        }
    }

    fn write_operand(&mut self, mmu: &mut Mmu, op: Operand, val: u8) {
        match op {
            Operand::B => self.regs.b = val,
            Operand::C => self.regs.c = val,
            Operand::D => self.regs.d = val,
            Operand::E => self.regs.e = val,
            Operand::H => self.regs.h = val,
            Operand::L => self.regs.l = val,
            Operand::HlIndirect => mmu.write_byte(self.regs.hl(), val),
            Operand::A => self.regs.a = val,
        }
    }

    /// Condition field of JR/JP/CALL/RET cc: NZ, Z, NC, C.
    #[inline]
    fn condition(&self, opcode: u8) -> bool {
        match (opcode >> 3) & 0x03 {
            0 => !self.regs.flag(FLAG_Z),
            1 => self.regs.flag(FLAG_Z),
            2 => !self.regs.flag(FLAG_C),
            _ => self.regs.flag(FLAG_C),
        }
    }

    fn add8(&mut self, val: u8, carry: bool) {
        let a = self.regs.a;
        let c = carry as u8;
        let res = a.wrapping_add(val).wrapping_add(c);
        self.regs.set_f(
            if res == 0 { FLAG_Z } else { 0 }
                | if (a & 0x0F) + (val & 0x0F) + c > 0x0F { FLAG_H } else { 0 }
                | if a as u16 + val as u16 + c as u16 > 0xFF { FLAG_C } else { 0 },
        );
        self.regs.a = res;
    }

    /// Flags for A - val (- carry). Returns the difference without storing
    /// it so CP can share the path.
    fn sub8(&mut self, val: u8, carry: bool) -> u8 {
        let a = self.regs.a;
        let c = carry as u8;
        let res = a.wrapping_sub(val).wrapping_sub(c);
        self.regs.set_f(
            FLAG_N
                | if res == 0 { FLAG_Z } else { 0 }
                | if (a & 0x0F) < (val & 0x0F) + c { FLAG_H } else { 0 }
                | if (a as u16) < val as u16 + c as u16 { FLAG_C } else { 0 },
        );
        res
    }

    /// ADD/ADC/SUB/SBC/AND/XOR/OR/CP selected by bits 3-5.
    fn alu(&mut self, kind: u8, val: u8) {
        let carry = self.regs.flag(FLAG_C);
        match kind & 0x07 {
            0 => self.add8(val, false),
            1 => self.add8(val, carry),
            2 => self.regs.a = self.sub8(val, false),
            3 => self.regs.a = self.sub8(val, carry),
            4 => {
                self.regs.a &= val;
                self.regs.set_f(FLAG_H | if self.regs.a == 0 { FLAG_Z } else { 0 });
            }
            5 => {
                self.regs.a ^= val;
                self.regs.set_f(if self.regs.a == 0 { FLAG_Z } else { 0 });
            }
            6 => {
                self.regs.a |= val;
                self.regs.set_f(if self.regs.a == 0 { FLAG_Z } else { 0 });
            }
            _ => {
                self.sub8(val, false);
            }
        }
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.regs.set_f(
            (self.regs.f() & FLAG_C)
                | if res == 0 { FLAG_Z } else { 0 }
                | if val & 0x0F == 0x0F { FLAG_H } else { 0 },
        );
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.regs.set_f(
            (self.regs.f() & FLAG_C)
                | FLAG_N
                | if res == 0 { FLAG_Z } else { 0 }
                | if val & 0x0F == 0 { FLAG_H } else { 0 },
        );
        res
    }

    fn add_hl(&mut self, val: u16) {
        let hl = self.regs.hl();
        let res = hl.wrapping_add(val);
        self.regs.set_f(
            (self.regs.f() & FLAG_Z)
                | if (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF { FLAG_H } else { 0 }
                | if hl as u32 + val as u32 > 0xFFFF { FLAG_C } else { 0 },
        );
        self.regs.set_hl(res);
    }

    /// SP + signed offset with H/C taken from the low byte, as shared by
    /// `ADD SP,e` and `LD HL,SP+e`.
    fn sp_plus_offset(&mut self, offset: u8) -> u16 {
        let sp = self.regs.sp;
        let res = sp.wrapping_add(offset as i8 as i16 as u16);
        self.regs.set_f(
            if (sp & 0x0F) + (offset as u16 & 0x0F) > 0x0F { FLAG_H } else { 0 }
                | if (sp & 0xFF) + offset as u16 > 0xFF { FLAG_C } else { 0 },
        );
        res
    }

    fn daa(&mut self) {
        let mut correction = 0u8;
        let mut carry = self.regs.flag(FLAG_C);
        let subtract = self.regs.flag(FLAG_N);
        if self.regs.flag(FLAG_H) || (!subtract && (self.regs.a & 0x0F) > 9) {
            correction |= 0x06;
        }
        if carry || (!subtract && self.regs.a > 0x99) {
            correction |= 0x60;
            carry = true;
        }
        self.regs.a = if subtract {
            self.regs.a.wrapping_sub(correction)
        } else {
            self.regs.a.wrapping_add(correction)
        };
        self.regs.set_f(
            if self.regs.a == 0 { FLAG_Z } else { 0 }
                | if subtract { FLAG_N } else { 0 }
                | if carry { FLAG_C } else { 0 },
        );
    }

    /// RLC/RRC/RL/RR/SLA/SRA/SWAP/SRL selected by bits 3-5 of a CB opcode.
    /// Sets Z from the result; the accumulator forms clear it afterwards.
    fn shift(&mut self, kind: u8, val: u8) -> u8 {
        let carry_in = self.regs.flag(FLAG_C) as u8;
        let (res, carry_out) = match kind & 0x07 {
            0 => (val.rotate_left(1), val & 0x80 != 0),
            1 => (val.rotate_right(1), val & 0x01 != 0),
            2 => ((val << 1) | carry_in, val & 0x80 != 0),
            3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            4 => (val << 1, val & 0x80 != 0),
            5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            6 => (val.rotate_left(4), false),
            _ => (val >> 1, val & 0x01 != 0),
        };
        self.regs.set_f(
            if res == 0 { FLAG_Z } else { 0 } | if carry_out { FLAG_C } else { 0 },
        );
        res
    }

    fn execute(&mut self, opcode: u8, mmu: &mut Mmu) {
        match opcode {
            0x00 => {}
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(mmu);
                self.regs.set16(Reg16::from_index(opcode >> 4), val);
            }
            0x02 => mmu.write_byte(self.regs.bc(), self.regs.a),
            0x12 => mmu.write_byte(self.regs.de(), self.regs.a),
            0x22 => {
                let hl = self.regs.hl();
                mmu.write_byte(hl, self.regs.a);
                self.regs.set_hl(hl.wrapping_add(1));
            }
            0x32 => {
                let hl = self.regs.hl();
                mmu.write_byte(hl, self.regs.a);
                self.regs.set_hl(hl.wrapping_sub(1));
            }
            0x0A => self.regs.a = mmu.read_byte(self.regs.bc()),
            0x1A => self.regs.a = mmu.read_byte(self.regs.de()),
            0x2A => {
                let hl = self.regs.hl();
                self.regs.a = mmu.read_byte(hl);
                self.regs.set_hl(hl.wrapping_add(1));
            }
            0x3A => {
                let hl = self.regs.hl();
                self.regs.a = mmu.read_byte(hl);
                self.regs.set_hl(hl.wrapping_sub(1));
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rr = Reg16::from_index(opcode >> 4);
                mmu.tick();
                self.regs.set16(rr, self.regs.get16(rr).wrapping_add(1));
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rr = Reg16::from_index(opcode >> 4);
                mmu.tick();
                self.regs.set16(rr, self.regs.get16(rr).wrapping_sub(1));
            }
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let op = Operand::from_index(opcode >> 3);
                let val = self.read_operand(mmu, op);
                let res = self.inc8(val);
                self.write_operand(mmu, op, res);
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let op = Operand::from_index(opcode >> 3);
                let val = self.read_operand(mmu, op);
                let res = self.dec8(val);
                self.write_operand(mmu, op, res);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let val = self.fetch8(mmu);
                self.write_operand(mmu, Operand::from_index(opcode >> 3), val);
            }
            // RLCA, RRCA, RLA, RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                self.regs.a = self.shift(opcode >> 3, self.regs.a);
                self.regs.set_flag(FLAG_Z, false);
            }
            0x08 => {
                let addr = self.fetch16(mmu);
                let sp = self.regs.sp;
                mmu.write_byte(addr, sp as u8);
                mmu.write_byte(addr.wrapping_add(1), (sp >> 8) as u8);
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                let val = self.regs.get16(Reg16::from_index(opcode >> 4));
                mmu.tick();
                self.add_hl(val);
            }
            0x10 => {
                // STOP is followed by a padding byte.
                self.fetch8(mmu);
                mmu.timer.reset_div();
                self.stopped = true;
            }
            0x18 => {
                let offset = self.fetch8(mmu) as i8;
                mmu.tick();
                self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(mmu) as i8;
                if self.condition(opcode) {
                    mmu.tick();
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                }
            }
            0x27 => self.daa(),
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.set_f(self.regs.f() | FLAG_N | FLAG_H);
            }
            0x37 => self.regs.set_f((self.regs.f() & FLAG_Z) | FLAG_C),
            0x3F => {
                let carry = if self.regs.flag(FLAG_C) { 0 } else { FLAG_C };
                self.regs.set_f((self.regs.f() & FLAG_Z) | carry);
            }
            0x76 => {
                // With IME clear and an interrupt already pending, HALT
                // falls straight through.
                if self.ime || mmu.interrupts.pending() == 0 {
                    self.halted = true;
                }
            }
            0x40..=0x7F => {
                let val = self.read_operand(mmu, Operand::from_index(opcode));
                self.write_operand(mmu, Operand::from_index(opcode >> 3), val);
            }
            0x80..=0xBF => {
                let val = self.read_operand(mmu, Operand::from_index(opcode));
                self.alu(opcode >> 3, val);
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.fetch8(mmu);
                self.alu(opcode >> 3, val);
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                mmu.tick();
                if self.condition(opcode) {
                    self.regs.pc = self.pop_stack(mmu);
                    mmu.tick();
                }
            }
            0xC9 => {
                self.regs.pc = self.pop_stack(mmu);
                mmu.tick();
            }
            0xD9 => {
                self.regs.pc = self.pop_stack(mmu);
                mmu.tick();
                self.ime = true;
                self.ime_enable_delay = 0;
            }
            0xC1 | 0xD1 | 0xE1 => {
                let val = self.pop_stack(mmu);
                self.regs.set16(Reg16::from_index(opcode >> 4), val);
            }
            0xF1 => {
                let val = self.pop_stack(mmu);
                self.regs.set_af(val);
            }
            0xC5 | 0xD5 | 0xE5 => {
                let val = self.regs.get16(Reg16::from_index(opcode >> 4));
                mmu.tick();
                self.push_stack(mmu, val);
            }
            0xF5 => {
                let val = self.regs.af();
                mmu.tick();
                self.push_stack(mmu, val);
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(mmu);
                if self.condition(opcode) {
                    mmu.tick();
                    self.regs.pc = addr;
                }
            }
            0xC3 => {
                let addr = self.fetch16(mmu);
                mmu.tick();
                self.regs.pc = addr;
            }
            0xE9 => self.regs.pc = self.regs.hl(),
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(mmu);
                if self.condition(opcode) {
                    mmu.tick();
                    let ret = self.regs.pc;
                    self.push_stack(mmu, ret);
                    self.regs.pc = addr;
                }
            }
            0xCD => {
                let addr = self.fetch16(mmu);
                mmu.tick();
                let ret = self.regs.pc;
                self.push_stack(mmu, ret);
                self.regs.pc = addr;
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                mmu.tick();
                let ret = self.regs.pc;
                self.push_stack(mmu, ret);
                self.regs.pc = (opcode & 0x38) as u16;
            }
            0xCB => {
                let cb = self.fetch8(mmu);
                self.execute_cb(cb, mmu);
            }
            0xE0 => {
                let offset = self.fetch8(mmu) as u16;
                mmu.write_byte(0xFF00 | offset, self.regs.a);
            }
            0xF0 => {
                let offset = self.fetch8(mmu) as u16;
                self.regs.a = mmu.read_byte(0xFF00 | offset);
            }
            0xE2 => mmu.write_byte(0xFF00 | self.regs.c as u16, self.regs.a),
            0xF2 => self.regs.a = mmu.read_byte(0xFF00 | self.regs.c as u16),
            0xEA => {
                let addr = self.fetch16(mmu);
                mmu.write_byte(addr, self.regs.a);
            }
            0xFA => {
                let addr = self.fetch16(mmu);
                self.regs.a = mmu.read_byte(addr);
            }
            0xE8 => {
                let offset = self.fetch8(mmu);
                self.regs.sp = self.sp_plus_offset(offset);
                mmu.tick();
                mmu.tick();
            }
            0xF8 => {
                let offset = self.fetch8(mmu);
                let val = self.sp_plus_offset(offset);
                self.regs.set_hl(val);
                mmu.tick();
            }
            0xF9 => {
                mmu.tick();
                self.regs.sp = self.regs.hl();
            }
            0xF3 => {
                self.ime = false;
                self.ime_enable_delay = 0;
            }
            0xFB => self.ime_enable_delay = 2,
            // D3 DB DD E3 E4 EB EC ED F4 FC FD
            _ => warn!(
                "Illegal opcode {opcode:02X} at {:04X}",
                self.regs.pc.wrapping_sub(1)
            ),
        }
    }

    fn execute_cb(&mut self, opcode: u8, mmu: &mut Mmu) {
        let op = Operand::from_index(opcode);
        let bit = (opcode >> 3) & 0x07;
        match opcode {
            0x00..=0x3F => {
                let val = self.read_operand(mmu, op);
                let res = self.shift(bit, val);
                self.write_operand(mmu, op, res);
            }
            0x40..=0x7F => {
                let val = self.read_operand(mmu, op);
                self.regs.set_f(
                    (self.regs.f() & FLAG_C)
                        | FLAG_H
                        | if val & (1 << bit) == 0 { FLAG_Z } else { 0 },
                );
            }
            0x80..=0xBF => {
                let val = self.read_operand(mmu, op);
                self.write_operand(mmu, op, val & !(1 << bit));
            }
            _ => {
                let val = self.read_operand(mmu, op);
                self.write_operand(mmu, op, val | (1 << bit));
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
