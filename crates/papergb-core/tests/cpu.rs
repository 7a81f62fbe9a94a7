mod common;

use common::{PROGRAM_BASE, SCRATCH, STACK_TOP, machine};
use papergb_core::{
    cpu::Cpu,
    interrupt::Interrupt,
    mmu::Mmu,
    registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z},
};

/// Run `program` for `steps` instructions starting from F=`flags`.
fn run(program: &[u8], flags: u8, steps: usize) -> (Cpu, Mmu) {
    let (mut cpu, mut mmu) = machine(program);
    cpu.regs.set_f(flags);
    for _ in 0..steps {
        cpu.step(&mut mmu);
    }
    (cpu, mmu)
}

#[test]
fn add_without_half_carry_or_carry() {
    // LD A,0x3C; LD B,0xC2; ADD A,B
    let (cpu, _) = run(&[0x3E, 0x3C, 0x06, 0xC2, 0x80], FLAG_Z | FLAG_C, 3);
    assert_eq!(cpu.regs.a, 0xFE);
    assert_eq!(cpu.regs.f(), 0x00);
}

#[test]
fn add_family_flags() {
    // ADD A,n half carry
    let (cpu, _) = run(&[0x3E, 0x0F, 0xC6, 0x01], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x10, FLAG_H));

    // ADD A,n carry and zero
    let (cpu, _) = run(&[0x3E, 0xF0, 0xC6, 0x10], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x00, FLAG_Z | FLAG_C));

    // SCF; ADC A,n adds the carry into the nibble sum
    let (cpu, _) = run(&[0x37, 0x3E, 0x0E, 0xCE, 0x01], 0, 3);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x10, FLAG_H));
}

#[test]
fn sub_family_flags() {
    // SUB n borrow from bit 4
    let (cpu, _) = run(&[0x3E, 0x10, 0xD6, 0x01], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x0F, FLAG_N | FLAG_H));

    // SUB n with operand greater than A
    let (cpu, _) = run(&[0x3E, 0x01, 0xD6, 0x02], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0xFF, FLAG_N | FLAG_H | FLAG_C));

    // SCF; SBC A,n borrows the carry
    let (cpu, _) = run(&[0x37, 0x3E, 0x00, 0xDE, 0x00], 0, 3);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0xFF, FLAG_N | FLAG_H | FLAG_C));

    // CP n leaves A alone
    let (cpu, _) = run(&[0x3E, 0x42, 0xFE, 0x42], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x42, FLAG_Z | FLAG_N));
}

#[test]
fn logic_family_flags() {
    let (cpu, _) = run(&[0x3E, 0xF0, 0xE6, 0x0F], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x00, FLAG_Z | FLAG_H));

    let (cpu, _) = run(&[0xAF], FLAG_N | FLAG_H | FLAG_C, 1);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x00, FLAG_Z));

    let (cpu, _) = run(&[0x3E, 0x50, 0xF6, 0x05], FLAG_C, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x55, 0));
}

#[test]
fn inc_dec_preserve_carry() {
    // LD B,0xFF; INC B
    let (cpu, _) = run(&[0x06, 0xFF, 0x04], FLAG_C, 2);
    assert_eq!((cpu.regs.b, cpu.regs.f()), (0x00, FLAG_Z | FLAG_H | FLAG_C));

    // LD B,0x10; DEC B
    let (cpu, _) = run(&[0x06, 0x10, 0x05], 0, 2);
    assert_eq!((cpu.regs.b, cpu.regs.f()), (0x0F, FLAG_N | FLAG_H));

    // LD B,0x01; DEC B
    let (cpu, _) = run(&[0x06, 0x01, 0x05], FLAG_C, 2);
    assert_eq!((cpu.regs.b, cpu.regs.f()), (0x00, FLAG_Z | FLAG_N | FLAG_C));

    // 16-bit INC/DEC touch no flags
    let (cpu, _) = run(&[0x01, 0xFF, 0xFF, 0x03], 0, 2);
    assert_eq!((cpu.regs.bc(), cpu.regs.f()), (0x0000, 0));
}

#[test]
fn add_hl_flags_from_bits_11_and_15() {
    // LD HL,0x0FFF; LD BC,0x0001; ADD HL,BC
    let (cpu, _) = run(&[0x21, 0xFF, 0x0F, 0x01, 0x01, 0x00, 0x09], FLAG_Z, 3);
    assert_eq!(cpu.regs.hl(), 0x1000);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H);

    // LD HL,0x8000; ADD HL,HL
    let (cpu, _) = run(&[0x21, 0x00, 0x80, 0x29], 0, 2);
    assert_eq!(cpu.regs.hl(), 0x0000);
    assert_eq!(cpu.regs.f(), FLAG_C);
}

#[test]
fn sp_offset_flags_from_low_byte() {
    // LD SP,0x00FF; ADD SP,1
    let (cpu, _) = run(&[0x31, 0xFF, 0x00, 0xE8, 0x01], FLAG_Z | FLAG_N, 2);
    assert_eq!(cpu.regs.sp, 0x0100);
    assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);

    // LD SP,0x0000; ADD SP,-1
    let (cpu, _) = run(&[0x31, 0x00, 0x00, 0xE8, 0xFF], 0, 2);
    assert_eq!(cpu.regs.sp, 0xFFFF);
    assert_eq!(cpu.regs.f(), 0);

    // LD HL,SP-1
    let (cpu, _) = run(&[0xF8, 0xFF], 0, 1);
    assert_eq!(cpu.regs.hl(), STACK_TOP - 1);
    assert_eq!(cpu.regs.sp, STACK_TOP);
    assert_eq!(cpu.regs.f(), FLAG_C);
}

#[test]
fn accumulator_rotates_clear_zero() {
    // LD A,0x80; RLCA
    let (cpu, _) = run(&[0x3E, 0x80, 0x07], FLAG_Z, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x01, FLAG_C));

    // XOR A; RRA with carry clear leaves zero but no Z
    let (cpu, _) = run(&[0xAF, 0x1F], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x00, 0));

    // SCF; LD A,0x00; RLA pulls the carry in
    let (cpu, _) = run(&[0x37, 0x3E, 0x00, 0x17], 0, 3);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x01, 0));
}

#[test]
fn cb_shift_family_flags() {
    // LD B,0x80; RL B
    let (cpu, _) = run(&[0x06, 0x80, 0xCB, 0x10], 0, 2);
    assert_eq!((cpu.regs.b, cpu.regs.f()), (0x00, FLAG_Z | FLAG_C));

    // LD A,0xF0; SWAP A
    let (cpu, _) = run(&[0x3E, 0xF0, 0xCB, 0x37], FLAG_C, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x0F, 0));

    // LD A,0x81; SRA A keeps bit 7
    let (cpu, _) = run(&[0x3E, 0x81, 0xCB, 0x2F], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0xC0, FLAG_C));

    // LD A,0x01; SRL A
    let (cpu, _) = run(&[0x3E, 0x01, 0xCB, 0x3F], 0, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0x00, FLAG_Z | FLAG_C));
}

#[test]
fn cb_bit_res_set() {
    // H is 0xC1 from SCRATCH. BIT 7,H then BIT 1,H
    let (cpu, _) = run(&[0xCB, 0x7C], FLAG_C, 1);
    assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);
    let (cpu, _) = run(&[0xCB, 0x4C], 0, 1);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H);

    // SET 0,(HL); RES 7,(HL)
    let (mut cpu, mut mmu) = machine(&[0xCB, 0xC6, 0xCB, 0xBE]);
    mmu.poke_byte(SCRATCH, 0x80);
    cpu.regs.set_f(0);
    cpu.step(&mut mmu);
    assert_eq!(mmu.peek_byte(SCRATCH), 0x81);
    cpu.step(&mut mmu);
    assert_eq!(mmu.peek_byte(SCRATCH), 0x01);
    assert_eq!(cpu.regs.f(), 0);
}

#[test]
fn misc_flag_instructions() {
    // LD A,0x35; CPL
    let (cpu, _) = run(&[0x3E, 0x35, 0x2F], FLAG_Z, 2);
    assert_eq!((cpu.regs.a, cpu.regs.f()), (0xCA, FLAG_Z | FLAG_N | FLAG_H));

    // SCF then CCF
    let (cpu, _) = run(&[0x37], FLAG_Z | FLAG_N | FLAG_H, 1);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_C);
    let (cpu, _) = run(&[0x37, 0x3F], FLAG_Z, 2);
    assert_eq!(cpu.regs.f(), FLAG_Z);
}

#[test]
fn pop_af_masks_low_nibble() {
    // LD BC,0x12FF; PUSH BC; POP AF
    let (cpu, _) = run(&[0x01, 0xFF, 0x12, 0xC5, 0xF1], 0, 3);
    assert_eq!(cpu.regs.af(), 0x12F0);
    assert_eq!(cpu.regs.sp, STACK_TOP);
}

#[test]
fn call_and_ret_round_trip() {
    // CALL 0xC010; ... at 0xC010: RET
    let mut program = vec![0u8; 0x11];
    program[..3].copy_from_slice(&[0xCD, 0x10, 0xC0]);
    program[0x10] = 0xC9;
    let (mut cpu, mut mmu) = machine(&program);
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.pc, 0xC010);
    assert_eq!(cpu.regs.sp, STACK_TOP - 2);
    assert_eq!(mmu.peek_byte(STACK_TOP - 1), 0xC0);
    assert_eq!(mmu.peek_byte(STACK_TOP - 2), 0x03);
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.pc, PROGRAM_BASE + 3);
    assert_eq!(cpu.regs.sp, STACK_TOP);
}

#[test]
fn ei_takes_effect_after_next_instruction() {
    // EI; NOP; NOP
    let (mut cpu, mut mmu) = machine(&[0xFB, 0x00, 0x00]);
    mmu.interrupts.enable = 0x01;
    mmu.interrupts.request_vblank();

    cpu.step(&mut mmu);
    assert!(!cpu.ime);
    assert_eq!(cpu.regs.pc, PROGRAM_BASE + 1);

    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert!(!cpu.ime);
    assert!(!mmu.interrupts.is_requested(Interrupt::VBlank));
    // Return address is the instruction after the NOP.
    assert_eq!(mmu.peek_byte(STACK_TOP - 2), 0x02);
    assert_eq!(mmu.peek_byte(STACK_TOP - 1), 0xC0);
}

#[test]
fn di_cancels_pending_ei() {
    // EI; DI; NOP
    let (mut cpu, mut mmu) = machine(&[0xFB, 0xF3, 0x00]);
    mmu.interrupts.enable = 0x01;
    mmu.interrupts.request_vblank();
    for _ in 0..3 {
        cpu.step(&mut mmu);
    }
    assert!(!cpu.ime);
    assert_eq!(cpu.regs.pc, PROGRAM_BASE + 3);
}

#[test]
fn reti_enables_immediately() {
    let (mut cpu, mut mmu) = machine(&[0xD9]);
    mmu.poke_byte(STACK_TOP, 0x34);
    mmu.poke_byte(STACK_TOP + 1, 0x12);
    cpu.step(&mut mmu);
    assert!(cpu.ime);
    assert_eq!(cpu.regs.pc, 0x1234);
}

#[test]
fn halt_wakes_into_handler_with_ime() {
    let (mut cpu, mut mmu) = machine(&[0x76, 0x00]);
    cpu.ime = true;
    mmu.interrupts.enable = 0x04;
    cpu.step(&mut mmu);
    assert!(cpu.halted);

    for _ in 0..8 {
        cpu.step(&mut mmu);
    }
    assert!(cpu.halted);
    assert_eq!(cpu.regs.pc, PROGRAM_BASE + 1);

    mmu.interrupts.request_timer();
    cpu.step(&mut mmu);
    assert!(!cpu.halted);
    assert_eq!(cpu.regs.pc, 0x0050);
    assert_eq!(mmu.peek_byte(STACK_TOP - 2), 0x01);
}

#[test]
fn halt_wakes_without_ime_and_continues() {
    // HALT; INC B
    let (mut cpu, mut mmu) = machine(&[0x76, 0x04]);
    mmu.interrupts.enable = 0x04;
    cpu.step(&mut mmu);
    assert!(cpu.halted);

    mmu.interrupts.request_timer();
    cpu.step(&mut mmu);
    assert!(!cpu.halted);
    assert_eq!(cpu.regs.pc, PROGRAM_BASE + 1);

    let b = cpu.regs.b;
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.b, b.wrapping_add(1));
    assert!(mmu.interrupts.is_requested(Interrupt::Timer));
}

#[test]
fn halt_with_pending_interrupt_and_no_ime_falls_through() {
    let (mut cpu, mut mmu) = machine(&[0x76, 0x00]);
    mmu.interrupts.enable = 0x04;
    mmu.interrupts.request_timer();
    cpu.step(&mut mmu);
    assert!(!cpu.halted);
    assert_eq!(cpu.regs.pc, PROGRAM_BASE + 1);
}

#[test]
fn lowest_pending_bit_is_serviced_first() {
    let (mut cpu, mut mmu) = machine(&[0x00]);
    cpu.ime = true;
    mmu.interrupts.enable = 0x1F;
    mmu.interrupts.request_joypad();
    mmu.interrupts.request_timer();
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.pc, 0x0050);
    assert_eq!(mmu.interrupts.flag, Interrupt::Joypad.bit());
}

#[test]
fn each_source_jumps_to_its_vector() {
    for source in Interrupt::ALL {
        let (mut cpu, mut mmu) = machine(&[0x00]);
        cpu.ime = true;
        mmu.interrupts.enable = source.bit();
        mmu.interrupts.request(source);
        cpu.step(&mut mmu);
        assert_eq!(cpu.regs.pc, source.vector(), "{source:?}");
        assert_eq!(mmu.interrupts.flag & source.bit(), 0);
    }
}
