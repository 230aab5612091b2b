//! End-to-end scenarios exercising the assembler and executor together,
//! the way the teacher crate's top-level tests drive a full CPU through
//! a handful of instructions and check the resulting register/memory
//! state rather than poking individual opcodes in isolation.

use aarch64_lite::assembler;
use aarch64_lite::cpu::Cpu;
use aarch64_lite::executor::Executor;

fn assemble_and_load(source: &str) -> Cpu {
    let image = assembler::assemble(source).expect("source should assemble");
    let mut cpu = Cpu::new();
    cpu.load_image(&image).expect("image should fit in memory");
    cpu
}

fn step_n(cpu: &mut Cpu, n: usize) {
    let mut executor = Executor::new(cpu);
    for _ in 0..n {
        executor.step().expect("step should succeed");
    }
}

#[test]
fn s1_wide_move_then_store() {
    let mut cpu = assemble_and_load(
        "\
movz x0, #0x1234
str x0, [x1]
",
    );
    cpu.write_reg(1, true, 0x100);
    step_n(&mut cpu, 2);

    assert_eq!(cpu.read_reg(0, true), 0x1234);
    assert_eq!(cpu.read_mem(0x100, true).unwrap(), 0x1234);
}

#[test]
fn s2_conditional_forward_branch() {
    let mut cpu = assemble_and_load(
        "\
    movz w0, #1
    cmp  w0, #1
    b.eq target
    movz w0, #99
target:
    and  x0, x0, x0
",
    );
    step_n(&mut cpu, 4);

    assert_eq!(cpu.read_reg(0, false), 1);
    let flags = cpu.flags();
    assert!(flags.z);
    assert!(!flags.n);
    assert!(!flags.c);
    assert!(!flags.v);
}

#[test]
fn s3_load_literal_with_int_directive() {
    let mut cpu = assemble_and_load(
        "\
    ldr w0, data
    and x0, x0, x0
data:
    .int 0xDEADBEEF
",
    );
    step_n(&mut cpu, 2);

    assert_eq!(cpu.read_reg(0, false), 0xDEADBEEF);
    assert_eq!(cpu.fetch_word(8).unwrap(), 0xDEADBEEF);
}

#[test]
fn s4_register_multiply_add() {
    let mut cpu = assemble_and_load("madd x0, x1, x2, x3\n");
    cpu.write_reg(1, true, 3);
    cpu.write_reg(2, true, 4);
    cpu.write_reg(3, true, 5);
    step_n(&mut cpu, 1);

    assert_eq!(cpu.read_reg(0, true), 17);
}

#[test]
fn s5_signed_overflow_flag() {
    let mut cpu = assemble_and_load("adds w0, w0, #1\n");
    cpu.write_reg(0, false, 0x7FFF_FFFF);
    step_n(&mut cpu, 1);

    let flags = cpu.flags();
    assert!(flags.n);
    assert!(!flags.z);
    assert!(!flags.c);
    assert!(flags.v);
    assert_eq!(cpu.read_reg(0, false), 0x8000_0000);
}

#[test]
fn s6_post_indexed_store() {
    let mut cpu = assemble_and_load("str x0, [x1], #8\n");
    cpu.write_reg(0, true, 0xFF);
    cpu.write_reg(1, true, 0x200);
    step_n(&mut cpu, 1);

    assert_eq!(cpu.read_mem(0x200, true).unwrap(), 0xFF);
    assert_eq!(cpu.read_reg(1, true), 0x208);
}

#[test]
fn s7_unsigned_offset_scales_with_access_width() {
    // The #16 byte offset must land at effective address base+16 even
    // though the 64-bit access scales the encoded field by 8 internally.
    let mut cpu = assemble_and_load("str x0, [x1, #16]\n");
    cpu.write_reg(0, true, 0xAA);
    cpu.write_reg(1, true, 0x300);
    step_n(&mut cpu, 1);

    assert_eq!(cpu.read_mem(0x310, true).unwrap(), 0xAA);
}

#[test]
fn zero_register_writes_are_discarded_across_a_run() {
    let mut cpu = assemble_and_load("movz xzr, #0x1234\n");
    step_n(&mut cpu, 1);
    assert_eq!(cpu.read_reg(31, true), 0);
}

#[test]
fn emulator_halts_on_sentinel_without_executing_it() {
    let image = [0x8a, 0x00, 0x00, 0x00u8];
    let mut cpu = Cpu::new();
    cpu.load_image(&image).unwrap();
    let mut executor = Executor::new(&mut cpu);
    executor.run().expect("halt sentinel should terminate cleanly");
    assert_eq!(cpu.pc(), 0);
}
