use crate::backend::{PReg, RegKind};

pub const fn rax() -> PReg { PReg::new(0, RegKind::General) }

pub const fn rcx() -> PReg { PReg::new(1, RegKind::General) }

pub const fn rdx() -> PReg { PReg::new(2, RegKind::General) }

pub const fn rbx() -> PReg { PReg::new(3, RegKind::General) }

pub const fn rsp() -> PReg { PReg::new(4, RegKind::General) }

pub const fn rbp() -> PReg { PReg::new(5, RegKind::General) }

pub const fn rsi() -> PReg { PReg::new(6, RegKind::General) }

pub const fn rdi() -> PReg { PReg::new(7, RegKind::General) }

pub const fn r8() -> PReg { PReg::new(8, RegKind::General) }

pub const fn r9() -> PReg { PReg::new(9, RegKind::General) }

pub const fn r10() -> PReg { PReg::new(10, RegKind::General) }

pub const fn r11() -> PReg { PReg::new(11, RegKind::General) }

pub const fn r12() -> PReg { PReg::new(12, RegKind::General) }

pub const fn r13() -> PReg { PReg::new(13, RegKind::General) }

pub const fn r14() -> PReg { PReg::new(14, RegKind::General) }

pub const fn r15() -> PReg { PReg::new(15, RegKind::General) }

pub const fn xmm0() -> PReg { PReg::new(0, RegKind::Float) }

pub const fn xmm1() -> PReg { PReg::new(1, RegKind::Float) }

pub const fn xmm2() -> PReg { PReg::new(2, RegKind::Float) }

pub const fn xmm3() -> PReg { PReg::new(3, RegKind::Float) }

pub const fn xmm4() -> PReg { PReg::new(4, RegKind::Float) }

pub const fn xmm5() -> PReg { PReg::new(5, RegKind::Float) }

pub const fn xmm6() -> PReg { PReg::new(6, RegKind::Float) }

pub const fn xmm7() -> PReg { PReg::new(7, RegKind::Float) }

pub const fn xmm8() -> PReg { PReg::new(8, RegKind::Float) }

pub const fn xmm9() -> PReg { PReg::new(9, RegKind::Float) }

pub const fn xmm10() -> PReg { PReg::new(10, RegKind::Float) }

pub const fn xmm11() -> PReg { PReg::new(11, RegKind::Float) }

pub const fn xmm12() -> PReg { PReg::new(12, RegKind::Float) }

pub const fn xmm13() -> PReg { PReg::new(13, RegKind::Float) }

pub const fn xmm14() -> PReg { PReg::new(14, RegKind::Float) }

pub const fn xmm15() -> PReg { PReg::new(15, RegKind::Float) }

pub const fn display_preg(reg: PReg) -> &'static str {
    match reg.kind() {
        RegKind::General => match reg.num() {
            0 => "rax",
            1 => "rcx",
            2 => "rdx",
            3 => "rbx",
            4 => "rsp",
            5 => "rbp",
            6 => "rsi",
            7 => "rdi",
            8 => "r8",
            9 => "r9",
            10 => "r10",
            11 => "r11",
            12 => "r12",
            13 => "r13",
            14 => "r14",
            15 => "r15",
            _ => "<invalid>",
        },
        RegKind::Float => match reg.num() {
            0 => "xmm0",
            1 => "xmm1",
            2 => "xmm2",
            3 => "xmm3",
            4 => "xmm4",
            5 => "xmm5",
            6 => "xmm6",
            7 => "xmm7",
            8 => "xmm8",
            9 => "xmm9",
            10 => "xmm10",
            11 => "xmm11",
            12 => "xmm12",
            13 => "xmm13",
            14 => "xmm14",
            15 => "xmm15",
            _ => "<invalid>",
        },
    }
}

/// Integer registers handed out by the allocator, in assignment precedence.
///
/// `rsp` and `rbp` hold the frame.
pub fn allocatable_gp_regs() -> Vec<PReg> {
    vec![
        rax(),
        rbx(),
        rcx(),
        rdx(),
        rsi(),
        rdi(),
        r8(),
        r9(),
        r10(),
        r11(),
        r12(),
        r13(),
        r14(),
        r15(),
    ]
}

/// Floating point registers handed out by the allocator, in assignment
/// precedence.
pub fn allocatable_fp_regs() -> Vec<PReg> {
    (0..16).map(|num| PReg::new(num, RegKind::Float)).collect()
}
