//! RISC-V register file: the fixed 32-register roster and the role flags
//! the allocator needs (argument / caller-save / callee-save / allocatable).
//!
//! The register names and their ordering are carried over from the
//! teacher's fused backend (`back::asm`, pre-rewrite); what changes here is
//! that a `Register` is now a plain `Copy` tag with no mutable fields of its
//! own — the per-register `used`/`occupied`/`temp` bookkeeping the design
//! notes call out as "shared mutable state keyed by a small fixed set" lives
//! in [`crate::back::regalloc::RegisterFile`], a small array the allocator
//! owns, not on the enum itself.

use derive_more::Display;

/// Registers for the RV32 integer register file, in register-file order.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Register {
    #[display("zero")]
    Zero,
    #[display("ra")]
    Ra,
    #[display("sp")]
    Sp,
    #[display("gp")]
    Gp,
    #[display("tp")]
    Tp,
    #[display("t0")]
    T0,
    #[display("t1")]
    T1,
    #[display("t2")]
    T2,
    #[display("fp")]
    Fp,
    #[display("s1")]
    S1,
    #[display("a0")]
    A0,
    #[display("a1")]
    A1,
    #[display("a2")]
    A2,
    #[display("a3")]
    A3,
    #[display("a4")]
    A4,
    #[display("a5")]
    A5,
    #[display("a6")]
    A6,
    #[display("a7")]
    A7,
    #[display("s2")]
    S2,
    #[display("s3")]
    S3,
    #[display("s4")]
    S4,
    #[display("s5")]
    S5,
    #[display("s6")]
    S6,
    #[display("s7")]
    S7,
    #[display("s8")]
    S8,
    #[display("s9")]
    S9,
    #[display("s10")]
    S10,
    #[display("s11")]
    S11,
    #[display("t3")]
    T3,
    #[display("t4")]
    T4,
    #[display("t5")]
    T5,
    #[display("t6")]
    T6,
}

pub const ALL_REGISTERS: [Register; 32] = [
    Register::Zero,
    Register::Ra,
    Register::Sp,
    Register::Gp,
    Register::Tp,
    Register::T0,
    Register::T1,
    Register::T2,
    Register::Fp,
    Register::S1,
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
    Register::S2,
    Register::S3,
    Register::S4,
    Register::S5,
    Register::S6,
    Register::S7,
    Register::S8,
    Register::S9,
    Register::S10,
    Register::S11,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
];

/// a0..a7, in calling-convention order.
pub const ARG_REGISTERS: [Register; 8] = [
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
];

/// s1..s11. `fp` (s0) is saved/restored separately by the prologue/epilogue
/// rather than through the generic callee-save loop, so it is excluded here
/// (see the frame layout in `spec.md` §3).
pub const CALLEE_SAVE: [Register; 11] = [
    Register::S1,
    Register::S2,
    Register::S3,
    Register::S4,
    Register::S5,
    Register::S6,
    Register::S7,
    Register::S8,
    Register::S9,
    Register::S10,
    Register::S11,
];

/// t0..t6, a0..a7 — the caller-save registers that also appear in
/// [`ALLOCATABLE`] (`ra` is caller-save too, but is never allocatable).
pub const CALLER_SAVE: [Register; 15] = [
    Register::T0,
    Register::T1,
    Register::T2,
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
];

/// Caller-save plus callee-save, excluding `sp`, `fp`, `ra`, `gp`, `tp`,
/// `zero` — the registers the allocator is allowed to bind temps to. Order
/// matters: `allocRegFor` scans in this fixed order.
pub const ALLOCATABLE: [Register; 26] = [
    Register::T0,
    Register::T1,
    Register::T2,
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
    Register::S1,
    Register::S2,
    Register::S3,
    Register::S4,
    Register::S5,
    Register::S6,
    Register::S7,
    Register::S8,
    Register::S9,
    Register::S10,
    Register::S11,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
];

impl Register {
    /// Index into a 32-entry table, matching [`ALL_REGISTERS`]'s order.
    pub fn index(self) -> usize {
        ALL_REGISTERS.iter().position(|&r| r == self).unwrap()
    }

    pub fn is_allocatable(self) -> bool {
        ALLOCATABLE.contains(&self)
    }

    pub fn is_caller_save(self) -> bool {
        CALLER_SAVE.contains(&self)
    }

    pub fn is_callee_save(self) -> bool {
        CALLEE_SAVE.contains(&self)
    }

    pub fn is_arg(self) -> bool {
        ARG_REGISTERS.contains(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocatable_excludes_reserved_registers() {
        for reg in [Register::Zero, Register::Ra, Register::Sp, Register::Fp, Register::Gp, Register::Tp] {
            assert!(!reg.is_allocatable());
        }
    }

    #[test]
    fn allocatable_is_caller_or_callee_save() {
        for reg in ALLOCATABLE {
            assert!(reg.is_caller_save() || reg.is_callee_save());
        }
    }

    #[test]
    fn index_round_trips_through_all_registers() {
        for (i, reg) in ALL_REGISTERS.iter().enumerate() {
            assert_eq!(reg.index(), i);
        }
    }
}
