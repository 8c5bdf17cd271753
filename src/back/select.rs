//! Instruction selection: TAC to a near-1:1 native selection IR.
//!
//! Because `middle::tac`'s builder already rewrites `==`/`!=`/`<=`/`>=`/
//! `&&`/`||` down to the primitive unary/binary ops at TAC-construction
//! time (see the builder's doc comment), selection here is almost entirely
//! a one-to-one relabeling — unlike
//! `original_source/backend/riscv/riscvasmemitter.py`'s `visitBinary`,
//! which still performs those rewrites itself. `Call`, `Return` and
//! `Alloc` are the exceptions: they need information only the register
//! allocator has (the call's live-out set, the epilogue label, the
//! array's frame offset), so they carry their TAC-level shape forward
//! unchanged and `back::regalloc` handles them specially, the same way
//! `bruteregalloc.py`'s `localAlloc` special-cases `Riscv.Call` instead of
//! routing it through the generic `allocForLoc`.

use crate::common::Id;
use crate::middle::tac::{BinaryOp, CondOp, Instr, Label, Temp, UnaryOp};

#[derive(Clone, Debug)]
pub enum Sel {
    Li { dst: Temp, value: i32 },
    Mv { dst: Temp, src: Temp },
    Unary { op: UnaryOp, dst: Temp, src: Temp },
    Binary { op: BinaryOp, dst: Temp, lhs: Temp, rhs: Temp },
    La { dst: Temp, symbol: Id },
    Lw { dst: Temp, base: Temp, offset: i32 },
    Sw { src: Temp, base: Temp, offset: i32 },
    /// Base address of a stack-allocated array; resolved against the
    /// subroutine's array offset table once the frame layout is known.
    Alloc { dst: Temp },
    J { target: Label },
    Branch { op: CondOp, cond: Temp, target: Label },
    /// `value`, if present, must end up in `a0`; then jump to the
    /// function's epilogue label.
    Return { value: Option<Temp> },
    Call { dst: Temp, target: Id, args: Vec<Temp> },
    Label(Label),
}

impl Sel {
    /// Temps read, for the generic (non-`Call`/`Return`) cases the
    /// allocator resolves via `allocForLoc`.
    pub fn srcs(&self) -> Vec<Temp> {
        use Sel::*;
        match self {
            Li { .. } | La { .. } | J { .. } | Label(_) => vec![],
            Mv { src, .. } => vec![*src],
            Unary { src, .. } => vec![*src],
            Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Lw { base, .. } => vec![*base],
            Sw { src, base, .. } => vec![*src, *base],
            Alloc { .. } => vec![],
            Branch { cond, .. } => vec![*cond],
            Return { .. } | Call { .. } => vec![],
        }
    }

    pub fn dsts(&self) -> Vec<Temp> {
        use Sel::*;
        match self {
            Li { dst, .. } => vec![*dst],
            Mv { dst, .. } => vec![*dst],
            Unary { dst, .. } => vec![*dst],
            Binary { dst, .. } => vec![*dst],
            La { dst, .. } => vec![*dst],
            Lw { dst, .. } => vec![*dst],
            Sw { .. } => vec![],
            Alloc { dst } => vec![*dst],
            J { .. } | Label(_) | Branch { .. } => vec![],
            Return { .. } => vec![],
            Call { dst, .. } => vec![*dst],
        }
    }
}

/// Lower one TAC instruction. Returns `None` for `Param`, which is dead by
/// construction (`Call` already carries the full argument list).
pub fn select_instr(instr: &Instr) -> Option<Sel> {
    Some(match instr {
        Instr::Assign { dst, src } => Sel::Mv { dst: *dst, src: *src },
        Instr::LoadImm { dst, value } => Sel::Li { dst: *dst, value: *value },
        Instr::Unary { op, dst, src } => Sel::Unary { op: *op, dst: *dst, src: *src },
        Instr::Binary { op, dst, lhs, rhs } => Sel::Binary { op: *op, dst: *dst, lhs: *lhs, rhs: *rhs },
        Instr::Branch { target } => Sel::J { target: *target },
        Instr::CondBranch { op, cond, target } => Sel::Branch { op: *op, cond: *cond, target: *target },
        Instr::Return { value } => Sel::Return { value: *value },
        Instr::Mark { label } => Sel::Label(*label),
        Instr::Param { .. } => return None,
        Instr::Call { dst, target, args } => Sel::Call { dst: *dst, target: *target, args: args.clone() },
        Instr::LoadSymbol { dst, name } => Sel::La { dst: *dst, symbol: *name },
        Instr::Load { dst, base, offset } => Sel::Lw { dst: *dst, base: *base, offset: *offset },
        Instr::Store { src, base, offset } => Sel::Sw { src: *src, base: *base, offset: *offset },
        Instr::Alloc { dst, .. } => Sel::Alloc { dst: *dst },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_drops_to_none() {
        assert!(select_instr(&Instr::Param { temp: Temp(0) }).is_none());
    }

    #[test]
    fn binary_carries_operands_through() {
        let sel = select_instr(&Instr::Binary { op: BinaryOp::Add, dst: Temp(2), lhs: Temp(0), rhs: Temp(1) }).unwrap();
        assert_eq!(sel.srcs(), vec![Temp(0), Temp(1)]);
        assert_eq!(sel.dsts(), vec![Temp(2)]);
    }
}
