//! The brute-force register allocator: no interference graph, no
//! coloring — just a per-basic-block binding table, spill-on-demand, and a
//! round-robin eviction cursor that survives across blocks. Grounded on
//! `original_source/backend/reg/bruteregalloc.py` (the binding/eviction
//! policy) and `original_source/backend/riscv/riscvasmemitter.py` (the
//! frame layout and prologue/epilogue shape), adapted to RV32 and to a
//! selection IR that already carries TAC operators 1:1 (see `back::select`).
//!
//! Bindings do not survive a block boundary: every temp live out of a
//! block is spilled to a stable home location before the block ends, and
//! the next block reloads lazily on first use. This is the "brute" part —
//! it gives up keeping values in registers across edges in exchange for an
//! allocator with no global fixed-point to get wrong.

use crate::back::riscv::{Register, ALLOCATABLE, ARG_REGISTERS, CALLEE_SAVE};
use crate::back::select::{select_instr, Sel};
use crate::common::{Map, Set};
use crate::middle::cfg::Cfg;
use crate::middle::tac::{CondOp, Label, TacFunction, Temp};

const RA_SLOT_FROM_TOP: i32 = 4;
const FP_SLOT_FROM_TOP: i32 = 8;

fn align16(n: i32) -> i32 {
    (n + 15) & !15
}

#[derive(Default)]
struct RegisterFile {
    occupant: Map<Register, Temp>,
}

impl RegisterFile {
    fn is_free(&self, r: Register) -> bool {
        !self.occupant.contains_key(&r)
    }

    fn temp_in(&self, r: Register) -> Option<Temp> {
        self.occupant.get(&r).copied()
    }

    fn occupy(&mut self, r: Register, t: Temp) {
        self.occupant.insert(r, t);
    }

    fn free(&mut self, r: Register) {
        self.occupant.remove(&r);
    }

    fn clear(&mut self) {
        self.occupant.clear();
    }
}

pub struct Allocator {
    /// Array base temp -> sp offset, fixed before the body is processed.
    arrays: Map<Temp, i32>,
    arrays_total: i32,
    /// 9th-and-later incoming parameters: temp -> fp offset.
    incoming_params: Map<Temp, i32>,
    /// Temp -> sp offset, assigned monotonically and never reused.
    spill_slots: Map<Temp, i32>,
    next_spill_slot: i32,
    file: RegisterFile,
    bindings: Map<Temp, Register>,
    /// Round-robin eviction cursor; persists across basic blocks.
    reg_index: usize,
    /// Callee-save registers ever bound in this function; survives the
    /// per-block `file`/`bindings` clears so the prologue/epilogue can skip
    /// saving registers the function never touches.
    used_callee_save: Set<Register>,
    out: Vec<String>,
}

impl Allocator {
    fn emit(&mut self, line: impl Into<String>) {
        self.out.push(line.into());
    }

    fn spill_slot_for(&mut self, t: Temp) -> i32 {
        if let Some(&off) = self.spill_slots.get(&t) {
            return off;
        }
        let off = self.arrays_total + self.next_spill_slot * 4;
        self.next_spill_slot += 1;
        self.spill_slots.insert(t, off);
        off
    }

    fn spill_store(&mut self, t: Temp, r: Register) {
        let off = self.spill_slot_for(t);
        self.emit(format!("\tsw {r}, {off}(sp)"));
    }

    fn unbind_temp(&mut self, t: Temp) {
        if let Some(r) = self.bindings.remove(&t) {
            self.file.free(r);
        }
    }

    fn unbind_reg(&mut self, r: Register) {
        if let Some(t) = self.file.temp_in(r) {
            self.bindings.remove(&t);
            self.file.free(r);
        }
    }

    /// Occupy `r` with `t`, recording `r` as used if it's callee-save so
    /// the prologue/epilogue know to save/restore it.
    fn bind(&mut self, r: Register, t: Temp) {
        self.file.occupy(r, t);
        self.bindings.insert(t, r);
        if r.is_callee_save() {
            self.used_callee_save.insert(r);
        }
    }

    /// Resolve a register for `t`, evicting something if every allocatable
    /// register is occupied: prefer a register holding a temp that's dead
    /// in `live` (free, no store needed), otherwise fall back to the
    /// round-robin cursor and spill the evicted temp first.
    ///
    /// `live` must be the *current* instruction's `liveIn` set, not its
    /// `liveOut`: the free-steal path below must not evict a register that
    /// holds one of this instruction's own operands just because that
    /// operand's last use is here (it's absent from `liveOut` but still
    /// `liveIn`).
    fn alloc_reg_for(&mut self, t: Temp, live: &Set<u32>) -> Register {
        if let Some(&r) = self.bindings.get(&t) {
            return r;
        }
        for &r in ALLOCATABLE.iter() {
            if self.file.is_free(r) {
                self.bind(r, t);
                return r;
            }
        }
        for &r in ALLOCATABLE.iter() {
            if let Some(held) = self.file.temp_in(r) {
                if !live.contains(&held.0) {
                    self.unbind_reg(r);
                    self.bind(r, t);
                    return r;
                }
            }
        }
        let r = ALLOCATABLE[self.reg_index % ALLOCATABLE.len()];
        self.reg_index += 1;
        if let Some(held) = self.file.temp_in(r) {
            self.spill_store(held, r);
            self.unbind_reg(r);
        }
        self.bind(r, t);
        r
    }

    /// Get `t`'s current register, reloading from its home location if
    /// it isn't already bound. `live` is `liveIn` of the current instruction
    /// (see `alloc_reg_for`).
    fn ensure_loaded(&mut self, t: Temp, live: &Set<u32>) -> Register {
        if let Some(&r) = self.bindings.get(&t) {
            return r;
        }
        let r = self.alloc_reg_for(t, live);
        if let Some(&off) = self.arrays.get(&t) {
            self.emit(format!("\taddi {r}, sp, {off}"));
        } else if let Some(&off) = self.incoming_params.get(&t) {
            self.emit(format!("\tlw {r}, {off}(fp)"));
        } else if let Some(&off) = self.spill_slots.get(&t) {
            self.emit(format!("\tlw {r}, {off}(sp)"));
        } else {
            panic!("internal inconsistency: temp {t} read before being defined");
        }
        r
    }

    /// `live_in` is the current instruction's `liveIn` set: every allocation
    /// decision here (including the free-steal path inside `alloc_reg_for`)
    /// must be judged against `liveIn`, not `liveOut`, or a dead-by-now
    /// operand of *this* instruction could be evicted before it's read.
    fn process_loc(&mut self, sel: &Sel, live_in: &Set<u32>) {
        match sel {
            Sel::Li { dst, value } => {
                let d = self.alloc_reg_for(*dst, live_in);
                self.emit(format!("\tli {d}, {value}"));
            }
            Sel::Mv { dst, src } => {
                let s = self.ensure_loaded(*src, live_in);
                let d = self.alloc_reg_for(*dst, live_in);
                if d != s {
                    self.emit(format!("\tmv {d}, {s}"));
                }
            }
            Sel::Unary { op, dst, src } => {
                let s = self.ensure_loaded(*src, live_in);
                let d = self.alloc_reg_for(*dst, live_in);
                let mnemonic = match op {
                    crate::middle::tac::UnaryOp::Neg => "neg",
                    crate::middle::tac::UnaryOp::Not => "not",
                    crate::middle::tac::UnaryOp::Seqz => "seqz",
                    crate::middle::tac::UnaryOp::Snez => "snez",
                };
                self.emit(format!("\t{mnemonic} {d}, {s}"));
            }
            Sel::Binary { op, dst, lhs, rhs } => {
                let l = self.ensure_loaded(*lhs, live_in);
                let r = self.ensure_loaded(*rhs, live_in);
                let d = self.alloc_reg_for(*dst, live_in);
                let mnemonic = match op {
                    crate::middle::tac::BinaryOp::Add => "add",
                    crate::middle::tac::BinaryOp::Sub => "sub",
                    crate::middle::tac::BinaryOp::Mul => "mul",
                    crate::middle::tac::BinaryOp::Div => "div",
                    crate::middle::tac::BinaryOp::Mod => "rem",
                    crate::middle::tac::BinaryOp::Slt => "slt",
                    crate::middle::tac::BinaryOp::Sgt => "sgt",
                    crate::middle::tac::BinaryOp::And => "and",
                    crate::middle::tac::BinaryOp::Or => "or",
                };
                self.emit(format!("\t{mnemonic} {d}, {l}, {r}"));
            }
            Sel::La { dst, symbol } => {
                let d = self.alloc_reg_for(*dst, live_in);
                self.emit(format!("\tla {d}, {symbol}"));
            }
            Sel::Lw { dst, base, offset } => {
                let b = self.ensure_loaded(*base, live_in);
                let d = self.alloc_reg_for(*dst, live_in);
                self.emit(format!("\tlw {d}, {offset}({b})"));
            }
            Sel::Sw { src, base, offset } => {
                let s = self.ensure_loaded(*src, live_in);
                let b = self.ensure_loaded(*base, live_in);
                self.emit(format!("\tsw {s}, {offset}({b})"));
            }
            Sel::Alloc { dst } => {
                let d = self.alloc_reg_for(*dst, live_in);
                let off = self.arrays[dst];
                self.emit(format!("\taddi {d}, sp, {off}"));
            }
            Sel::J { target } => self.emit(format!("\tj {target}")),
            Sel::Branch { op, cond, target } => {
                let c = self.ensure_loaded(*cond, live_in);
                let mnemonic = match op {
                    CondOp::Beq => "beqz",
                    CondOp::Bnez => "bnez",
                };
                self.emit(format!("\t{mnemonic} {c}, {target}"));
            }
            Sel::Label(label) => self.emit(format!("{label}:")),
            Sel::Return { .. } | Sel::Call { .. } => {
                unreachable!("Return/Call are dispatched before process_loc")
            }
        }
    }

    /// The call's args round-trip through memory rather than moving
    /// register to register directly: it sidesteps the parallel-move
    /// hazard of shuffling values into `a0..a7` when a source temp already
    /// happens to occupy a different argument register.
    fn process_call(
        &mut self,
        dst: Temp,
        target: crate::common::Id,
        args: &[Temp],
        live_in: &Set<u32>,
        live_out: &Set<u32>,
    ) {
        for &r in ALLOCATABLE.iter() {
            if let Some(held) = self.file.temp_in(r) {
                if live_out.contains(&held.0) {
                    self.spill_store(held, r);
                }
            }
        }

        for &arg in args {
            let r = self.ensure_loaded(arg, live_in);
            self.spill_store(arg, r);
        }

        for &r in ALLOCATABLE.iter() {
            self.unbind_reg(r);
        }

        let extra = args.len().saturating_sub(8);
        if extra > 0 {
            self.emit(format!("\taddi sp, sp, -{}", extra * 4));
            for (i, &arg) in args[8..].iter().enumerate() {
                let off = self.spill_slots[&arg] + (extra as i32) * 4;
                self.emit(format!("\tlw t0, {off}(sp)"));
                self.emit(format!("\tsw t0, {}(sp)", i * 4));
            }
        }

        for (i, &arg) in args.iter().take(8).enumerate() {
            let off = self.spill_slots[&arg];
            let adjusted = if extra > 0 { off + (extra as i32) * 4 } else { off };
            self.emit(format!("\tlw {}, {adjusted}(sp)", ARG_REGISTERS[i]));
        }

        self.emit(format!("\tcall {target}"));

        if extra > 0 {
            self.emit(format!("\taddi sp, sp, {}", extra * 4));
        }

        self.bind(Register::A0, dst);
    }

    fn process_return(&mut self, value: Option<Temp>, epilogue: Label, live_in: &Set<u32>) {
        match value {
            Some(v) => {
                let r = self.ensure_loaded(v, live_in);
                if r != Register::A0 {
                    self.unbind_reg(Register::A0);
                    self.emit(format!("\tmv a0, {r}"));
                }
            }
            None => {
                self.unbind_reg(Register::A0);
                self.emit("\tli a0, 0");
            }
        }
        self.emit(format!("\tj {epilogue}"));
    }
}

/// Lower one function's CFG to assembly text, including its own
/// prologue/epilogue. Unreachable blocks (per `middle::cfg`) are dropped —
/// nothing jumps to them, so emitting their bodies would be dead text.
pub fn assemble_function(func: &TacFunction, cfg: &Cfg) -> String {
    let mut arrays = Map::new();
    let mut arrays_total = 0i32;
    for &(base, size) in &func.arrays {
        arrays.insert(base, arrays_total);
        arrays_total += size;
    }

    let mut incoming_params = Map::new();
    for (i, &_) in func.params.iter().enumerate().skip(8) {
        incoming_params.insert(func.params[i], ((i - 8) as i32) * 4);
    }

    let mut alloc = Allocator {
        arrays,
        arrays_total,
        incoming_params,
        spill_slots: Map::new(),
        next_spill_slot: 0,
        file: RegisterFile::default(),
        bindings: Map::new(),
        reg_index: 0,
        used_callee_save: Set::new(),
        out: Vec::new(),
    };

    for (i, &t) in func.params.iter().take(8).enumerate() {
        alloc.bind(ARG_REGISTERS[i], t);
    }

    for (id, block) in cfg.iter().enumerate() {
        if cfg.unreachable(id) {
            continue;
        }
        if id != 0 {
            alloc.bindings.clear();
            alloc.file.clear();
        }
        // The terminator (if any) is held back until after the live-out
        // stores below: storing a live-out temp after an already-emitted
        // jump/branch/return would be dead code, since control never
        // reaches it. Non-terminator locations process in order as usual.
        let (terminator, body) = match block.locs.split_last() {
            Some((last, rest)) if last.instr.is_terminator() => (Some(last), rest),
            _ => (None, &block.locs[..]),
        };

        for loc in body {
            let Some(sel) = select_instr(&loc.instr) else { continue };
            match sel {
                Sel::Call { dst, target, args } => {
                    alloc.process_call(dst, target, &args, &loc.live_in, &loc.live_out)
                }
                Sel::Return { value } => alloc.process_return(value, func.epilogue, &loc.live_in),
                other => alloc.process_loc(&other, &loc.live_in),
            }
        }

        let live_out = block.live_out();
        for &id in &live_out {
            let t = Temp(id);
            if alloc.arrays.contains_key(&t) || alloc.incoming_params.contains_key(&t) {
                continue;
            }
            if let Some(&r) = alloc.bindings.get(&t) {
                alloc.spill_store(t, r);
            }
        }

        if let Some(loc) = terminator {
            if let Some(sel) = select_instr(&loc.instr) {
                match sel {
                    Sel::Call { dst, target, args } => {
                        alloc.process_call(dst, target, &args, &loc.live_in, &loc.live_out)
                    }
                    Sel::Return { value } => alloc.process_return(value, func.epilogue, &loc.live_in),
                    other => alloc.process_loc(&other, &loc.live_in),
                }
            }
        }
    }

    let spill_total = alloc.next_spill_slot * 4;
    let frame_size = align16(arrays_total + spill_total + RA_SLOT_FROM_TOP + FP_SLOT_FROM_TOP + CALLEE_SAVE.len() as i32 * 4);

    let mut text = String::new();
    text.push_str(&format!("{}:\n", func.entry));
    text.push_str(&format!("\taddi sp, sp, -{frame_size}\n"));
    text.push_str(&format!("\tsw ra, {}(sp)\n", frame_size - RA_SLOT_FROM_TOP));
    text.push_str(&format!("\tsw fp, {}(sp)\n", frame_size - FP_SLOT_FROM_TOP));
    for (i, &r) in CALLEE_SAVE.iter().enumerate() {
        if alloc.used_callee_save.contains(&r) {
            text.push_str(&format!("\tsw {r}, {}(sp)\n", frame_size - FP_SLOT_FROM_TOP - 4 * (i as i32 + 1)));
        }
    }
    text.push_str(&format!("\taddi fp, sp, {frame_size}\n"));

    for line in &alloc.out {
        text.push_str(line);
        text.push('\n');
    }

    text.push_str(&format!("{}:\n", func.epilogue));
    for (i, &r) in CALLEE_SAVE.iter().enumerate() {
        if alloc.used_callee_save.contains(&r) {
            text.push_str(&format!("\tlw {r}, {}(sp)\n", frame_size - FP_SLOT_FROM_TOP - 4 * (i as i32 + 1)));
        }
    }
    text.push_str(&format!("\tlw ra, {}(sp)\n", frame_size - RA_SLOT_FROM_TOP));
    text.push_str(&format!("\tlw fp, {}(sp)\n", frame_size - FP_SLOT_FROM_TOP));
    text.push_str(&format!("\taddi sp, sp, {frame_size}\n"));
    text.push_str("\tret\n");

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::{parse, resolve};
    use crate::middle::{cfg, tac};

    fn assemble_src(src: &str) -> String {
        let prog = resolve(parse(src).unwrap()).unwrap();
        let tac_prog = tac::build(&prog);
        let f = &tac_prog.functions[0];
        let cfg = cfg::build(f);
        assemble_function(f, &cfg)
    }

    #[test]
    fn zero_param_return_emits_prologue_and_ret() {
        let asm = assemble_src("int main() { return 7; }");
        assert!(asm.contains("main:"));
        assert!(asm.contains("li t0, 7") || asm.contains("li a0, 7") || asm.contains("7"));
        assert!(asm.trim_end().ends_with("ret"));
    }

    #[test]
    fn ninth_parameter_reads_from_frame_pointer() {
        let asm = assemble_src(
            "int f(int a,int b,int c,int d,int e,int g,int h,int i,int j){ return j; }\nint main() { return f(1,2,3,4,5,6,7,8,9); }",
        );
        assert!(asm.contains("(fp)"));
    }

    #[test]
    fn call_with_many_args_frees_stack_region() {
        let asm = assemble_src(
            "int f(int a,int b,int c,int d,int e,int g,int h,int i,int j){ return j; }\nint main() { return f(1,2,3,4,5,6,7,8,9); }",
        );
        assert!(asm.contains("addi sp, sp, -4"));
        assert!(asm.contains("call f"));
    }

    #[test]
    fn binary_op_register_pressure_does_not_clobber_live_in_operand() {
        let lhs = Temp(1);
        let rhs = Temp(2);
        let dst = Temp(3);

        let mut alloc = Allocator {
            arrays: Map::new(),
            arrays_total: 0,
            incoming_params: Map::new(),
            spill_slots: Map::new(),
            next_spill_slot: 0,
            file: RegisterFile::default(),
            bindings: Map::new(),
            reg_index: 0,
            used_callee_save: Set::new(),
            out: Vec::new(),
        };

        // Fill every allocatable register so neither `rhs`'s reload nor
        // `dst`'s allocation finds a free one; `lhs` sits in the first slot
        // so it would be the first eviction candidate scanned.
        alloc.bind(ALLOCATABLE[0], lhs);
        for (i, &r) in ALLOCATABLE.iter().enumerate().skip(1) {
            alloc.bind(r, Temp(100 + i as u32));
        }

        alloc.spill_slots.insert(rhs, 0);
        alloc.next_spill_slot = 1;

        // Both operands are read by this instruction, so both are in its
        // liveIn set, even though lhs's last use is here (absent from
        // liveOut). The free-steal path must honor liveIn and leave lhs's
        // register alone.
        let live_in: Set<u32> = [lhs.0, rhs.0].into_iter().collect();
        let sel = Sel::Binary { op: crate::middle::tac::BinaryOp::Add, dst, lhs, rhs };
        alloc.process_loc(&sel, &live_in);

        assert_eq!(
            alloc.file.temp_in(ALLOCATABLE[0]),
            Some(lhs),
            "lhs must still occupy its register after rhs's reload and dst's allocation"
        );

        let add_line = alloc.out.iter().find(|l| l.contains("add ")).expect("add emitted");
        let operands: Vec<&str> = add_line.trim().trim_start_matches("add ").split(", ").collect();
        assert_eq!(operands.len(), 3);
        assert_ne!(operands[1], operands[2], "lhs and rhs collapsed onto the same register: {add_line}");
    }

    #[test]
    fn void_return_loads_zero_into_a0() {
        let asm = assemble_src("int main() { int a = 1; }");
        assert!(asm.contains("li a0, 0"));
    }

    #[test]
    fn no_callee_save_usage_emits_no_saves() {
        let asm = assemble_src("int main() { return 0; }");
        for r in CALLEE_SAVE {
            assert!(!asm.contains(&format!("sw {r}, ")), "unexpected save of unused {r}");
            assert!(!asm.contains(&format!("lw {r}, ")), "unexpected restore of unused {r}");
        }
    }

    #[test]
    fn heavy_register_pressure_saves_and_restores_callee_save_registers() {
        let mut src = String::from("int main() {\n");
        for i in 0..30 {
            src.push_str(&format!("\tint v{i} = {i};\n"));
        }
        src.push_str("\tint total = 0;\n");
        for i in 0..30 {
            src.push_str(&format!("\ttotal = total + v{i};\n"));
        }
        src.push_str("\treturn total;\n}\n");

        let asm = assemble_src(&src);
        assert!(CALLEE_SAVE.iter().any(|r| asm.contains(&format!("sw {r}, "))));
        assert!(CALLEE_SAVE.iter().any(|r| asm.contains(&format!("lw {r}, "))));
    }
}
