//! Top-level assembly text emission: `.data` for globals, then `.text` with
//! one assembled function per `middle::tac::TacFunction`.
//!
//! This module used to fuse register allocation into code generation
//! directly (there was no separate allocator — see the design note this
//! file used to carry); the full compiler needs a genuinely separate
//! allocator instead (`back::regalloc`), so this is now just the driver
//! that ties `middle::cfg`/`back::regalloc` together and renders the
//! `.data` section. It also targets RV32 rather than RV64 (4-byte words
//! throughout, matching `middle::tac`'s addressing arithmetic).

use crate::back::regalloc::assemble_function;
use crate::middle::cfg;
use crate::middle::tac::{GlobalInit, TacProgram};

pub fn assemble(program: &TacProgram) -> String {
    let mut out = String::new();

    if !program.globals.is_empty() {
        out.push_str(".data\n");
        for (name, init) in &program.globals {
            out.push_str(&format!(".global {name}\n{name}:\n"));
            match init {
                GlobalInit::Scalar(v) => out.push_str(&format!("\t.word {v}\n")),
                GlobalInit::Zero(count) => out.push_str(&format!("\t.zero {}\n", count * 4)),
                GlobalInit::Words(vals) => {
                    for v in vals {
                        out.push_str(&format!("\t.word {v}\n"));
                    }
                }
            }
        }
        out.push('\n');
    }

    out.push_str(".text\n");
    for func in &program.functions {
        let graph = cfg::build(func);
        out.push_str(&format!(".global {}\n", func.name));
        out.push_str(&assemble_function(func, &graph));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::{parse, resolve};
    use crate::middle::tac;

    fn assemble_src(src: &str) -> String {
        let prog = resolve(parse(src).unwrap()).unwrap();
        assemble(&tac::build(&prog))
    }

    #[test]
    fn emits_data_section_for_globals() {
        let asm = assemble_src("int g = 3; int main() { return g; }");
        assert!(asm.contains(".data"));
        assert!(asm.contains(".word 3"));
    }

    #[test]
    fn emits_text_section_with_entry_label() {
        let asm = assemble_src("int main() { return 0; }");
        assert!(asm.contains(".text"));
        assert!(asm.contains("main:"));
    }

    #[test]
    fn zero_initialized_array_uses_zero_directive() {
        let asm = assemble_src("int g[4]; int main() { return g[0]; }");
        assert!(asm.contains(".zero 16"));
    }

    #[test]
    fn multiple_functions_each_get_a_global_directive() {
        let asm = assemble_src("int f() { return 1; } int main() { return f(); }");
        assert!(asm.contains(".global f"));
        assert!(asm.contains(".global main"));
    }
}
