//! Three-address code: temps, labels, instructions, and the builder that
//! walks a resolved [`crate::front::ast::Program`] to produce them.
//!
//! Grounded on `original_source/frontend/tacgen/tacgen.py` and
//! `original_source/utils/tac/tacinstr.py`, reworked from a visitor over a
//! mutable `FuncVisitor` into a `Builder` that owns its output vector
//! directly — there's no separate `ProgramWriter`/`FuncVisitor` split since
//! nothing here needs the indirection a second visitor gave the Python.

use crate::common::{Id, Map};
use crate::front::ast::{self, Expr, Program, Stmt, SymbolId, SymbolKind};

/// An abstract value slot, unique within its function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temp(pub u32);

impl std::fmt::Display for Temp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A jump target. `Entry`/`Exit` are one-per-function; `Block` labels are
/// allocated from a single program-wide counter so they're unique even
/// though basic blocks are scoped per function (see the design note on the
/// global label counter).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Entry(Id),
    Exit(Id),
    Block(u32),
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Entry(name) => write!(f, "{name}"),
            Label::Exit(name) => write!(f, "{name}_exit"),
            Label::Block(n) => write!(f, "_L{n}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Seqz,
    Snez,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Slt,
    Sgt,
    And,
    Or,
}

/// `CondBranch`'s test: branch if the operand is zero, or if it's nonzero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondOp {
    Beq,
    Bnez,
}

#[derive(Clone, Debug)]
pub enum Instr {
    Assign { dst: Temp, src: Temp },
    LoadImm { dst: Temp, value: i32 },
    Unary { op: UnaryOp, dst: Temp, src: Temp },
    Binary { op: BinaryOp, dst: Temp, lhs: Temp, rhs: Temp },
    Branch { target: Label },
    CondBranch { op: CondOp, cond: Temp, target: Label },
    Return { value: Option<Temp> },
    Mark { label: Label },
    /// Pre-call marker; dead by the time the selector runs (see
    /// `back::select`), since `Call` already carries its full argument list.
    Param { temp: Temp },
    Call { dst: Temp, target: Id, args: Vec<Temp> },
    LoadSymbol { dst: Temp, name: Id },
    Load { dst: Temp, base: Temp, offset: i32 },
    Store { src: Temp, base: Temp, offset: i32 },
    Alloc { dst: Temp, size: i32 },
}

impl Instr {
    /// Temps read by this instruction, in `srcs` order.
    pub fn reads(&self) -> Vec<Temp> {
        use Instr::*;
        match self {
            Assign { src, .. } => vec![*src],
            LoadImm { .. } => vec![],
            Unary { src, .. } => vec![*src],
            Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Branch { .. } => vec![],
            CondBranch { cond, .. } => vec![*cond],
            Return { value } => value.iter().copied().collect(),
            Mark { .. } => vec![],
            Param { temp } => vec![*temp],
            Call { .. } => vec![],
            LoadSymbol { .. } => vec![],
            Load { base, .. } => vec![*base],
            Store { src, base, .. } => vec![*src, *base],
            Alloc { .. } => vec![],
        }
    }

    /// Temps written by this instruction.
    pub fn writes(&self) -> Vec<Temp> {
        use Instr::*;
        match self {
            Assign { dst, .. } => vec![*dst],
            LoadImm { dst, .. } => vec![*dst],
            Unary { dst, .. } => vec![*dst],
            Binary { dst, .. } => vec![*dst],
            Branch { .. } => vec![],
            CondBranch { .. } => vec![],
            Return { .. } => vec![],
            Mark { .. } => vec![],
            Param { .. } => vec![],
            Call { dst, .. } => vec![*dst],
            LoadSymbol { dst, .. } => vec![*dst],
            Load { dst, .. } => vec![*dst],
            Store { .. } => vec![],
            Alloc { dst, .. } => vec![*dst],
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Instr::Mark { .. })
    }

    /// A block ending in this instruction is non-continuous: it does not
    /// fall through to the next block by id.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Branch { .. } | Instr::CondBranch { .. } | Instr::Return { .. })
    }
}

impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instr::*;
        match self {
            Assign { dst, src } => write!(f, "{dst} = {src}"),
            LoadImm { dst, value } => write!(f, "{dst} = {value}"),
            Unary { op, dst, src } => write!(f, "{dst} = {op:?} {src}"),
            Binary { op, dst, lhs, rhs } => write!(f, "{dst} = ({lhs} {op:?} {rhs})"),
            Branch { target } => write!(f, "branch {target}"),
            CondBranch { op, cond, target } => write!(f, "if ({cond} {op:?}) branch {target}"),
            Return { value: Some(v) } => write!(f, "return {v}"),
            Return { value: None } => write!(f, "return"),
            Mark { label } => write!(f, "{label}:"),
            Param { temp } => write!(f, "param {temp}"),
            Call { dst, target, args } => {
                write!(f, "{dst} = call {target}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            LoadSymbol { dst, name } => write!(f, "{dst} = load_symbol {name}"),
            Load { dst, base, offset } => write!(f, "{dst} = load {base}, {offset}"),
            Store { src, base, offset } => write!(f, "store {src}, {base}, {offset}"),
            Alloc { dst, size } => write!(f, "{dst} = alloc {size}"),
        }
    }
}

#[derive(Debug)]
pub struct TacFunction {
    pub name: Id,
    pub entry: Label,
    pub epilogue: Label,
    pub instrs: Vec<Instr>,
    pub params: Vec<Temp>,
    /// `(base temp, size in bytes)` for each stack-allocated local array.
    pub arrays: Vec<(Temp, i32)>,
}

#[derive(Debug, Clone)]
pub enum GlobalInit {
    Scalar(i32),
    /// `count` zero words.
    Zero(usize),
    Words(Vec<i32>),
}

#[derive(Debug)]
pub struct TacProgram {
    pub functions: Vec<TacFunction>,
    pub globals: Vec<(Id, GlobalInit)>,
}

pub fn build(program: &Program) -> TacProgram {
    let mut next_label = 0u32;
    let functions = program
        .functions
        .iter()
        .filter_map(|f| build_function(&program.symbols, &mut next_label, f))
        .collect();

    let globals = program
        .globals
        .iter()
        .map(|g| {
            let name = program.symbols[g.symbol].name;
            let init = match &g.init {
                ast::GlobalInit::Scalar(v) => GlobalInit::Scalar(*v),
                ast::GlobalInit::ZeroArray(n) => GlobalInit::Zero(*n),
                ast::GlobalInit::Array(vals) => GlobalInit::Words(vals.clone()),
            };
            (name, init)
        })
        .collect();

    TacProgram { functions, globals }
}

fn build_function(symbols: &ast::SymbolTable, next_label: &mut u32, f: &ast::Function) -> Option<TacFunction> {
    let body = f.body.as_ref()?;
    let mut b = Builder {
        symbols,
        next_temp: 0,
        next_label,
        instrs: Vec::new(),
        env: Map::new(),
        loop_labels: Vec::new(),
        arrays: Vec::new(),
    };

    let params = f
        .params
        .iter()
        .map(|p| {
            let t = b.fresh_temp();
            b.env.insert(p.symbol, t);
            t
        })
        .collect();

    b.build_block(body);
    if !matches!(b.instrs.last(), Some(Instr::Return { .. })) {
        b.emit(Instr::Return { value: None });
    }

    Some(TacFunction {
        name: f.name,
        entry: Label::Entry(f.name),
        epilogue: Label::Exit(f.name),
        instrs: b.instrs,
        params,
        arrays: b.arrays,
    })
}

struct Builder<'a> {
    symbols: &'a ast::SymbolTable,
    next_temp: u32,
    next_label: &'a mut u32,
    instrs: Vec<Instr>,
    /// Current temp holding each local symbol's value (scalars) or base
    /// address (arrays, including array parameters, which decay to a
    /// pointer value).
    env: Map<SymbolId, Temp>,
    /// `(break, loop)` label pair for each loop we're nested in.
    loop_labels: Vec<(Label, Label)>,
    arrays: Vec<(Temp, i32)>,
}

impl<'a> Builder<'a> {
    fn fresh_temp(&mut self) -> Temp {
        let t = Temp(self.next_temp);
        self.next_temp += 1;
        t
    }

    fn fresh_label(&mut self) -> Label {
        let l = Label::Block(*self.next_label);
        *self.next_label += 1;
        l
    }

    fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    fn build_block(&mut self, block: &ast::Block) {
        for item in &block.items {
            match item {
                ast::BlockItem::Decl(d) => self.build_decl(d),
                ast::BlockItem::Stmt(s) => self.build_stmt(s),
            }
        }
    }

    fn build_decl(&mut self, d: &ast::Decl) {
        if d.dims.is_empty() {
            let t = self.fresh_temp();
            self.env.insert(d.symbol, t);
            if let Some(ast::DeclInit::Scalar(e)) = &d.init {
                let v = self.visit_expr(e);
                self.emit(Instr::Assign { dst: t, src: v });
            }
            return;
        }

        let total_bytes = (d.dims.iter().product::<usize>() * 4) as i32;
        let base = self.fresh_temp();
        self.emit(Instr::Alloc { dst: base, size: total_bytes });
        self.arrays.push((base, total_bytes));
        self.env.insert(d.symbol, base);

        if let Some(ast::DeclInit::Array(vals)) = &d.init {
            let mut zero_temp: Option<Temp> = None;
            for (i, v) in vals.iter().enumerate() {
                let val_temp = if *v == 0 {
                    match zero_temp {
                        Some(z) => z,
                        None => {
                            let z = self.fresh_temp();
                            self.emit(Instr::LoadImm { dst: z, value: 0 });
                            zero_temp = Some(z);
                            z
                        }
                    }
                } else {
                    let t = self.fresh_temp();
                    self.emit(Instr::LoadImm { dst: t, value: *v });
                    t
                };
                self.emit(Instr::Store { src: val_temp, base, offset: (i as i32) * 4 });
            }
        }
    }

    fn build_stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Expr(e) => {
                self.visit_expr(e);
            }
            Stmt::Block(b) => self.build_block(b),
            Stmt::If { cond, then_branch, else_branch } => {
                let c = self.visit_expr(cond);
                match else_branch {
                    None => {
                        let skip = self.fresh_label();
                        self.emit(Instr::CondBranch { op: CondOp::Beq, cond: c, target: skip });
                        self.build_stmt(then_branch);
                        self.emit(Instr::Mark { label: skip });
                    }
                    Some(else_branch) => {
                        let skip = self.fresh_label();
                        let exit = self.fresh_label();
                        self.emit(Instr::CondBranch { op: CondOp::Beq, cond: c, target: skip });
                        self.build_stmt(then_branch);
                        self.emit(Instr::Branch { target: exit });
                        self.emit(Instr::Mark { label: skip });
                        self.build_stmt(else_branch);
                        self.emit(Instr::Mark { label: exit });
                    }
                }
            }
            Stmt::While { cond, body } => {
                let begin = self.fresh_label();
                let loop_l = self.fresh_label();
                let brk = self.fresh_label();
                self.loop_labels.push((brk, loop_l));
                self.emit(Instr::Mark { label: begin });
                let c = self.visit_expr(cond);
                self.emit(Instr::CondBranch { op: CondOp::Beq, cond: c, target: brk });
                self.build_stmt(body);
                self.emit(Instr::Mark { label: loop_l });
                self.emit(Instr::Branch { target: begin });
                self.emit(Instr::Mark { label: brk });
                self.loop_labels.pop();
            }
            Stmt::DoWhile { body, cond } => {
                let begin = self.fresh_label();
                let loop_l = self.fresh_label();
                let brk = self.fresh_label();
                self.loop_labels.push((brk, loop_l));
                self.emit(Instr::Mark { label: begin });
                self.build_stmt(body);
                self.emit(Instr::Mark { label: loop_l });
                let c = self.visit_expr(cond);
                self.emit(Instr::CondBranch { op: CondOp::Beq, cond: c, target: brk });
                self.emit(Instr::Branch { target: begin });
                self.emit(Instr::Mark { label: brk });
                self.loop_labels.pop();
            }
            Stmt::For { init, cond, update, body } => {
                if let Some(init) = init {
                    match &**init {
                        ast::ForInit::Decl(d) => self.build_decl(d),
                        ast::ForInit::Expr(e) => {
                            self.visit_expr(e);
                        }
                    }
                }
                let begin = self.fresh_label();
                let loop_l = self.fresh_label();
                let brk = self.fresh_label();
                self.loop_labels.push((brk, loop_l));
                self.emit(Instr::Mark { label: begin });
                let c = match cond {
                    Some(e) => self.visit_expr(e),
                    None => {
                        let t = self.fresh_temp();
                        self.emit(Instr::LoadImm { dst: t, value: 1 });
                        t
                    }
                };
                self.emit(Instr::CondBranch { op: CondOp::Beq, cond: c, target: brk });
                self.build_stmt(body);
                self.emit(Instr::Mark { label: loop_l });
                if let Some(u) = update {
                    self.visit_expr(u);
                }
                self.emit(Instr::Branch { target: begin });
                self.emit(Instr::Mark { label: brk });
                self.loop_labels.pop();
            }
            Stmt::Break => {
                let (brk, _) = *self.loop_labels.last().expect("resolve guarantees break is inside a loop");
                self.emit(Instr::Branch { target: brk });
            }
            Stmt::Continue => {
                let (_, loop_l) = *self.loop_labels.last().expect("resolve guarantees continue is inside a loop");
                self.emit(Instr::Branch { target: loop_l });
            }
            Stmt::Return(value) => {
                let v = value.as_ref().map(|e| self.visit_expr(e));
                self.emit(Instr::Return { value: v });
            }
            Stmt::Empty => {}
        }
    }

    fn visit_expr(&mut self, e: &Expr) -> Temp {
        match e {
            Expr::Int(n) => {
                let t = self.fresh_temp();
                self.emit(Instr::LoadImm { dst: t, value: *n });
                t
            }
            Expr::Ident(sym) => {
                let symbol = &self.symbols[*sym];
                if symbol.is_global {
                    let base = self.fresh_temp();
                    self.emit(Instr::LoadSymbol { dst: base, name: symbol.name });
                    if symbol.kind.is_array() {
                        base
                    } else {
                        let v = self.fresh_temp();
                        self.emit(Instr::Load { dst: v, base, offset: 0 });
                        v
                    }
                } else {
                    self.env[sym]
                }
            }
            Expr::Index { .. } => {
                let addr = self.address_of(e);
                let v = self.fresh_temp();
                self.emit(Instr::Load { dst: v, base: addr, offset: 0 });
                v
            }
            Expr::Unary { op, expr } => {
                let src = self.visit_expr(expr);
                let op = match op {
                    ast::UnaryOp::Neg => UnaryOp::Neg,
                    ast::UnaryOp::BitNot => UnaryOp::Not,
                    ast::UnaryOp::LogicNot => UnaryOp::Seqz,
                };
                let dst = self.fresh_temp();
                self.emit(Instr::Unary { op, dst, src });
                dst
            }
            Expr::Binary { op, lhs, rhs } => self.visit_binary(*op, lhs, rhs),
            Expr::Assign { lhs, rhs } => {
                let v = self.visit_expr(rhs);
                match &**lhs {
                    Expr::Ident(sym) => {
                        let symbol = &self.symbols[*sym];
                        if symbol.is_global {
                            let base = self.fresh_temp();
                            self.emit(Instr::LoadSymbol { dst: base, name: symbol.name });
                            self.emit(Instr::Store { src: v, base, offset: 0 });
                        } else {
                            let dst = self.env[sym];
                            self.emit(Instr::Assign { dst, src: v });
                        }
                    }
                    Expr::Index { .. } => {
                        let addr = self.address_of(lhs);
                        self.emit(Instr::Store { src: v, base: addr, offset: 0 });
                    }
                    _ => unreachable!("resolve guarantees assignment targets are identifiers or indices"),
                }
                v
            }
            Expr::Call { symbol, args } => {
                let mut arg_temps = Vec::with_capacity(args.len());
                for a in args {
                    let t = self.visit_expr(a);
                    self.emit(Instr::Param { temp: t });
                    arg_temps.push(t);
                }
                let target = self.symbols[*symbol].name;
                let dst = self.fresh_temp();
                self.emit(Instr::Call { dst, target, args: arg_temps });
                dst
            }
            Expr::Cond { cond, then_expr, else_expr } => {
                let c = self.visit_expr(cond);
                let skip = self.fresh_label();
                let exit = self.fresh_label();
                let r = self.fresh_temp();
                self.emit(Instr::CondBranch { op: CondOp::Beq, cond: c, target: skip });
                let t = self.visit_expr(then_expr);
                self.emit(Instr::Assign { dst: r, src: t });
                self.emit(Instr::Branch { target: exit });
                self.emit(Instr::Mark { label: skip });
                let v = self.visit_expr(else_expr);
                self.emit(Instr::Assign { dst: r, src: v });
                self.emit(Instr::Mark { label: exit });
                r
            }
        }
    }

    /// Evaluate `lhs op rhs`, applying the `==`/`!=`/`<=`/`>=`/`&&`/`||`
    /// rewrites to native-friendly opcodes at construction time.
    fn visit_binary(&mut self, op: ast::BinaryOp, lhs: &Expr, rhs: &Expr) -> Temp {
        use ast::BinaryOp as B;

        let l = self.visit_expr(lhs);
        let r = self.visit_expr(rhs);

        let direct = |b: &mut Self, op: BinaryOp| {
            let dst = b.fresh_temp();
            b.emit(Instr::Binary { op, dst, lhs: l, rhs: r });
            dst
        };

        match op {
            B::Add => direct(self, BinaryOp::Add),
            B::Sub => direct(self, BinaryOp::Sub),
            B::Mul => direct(self, BinaryOp::Mul),
            B::Div => direct(self, BinaryOp::Div),
            B::Mod => direct(self, BinaryOp::Mod),
            B::Lt => direct(self, BinaryOp::Slt),
            B::Gt => direct(self, BinaryOp::Sgt),
            B::Eq => {
                let dst = direct(self, BinaryOp::Sub);
                self.emit(Instr::Unary { op: UnaryOp::Seqz, dst, src: dst });
                dst
            }
            B::Ne => {
                let dst = direct(self, BinaryOp::Sub);
                self.emit(Instr::Unary { op: UnaryOp::Snez, dst, src: dst });
                dst
            }
            B::Le => {
                let dst = direct(self, BinaryOp::Sgt);
                self.emit(Instr::Unary { op: UnaryOp::Seqz, dst, src: dst });
                dst
            }
            B::Ge => {
                let dst = direct(self, BinaryOp::Slt);
                self.emit(Instr::Unary { op: UnaryOp::Seqz, dst, src: dst });
                dst
            }
            B::And => {
                let ln = self.fresh_temp();
                self.emit(Instr::Unary { op: UnaryOp::Snez, dst: ln, src: l });
                let rn = self.fresh_temp();
                self.emit(Instr::Unary { op: UnaryOp::Snez, dst: rn, src: r });
                let dst = self.fresh_temp();
                self.emit(Instr::Binary { op: BinaryOp::And, dst, lhs: ln, rhs: rn });
                dst
            }
            B::Or => {
                let dst = direct(self, BinaryOp::Or);
                self.emit(Instr::Unary { op: UnaryOp::Snez, dst, src: dst });
                dst
            }
        }
    }

    /// Compute the byte address of `a[i1][i2]...[ik]`, accumulating
    /// `offset = 4 * sum(i_j * stride_j)` left to right, `stride_j = 4 *
    /// product(dims after position j)`.
    fn address_of(&mut self, e: &Expr) -> Temp {
        let (base, indices) = flatten_index(e);
        let sym = match base {
            Expr::Ident(s) => *s,
            _ => unreachable!("resolve guarantees an index base resolves to an array identifier"),
        };
        let symbol = &self.symbols[sym];
        let dims = match &symbol.kind {
            SymbolKind::Array { dims } => dims.clone(),
            _ => unreachable!("resolve guarantees index bases are arrays"),
        };

        let mut addr = if symbol.is_global {
            let base = self.fresh_temp();
            self.emit(Instr::LoadSymbol { dst: base, name: symbol.name });
            base
        } else {
            self.env[&sym]
        };

        let n = dims.len();
        for (j, index_expr) in indices.iter().enumerate() {
            let idx = self.visit_expr(index_expr);
            let stride = 4 * dims[j + 1..n].iter().product::<usize>() as i32;
            let stride_t = self.fresh_temp();
            self.emit(Instr::LoadImm { dst: stride_t, value: stride });
            let offset_t = self.fresh_temp();
            self.emit(Instr::Binary { op: BinaryOp::Mul, dst: offset_t, lhs: idx, rhs: stride_t });
            let next_addr = self.fresh_temp();
            self.emit(Instr::Binary { op: BinaryOp::Add, dst: next_addr, lhs: addr, rhs: offset_t });
            addr = next_addr;
        }
        addr
    }
}

/// Flatten a chain of nested `Index` nodes (`a[i1][i2]` parses as
/// `Index{base: Index{base: a, index: i1}, index: i2}`) into the array's
/// identifier expression and its indices in left-to-right source order.
fn flatten_index(e: &Expr) -> (&Expr, Vec<&Expr>) {
    let mut indices = Vec::new();
    let mut cur = e;
    while let Expr::Index { base, index } = cur {
        indices.push(index.as_ref());
        cur = base.as_ref();
    }
    indices.reverse();
    (cur, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::{parse, resolve};

    fn build_src(src: &str) -> TacProgram {
        build(&resolve(parse(src).unwrap()).unwrap())
    }

    #[test]
    fn zero_param_return_literal() {
        let tac = build_src("int main() { return 0; }");
        let f = &tac.functions[0];
        assert!(matches!(f.instrs.last(), Some(Instr::Return { .. })));
        assert!(matches!(f.instrs[0], Instr::LoadImm { value: 0, .. }));
    }

    #[test]
    fn two_locals_add() {
        let tac = build_src("int main() { int a = 1; int b = 2; return a + b; }");
        let f = &tac.functions[0];
        let adds = f.instrs.iter().filter(|i| matches!(i, Instr::Binary { op: BinaryOp::Add, .. })).count();
        assert_eq!(adds, 1);
    }

    #[test]
    fn global_round_trip() {
        let tac = build_src("int g = 7; int main() { return g; }");
        assert!(matches!(&tac.globals[0].1, GlobalInit::Scalar(7)));
        let f = &tac.functions[0];
        assert!(f.instrs.iter().any(|i| matches!(i, Instr::LoadSymbol { .. })));
    }

    #[test]
    fn nine_param_function_has_nine_params() {
        let tac = build_src(
            "int f(int a,int b,int c,int d,int e,int g,int h,int i,int j){ return j; }\nint main() { return f(1,2,3,4,5,6,7,8,9); }",
        );
        let f = tac.functions.iter().find(|f| &*f.name == "f").unwrap();
        assert_eq!(f.params.len(), 9);
    }

    #[test]
    fn array_index_emits_two_strides() {
        let tac = build_src("int main() { int a[3][4]; a[1][2] = 5; return 0; }");
        let f = &tac.functions[0];
        let muls = f.instrs.iter().filter(|i| matches!(i, Instr::Binary { op: BinaryOp::Mul, .. })).count();
        assert_eq!(muls, 2);
    }

    #[test]
    fn logical_and_normalizes_both_operands() {
        let tac = build_src("int main() { int a = 1; int b = 2; return a && b; }");
        let f = &tac.functions[0];
        let snez = f.instrs.iter().filter(|i| matches!(i, Instr::Unary { op: UnaryOp::Snez, .. })).count();
        assert_eq!(snez, 2);
    }

    #[test]
    fn logical_and_does_not_clobber_its_operand_temps() {
        let tac = build_src("int main() { int a = 5; int b = a && 0; return a; }");
        let f = &tac.functions[0];
        // `a`'s temp is whatever `LoadImm { value: 5, .. }` wrote to; the
        // `&&` normalization must not later overwrite that same temp with
        // Snez's result, or the final `return a` would read `a && 0`
        // instead of `a`'s own value.
        let a_temp = match f.instrs[0] {
            Instr::LoadImm { dst, value: 5 } => dst,
            _ => panic!("expected a's initializer first"),
        };
        let snez_dsts: Vec<Temp> = f
            .instrs
            .iter()
            .filter_map(|i| match i {
                Instr::Unary { op: UnaryOp::Snez, dst, .. } => Some(*dst),
                _ => None,
            })
            .collect();
        assert!(!snez_dsts.contains(&a_temp), "&& rewrote a's own temp in place");
    }

    #[test]
    fn call_site_emits_param_per_argument() {
        let tac = build_src("int f(int a) { return a; }\nint main() { return f(1); }");
        let main = tac.functions.iter().find(|f| &*f.name == "main").unwrap();
        assert!(main.instrs.iter().any(|i| matches!(i, Instr::Param { .. })));
        assert!(main.instrs.iter().any(|i| matches!(i, Instr::Call { .. })));
    }
}
