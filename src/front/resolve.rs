//! Name and shape resolution.
//!
//! Walks the raw tree the parser produced and binds every identifier to a
//! [`SymbolId`], checking the things the grammar itself can't: redeclaration,
//! undeclared-name use, array shape/arity agreement at call sites and
//! indexing, and the presence of a parameterless `main`. Grounded on
//! `original_source/frontend/typecheck/namer.py`'s scope-stack walk, reworked
//! as a tree rewrite rather than in-place attribute mutation (see the module
//! doc on [`super::ast`]).

use std::fmt::Debug;

use derive_more::derive::Display;

use super::ast::*;
use super::parse::raw;
use crate::common::{Id, Map, Span};

#[derive(Display)]
#[display("{span}: {message}")]
pub struct ResolveError {
    pub span: Span,
    pub message: String,
}

impl Debug for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for ResolveError {}

type RResult<T> = Result<T, ResolveError>;

fn err<T>(span: Span, message: impl Into<String>) -> RResult<T> {
    Err(ResolveError { span, message: message.into() })
}

/// A stack of lexical scopes, innermost last. Each scope maps a name to the
/// `SymbolId` it resolves to within that scope.
struct Scopes {
    frames: Vec<Map<Id, SymbolId>>,
}

impl Scopes {
    fn new() -> Self {
        Scopes { frames: vec![Map::new()] }
    }

    fn push(&mut self) {
        self.frames.push(Map::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    /// Declare `name` in the innermost scope. Fails if already declared in
    /// that exact scope (shadowing an outer scope is fine).
    fn declare(&mut self, name: Id, span: Span, id: SymbolId) -> RResult<()> {
        let frame = self.frames.last_mut().unwrap();
        if frame.contains_key(&name) {
            return err(span, format!("'{name}' is already declared in this scope"));
        }
        frame.insert(name, id);
        Ok(())
    }

    fn lookup(&self, name: Id, span: Span) -> RResult<SymbolId> {
        for frame in self.frames.iter().rev() {
            if let Some(&id) = frame.get(&name) {
                return Ok(id);
            }
        }
        err(span, format!("undeclared identifier '{name}'"))
    }
}

struct Resolver {
    symbols: SymbolTable,
    scopes: Scopes,
    /// Function arities, keyed by name, for call-site argument checks —
    /// looked up independently of the scope stack since functions live in
    /// one flat global namespace regardless of nesting.
    functions: Map<Id, (SymbolId, usize)>,
    loop_depth: u32,
}

pub fn resolve(program: raw::Program) -> RResult<Program> {
    let mut r = Resolver {
        symbols: SymbolTable::new(),
        scopes: Scopes::new(),
        functions: Map::new(),
        loop_depth: 0,
    };

    // Pre-declare every function signature so forward calls resolve
    // regardless of textual order, matching the original's two-pass namer.
    for f in &program.functions {
        let arity = f.params.len();
        if let Some(&(_, prev_arity)) = r.functions.get(&f.name) {
            if prev_arity != arity {
                return err(f.span, format!("conflicting declarations of function '{}'", f.name));
            }
            continue;
        }
        let id = r.symbols.insert(Symbol { name: f.name, is_global: true, kind: SymbolKind::Func { arity } });
        r.functions.insert(f.name, (id, arity));
    }

    let mut globals = Vec::new();
    for g in program.globals {
        globals.push(r.resolve_global(g)?);
    }

    let mut functions = Vec::new();
    for f in program.functions {
        functions.push(r.resolve_function(f)?);
    }

    match r.functions.get(&internment::Intern::new("main".to_string())) {
        Some(&(_, 0)) => {}
        Some(_) => return err(Span::default(), "'main' must take no parameters"),
        None => return err(Span::default(), "program has no 'main' function"),
    }

    Ok(Program { symbols: r.symbols, globals, functions })
}

impl Resolver {
    fn resolve_global(&mut self, g: raw::Global) -> RResult<GlobalDecl> {
        let kind = if g.dims.is_empty() {
            SymbolKind::Var
        } else {
            SymbolKind::Array { dims: g.dims.clone() }
        };
        let id = self.symbols.insert(Symbol { name: g.name, is_global: true, kind });
        self.scopes.declare(g.name, g.span, id)?;

        let len = if g.dims.is_empty() { None } else { Some(g.dims.iter().product::<usize>()) };
        let init = match (g.init, len) {
            (raw::GlobalInit::None, None) => GlobalInit::Scalar(0),
            (raw::GlobalInit::None, Some(n)) => GlobalInit::ZeroArray(n),
            (raw::GlobalInit::Scalar(v), None) => GlobalInit::Scalar(v),
            (raw::GlobalInit::Array(vals), Some(n)) => {
                if vals.len() > n {
                    return err(g.span, format!("initializer for '{}' has too many elements", g.name));
                }
                let mut vals = vals;
                vals.resize(n, 0);
                GlobalInit::Array(vals)
            }
            _ => return err(g.span, format!("initializer shape mismatch for '{}'", g.name)),
        };
        Ok(GlobalDecl { symbol: id, init })
    }

    fn resolve_function(&mut self, f: raw::Function) -> RResult<Function> {
        let symbol = self.functions[&f.name].0;
        self.scopes.push();
        let mut params = Vec::new();
        for p in f.params {
            let kind = if p.dims.is_empty() { SymbolKind::Var } else { SymbolKind::Array { dims: p.dims.clone() } };
            let id = self.symbols.insert(Symbol { name: p.name, is_global: false, kind });
            self.scopes.declare(p.name, f.span, id)?;
            params.push(Param { symbol: id, dims: p.dims });
        }
        let body = match f.body {
            Some(block) => Some(self.resolve_block(block)?),
            None => None,
        };
        self.scopes.pop();
        Ok(Function { name: f.name, symbol, params, body })
    }

    fn resolve_block(&mut self, block: raw::Block) -> RResult<Block> {
        self.scopes.push();
        let mut items = Vec::new();
        for item in block.items {
            items.push(match item {
                raw::BlockItem::Decl(d) => BlockItem::Decl(self.resolve_decl(d)?),
                raw::BlockItem::Stmt(s) => BlockItem::Stmt(self.resolve_stmt(s)?),
            });
        }
        self.scopes.pop();
        Ok(Block { items })
    }

    fn resolve_decl(&mut self, d: raw::Decl) -> RResult<Decl> {
        let init = match d.init {
            Some(raw::DeclInit::Scalar(e)) => Some(DeclInit::Scalar(self.resolve_expr(e)?)),
            Some(raw::DeclInit::Array(vals)) => {
                let len: usize = d.dims.iter().product();
                if vals.len() > len {
                    return err(d.span, format!("initializer for '{}' has too many elements", d.name));
                }
                let mut vals = vals;
                vals.resize(len, 0);
                Some(DeclInit::Array(vals))
            }
            None => None,
        };
        let kind = if d.dims.is_empty() { SymbolKind::Var } else { SymbolKind::Array { dims: d.dims.clone() } };
        let id = self.symbols.insert(Symbol { name: d.name, is_global: false, kind });
        self.scopes.declare(d.name, d.span, id)?;
        Ok(Decl { symbol: id, dims: d.dims, init })
    }

    fn resolve_stmt(&mut self, stmt: raw::Stmt) -> RResult<Stmt> {
        Ok(match stmt {
            raw::Stmt::Expr(e) => Stmt::Expr(self.resolve_expr(e)?),
            raw::Stmt::Block(b) => Stmt::Block(self.resolve_block(b)?),
            raw::Stmt::If { cond, then_branch, else_branch } => Stmt::If {
                cond: self.resolve_expr(cond)?,
                then_branch: Box::new(self.resolve_stmt(*then_branch)?),
                else_branch: else_branch.map(|s| self.resolve_stmt(*s)).transpose()?.map(Box::new),
            },
            raw::Stmt::While { cond, body } => {
                let cond = self.resolve_expr(cond)?;
                self.loop_depth += 1;
                let body = self.resolve_stmt(*body)?;
                self.loop_depth -= 1;
                Stmt::While { cond, body: Box::new(body) }
            }
            raw::Stmt::DoWhile { body, cond } => {
                self.loop_depth += 1;
                let body = self.resolve_stmt(*body)?;
                self.loop_depth -= 1;
                Stmt::DoWhile { body: Box::new(body), cond: self.resolve_expr(cond)? }
            }
            raw::Stmt::For { init, cond, update, body } => {
                self.scopes.push();
                let init = init
                    .map(|i| -> RResult<ForInit> {
                        Ok(match *i {
                            raw::ForInit::Decl(d) => ForInit::Decl(self.resolve_decl(d)?),
                            raw::ForInit::Expr(e) => ForInit::Expr(self.resolve_expr(e)?),
                        })
                    })
                    .transpose()?
                    .map(Box::new);
                let cond = cond.map(|e| self.resolve_expr(e)).transpose()?;
                let update = update.map(|e| self.resolve_expr(e)).transpose()?;
                self.loop_depth += 1;
                let body = self.resolve_stmt(*body)?;
                self.loop_depth -= 1;
                self.scopes.pop();
                Stmt::For { init, cond, update, body: Box::new(body) }
            }
            raw::Stmt::Break(span) => {
                if self.loop_depth == 0 {
                    return err(span, "'break' outside a loop");
                }
                Stmt::Break
            }
            raw::Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    return err(span, "'continue' outside a loop");
                }
                Stmt::Continue
            }
            raw::Stmt::Return(_, value) => Stmt::Return(value.map(|e| self.resolve_expr(e)).transpose()?),
            raw::Stmt::Empty => Stmt::Empty,
        })
    }

    fn resolve_expr(&mut self, expr: raw::Expr) -> RResult<Expr> {
        Ok(match expr {
            raw::Expr::Int(n) => Expr::Int(n),
            raw::Expr::Ident(name, span) => {
                let id = self.scopes.lookup(name, span)?;
                if self.symbols.get(id).kind.is_array() {
                    return err(span, format!("'{name}' is an array; use indexing to access an element"));
                }
                Expr::Ident(id)
            }
            raw::Expr::Index { base, index, span } => {
                let base = self.resolve_index_base(*base, span)?;
                let dims = self.array_dims(&base).expect("check_indexable guarantees an array base");
                let depth = index_depth(&base) + 1;
                if depth > dims.len() {
                    return err(span, format!("too many indices for array (expected at most {})", dims.len()));
                }
                Expr::Index { base: Box::new(base), index: Box::new(self.resolve_expr(*index)?) }
            }
            raw::Expr::Unary { op, expr } => Expr::Unary { op, expr: Box::new(self.resolve_expr(*expr)?) },
            raw::Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: Box::new(self.resolve_expr(*lhs)?),
                rhs: Box::new(self.resolve_expr(*rhs)?),
            },
            raw::Expr::Assign { lhs, rhs, span } => {
                let lhs = self.resolve_expr(*lhs)?;
                if !matches!(lhs, Expr::Ident(_) | Expr::Index { .. }) {
                    return err(span, "left-hand side of assignment must be a variable or array element");
                }
                Expr::Assign { lhs: Box::new(lhs), rhs: Box::new(self.resolve_expr(*rhs)?) }
            }
            raw::Expr::Call { name, args, span } => {
                let (symbol, arity) = *self
                    .functions
                    .get(&name)
                    .ok_or_else(|| ResolveError { span, message: format!("call to undeclared function '{name}'") })?;
                if args.len() != arity {
                    return err(
                        span,
                        format!("'{name}' expects {arity} argument(s), found {}", args.len()),
                    );
                }
                let mut resolved_args = Vec::with_capacity(args.len());
                for a in args {
                    resolved_args.push(self.resolve_expr(a)?);
                }
                Expr::Call { symbol, args: resolved_args }
            }
            raw::Expr::Cond { cond, then_expr, else_expr } => Expr::Cond {
                cond: Box::new(self.resolve_expr(*cond)?),
                then_expr: Box::new(self.resolve_expr(*then_expr)?),
                else_expr: Box::new(self.resolve_expr(*else_expr)?),
            },
        })
    }

    /// Resolve the base of an `Index` expression. Unlike `resolve_expr`'s
    /// `Ident` arm, an array-typed identifier is expected here rather than
    /// rejected — `check_indexable` (via the caller) is what validates it.
    fn resolve_index_base(&mut self, expr: raw::Expr, span: Span) -> RResult<Expr> {
        let resolved = match expr {
            raw::Expr::Ident(name, ident_span) => Expr::Ident(self.scopes.lookup(name, ident_span)?),
            raw::Expr::Index { base, index, span: inner_span } => {
                let base = self.resolve_index_base(*base, inner_span)?;
                Expr::Index { base: Box::new(base), index: Box::new(self.resolve_expr(*index)?) }
            }
            other => self.resolve_expr(other)?,
        };
        self.check_indexable(&resolved, span)?;
        Ok(resolved)
    }

    /// An `Index` base must itself be an identifier bound to an array (or
    /// another `Index`, for multi-dimensional access) — reject indexing a
    /// scalar or a function.
    fn check_indexable(&self, base: &Expr, span: Span) -> RResult<()> {
        match base {
            Expr::Ident(id) if self.symbols.get(*id).kind.is_array() => Ok(()),
            Expr::Index { .. } => Ok(()),
            _ => err(span, "cannot index a non-array value"),
        }
    }

    /// The declared dimensions of the array underlying an already-resolved
    /// index base, following a chain of nested `Index` nodes down to the
    /// root identifier.
    fn array_dims(&self, base: &Expr) -> Option<&[usize]> {
        match base {
            Expr::Ident(id) => match &self.symbols.get(*id).kind {
                SymbolKind::Array { dims } => Some(dims),
                _ => None,
            },
            Expr::Index { base, .. } => self.array_dims(base),
            _ => None,
        }
    }
}

/// How many `Index` layers already wrap `expr` — equivalently, how many
/// subscripts have already been applied to the root array identifier.
fn index_depth(expr: &Expr) -> usize {
    match expr {
        Expr::Index { base, .. } => 1 + index_depth(base),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse;
    use super::*;

    fn resolve_src(src: &str) -> RResult<Program> {
        resolve(parse(src).unwrap())
    }

    #[test]
    fn resolves_simple_main() {
        let prog = resolve_src("int main() { return 0; }").unwrap();
        assert_eq!(prog.functions.len(), 1);
    }

    #[test]
    fn rejects_missing_main() {
        assert!(resolve_src("int f() { return 0; }").is_err());
    }

    #[test]
    fn rejects_undeclared_identifier() {
        assert!(resolve_src("int main() { return x; }").is_err());
    }

    #[test]
    fn rejects_redeclaration_in_same_scope() {
        assert!(resolve_src("int main() { int x; int x; return 0; }").is_err());
    }

    #[test]
    fn allows_shadowing_in_inner_scope() {
        assert!(resolve_src("int main() { int x; { int x; } return x; }").is_ok());
    }

    #[test]
    fn rejects_wrong_call_arity() {
        assert!(resolve_src("int f(int a) { return a; } int main() { return f(1, 2); }").is_err());
    }

    #[test]
    fn rejects_break_outside_loop() {
        assert!(resolve_src("int main() { break; return 0; }").is_err());
    }

    #[test]
    fn resolves_forward_call() {
        assert!(resolve_src("int main() { return f(); } int f() { return 1; }").is_ok());
    }

    #[test]
    fn rejects_indexing_a_scalar() {
        assert!(resolve_src("int main() { int x; return x[0]; }").is_err());
    }

    #[test]
    fn resolves_array_element_access() {
        assert!(resolve_src("int main() { int a[4]; a[0] = 1; return a[0]; }").is_ok());
    }

    #[test]
    fn resolves_multidimensional_array_access() {
        assert!(resolve_src("int main() { int a[2][3]; a[1][2] = 1; return a[1][2]; }").is_ok());
    }

    #[test]
    fn rejects_over_indexing_an_array() {
        assert!(resolve_src("int main() { int a[2]; return a[0][1]; }").is_err());
    }

    #[test]
    fn rejects_bare_array_identifier_as_a_value() {
        assert!(resolve_src("int main() { int a[2]; return a; }").is_err());
    }
}
