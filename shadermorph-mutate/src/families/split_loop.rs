//! Loop splitting: replace an analyzable counted `for` loop with two
//! consecutive loops over disjoint sub-ranges whose union, in order, is the
//! original range.

use shadermorph::ast::{
    BinOp, Block, Expr, ExprKind, Stmt, StmtKind, TranslationUnit, UnOp, VarDeclGroup,
};
use shadermorph::consts;
use shadermorph::rng::MutationRng;
use shadermorph::types::{BasicType, Type};
use shadermorph::walk::contains_top_level_break;

use crate::injection::{collect_injection_points, InjectionPoint};
use crate::mutation::Mutation;
use crate::params::GenerationParams;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoopSplitInfo {
    counter: String,
    start: i32,
    end: i32,
    increasing: bool,
}

fn expr_as_name(expr: &Expr) -> Option<&str> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(name),
        _ => None,
    }
}

fn expr_as_int(expr: &Expr) -> Option<i32> {
    expr.as_int_lit()
}

/// The full shape analysis: integer counter declared (alone) by the
/// initializer with a literal value, `++`/`--` increment of that counter, a
/// comparison against a literal consistent with the direction, no top-level
/// `break`, and a body that never writes the counter.
fn loop_split_info(stmt: &Stmt) -> Option<LoopSplitInfo> {
    let StmtKind::For {
        init,
        cond,
        inc,
        body,
    } = &stmt.kind
    else {
        return None;
    };

    // A top-level break in the first loop would have to suppress the second
    // loop as well; we do not attempt that.
    if contains_top_level_break(body) {
        return None;
    }

    let ExprKind::Unary(inc_op, inc_target) = &inc.as_ref()?.kind else {
        return None;
    };
    let increasing = match inc_op {
        UnOp::PreInc | UnOp::PostInc => true,
        UnOp::PreDec | UnOp::PostDec => false,
        _ => return None,
    };
    let counter = expr_as_name(inc_target)?.to_string();

    let StmtKind::Decl(group) = &init.as_ref()?.kind else {
        return None;
    };
    if group.decls.len() != 1 {
        return None;
    }
    match group.base_type.without_qualifiers() {
        Type::Basic(BasicType::Int | BasicType::Uint) => {}
        _ => return None,
    }
    let decl = &group.decls[0];
    if decl.array_size.is_some() || decl.name != counter {
        return None;
    }
    let start = expr_as_int(decl.init.as_ref()?)?;

    let ExprKind::Binary(comparison, lhs, rhs) = &cond.as_ref()?.kind else {
        return None;
    };
    if !matches!(
        comparison,
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Ne
    ) {
        return None;
    }

    // VARIABLE op LITERAL or LITERAL op VARIABLE.
    let (end, variable_first) = if expr_as_name(lhs) == Some(counter.as_str()) {
        (expr_as_int(rhs)?, true)
    } else if expr_as_name(rhs) == Some(counter.as_str()) {
        (expr_as_int(lhs)?, false)
    } else {
        return None;
    };

    if !direction_bounds_and_test_consistent(increasing, start, end, *comparison, variable_first) {
        return None;
    }

    if body_modifies_counter(body, &counter) {
        return None;
    }

    Some(LoopSplitInfo {
        counter,
        start,
        end,
        increasing,
    })
}

fn direction_bounds_and_test_consistent(
    increasing: bool,
    start: i32,
    end: i32,
    comparison: BinOp,
    variable_first: bool,
) -> bool {
    let (lower, upper) = if increasing { (start, end) } else { (end, start) };
    if upper <= lower {
        return false;
    }
    let allowed_variable_first = if increasing {
        [BinOp::Lt, BinOp::Le, BinOp::Ne]
    } else {
        [BinOp::Gt, BinOp::Ge, BinOp::Ne]
    };
    let allowed_variable_last = if increasing {
        [BinOp::Gt, BinOp::Ge, BinOp::Ne]
    } else {
        [BinOp::Lt, BinOp::Le, BinOp::Ne]
    };
    if variable_first {
        allowed_variable_first.contains(&comparison)
    } else {
        allowed_variable_last.contains(&comparison)
    }
}

fn body_modifies_counter(body: &Stmt, counter: &str) -> bool {
    fn expr_writes(expr: &Expr, counter: &str) -> bool {
        match &expr.kind {
            ExprKind::Binary(op, lhs, rhs) => {
                (op.is_side_effecting() && expr_as_name(lhs) == Some(counter))
                    || expr_writes(lhs, counter)
                    || expr_writes(rhs, counter)
            }
            ExprKind::Unary(op, operand) => {
                (op.is_side_effecting() && expr_as_name(operand) == Some(counter))
                    || expr_writes(operand, counter)
            }
            ExprKind::Ternary(c, t, e) => {
                expr_writes(c, counter) || expr_writes(t, counter) || expr_writes(e, counter)
            }
            ExprKind::Paren(inner) | ExprKind::Member(inner, _) => expr_writes(inner, counter),
            ExprKind::Index(l, r) => expr_writes(l, counter) || expr_writes(r, counter),
            ExprKind::Call(_, args) | ExprKind::Ctor(_, args) => {
                args.iter().any(|a| expr_writes(a, counter))
            }
            _ => false,
        }
    }

    fn stmt_writes(stmt: &Stmt, counter: &str) -> bool {
        if shadermorph::walk::exprs_of_stmt(stmt)
            .iter()
            .any(|e| expr_writes(e, counter))
        {
            return true;
        }
        match &stmt.kind {
            StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
                block.stmts.iter().any(|s| stmt_writes(s, counter))
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                stmt_writes(then_branch, counter)
                    || else_branch.as_deref().is_some_and(|e| stmt_writes(e, counter))
            }
            StmtKind::For { init, body, .. } => {
                init.as_deref().is_some_and(|i| stmt_writes(i, counter))
                    || stmt_writes(body, counter)
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                stmt_writes(body, counter)
            }
            _ => false,
        }
    }

    stmt_writes(body, counter)
}

#[must_use]
pub fn suitable_for_splitting(point: &InjectionPoint, tu: &TranslationUnit) -> bool {
    point
        .next_stmt(tu)
        .is_some_and(|next| loop_split_info(next).is_some())
}

pub struct SplitForLoopMutation {
    point: InjectionPoint,
    rng: MutationRng,
}

pub fn find_split_loop_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    _params: &GenerationParams,
) -> Vec<SplitForLoopMutation> {
    collect_injection_points(tu)
        .into_iter()
        .filter(|point| suitable_for_splitting(point, tu))
        .map(|point| SplitForLoopMutation {
            point,
            rng: rng.spawn_child(),
        })
        .collect()
}

impl Mutation for SplitForLoopMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        assert!(
            suitable_for_splitting(&self.point, tu),
            "split site became unsuitable between discovery and application"
        );
        let original = self
            .point
            .next_stmt(tu)
            .expect("suitable point has a next statement");
        let info = loop_split_info(original).expect("suitable loop analyzes");
        let new_counter = format!("{}{}", consts::SPLIT_LOOP_COUNTER_PREFIX, info.counter);

        let mut first = original.clone_fresh();
        let mut second = original.clone_fresh();
        rename_identifier(&mut first, &info.counter, &new_counter);
        rename_identifier(&mut second, &info.counter, &new_counter);

        let range = info.start.abs_diff(info.end);
        let split_after = self.rng.next_int(range + 1) as i32;
        let direction = if info.increasing { 1 } else { -1 };
        let boundary = info.start + direction * split_after;

        // First loop runs [start, boundary), second [boundary, end), in the
        // loop's own direction.
        adjust_bound(&mut first, &new_counter, boundary, info.increasing);
        adjust_initializer(&mut second, boundary);

        self.point
            .replace_next(tu, Stmt::new(StmtKind::Block(Block::new(vec![first, second], true))));
    }

    fn name(&self) -> &'static str {
        "SplitForLoopMutation"
    }
}

fn adjust_bound(loop_stmt: &mut Stmt, counter: &str, bound: i32, increasing: bool) {
    let StmtKind::For { cond, .. } = &mut loop_stmt.kind else {
        unreachable!("split target is a for loop");
    };
    let op = if increasing { BinOp::Lt } else { BinOp::Gt };
    *cond = Some(Expr::binary(op, Expr::ident(counter), Expr::int(bound)));
}

fn adjust_initializer(loop_stmt: &mut Stmt, start: i32) {
    let StmtKind::For { init, .. } = &mut loop_stmt.kind else {
        unreachable!("split target is a for loop");
    };
    let Some(init) = init else {
        unreachable!("analyzed loop has an initializer");
    };
    let StmtKind::Decl(group) = &mut init.kind else {
        unreachable!("analyzed initializer is a declaration");
    };
    group.decls[0].init = Some(Expr::int(start));
}

/// Renames every occurrence of an identifier (uses and declarators) inside a
/// statement. The analyzed loop shape rules out shadowing of the counter.
fn rename_identifier(stmt: &mut Stmt, old: &str, new: &str) {
    fn rename_expr(expr: &mut Expr, old: &str, new: &str) {
        match &mut expr.kind {
            ExprKind::Ident(name) => {
                if name == old {
                    *name = new.to_string();
                }
            }
            ExprKind::Unary(_, e) | ExprKind::Paren(e) | ExprKind::Member(e, _) => {
                rename_expr(e, old, new);
            }
            ExprKind::Binary(_, l, r) | ExprKind::Index(l, r) => {
                rename_expr(l, old, new);
                rename_expr(r, old, new);
            }
            ExprKind::Ternary(c, t, e) => {
                rename_expr(c, old, new);
                rename_expr(t, old, new);
                rename_expr(e, old, new);
            }
            ExprKind::Call(_, args) | ExprKind::Ctor(_, args) => {
                for arg in args {
                    rename_expr(arg, old, new);
                }
            }
            _ => {}
        }
    }

    fn rename_group(group: &mut VarDeclGroup, old: &str, new: &str) {
        for decl in &mut group.decls {
            if decl.name == old {
                decl.name = new.to_string();
            }
            if let Some(init) = &mut decl.init {
                rename_expr(init, old, new);
            }
        }
    }

    match &mut stmt.kind {
        StmtKind::Decl(group) => rename_group(group, old, new),
        StmtKind::Expr(e) => rename_expr(e, old, new),
        StmtKind::Block(block) => {
            for inner in &mut block.stmts {
                rename_identifier(inner, old, new);
            }
        }
        StmtKind::Switch { subject, body } => {
            rename_expr(subject, old, new);
            for inner in &mut body.stmts {
                rename_identifier(inner, old, new);
            }
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            rename_expr(cond, old, new);
            rename_identifier(then_branch, old, new);
            if let Some(else_branch) = else_branch {
                rename_identifier(else_branch, old, new);
            }
        }
        StmtKind::For {
            init,
            cond,
            inc,
            body,
        } => {
            if let Some(init) = init {
                rename_identifier(init, old, new);
            }
            if let Some(cond) = cond {
                rename_expr(cond, old, new);
            }
            if let Some(inc) = inc {
                rename_expr(inc, old, new);
            }
            rename_identifier(body, old, new);
        }
        StmtKind::While { cond, body } => {
            rename_expr(cond, old, new);
            rename_identifier(body, old, new);
        }
        StmtKind::DoWhile { body, cond } => {
            rename_identifier(body, old, new);
            rename_expr(cond, old, new);
        }
        StmtKind::Return(Some(value)) | StmtKind::CaseLabel(Some(value)) => {
            rename_expr(value, old, new);
        }
        _ => {}
    }
}
