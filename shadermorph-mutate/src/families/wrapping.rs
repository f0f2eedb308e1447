//! Wrapping conditionals: replace a statement `S` with control flow that
//! still executes `S` exactly once — `if (true) { S } else {}`,
//! `if (false) {} else { S }`, a single-iteration `for`, or
//! `do { S } while (false)`.

use shadermorph::ast::{
    BinOp, Expr, Stmt, StmtKind, TranslationUnit, UnOp, VarDeclGroup,
};
use shadermorph::consts;
use shadermorph::rng::MutationRng;
use shadermorph::types::{BasicType, Type};
use shadermorph::walk::{contains_top_level_break, contains_top_level_continue};

use crate::fuzzer::{Fuzzer, FuzzingContext};
use crate::injection::{collect_injection_points, InjectionPoint};
use crate::mutation::Mutation;
use crate::opaque::OpaqueExprGenerator;
use crate::params::GenerationParams;

const NUM_WRAP_KINDS: u32 = 4;

pub struct WrappingConditionalMutation {
    point: InjectionPoint,
    rng: MutationRng,
    params: GenerationParams,
}

#[must_use]
pub fn suitable_for_wrapping(point: &InjectionPoint, tu: &TranslationUnit) -> bool {
    let Some(next) = point.next_stmt(tu) else {
        return false;
    };
    // A declaration cannot be wrapped: moving it into a nested scope would
    // hide it from later statements.
    if matches!(next.kind, StmtKind::Decl(_)) {
        return false;
    }
    // A case label cannot move into nested control flow.
    if matches!(next.kind, StmtKind::CaseLabel(_)) {
        return false;
    }
    !contains_top_level_break(next) && !contains_top_level_continue(next)
}

pub fn find_wrapping_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<WrappingConditionalMutation> {
    collect_injection_points(tu)
        .into_iter()
        .filter(|point| suitable_for_wrapping(point, tu))
        .map(|point| WrappingConditionalMutation {
            point,
            rng: rng.spawn_child(),
            params: params.clone(),
        })
        .collect()
}

impl Mutation for WrappingConditionalMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        assert!(
            suitable_for_wrapping(&self.point, tu),
            "wrapping site became unsuitable between discovery and application"
        );
        let original = self
            .point
            .next_stmt(tu)
            .expect("suitable point has a next statement")
            .clone();
        let mut wrapped = self.wrap_statement(original, tu);
        if self.point.is_if_branch_point() {
            // An extra block avoids the wrapped if absorbing an enclosing
            // if's else branch.
            wrapped = Stmt::block(vec![wrapped], false);
        }
        self.point.replace_next(tu, wrapped);
    }

    fn name(&self) -> &'static str {
        "WrappingConditionalMutation"
    }
}

impl WrappingConditionalMutation {
    fn wrap_statement(&mut self, stmt: Stmt, tu: &TranslationUnit) -> Stmt {
        let stmt = match stmt.kind {
            StmtKind::Block(_) => stmt,
            _ => Stmt::block(vec![stmt], true),
        };
        let rng = &mut self.rng;
        let generator = OpaqueExprGenerator::new(tu.version, &self.params);
        let mut fuzzer = Fuzzer::new(
            FuzzingContext::new(self.point.scope.clone()),
            tu.version,
            &self.params,
        );
        loop {
            match rng.next_int(NUM_WRAP_KINDS) {
                0 => {
                    // if (true) { stmt } else {} — the empty else stops the
                    // new if from absorbing an enclosing else branch.
                    let truth = generator
                        .make_opaque_bool(true, BasicType::Bool, false, 0, rng, &mut fuzzer);
                    return Stmt::new(StmtKind::If {
                        cond: wrapped_if_condition(truth, true),
                        then_branch: Box::new(stmt),
                        else_branch: Some(Box::new(empty_block())),
                    });
                }
                1 => {
                    // if (false) {} else { stmt }
                    let falsity = generator
                        .make_opaque_bool(false, BasicType::Bool, false, 0, rng, &mut fuzzer);
                    return Stmt::new(StmtKind::If {
                        cond: wrapped_if_condition(falsity, false),
                        then_branch: Box::new(empty_block()),
                        else_branch: Some(Box::new(stmt)),
                    });
                }
                2 => {
                    return single_iteration_for(
                        stmt,
                        &generator,
                        &mut fuzzer,
                        rng,
                        tu.version.restricted_for_loops(),
                    );
                }
                _ => {
                    if !tu.version.supports_do_stmt() {
                        continue;
                    }
                    // do { stmt } while (false);
                    let falsity = generator
                        .make_opaque_bool(false, BasicType::Bool, false, 0, rng, &mut fuzzer);
                    return Stmt::new(StmtKind::DoWhile {
                        body: Box::new(stmt),
                        cond: wrapped_loop_condition(falsity),
                    });
                }
            }
        }
    }
}

/// `for (int c = 0; c < 1; c++) { stmt }` (or the downward mirror), with
/// opaque bounds where the dialect allows non-constant ones.
fn single_iteration_for(
    stmt: Stmt,
    generator: &OpaqueExprGenerator,
    fuzzer: &mut Fuzzer,
    rng: &mut MutationRng,
    bounds_must_be_const: bool,
) -> Stmt {
    let up = rng.next_bool();
    let counter = consts::INJECTED_LOOP_COUNTER;

    let start = if up {
        generator.make_opaque_zero(BasicType::Int, bounds_must_be_const, 0, rng, fuzzer)
    } else {
        generator.make_opaque_one(BasicType::Int, bounds_must_be_const, 0, rng, fuzzer)
    };
    let end = if up {
        generator.make_opaque_one(BasicType::Int, bounds_must_be_const, 0, rng, fuzzer)
    } else {
        generator.make_opaque_zero(BasicType::Int, bounds_must_be_const, 0, rng, fuzzer)
    };
    let init = Stmt::new(StmtKind::Decl(VarDeclGroup::single(
        Type::Basic(BasicType::Int),
        counter,
        Some(start),
    )));
    let test_op = if rng.next_bool() {
        if up { BinOp::Lt } else { BinOp::Gt }
    } else {
        BinOp::Ne
    };
    let test = Expr::binary(test_op, Expr::ident(counter), end);
    let inc_op = if up { UnOp::PostInc } else { UnOp::PostDec };
    let inc = Expr::unary(inc_op, Expr::ident(counter));
    Stmt::new(StmtKind::For {
        init: Some(Box::new(init)),
        cond: Some(wrapped_loop_condition(test)),
        inc: Some(inc),
        body: Box::new(stmt),
    })
}

fn empty_block() -> Stmt {
    Stmt::block(Vec::new(), true)
}

fn wrapped_loop_condition(expr: Expr) -> Expr {
    Expr::call(consts::WRAPPED_LOOP, vec![expr])
}

#[must_use]
pub fn wrapped_if_condition(expr: Expr, truth: bool) -> Expr {
    let name = if truth {
        consts::WRAPPED_IF_TRUE
    } else {
        consts::WRAPPED_IF_FALSE
    };
    Expr::call(name, vec![expr])
}
