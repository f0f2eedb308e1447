//! Dead jump injection: insert `if (<opaque-false>) { jump; }` at an
//! arbitrary point. The guard can never hold, so the jump never executes.

use shadermorph::ast::{Expr, Stmt, StmtKind, TranslationUnit};
use shadermorph::rng::MutationRng;
use shadermorph::types::Type;
use shadermorph::version::ShaderKind;

use crate::fuzzer::{Fuzzer, FuzzingContext};
use crate::injection::{collect_injection_points, InjectionPoint};
use crate::mutation::Mutation;
use crate::opaque::OpaqueExprGenerator;
use crate::params::GenerationParams;

pub struct DeadJumpMutation {
    point: InjectionPoint,
    rng: MutationRng,
    params: GenerationParams,
}

/// Every injection point can host a dead jump.
pub fn find_dead_jump_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<DeadJumpMutation> {
    collect_injection_points(tu)
        .into_iter()
        .map(|point| DeadJumpMutation {
            point,
            rng: rng.spawn_child(),
            params: params.clone(),
        })
        .collect()
}

impl DeadJumpMutation {
    fn prepare_jump(&mut self, tu: &TranslationUnit) -> Stmt {
        if !self.point.in_loop {
            return self.prepare_return(tu);
        }
        // "discard" only exists in fragment shaders.
        let kinds = if self.params.shader_kind == ShaderKind::Fragment {
            4
        } else {
            3
        };
        match self.rng.next_int(kinds) {
            0 => Stmt::new(StmtKind::Break),
            1 => Stmt::new(StmtKind::Continue),
            2 => self.prepare_return(tu),
            _ => Stmt::new(StmtKind::Discard),
        }
    }

    fn prepare_return(&mut self, _tu: &TranslationUnit) -> Stmt {
        let return_type = &self.point.enclosing_function.return_type;
        match return_type.canonical_constant() {
            Some(constant) => Stmt::new(StmtKind::Return(Some(constant))),
            None if return_type.without_qualifiers() == &Type::Void => {
                Stmt::new(StmtKind::Return(None))
            }
            // No way to synthesize a return value; dead filler instead.
            None => Stmt::block(Vec::new(), true),
        }
    }
}

impl Mutation for DeadJumpMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        let jump = self.prepare_jump(tu);
        let guarded = make_dead_conditional(&self.point, jump, &mut self.rng, &self.params, tu);
        self.point.inject(tu, guarded);
    }

    fn name(&self) -> &'static str {
        "DeadJumpMutation"
    }
}

/// `if (<dead condition>) { stmt }` built against the point's scope.
pub fn make_dead_conditional(
    point: &InjectionPoint,
    then_stmt: Stmt,
    rng: &mut MutationRng,
    params: &GenerationParams,
    tu: &TranslationUnit,
) -> Stmt {
    let generator = OpaqueExprGenerator::new(tu.version, params);
    let mut fuzzer = Fuzzer::new(FuzzingContext::new(point.scope.clone()), tu.version, params);
    let condition = generator.make_dead_condition(rng, &mut fuzzer);
    make_guard(condition, then_stmt)
}

fn make_guard(condition: Expr, then_stmt: Stmt) -> Stmt {
    let body = match then_stmt.kind {
        StmtKind::Block(_) => then_stmt,
        _ => Stmt::block(vec![then_stmt], true),
    };
    Stmt::new(StmtKind::If {
        cond: condition,
        then_branch: Box::new(body),
        else_branch: None,
    })
}
