//! Dead barrier injection for compute shaders: `if (<opaque-false>)
//! { barrier(); }`. The call is unreachable, so no execution-order
//! constraint is actually introduced.

use shadermorph::ast::{Expr, Stmt, TranslationUnit};
use shadermorph::rng::MutationRng;
use shadermorph::version::ShaderKind;

use crate::families::dead_jump::make_dead_conditional;
use crate::injection::{collect_injection_points, InjectionPoint};
use crate::mutation::Mutation;
use crate::params::GenerationParams;

pub struct DeadBarrierMutation {
    point: InjectionPoint,
    rng: MutationRng,
    params: GenerationParams,
}

pub fn find_dead_barrier_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<DeadBarrierMutation> {
    if params.shader_kind != ShaderKind::Compute || !tu.version.supports_barrier() {
        return Vec::new();
    }
    collect_injection_points(tu)
        .into_iter()
        .map(|point| DeadBarrierMutation {
            point,
            rng: rng.spawn_child(),
            params: params.clone(),
        })
        .collect()
}

impl Mutation for DeadBarrierMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        assert!(
            self.params.shader_kind == ShaderKind::Compute && tu.version.supports_barrier(),
            "dead barriers require a compute shader dialect with barrier()"
        );
        let barrier = Stmt::expr(Expr::call("barrier", Vec::new()));
        let guarded =
            make_dead_conditional(&self.point, barrier, &mut self.rng, &self.params, tu);
        self.point.inject(tu, guarded);
    }

    fn name(&self) -> &'static str {
        "DeadBarrierMutation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadermorph::ast::{
        Block, Declaration, FunctionDefinition, FunctionPrototype, StmtKind,
    };
    use shadermorph::printer;
    use shadermorph::rng::MutationRng;
    use shadermorph::types::Type;
    use shadermorph::version::ShadingLanguageVersion;

    fn shader(version: ShadingLanguageVersion, kind: ShaderKind) -> TranslationUnit {
        TranslationUnit::new(
            version,
            kind,
            vec![Declaration::Function(FunctionDefinition {
                prototype: FunctionPrototype {
                    name: "main".to_string(),
                    return_type: Type::Void,
                    params: Vec::new(),
                },
                body: Block::new(vec![Stmt::new(StmtKind::Empty)], true),
            })],
        )
    }

    #[test]
    fn barrier_injection_is_gated_and_dead() {
        let mut params = crate::params::GenerationParams::normal(ShaderKind::Compute);
        params.injection_switch_available = false;

        // Fragment shaders and barrier-less dialects yield nothing.
        let fragment = shader(ShadingLanguageVersion::Essl310, ShaderKind::Fragment);
        let mut rng = MutationRng::from_seed(0);
        let fragment_params = crate::params::GenerationParams::normal(ShaderKind::Fragment);
        assert!(find_dead_barrier_mutations(&fragment, &mut rng, &fragment_params).is_empty());

        let old_dialect = shader(ShadingLanguageVersion::Essl300, ShaderKind::Compute);
        assert!(find_dead_barrier_mutations(&old_dialect, &mut rng, &params).is_empty());

        // A compute shader on a barrier-capable dialect gets guarded calls.
        let compute = shader(ShadingLanguageVersion::Essl310, ShaderKind::Compute);
        let mutations = find_dead_barrier_mutations(&compute, &mut rng, &params);
        assert!(!mutations.is_empty());
        let mut mutated = compute.clone();
        let mut mutations = mutations;
        mutations[0].apply(&mut mutated);
        let printed = printer::print(&mutated);
        assert!(printed.contains("barrier()"));
        assert!(printed.contains(shadermorph::consts::DEAD));
    }
}
