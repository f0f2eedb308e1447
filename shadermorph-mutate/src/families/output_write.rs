//! Output-variable write injections. The dead variant hides an arbitrary
//! write behind an opaque-false guard; the live variant really overwrites an
//! output but saves and restores the original value, with the restore
//! guarded by an opaque-true condition.

use shadermorph::ast::{Expr, Stmt, StmtKind, TranslationUnit, VarDeclGroup};
use shadermorph::consts;
use shadermorph::rng::MutationRng;
use shadermorph::typer::builtin_variable_type;
use shadermorph::types::{BasicType, Type, TypeQualifier};
use shadermorph::version::{ShaderKind, ShadingLanguageVersion};

use crate::families::dead_jump::make_dead_conditional;
use crate::fuzzer::{Fuzzer, FuzzingContext};
use crate::injection::{collect_injection_points, InjectionPoint};
use crate::mutation::Mutation;
use crate::opaque::OpaqueExprGenerator;
use crate::params::GenerationParams;

/// Output variables visible at the point: the stage's builtin outputs plus
/// anything in scope declared with the output qualifier. Sorted by name so
/// random selection is deterministic.
fn available_output_variables(
    point: &InjectionPoint,
    version: ShadingLanguageVersion,
    params: &GenerationParams,
) -> Vec<(String, Type)> {
    let mut result: Vec<(String, Type)> = Vec::new();
    match params.shader_kind {
        ShaderKind::Fragment => {
            if version.supports_gl_frag_color() {
                result.push((
                    "gl_FragColor".to_string(),
                    Type::Basic(BasicType::Vec4),
                ));
            }
        }
        ShaderKind::Vertex => {
            result.push(("gl_Position".to_string(), Type::Basic(BasicType::Vec4)));
            result.push(("gl_PointSize".to_string(), Type::Basic(BasicType::Float)));
        }
        ShaderKind::Compute => {}
    }
    for name in point.scope.names_with_qualifier(TypeQualifier::ShaderOutput) {
        let ty = point
            .scope
            .lookup_type(&name)
            .expect("qualified name resolves")
            .without_qualifiers()
            .clone();
        result.push((name, ty));
    }
    result.sort_by(|a, b| a.0.cmp(&b.0));
    result.dedup_by(|a, b| a.0 == b.0);
    result
}

fn suitable_for_output_write(
    point: &InjectionPoint,
    version: ShadingLanguageVersion,
    params: &GenerationParams,
) -> bool {
    !available_output_variables(point, version, params).is_empty()
}

fn choose_output_variable(
    point: &InjectionPoint,
    version: ShadingLanguageVersion,
    params: &GenerationParams,
    rng: &mut MutationRng,
) -> (String, Type) {
    let available = available_output_variables(point, version, params);
    assert!(
        !available.is_empty(),
        "output-write site lost its output variables between discovery and application"
    );
    available[rng.choose_index(available.len())].clone()
}

/// Fuzz a value of the output's type, falling back to its canonical constant
/// when the fuzzer is cornered.
fn fuzzed_output_value(
    point: &InjectionPoint,
    ty: &Type,
    tu: &TranslationUnit,
    params: &GenerationParams,
    rng: &mut MutationRng,
) -> Expr {
    let mut fuzzer = Fuzzer::new(FuzzingContext::new(point.scope.clone()), tu.version, params);
    let value = fuzzer
        .fuzz_expr(rng, ty, false, false, 0)
        .unwrap_or_else(|_| {
            ty.canonical_constant()
                .expect("output variables have basic types")
        });
    OpaqueExprGenerator::fuzzed_tag(value)
}

pub struct DeadOutputWriteMutation {
    point: InjectionPoint,
    rng: MutationRng,
    params: GenerationParams,
}

pub fn find_dead_output_write_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<DeadOutputWriteMutation> {
    collect_injection_points(tu)
        .into_iter()
        .filter(|point| suitable_for_output_write(point, tu.version, params))
        .map(|point| DeadOutputWriteMutation {
            point,
            rng: rng.spawn_child(),
            params: params.clone(),
        })
        .collect()
}

impl Mutation for DeadOutputWriteMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        let (name, ty) =
            choose_output_variable(&self.point, tu.version, &self.params, &mut self.rng);
        let value = fuzzed_output_value(&self.point, &ty, tu, &self.params, &mut self.rng);
        let write = Stmt::expr(Expr::assign(Expr::ident(name), value));
        let guarded = make_dead_conditional(&self.point, write, &mut self.rng, &self.params, tu);
        self.point.inject(tu, guarded);
    }

    fn name(&self) -> &'static str {
        "DeadOutputWriteMutation"
    }
}

pub struct LiveOutputWriteMutation {
    point: InjectionPoint,
    rng: MutationRng,
    params: GenerationParams,
}

pub fn find_live_output_write_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<LiveOutputWriteMutation> {
    collect_injection_points(tu)
        .into_iter()
        .filter(|point| suitable_for_output_write(point, tu.version, params))
        .map(|point| LiveOutputWriteMutation {
            point,
            rng: rng.spawn_child(),
            params: params.clone(),
        })
        .collect()
}

impl Mutation for LiveOutputWriteMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        let (name, ty) =
            choose_output_variable(&self.point, tu.version, &self.params, &mut self.rng);
        debug_assert!(
            self.point.scope.lookup_type(&name).is_some()
                || builtin_variable_type(&name, tu.version, self.params.shader_kind).is_some()
        );
        let backup = format!("{}{name}", consts::OUT_BACKUP_PREFIX);

        let mut stmts = Vec::new();
        stmts.push(Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            ty.clone(),
            backup.clone(),
            None,
        ))));
        stmts.push(Stmt::expr(Expr::assign(
            Expr::ident(backup.clone()),
            Expr::ident(name.clone()),
        )));
        let value = fuzzed_output_value(&self.point, &ty, tu, &self.params, &mut self.rng);
        stmts.push(Stmt::expr(Expr::assign(Expr::ident(name.clone()), value)));

        // Restore under an opaque-true guard: the restore always runs, so the
        // final value is unchanged, but no compiler can prove that.
        let generator = OpaqueExprGenerator::new(tu.version, &self.params);
        let mut fuzzer = Fuzzer::new(
            FuzzingContext::new(self.point.scope.clone()),
            tu.version,
            &self.params,
        );
        let truth =
            generator.make_opaque_bool(true, BasicType::Bool, false, 0, &mut self.rng, &mut fuzzer);
        let restore = Stmt::expr(Expr::assign(Expr::ident(name), Expr::ident(backup)));
        stmts.push(Stmt::new(StmtKind::If {
            cond: Expr::call(consts::WRAPPED_IF_TRUE, vec![truth]),
            then_branch: Box::new(Stmt::block(vec![restore], true)),
            else_branch: None,
        }));

        self.point.inject(tu, Stmt::block(stmts, true));
    }

    fn name(&self) -> &'static str {
        "LiveOutputWriteMutation"
    }
}
