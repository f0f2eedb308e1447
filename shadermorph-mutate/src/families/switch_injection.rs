//! Switch injection: replace a block's statements with a `switch` over an
//! opaque zero whose case 0 arm executes exactly the original statements,
//! surrounded by unreachable decoy cases full of fuzzed code.

use shadermorph::ast::{Expr, NodeId, Stmt, StmtKind, TranslationUnit};
use shadermorph::consts;
use shadermorph::rng::MutationRng;
use shadermorph::scope::Scope;
use shadermorph::types::BasicType;
use shadermorph::walk::{contains_top_level_break, declare_group};

use crate::families::fresh_prefix_id;
use crate::fuzzer::{Fuzzer, FuzzingContext};
use crate::injection::{collect_injection_points, InjectionPoint};
use crate::mutation::Mutation;
use crate::opaque::OpaqueExprGenerator;
use crate::params::GenerationParams;

pub struct SwitchInjectionMutation {
    point: InjectionPoint,
    rng: MutationRng,
    params: GenerationParams,
}

fn is_block_without_top_level_breaks(stmt: &Stmt) -> bool {
    stmt.as_block().is_some() && !contains_top_level_break(stmt)
}

#[must_use]
pub fn suitable_for_switch_injection(point: &InjectionPoint, tu: &TranslationUnit) -> bool {
    if !tu.version.supports_switch_stmt() {
        return false;
    }
    let Some(next) = point.next_stmt(tu) else {
        return false;
    };
    if is_block_without_top_level_breaks(next) {
        return true;
    }
    match &next.kind {
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            is_block_without_top_level_breaks(then_branch)
                || else_branch
                    .as_deref()
                    .is_some_and(is_block_without_top_level_breaks)
        }
        StmtKind::For { body, .. }
        | StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. } => is_block_without_top_level_breaks(body),
        _ => false,
    }
}

pub fn find_switch_injection_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<SwitchInjectionMutation> {
    collect_injection_points(tu)
        .into_iter()
        .filter(|point| suitable_for_switch_injection(point, tu))
        .map(|point| SwitchInjectionMutation {
            point,
            rng: rng.spawn_child(),
            params: params.clone(),
        })
        .collect()
}

impl Mutation for SwitchInjectionMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        assert!(
            suitable_for_switch_injection(&self.point, tu),
            "switch site became unsuitable between discovery and application"
        );
        let next = self.point.next_stmt(tu).expect("suitable point has a next");
        let next_id = next.id;
        match &next.kind {
            StmtKind::Block(block) => {
                let block_id = block.id;
                self.switchify(tu, block_id, self.point.scope.clone());
            }
            StmtKind::For { init, body, .. } => {
                // The for header may declare variables that shadow outer
                // names; extend the snapshot so fuzzed decoys see them.
                let mut scope = self.point.scope.clone();
                if let Some(init) = init {
                    if let StmtKind::Decl(group) = &init.kind {
                        declare_group(&mut scope, group);
                    }
                }
                let block_id = body.as_block().expect("suitable loop body is a block").id;
                self.switchify(tu, block_id, scope);
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                let block_id = body.as_block().expect("suitable loop body is a block").id;
                self.switchify(tu, block_id, self.point.scope.clone());
            }
            StmtKind::If { .. } => {
                self.switchify_if(tu, next_id);
            }
            _ => unreachable!("unsuitable statement shape at switch site"),
        }
    }

    fn name(&self) -> &'static str {
        "SwitchInjectionMutation"
    }
}

impl SwitchInjectionMutation {
    fn switchify_if(&mut self, tu: &mut TranslationUnit, if_stmt: NodeId) {
        let StmtKind::If {
            then_branch,
            else_branch,
            ..
        } = &tu.find_stmt(if_stmt).expect("if statement present").kind
        else {
            unreachable!()
        };
        let then_ok = is_block_without_top_level_breaks(then_branch);
        let else_ok = else_branch
            .as_deref()
            .is_some_and(is_block_without_top_level_breaks);
        let then_id = then_branch.as_block().map(|b| b.id);
        let else_id = else_branch.as_deref().and_then(|s| s.as_block()).map(|b| b.id);

        if then_ok && !else_ok {
            self.switchify(tu, then_id.expect("then branch is a block"), self.point.scope.clone());
            return;
        }
        if !then_ok && else_ok {
            self.switchify(tu, else_id.expect("else branch is a block"), self.point.scope.clone());
            return;
        }
        assert!(then_ok && else_ok);
        loop {
            let mut transformed = false;
            if self.rng.next_bool() {
                self.switchify(tu, then_id.expect("then branch is a block"), self.point.scope.clone());
                transformed = true;
            }
            if self.rng.next_bool() {
                self.switchify(tu, else_id.expect("else branch is a block"), self.point.scope.clone());
                transformed = true;
            }
            if transformed {
                return;
            }
        }
    }

    fn switchify(&mut self, tu: &mut TranslationUnit, block_id: NodeId, scope: Scope) {
        let stmt_count = tu
            .find_block(block_id)
            .expect("block to switchify is present")
            .stmts
            .len();
        if stmt_count == 0 {
            return;
        }

        let rng = &mut self.rng;
        let params = &self.params;

        let cases_before = rng.next_int(params.max_decoy_cases);
        let cases_during = rng.next_int(params.max_decoy_cases);
        let cases_after = rng.next_int(params.max_decoy_cases);

        let prefix = format!("sw{}", fresh_prefix_id(tu, "v_sw"));
        let mut stmt_fuzzer =
            Fuzzer::with_prefix(FuzzingContext::new(scope.clone()), tu.version, params, prefix);

        let mut used_labels: Vec<u32> = Vec::new();

        let before =
            unreachable_switch_content(rng, cases_before, &mut used_labels, &mut stmt_fuzzer);
        let after =
            unreachable_switch_content(rng, cases_after, &mut used_labels, &mut stmt_fuzzer);

        // Case labels to appear before original statement i; label 0, the
        // real entry, is always first.
        let mut labels_per_stmt: Vec<Vec<u32>> = vec![Vec::new(); stmt_count];
        labels_per_stmt[0].push(0);
        for _ in 0..cases_during {
            let slot = rng.choose_index(stmt_count);
            let label = fresh_case_label(rng, &mut used_labels);
            labels_per_stmt[slot].push(label);
        }

        let generator = OpaqueExprGenerator::new(tu.version, params);
        let mut cond_fuzzer = Fuzzer::new(FuzzingContext::new(scope), tu.version, params);
        let zero = generator.make_opaque_zero(BasicType::Int, false, 0, rng, &mut cond_fuzzer);
        let subject = Expr::call(consts::SWITCH, vec![zero]);

        let block = tu
            .find_block_mut(block_id)
            .expect("block to switchify is present");
        let originals = std::mem::take(&mut block.stmts);

        let mut body = Vec::new();
        body.extend(before);
        for (stmt, labels) in originals.into_iter().zip(labels_per_stmt) {
            for label in labels {
                body.push(Stmt::new(StmtKind::CaseLabel(Some(Expr::int(
                    label as i32,
                )))));
            }
            body.push(stmt);
        }
        body.push(Stmt::new(StmtKind::Break));
        body.extend(after);
        body.push(Stmt::new(StmtKind::CaseLabel(None)));
        body.push(Stmt::expr(Expr::int(1)));

        block.stmts = vec![Stmt::new(StmtKind::Switch {
            subject,
            body: shadermorph::ast::Block::new(body, true),
        })];
    }

}

/// A case label in `[1, 100)` not used before in this switch; label 0 stays
/// reserved for the reachable entry.
fn fresh_case_label(rng: &mut MutationRng, used: &mut Vec<u32>) -> u32 {
    loop {
        let label = rng.next_positive_int(100);
        if !used.contains(&label) {
            used.push(label);
            return label;
        }
    }
}

fn unreachable_switch_content(
    rng: &mut MutationRng,
    count: u32,
    used_labels: &mut Vec<u32>,
    fuzzer: &mut Fuzzer,
) -> Vec<Stmt> {
    let mut stmts = Vec::new();
    for _ in 0..count {
        let label = fresh_case_label(rng, used_labels);
        stmts.push(Stmt::new(StmtKind::CaseLabel(Some(Expr::int(
            label as i32,
        )))));
        stmts.push(fuzzer.fuzz_stmt(rng));
    }
    stmts
}
