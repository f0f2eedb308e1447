//! Sub-expression identity wrapping: replace a typed sub-expression `e` with
//! an identity-tagged computation of the same value. L-value positions,
//! output arguments, and restricted const/loop-header contexts are skipped.

use std::collections::HashSet;

use shadermorph::ast::{
    Block, Declaration, Expr, ExprKind, NodeId, Stmt, StmtKind, TranslationUnit,
};
use shadermorph::rng::MutationRng;
use shadermorph::scope::Scope;
use shadermorph::typer::{output_argument_indices, type_of, TypeEnv};
use shadermorph::types::{BasicType, TypeQualifier};
use shadermorph::walk::{declare_global, declare_group, declare_params, referenced_names};

use crate::fuzzer::{Fuzzer, FuzzingContext};
use crate::mutation::Mutation;
use crate::opaque::OpaqueExprGenerator;
use crate::params::GenerationParams;

pub struct IdentityMutation {
    target: NodeId,
    ty: BasicType,
    const_context: bool,
    scope: Scope,
    rng: MutationRng,
    params: GenerationParams,
}

pub fn find_identity_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<IdentityMutation> {
    let env = TypeEnv::new(tu);
    let mut walker = Walker {
        tu,
        env: &env,
        rng,
        params,
        scope: Scope::new(),
        loop_iterators: Vec::new(),
        in_initializer: false,
        decl_is_const: false,
        out: Vec::new(),
    };
    for declaration in &tu.declarations {
        match declaration {
            Declaration::Function(function) => {
                walker.scope.push_frame();
                declare_params(&mut walker.scope, &function.prototype);
                walker.visit_block(&function.body);
                walker.scope.pop_frame();
            }
            other => declare_global(&mut walker.scope, other),
        }
    }
    walker.out
}

struct Walker<'a> {
    tu: &'a TranslationUnit,
    env: &'a TypeEnv<'a>,
    rng: &'a mut MutationRng,
    params: &'a GenerationParams,
    scope: Scope,
    /// Names of loop counters of enclosing restricted-dialect `for` loops;
    /// they must not appear in fuzzed replacement code.
    loop_iterators: Vec<HashSet<String>>,
    in_initializer: bool,
    decl_is_const: bool,
    out: Vec<IdentityMutation>,
}

impl Walker<'_> {
    fn consider(&mut self, expr: &Expr) {
        let Some(ty) = type_of(expr, &self.scope, self.env) else {
            return;
        };
        let Some(basic) = ty.as_basic() else {
            return;
        };
        let mut snapshot = self.scope.flatten();
        if self.tu.version.restricted_for_loops() {
            for iterators in &self.loop_iterators {
                for name in iterators {
                    snapshot.remove_from_current_frame(name);
                }
            }
        }
        self.out.push(IdentityMutation {
            target: expr.id,
            ty: basic,
            const_context: self.const_context(),
            scope: snapshot,
            rng: self.rng.spawn_child(),
            params: self.params.clone(),
        });
    }

    fn const_context(&self) -> bool {
        self.in_initializer && self.decl_is_const
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.consider(expr);
        match &expr.kind {
            ExprKind::Binary(op, lhs, rhs) => {
                // The target of a write is not a value position.
                if !op.is_side_effecting() {
                    self.visit_expr(lhs);
                }
                self.visit_expr(rhs);
            }
            ExprKind::Unary(op, operand) => {
                if !op.is_side_effecting() {
                    self.visit_expr(operand);
                }
            }
            ExprKind::Ternary(cond, then_expr, else_expr) => {
                self.visit_expr(cond);
                self.visit_expr(then_expr);
                self.visit_expr(else_expr);
            }
            ExprKind::Paren(inner) | ExprKind::Member(inner, _) => self.visit_expr(inner),
            ExprKind::Index(receiver, index) => {
                // Restricted dialects constrain the shape of array indices;
                // leave everything under an index expression alone there.
                if !self.tu.version.is_webgl() {
                    self.visit_expr(receiver);
                    self.visit_expr(index);
                }
            }
            ExprKind::Ctor(_, args) => {
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprKind::Call(name, args) => {
                let outputs = output_argument_indices(name, args, &self.scope, self.env)
                    .unwrap_or_default();
                for (i, arg) in args.iter().enumerate() {
                    if !outputs.contains(&i) {
                        self.visit_expr(arg);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_block(&mut self, block: &Block) {
        self.scope.push_frame();
        for stmt in &block.stmts {
            self.visit_stmt(stmt);
        }
        self.scope.pop_frame();
    }

    fn visit_decl_group(&mut self, group: &shadermorph::ast::VarDeclGroup) {
        let is_const = group.base_type.has_qualifier(TypeQualifier::Const);
        for decl in &group.decls {
            if let Some(init) = &decl.init {
                self.in_initializer = true;
                self.decl_is_const = is_const;
                self.visit_expr(init);
                self.in_initializer = false;
                self.decl_is_const = false;
            }
        }
        declare_group(&mut self.scope, group);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Decl(group) => self.visit_decl_group(group),
            StmtKind::Expr(e) => self.visit_expr(e),
            StmtKind::Block(block) => self.visit_block(block),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(cond);
                self.visit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                self.scope.push_frame();
                if self.tu.version.restricted_for_loops() {
                    // The header's canonical shape must not be disturbed;
                    // note the counter names and go straight to the body.
                    let iterators: HashSet<String> = inc
                        .as_ref()
                        .map(|e| referenced_names(e).into_iter().collect())
                        .unwrap_or_default();
                    if let Some(init) = init {
                        if let StmtKind::Decl(group) = &init.kind {
                            declare_group(&mut self.scope, group);
                        }
                    }
                    self.loop_iterators.push(iterators);
                    self.visit_stmt(body);
                    self.loop_iterators.pop();
                } else {
                    if let Some(init) = init {
                        self.visit_stmt(init);
                    }
                    if let Some(cond) = cond {
                        self.visit_expr(cond);
                    }
                    if let Some(inc) = inc {
                        self.visit_expr(inc);
                    }
                    self.visit_stmt(body);
                }
                self.scope.pop_frame();
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond);
                self.visit_stmt(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.visit_stmt(body);
                self.visit_expr(cond);
            }
            StmtKind::Switch { subject, body } => {
                self.visit_expr(subject);
                self.visit_block(body);
            }
            StmtKind::Return(Some(value)) => self.visit_expr(value),
            // Case labels must stay constant expressions.
            _ => {}
        }
    }
}

impl Mutation for IdentityMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        let expr = tu
            .find_expr(self.target)
            .expect("identity target vanished between discovery and application")
            // Keep inner node ids alive so that identity mutations nested
            // inside this expression remain addressable.
            .clone();
        let generator = OpaqueExprGenerator::new(tu.version, &self.params);
        let mut fuzzer = Fuzzer::new(
            FuzzingContext::new(self.scope.clone()),
            tu.version,
            &self.params,
        );
        let replacement = generator.apply_identity(
            expr,
            self.ty,
            self.const_context,
            0,
            &mut self.rng,
            &mut fuzzer,
        );
        let replaced = tu.replace_expr(self.target, replacement);
        assert!(replaced, "identity target was present a moment ago");
    }

    fn name(&self) -> &'static str {
        "IdentityMutation"
    }
}
