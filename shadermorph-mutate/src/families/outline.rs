//! Statement outlining: extract the right-hand side of an assignment into a
//! fresh function taking every referenced in-scope variable as a parameter.

use shadermorph::ast::{
    BinOp, Block, Declaration, Expr, ExprKind, FunctionDefinition, FunctionPrototype, NodeId,
    ParamDecl, Stmt, StmtKind, TranslationUnit,
};
use shadermorph::consts;
use shadermorph::scope::Scope;
use shadermorph::rng::MutationRng;
use shadermorph::typer::builtin_variable_type;
use shadermorph::types::Type;
use shadermorph::walk::{declare_global, declare_group, declare_params, referenced_names};

use crate::families::fresh_prefix_id;
use crate::mutation::Mutation;
use crate::params::GenerationParams;

pub struct OutlineStatementMutation {
    stmt: NodeId,
    scope: Scope,
    enclosing_function: String,
}

fn assignment_parts(stmt: &Stmt) -> Option<(&str, &Expr)> {
    let StmtKind::Expr(expr) = &stmt.kind else {
        return None;
    };
    let ExprKind::Binary(BinOp::Assign, lhs, rhs) = &expr.kind else {
        return None;
    };
    match &lhs.kind {
        ExprKind::Ident(name) => Some((name, rhs)),
        _ => None,
    }
}

fn lhs_type(name: &str, scope: &Scope, tu: &TranslationUnit) -> Option<Type> {
    scope
        .lookup_type(name)
        .cloned()
        .or_else(|| builtin_variable_type(name, tu.version, tu.kind))
}

/// The right-hand side must not mention array-typed variables: arrays cannot
/// be passed as the synthesized function's parameters here.
fn references_array(rhs: &Expr, scope: &Scope) -> bool {
    referenced_names(rhs).iter().any(|name| {
        scope.lookup_type(name).is_some_and(Type::is_array)
    })
}

fn suitable_stmt(stmt: &Stmt, scope: &Scope, tu: &TranslationUnit) -> bool {
    let Some((lhs, rhs)) = assignment_parts(stmt) else {
        return false;
    };
    if references_array(rhs, scope) {
        return false;
    }
    lhs_type(lhs, scope, tu).is_some()
}

pub fn find_outline_mutations(
    tu: &TranslationUnit,
    _rng: &mut MutationRng,
    _params: &GenerationParams,
) -> Vec<OutlineStatementMutation> {
    struct Walker<'a> {
        tu: &'a TranslationUnit,
        scope: Scope,
        function: String,
        out: Vec<OutlineStatementMutation>,
    }

    impl Walker<'_> {
        fn visit_block(&mut self, block: &Block) {
            self.scope.push_frame();
            for stmt in &block.stmts {
                self.visit_stmt(stmt);
            }
            self.scope.pop_frame();
        }

        fn visit_stmt(&mut self, stmt: &Stmt) {
            if suitable_stmt(stmt, &self.scope, self.tu) {
                self.out.push(OutlineStatementMutation {
                    stmt: stmt.id,
                    scope: self.scope.flatten(),
                    enclosing_function: self.function.clone(),
                });
            }
            match &stmt.kind {
                StmtKind::Decl(group) => declare_group(&mut self.scope, group),
                StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
                    self.visit_block(block);
                }
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.visit_stmt(then_branch);
                    if let Some(else_branch) = else_branch {
                        self.visit_stmt(else_branch);
                    }
                }
                StmtKind::For { init, body, .. } => {
                    self.scope.push_frame();
                    if let Some(init) = init {
                        self.visit_stmt(init);
                    }
                    self.visit_stmt(body);
                    self.scope.pop_frame();
                }
                StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                    self.visit_stmt(body);
                }
                _ => {}
            }
        }
    }

    let mut walker = Walker {
        tu,
        scope: Scope::new(),
        function: String::new(),
        out: Vec::new(),
    };
    for declaration in &tu.declarations {
        match declaration {
            Declaration::Function(function) => {
                walker.function = function.prototype.name.clone();
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

impl Mutation for OutlineStatementMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        let (lhs_name, rhs) = {
            let stmt = tu
                .find_stmt(self.stmt)
                .expect("outline site vanished between discovery and application");
            assert!(
                suitable_stmt(stmt, &self.scope, tu),
                "outline site became unsuitable between discovery and application"
            );
            let (lhs, rhs) = assignment_parts(stmt).expect("suitable statement is an assignment");
            (lhs.to_string(), rhs.clone_fresh())
        };

        // Parameters: every referenced variable the statement's scope knows,
        // in first-use order, stripped of qualifiers.
        let referenced: Vec<String> = referenced_names(&rhs)
            .into_iter()
            .filter(|name| self.scope.lookup(name).is_some())
            .collect();
        let params: Vec<ParamDecl> = referenced
            .iter()
            .map(|name| {
                let ty = self
                    .scope
                    .lookup_type(name)
                    .expect("referenced name resolves")
                    .without_qualifiers()
                    .clone();
                assert!(!ty.is_array(), "arrays were excluded at discovery");
                ParamDecl {
                    name: name.clone(),
                    ty,
                }
            })
            .collect();

        let return_type = lhs_type(&lhs_name, &self.scope, tu)
            .expect("suitable statement has a typed left-hand side")
            .without_qualifiers()
            .clone();

        let function_name = format!(
            "{}{}",
            consts::OUTLINED_FUNCTION_PREFIX,
            fresh_prefix_id(tu, consts::OUTLINED_FUNCTION_PREFIX)
        );

        let call = Expr::call(
            function_name.clone(),
            referenced.iter().map(|name| Expr::ident(name.clone())).collect(),
        );
        let replaced = tu.replace_stmt(
            self.stmt,
            Stmt::expr(Expr::assign(Expr::ident(lhs_name), call)),
        );
        assert!(replaced, "outline target was present a moment ago");

        tu.add_declaration_before(
            Declaration::Function(FunctionDefinition {
                prototype: FunctionPrototype {
                    name: function_name,
                    return_type,
                    params,
                },
                body: Block::new(vec![Stmt::new(StmtKind::Return(Some(rhs)))], false),
            }),
            &self.enclosing_function,
        );
    }

    fn name(&self) -> &'static str {
        "OutlineStatementMutation"
    }
}
