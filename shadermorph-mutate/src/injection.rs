//! Injection points: addressable, order-stable positions at which a new
//! statement may be inserted or the next statement replaced. A point is
//! backed by node identity (owning block plus a stable marker statement),
//! never by a numeric index, so edits at one point do not invalidate other
//! points discovered in the same pass.

use shadermorph::ast::{
    Block, Declaration, FunctionPrototype, NodeId, Stmt, StmtKind, TranslationUnit,
};
use shadermorph::scope::Scope;
use shadermorph::walk::{declare_global, declare_group, declare_params};

#[derive(Debug, Clone)]
pub enum PointKind {
    /// Before the statement identified by `next` in `block`, or after the
    /// last statement when `next` is `None`.
    Block {
        block: NodeId,
        next: Option<NodeId>,
    },
    /// The body position of a loop whose body is not a block.
    LoopBody { loop_stmt: NodeId },
    /// A non-block branch of an if statement.
    IfBranch { if_stmt: NodeId, then_branch: bool },
}

#[derive(Debug, Clone)]
pub struct InjectionPoint {
    pub kind: PointKind,
    /// Lexically inside a loop (for a loop-body point: inside that loop).
    pub in_loop: bool,
    pub in_switch: bool,
    pub enclosing_function: FunctionPrototype,
    /// Flattened snapshot of the scope valid at this point.
    pub scope: Scope,
}

impl InjectionPoint {
    #[must_use]
    pub fn has_next_stmt(&self) -> bool {
        match &self.kind {
            PointKind::Block { next, .. } => next.is_some(),
            PointKind::LoopBody { .. } | PointKind::IfBranch { .. } => true,
        }
    }

    #[must_use]
    pub fn next_stmt<'a>(&self, tu: &'a TranslationUnit) -> Option<&'a Stmt> {
        match &self.kind {
            PointKind::Block { block, next } => {
                let next = (*next)?;
                let block = tu.find_block(*block)?;
                let index = block.index_of(next)?;
                block.stmts.get(index)
            }
            PointKind::LoopBody { loop_stmt } => tu.find_stmt(*loop_stmt)?.loop_body(),
            PointKind::IfBranch {
                if_stmt,
                then_branch,
            } => match &tu.find_stmt(*if_stmt)?.kind {
                StmtKind::If {
                    then_branch: t,
                    else_branch: e,
                    ..
                } => {
                    if *then_branch {
                        Some(&**t)
                    } else {
                        e.as_deref()
                    }
                }
                _ => None,
            },
        }
    }

    #[must_use]
    pub fn is_if_branch_point(&self) -> bool {
        matches!(self.kind, PointKind::IfBranch { .. })
    }

    /// Inserts a statement at this point. For a loop-body or if-branch point
    /// the existing body is wrapped in a block with the new statement first.
    /// Panics if the point no longer addresses the tree, which indicates
    /// disagreement between discovery and application.
    pub fn inject(&self, tu: &mut TranslationUnit, stmt: Stmt) {
        match &self.kind {
            PointKind::Block { block, next } => {
                let inserted = tu.insert_stmt(*block, *next, stmt);
                assert!(inserted, "stale injection point: block edit failed");
            }
            PointKind::LoopBody { .. } | PointKind::IfBranch { .. } => {
                let body = self
                    .take_body(tu)
                    .expect("stale injection point: body missing");
                self.put_body(tu, Stmt::block(vec![stmt, body], true));
            }
        }
    }

    /// Replaces the next statement with the given statement.
    pub fn replace_next(&self, tu: &mut TranslationUnit, stmt: Stmt) {
        match &self.kind {
            PointKind::Block { next, .. } => {
                let next = next.expect("replace_next at an end-of-block point");
                let replaced = tu.replace_stmt(next, stmt);
                assert!(replaced, "stale injection point: statement replace failed");
            }
            PointKind::LoopBody { .. } | PointKind::IfBranch { .. } => {
                self.put_body(tu, stmt);
            }
        }
    }

    fn take_body(&self, tu: &mut TranslationUnit) -> Option<Stmt> {
        let slot = self.body_slot(tu)?;
        Some(std::mem::replace(slot, Stmt::new(StmtKind::Empty)))
    }

    fn put_body(&self, tu: &mut TranslationUnit, stmt: Stmt) {
        let slot = self
            .body_slot(tu)
            .expect("stale injection point: body missing");
        *slot = stmt;
    }

    fn body_slot<'a>(&self, tu: &'a mut TranslationUnit) -> Option<&'a mut Stmt> {
        match &self.kind {
            PointKind::Block { .. } => None,
            PointKind::LoopBody { loop_stmt } => match &mut tu.find_stmt_mut(*loop_stmt)?.kind {
                StmtKind::For { body, .. }
                | StmtKind::While { body, .. }
                | StmtKind::DoWhile { body, .. } => Some(&mut **body),
                _ => None,
            },
            PointKind::IfBranch {
                if_stmt,
                then_branch,
            } => match &mut tu.find_stmt_mut(*if_stmt)?.kind {
                StmtKind::If {
                    then_branch: t,
                    else_branch: e,
                    ..
                } => {
                    if *then_branch {
                        Some(&mut **t)
                    } else {
                        e.as_deref_mut()
                    }
                }
                _ => None,
            },
        }
    }
}

struct Collector {
    points: Vec<InjectionPoint>,
    scope: Scope,
    loop_depth: u32,
    switch_depth: u32,
    current_function: Option<FunctionPrototype>,
}

impl Collector {
    fn add_point(&mut self, kind: PointKind, in_loop: bool) {
        let Some(function) = self.current_function.clone() else {
            return;
        };
        self.points.push(InjectionPoint {
            kind,
            in_loop,
            in_switch: self.switch_depth > 0,
            enclosing_function: function,
            scope: self.scope.flatten(),
        });
    }

    fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }

    /// `direct_switch_body`: statements of this block are labelled switch
    /// content; no injection directly between them.
    fn visit_block(&mut self, block: &Block, direct_switch_body: bool) {
        self.scope.push_frame();
        for stmt in &block.stmts {
            if !direct_switch_body {
                self.add_point(
                    PointKind::Block {
                        block: block.id,
                        next: Some(stmt.id),
                    },
                    self.in_loop(),
                );
            }
            self.visit_stmt(stmt);
        }
        if !direct_switch_body {
            self.add_point(
                PointKind::Block {
                    block: block.id,
                    next: None,
                },
                self.in_loop(),
            );
        }
        self.scope.pop_frame();
    }

    fn visit_loop_body(&mut self, loop_stmt: &Stmt) {
        let body = loop_stmt.loop_body().expect("loop statement has a body");
        if body.as_block().is_none() {
            self.add_point(PointKind::LoopBody { loop_stmt: loop_stmt.id }, true);
        }
        self.loop_depth += 1;
        self.visit_stmt(body);
        self.loop_depth -= 1;
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => self.visit_block(block, false),
            StmtKind::Decl(group) => declare_group(&mut self.scope, group),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                if then_branch.as_block().is_none() {
                    self.add_point(
                        PointKind::IfBranch {
                            if_stmt: stmt.id,
                            then_branch: true,
                        },
                        self.in_loop(),
                    );
                }
                if let Some(else_branch) = else_branch {
                    if else_branch.as_block().is_none() {
                        self.add_point(
                            PointKind::IfBranch {
                                if_stmt: stmt.id,
                                then_branch: false,
                            },
                            self.in_loop(),
                        );
                    }
                }
                self.visit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            StmtKind::For { init, .. } => {
                self.scope.push_frame();
                if let Some(init) = init {
                    if let StmtKind::Decl(group) = &init.kind {
                        declare_group(&mut self.scope, group);
                    }
                }
                self.visit_loop_body(stmt);
                self.scope.pop_frame();
            }
            StmtKind::While { .. } | StmtKind::DoWhile { .. } => self.visit_loop_body(stmt),
            StmtKind::Switch { body, .. } => {
                // No injection directly between the labelled statements of a
                // switch body; nested blocks are still fair game.
                self.switch_depth += 1;
                self.visit_block(body, true);
                self.switch_depth -= 1;
            }
            _ => {}
        }
    }
}

/// Single read-only sweep collecting every injection point in the unit, in a
/// deterministic order. Families filter the result with their own
/// suitability predicates.
#[must_use]
pub fn collect_injection_points(tu: &TranslationUnit) -> Vec<InjectionPoint> {
    let mut collector = Collector {
        points: Vec::new(),
        scope: Scope::new(),
        loop_depth: 0,
        switch_depth: 0,
        current_function: None,
    };
    for declaration in &tu.declarations {
        match declaration {
            Declaration::Function(function) => {
                collector.current_function = Some(function.prototype.clone());
                collector.scope.push_frame();
                declare_params(&mut collector.scope, &function.prototype);
                collector.visit_block(&function.body, false);
                collector.scope.pop_frame();
                collector.current_function = None;
            }
            other => declare_global(&mut collector.scope, other),
        }
    }
    collector.points
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadermorph::ast::{Expr, FunctionDefinition};
    use shadermorph::types::Type;
    use shadermorph::version::{ShaderKind, ShadingLanguageVersion};

    fn tu_with_main(stmts: Vec<Stmt>) -> TranslationUnit {
        TranslationUnit::new(
            ShadingLanguageVersion::Essl300,
            ShaderKind::Fragment,
            vec![Declaration::Function(FunctionDefinition {
                prototype: FunctionPrototype {
                    name: "main".to_string(),
                    return_type: Type::Void,
                    params: Vec::new(),
                },
                body: Block::new(stmts, true),
            })],
        )
    }

    #[test]
    fn one_point_per_statement_plus_end() {
        let tu = tu_with_main(vec![
            Stmt::expr(Expr::assign(Expr::ident("x"), Expr::int(1))),
            Stmt::expr(Expr::assign(Expr::ident("x"), Expr::int(2))),
        ]);
        let points = collect_injection_points(&tu);
        assert_eq!(points.len(), 3);
        assert!(points[0].has_next_stmt());
        assert!(points[1].has_next_stmt());
        assert!(!points[2].has_next_stmt());
    }

    #[test]
    fn points_survive_insertions_at_other_points() {
        let tu = tu_with_main(vec![
            Stmt::expr(Expr::assign(Expr::ident("x"), Expr::int(1))),
            Stmt::expr(Expr::assign(Expr::ident("x"), Expr::int(2))),
        ]);
        let mut tu = tu;
        let points = collect_injection_points(&tu);
        // Insert at the first point, then at the (previously discovered)
        // second point; the second insertion must still land before the
        // original second statement.
        points[0].inject(&mut tu, Stmt::new(StmtKind::Empty));
        points[1].inject(&mut tu, Stmt::new(StmtKind::Discard));
        let body = &tu.functions().next().unwrap().body;
        assert!(matches!(body.stmts[0].kind, StmtKind::Empty));
        assert!(matches!(body.stmts[2].kind, StmtKind::Discard));
        assert_eq!(body.stmts.len(), 4);
    }

    #[test]
    fn loop_points_know_they_are_in_a_loop() {
        let tu = tu_with_main(vec![Stmt::new(StmtKind::While {
            cond: Expr::bool_lit(true),
            body: Box::new(Stmt::block(
                vec![Stmt::expr(Expr::assign(Expr::ident("x"), Expr::int(1)))],
                true,
            )),
        })]);
        let points = collect_injection_points(&tu);
        let inside: Vec<_> = points.iter().filter(|p| p.in_loop).collect();
        // One point before the assignment, one at the end of the loop body.
        assert_eq!(inside.len(), 2);
    }

    #[test]
    fn non_block_loop_bodies_get_a_wrapping_point() {
        let tu = tu_with_main(vec![Stmt::new(StmtKind::While {
            cond: Expr::bool_lit(true),
            body: Box::new(Stmt::expr(Expr::assign(Expr::ident("x"), Expr::int(1)))),
        })]);
        let mut tu = tu;
        let points = collect_injection_points(&tu);
        let loop_point = points
            .iter()
            .find(|p| matches!(p.kind, PointKind::LoopBody { .. }))
            .expect("loop body point");
        loop_point.inject(&mut tu, Stmt::new(StmtKind::Empty));
        let body = &tu.functions().next().unwrap().body;
        let StmtKind::While { body: loop_body, .. } = &body.stmts[0].kind else {
            unreachable!()
        };
        let block = loop_body.as_block().expect("body wrapped in a block");
        assert_eq!(block.stmts.len(), 2);
    }
}
