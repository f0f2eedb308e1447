//! Transient child-to-parent table, recomputed per analysis pass. Nothing in
//! the tree stores a parent pointer; a pass that needs to reason about a
//! node's context builds one of these from a read-only walk and drops it when
//! the pass ends.

use std::collections::HashMap;

use crate::ast::{Block, Expr, ExprKind, NodeId, Stmt, StmtKind, TranslationUnit};
use crate::walk::exprs_of_stmt;

#[derive(Debug, Default)]
pub struct ParentMap {
    parents: HashMap<NodeId, NodeId>,
}

impl ParentMap {
    #[must_use]
    pub fn build(tu: &TranslationUnit) -> ParentMap {
        let mut map = ParentMap::default();
        for function in tu.functions() {
            // A function body has no parent node.
            map.record_block(&function.body);
        }
        map
    }

    #[must_use]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    fn record_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.parents.insert(stmt.id, block.id);
            self.record_stmt(stmt);
        }
    }

    fn record_stmt(&mut self, stmt: &Stmt) {
        for expr in exprs_of_stmt(stmt) {
            self.parents.insert(expr.id, stmt.id);
            self.record_expr(expr);
        }
        match &stmt.kind {
            StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
                self.parents.insert(block.id, stmt.id);
                self.record_block(block);
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.parents.insert(then_branch.id, stmt.id);
                self.record_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.parents.insert(else_branch.id, stmt.id);
                    self.record_stmt(else_branch);
                }
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.parents.insert(init.id, stmt.id);
                    self.record_stmt(init);
                }
                self.parents.insert(body.id, stmt.id);
                self.record_stmt(body);
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                self.parents.insert(body.id, stmt.id);
                self.record_stmt(body);
            }
            _ => {}
        }
    }

    fn record_expr(&mut self, expr: &Expr) {
        let children: Vec<&Expr> = match &expr.kind {
            ExprKind::Unary(_, e) | ExprKind::Paren(e) | ExprKind::Member(e, _) => vec![e],
            ExprKind::Binary(_, l, r) | ExprKind::Index(l, r) => vec![l, r],
            ExprKind::Ternary(c, t, e) => vec![c, t, e],
            ExprKind::Call(_, args) | ExprKind::Ctor(_, args) => args.iter().collect(),
            _ => Vec::new(),
        };
        for child in children {
            self.parents.insert(child.id, expr.id);
            self.record_expr(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Declaration, FunctionDefinition, FunctionPrototype};
    use crate::types::Type;
    use crate::version::{ShaderKind, ShadingLanguageVersion};

    #[test]
    fn parents_of_switch_body_blocks_are_the_switch() {
        let body = Block::new(vec![Stmt::new(StmtKind::Break)], true);
        let body_id = body.id;
        let switch = Stmt::new(StmtKind::Switch {
            subject: Expr::int(0),
            body,
        });
        let switch_id = switch.id;
        let main_body = Block::new(vec![switch], true);
        let tu = TranslationUnit::new(
            ShadingLanguageVersion::Essl300,
            ShaderKind::Fragment,
            vec![Declaration::Function(FunctionDefinition {
                prototype: FunctionPrototype {
                    name: "main".to_string(),
                    return_type: Type::Void,
                    params: Vec::new(),
                },
                body: main_body,
            })],
        );
        let map = ParentMap::build(&tu);
        assert_eq!(map.parent_of(body_id), Some(switch_id));
        // The function body itself has no parent.
        assert_eq!(map.parent_of(switch_id).and_then(|p| map.parent_of(p)), None);
    }
}
